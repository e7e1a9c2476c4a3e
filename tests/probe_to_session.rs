use ndarray::array;
use ndarray_npy::write_npy;
use std::fs;

use session_annotator::config::JobConfig;
use session_annotator::grouping::groups_from_shanks;
use session_annotator::{annotate_file, Document, ProbeGeometry, SessionPaths};
use tempfile::tempdir;

const TEMPLATE: &str = "<parameters>\
    <generalInfo><date/></generalInfo>\
    <acquisitionSystem><nChannels>6</nChannels></acquisitionSystem>\
    <anatomicalDescription/>\
    <region/>\
    <brainRegions/>\
</parameters>";

#[test]
fn probe_shanks_drive_the_annotation() {
    let dir = tempdir().unwrap();
    let session = SessionPaths::from_recording(dir.path().join("2024-06-10_15-45-00.bin.ap"));

    let probe = ProbeGeometry::new(
        vec![0, 1, 2, 3, 4, 5],
        vec![0.0, 16.0, 0.0, 250.0, 266.0, 250.0],
        vec![0.0, 20.0, 40.0, 0.0, 20.0, 40.0],
        vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
    )
    .unwrap();
    probe.save(session.probe_path()).unwrap();

    let loaded = ProbeGeometry::load(session.probe_path()).unwrap();
    let groups = groups_from_shanks(&loaded);
    assert_eq!(groups.len(), 2);

    let template = dir.path().join("template.xml");
    fs::write(&template, TEMPLATE).unwrap();

    let request = session_annotator::AnnotationRequest::new(groups)
        .with_date("2024-06-10")
        .with_region_labels(["CA1", "PFC"]);
    annotate_file(&template, session.session_xml_path(), &request).unwrap();

    let doc = Document::from_file(session.session_xml_path()).unwrap();
    assert_eq!(doc.find("generalInfo/date").and_then(|e| e.text()), Some("2024-06-10"));
    assert_eq!(doc.find("region").and_then(|e| e.text()), Some("CA1 CA1 CA1 PFC PFC PFC"));
    assert_eq!(
        doc.find("brainRegions/PFC/channels").and_then(|e| e.text()),
        Some("3 4 5")
    );
}

#[test]
fn job_file_with_positions_runs_end_to_end() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("template.xml"), TEMPLATE).unwrap();
    write_npy(
        dir.path().join("channel_positions.npy"),
        &array![
            [0.0f32, 0.0],
            [0.0, 20.0],
            [300.0, 0.0],
            [300.0, 20.0],
            [600.0, 0.0],
            [600.0, 20.0]
        ],
    )
    .unwrap();

    let job_path = dir.path().join("job.toml");
    fs::write(
        &job_path,
        r#"
template = "template.xml"
output = "annotated.xml"
regions = ["CA1", "", "TH"]

[groups]
positions = "channel_positions.npy"
x_threshold = 50.0
y_threshold = 50.0
"#,
    )
    .unwrap();

    let job = JobConfig::load(&job_path).unwrap();
    let request = job.to_request().unwrap();
    assert_eq!(request.channel_groups.len(), 3);

    let report = annotate_file(&job.template, &job.output, &request).unwrap();
    assert_eq!(report.regions.len(), 2);

    let doc = Document::from_file(dir.path().join("annotated.xml")).unwrap();
    let groups = doc.find("anatomicalDescription/channelGroups").unwrap();
    assert_eq!(groups.children.len(), 3);
    assert_eq!(
        doc.find("brainRegions/TH/electrodeGroups").and_then(|e| e.text()),
        Some("2")
    );
    // Unassigned middle group leaves channels 2 and 3 empty
    let raw = fs::read_to_string(dir.path().join("annotated.xml")).unwrap();
    assert!(raw.contains("<region>CA1 CA1   TH TH</region>"));
}

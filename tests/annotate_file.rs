use std::fs;
use std::path::{Path, PathBuf};

use session_annotator::{
    annotate, annotate_file, AnnotateError, AnnotationRequest, ChannelGroup, Document,
    SkipReason, StepOutcome,
};
use tempfile::{tempdir, TempDir};

const TEMPLATE: &str = r#"<?xml version='1.0'?>
<parameters version="1.0" creator="ndManager-1.2.1">
  <generalInfo>
    <date>2000-01-01</date>
    <experimenters/>
  </generalInfo>
  <acquisitionSystem>
    <nBits>16</nBits>
    <nChannels>12</nChannels>
    <samplingRate>30000</samplingRate>
  </acquisitionSystem>
  <anatomicalDescription>
    <channelGroups>
      <group>
        <channel skip="0">0</channel>
      </group>
    </channelGroups>
  </anatomicalDescription>
  <region/>
  <brainRegions/>
</parameters>
"#;

fn write_template(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("template.xml");
    fs::write(&path, contents).unwrap();
    path
}

fn groups(raw: &[&[usize]]) -> Vec<ChannelGroup> {
    raw.iter().map(|g| ChannelGroup::new(g.iter().copied())).collect()
}

fn labels(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[test]
fn writes_groups_regions_and_date() {
    let dir = tempdir().unwrap();
    let template = write_template(&dir, TEMPLATE);
    let output = dir.path().join("session.xml");

    let report = annotate(
        &template,
        &output,
        &groups(&[&[0, 1, 2], &[3, 4, 5], &[6, 7]]),
        Some("2024-06-10"),
        Some(labels(&["CA1", "CA1", "PFC"]).as_slice()),
    )
    .unwrap();

    assert_eq!(report.group_count, 3);
    assert_eq!(report.channel_count, 8);

    let expected = r#"<?xml version="1.0" encoding="utf-8"?>
<parameters version="1.0" creator="ndManager-1.2.1">
 <generalInfo>
  <date>2024-06-10</date>
  <experimenters/>
 </generalInfo>
 <acquisitionSystem>
  <nBits>16</nBits>
  <nChannels>12</nChannels>
  <samplingRate>30000</samplingRate>
 </acquisitionSystem>
 <anatomicalDescription>
  <channelGroups>
   <group>
    <channel skip="0">0</channel>
    <channel skip="0">1</channel>
    <channel skip="0">2</channel>
   </group>
   <group>
    <channel skip="0">3</channel>
    <channel skip="0">4</channel>
    <channel skip="0">5</channel>
   </group>
   <group>
    <channel skip="0">6</channel>
    <channel skip="0">7</channel>
   </group>
  </channelGroups>
 </anatomicalDescription>
 <region>CA1 CA1 CA1 CA1 CA1 CA1 PFC PFC    </region>
 <brainRegions>
  <CA1>
   <channels>0 1 2 3 4 5</channels>
   <electrodeGroups>0 1</electrodeGroups>
  </CA1>
  <PFC>
   <channels>6 7</channels>
   <electrodeGroups>2</electrodeGroups>
  </PFC>
 </brainRegions>
</parameters>
"#;
    assert_eq!(read(&output), expected);
}

#[test]
fn template_is_never_modified() {
    let dir = tempdir().unwrap();
    let template = write_template(&dir, TEMPLATE);
    let output = dir.path().join("out.xml");

    annotate(&template, &output, &groups(&[&[0, 1]]), Some("2024-06-10"), None).unwrap();
    assert_eq!(read(&template), TEMPLATE);
}

#[test]
fn repeated_runs_are_byte_identical() {
    let dir = tempdir().unwrap();
    let template = write_template(&dir, TEMPLATE);
    let first = dir.path().join("first.xml");
    let second = dir.path().join("second.xml");

    let request = AnnotationRequest::new(groups(&[&[0, 1], &[1, 2], &[9, 8]]))
        .with_date("2024-06-10")
        .with_region_labels(["B", "A", ""]);
    annotate_file(&template, &first, &request).unwrap();
    annotate_file(&template, &second, &request).unwrap();

    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
}

#[test]
fn output_can_serve_as_its_own_template() {
    let dir = tempdir().unwrap();
    let template = write_template(&dir, TEMPLATE);
    let once = dir.path().join("once.xml");
    let twice = dir.path().join("twice.xml");

    let request = AnnotationRequest::new(groups(&[&[0, 1], &[2, 3]]))
        .with_region_labels(["CA1", "CA3"]);
    annotate_file(&template, &once, &request).unwrap();
    annotate_file(&once, &twice, &request).unwrap();

    let doc = Document::from_file(&twice).unwrap();
    let groups_element = doc.find("anatomicalDescription/channelGroups").unwrap();
    assert_eq!(groups_element.children.len(), 2);
    assert_eq!(doc.find("brainRegions").unwrap().children.len(), 2);
}

#[test]
fn label_mismatch_writes_nothing() {
    let dir = tempdir().unwrap();
    let template = write_template(&dir, TEMPLATE);
    let output = dir.path().join("out.xml");

    let err = annotate(
        &template,
        &output,
        &groups(&[&[0], &[1], &[2]]),
        None,
        Some(labels(&["CA1", "PFC"]).as_slice()),
    )
    .unwrap_err();

    assert!(matches!(err, AnnotateError::RegionCountMismatch { labels: 2, groups: 3 }));
    assert!(!output.exists());
}

#[test]
fn failed_validation_keeps_existing_output() {
    let dir = tempdir().unwrap();
    let template = write_template(&dir, "<parameters><region/></parameters>");
    let output = dir.path().join("out.xml");
    fs::write(&output, "previous").unwrap();

    let err = annotate(&template, &output, &[], None, None).unwrap_err();
    assert!(matches!(err, AnnotateError::MissingAnatomicalDescription));
    assert_eq!(read(&output), "previous");
}

#[test]
fn existing_output_is_overwritten() {
    let dir = tempdir().unwrap();
    let template = write_template(&dir, TEMPLATE);
    let output = dir.path().join("out.xml");
    fs::write(&output, "stale contents that are much longer than nothing").unwrap();

    annotate(&template, &output, &[], None, None).unwrap();
    let written = read(&output);
    assert!(written.starts_with("<?xml"));
    assert!(written.contains("<channelGroups/>"));
    assert!(written.ends_with("</parameters>\n"));
}

#[test]
fn missing_date_field_is_skipped_with_other_steps_applied() {
    let dir = tempdir().unwrap();
    let template = write_template(
        &dir,
        "<parameters>\
           <acquisitionSystem><nChannels>4</nChannels></acquisitionSystem>\
           <anatomicalDescription/>\
           <region/>\
           <brainRegions/>\
         </parameters>",
    );
    let output = dir.path().join("out.xml");

    let report = annotate(
        &template,
        &output,
        &groups(&[&[0, 1], &[2, 3]]),
        Some("2024-06-10"),
        Some(labels(&["CA1", "TH"]).as_slice()),
    )
    .unwrap();

    assert_eq!(
        report.date,
        StepOutcome::Skipped(SkipReason::MissingSection("generalInfo/date"))
    );
    assert!(report.region_array.is_applied());
    assert!(report.brain_regions.is_applied());

    let doc = Document::from_file(&output).unwrap();
    assert_eq!(doc.find("region").and_then(|e| e.text()), Some("CA1 CA1 TH TH"));
    assert_eq!(
        doc.find("brainRegions/TH/electrodeGroups").and_then(|e| e.text()),
        Some("1")
    );
}

#[test]
fn date_only_rerun_keeps_untouched_text_verbatim() {
    let dir = tempdir().unwrap();
    let template = write_template(
        &dir,
        "<parameters>\n\
           <generalInfo><date>2000-01-01</date><notes>  free text </notes></generalInfo>\n\
           <acquisitionSystem><nChannels>4</nChannels></acquisitionSystem>\n\
           <anatomicalDescription/>\n\
           <region/>\n\
           <brainRegions/>\n\
         </parameters>",
    );
    let first = dir.path().join("first.xml");
    let second = dir.path().join("second.xml");

    annotate(
        &template,
        &first,
        &groups(&[&[0, 1], &[2, 3]]),
        None,
        Some(labels(&["CA1", ""]).as_slice()),
    )
    .unwrap();
    assert!(read(&first).contains("<region>CA1 CA1  </region>"));

    let report = annotate(
        &first,
        &second,
        &groups(&[&[0, 1], &[2, 3]]),
        Some("2024-06-10"),
        None,
    )
    .unwrap();
    assert!(report.date.is_applied());
    assert_eq!(report.region_array, StepOutcome::Skipped(SkipReason::NoInput));

    let doc = Document::from_file(&second).unwrap();
    let region = doc.find("region").and_then(|e| e.text()).unwrap();
    assert_eq!(region, "CA1 CA1  ");
    assert_eq!(region.split(' ').count(), 4);
    assert_eq!(
        doc.find("generalInfo/notes").and_then(|e| e.text()),
        Some("  free text ")
    );
    assert!(read(&second).contains("<notes>  free text </notes>"));
}

#[test]
fn missing_template_is_an_io_error() {
    let dir = tempdir().unwrap();
    let err = annotate(
        dir.path().join("nope.xml"),
        dir.path().join("out.xml"),
        &[],
        None,
        None,
    )
    .unwrap_err();
    assert!(matches!(err, AnnotateError::Io(_)));
}

#[test]
fn unwritable_output_directory_is_an_io_error() {
    let dir = tempdir().unwrap();
    let template = write_template(&dir, TEMPLATE);
    let output = dir.path().join("missing_dir").join("out.xml");

    let err = annotate(&template, &output, &[], None, None).unwrap_err();
    assert!(matches!(err, AnnotateError::Io(_)));
    assert!(!output.exists());
}

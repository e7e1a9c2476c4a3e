mod annotator;
pub mod config;
pub mod document;
pub mod grouping;
pub mod probe;
pub mod regions;
pub mod session;
pub mod types;

use std::path::Path;

// Re-export types
pub use annotator::{annotate_document, annotate_file, AnnotationRequest};
pub use document::{Document, Element};
pub use probe::{ProbeError, ProbeGeometry};
pub use session::{SessionPaths, SortingSettings};
pub use types::*;

/// Writes an annotated copy of a NeuroScope session file.
///
/// The channel groups replace `anatomicalDescription/channelGroups`. If a
/// date is given it replaces `generalInfo/date`. If region labels are given
/// (one per group) the per-channel `region` array and the `brainRegions`
/// section are rebuilt. The template itself is left untouched.
///
/// # Examples
///
/// ```no_run
/// use session_annotator::{annotate, ChannelGroup};
///
/// let groups = vec![ChannelGroup::new(0..8), ChannelGroup::new(8..16)];
/// let labels = vec!["CA1".to_string(), "PFC".to_string()];
/// match annotate("sample_xml_neuroscope.xml", "session.xml", &groups, Some("2025-11-17"), Some(labels.as_slice())) {
///     Ok(report) => println!("Wrote {} groups", report.group_count),
///     Err(e) => println!("Error annotating file: {}", e),
/// }
/// ```
pub fn annotate<P: AsRef<Path>, Q: AsRef<Path>>(
    template: P,
    output: Q,
    channel_groups: &[ChannelGroup],
    date: Option<&str>,
    region_labels: Option<&[String]>,
) -> Result<AnnotationReport, AnnotateError> {
    let request = AnnotationRequest {
        channel_groups: channel_groups.to_vec(),
        date: date.map(str::to_string),
        region_labels: region_labels.map(<[String]>::to_vec),
        sort_regions: false,
    };
    annotate_file(template, output, &request)
}

use chrono::NaiveDate;
use log::{debug, info, warn};
use std::path::Path;

use crate::document::{is_valid_element_name, Document, Element};
use crate::regions::{join_spaced, region_array, summarize};
use crate::types::*;

// Section paths, relative to the document element
const ANATOMICAL_DESCRIPTION: &str = "anatomicalDescription";
const CHANNEL_GROUPS: &str = "channelGroups";
const DATE_PATH: &str = "generalInfo/date";
const N_CHANNELS_PATH: &str = "acquisitionSystem/nChannels";
const REGION_PATH: &str = "region";
const BRAIN_REGIONS_PATH: &str = "brainRegions";

/// Everything the annotator needs besides the template itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationRequest {
    /// Electrode groups in order; group `i` becomes electrode group `i`
    pub channel_groups: Vec<ChannelGroup>,
    /// Recording date (YYYY-MM-DD) to write into `generalInfo/date`
    pub date: Option<String>,
    /// One region label per channel group; empty strings mark unassigned groups
    pub region_labels: Option<Vec<String>>,
    /// Emit `brainRegions` children sorted by name instead of first-seen order
    pub sort_regions: bool,
}

impl AnnotationRequest {
    pub fn new(channel_groups: Vec<ChannelGroup>) -> Self {
        AnnotationRequest {
            channel_groups,
            ..Default::default()
        }
    }

    pub fn with_date<S: Into<String>>(mut self, date: S) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn with_region_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.region_labels = Some(labels.into_iter().map(Into::into).collect());
        self
    }

    pub fn sorted_regions(mut self, sort: bool) -> Self {
        self.sort_regions = sort;
        self
    }

    /// Labels to derive regions from, or `None` if none were given.
    fn labels(&self) -> Option<&[String]> {
        self.region_labels
            .as_deref()
            .filter(|labels| !labels.is_empty())
    }
}

/// Region data ready to be written, computed before the document is touched.
enum RegionPlan {
    NotRequested,
    Skipped(SkipReason),
    Ready {
        array: Vec<String>,
        summary: RegionSummary,
    },
}

/// Reads `template`, annotates it and writes the result to `output`.
///
/// The template is never modified. If validation fails nothing is written;
/// an existing file at `output` is replaced only once the new document is
/// complete.
pub fn annotate_file<P: AsRef<Path>, Q: AsRef<Path>>(
    template: P,
    output: Q,
    request: &AnnotationRequest,
) -> Result<AnnotationReport, AnnotateError> {
    validate_request(request)?;

    let mut document = Document::from_file(template.as_ref())?;
    let report = annotate_document(&mut document, request)?;
    document.write_atomic(output.as_ref())?;

    info!("Generated XML file: {}", output.as_ref().display());
    info!("Total groups: {}", report.group_count);
    info!("Total channels: {}", report.channel_count);

    Ok(report)
}

/// Annotates a document in memory.
///
/// On error the document is left exactly as it was.
pub fn annotate_document(
    document: &mut Document,
    request: &AnnotationRequest,
) -> Result<AnnotationReport, AnnotateError> {
    validate_request(request)?;

    info!(
        "Generating XML with {} channel groups",
        request.channel_groups.len()
    );
    for (idx, group) in request.channel_groups.iter().enumerate() {
        debug!("  Group {}: {} channels", idx, group.len());
    }

    if document.find(ANATOMICAL_DESCRIPTION).is_none() {
        return Err(AnnotateError::MissingAnatomicalDescription);
    }

    let plan = plan_regions(document, request)?;

    // No fallible work past this point
    rebuild_channel_groups(document, &request.channel_groups);
    let date = set_date(document, request.date.as_deref());

    let (region_array, brain_regions, regions) = match plan {
        RegionPlan::NotRequested => (
            StepOutcome::Skipped(SkipReason::NoInput),
            StepOutcome::Skipped(SkipReason::NoInput),
            RegionSummary::default(),
        ),
        RegionPlan::Skipped(reason) => {
            warn!("Skipping region annotation: {}", reason);
            let summary = request
                .labels()
                .map(|labels| summarize(&request.channel_groups, labels))
                .unwrap_or_default();
            (
                StepOutcome::Skipped(reason.clone()),
                StepOutcome::Skipped(reason),
                summary,
            )
        }
        RegionPlan::Ready { array, summary } => {
            let array_outcome = write_region_array(document, &array);
            let regions_outcome = rebuild_brain_regions(document, &summary);
            (array_outcome, regions_outcome, summary)
        }
    };

    Ok(AnnotationReport {
        group_count: request.channel_groups.len(),
        channel_count: request.channel_groups.iter().map(ChannelGroup::len).sum(),
        date,
        region_array,
        brain_regions,
        regions,
    })
}

/// Checks that depend only on the request, not on the template.
fn validate_request(request: &AnnotationRequest) -> Result<(), AnnotateError> {
    if let Some(labels) = &request.region_labels {
        if labels.len() != request.channel_groups.len() {
            return Err(AnnotateError::RegionCountMismatch {
                labels: labels.len(),
                groups: request.channel_groups.len(),
            });
        }
        if let Some(bad) = labels
            .iter()
            .find(|label| !label.is_empty() && !is_valid_element_name(label))
        {
            return Err(AnnotateError::InvalidRegionName(bad.clone()));
        }
    }

    Ok(())
}

fn plan_regions(
    document: &Document,
    request: &AnnotationRequest,
) -> Result<RegionPlan, AnnotateError> {
    let labels = match request.labels() {
        Some(labels) => labels,
        None => return Ok(RegionPlan::NotRequested),
    };

    let n_channels = match read_n_channels(document) {
        Ok(n) => n,
        Err(reason) => return Ok(RegionPlan::Skipped(reason)),
    };

    let array = region_array(&request.channel_groups, labels, n_channels)?;
    let mut summary = summarize(&request.channel_groups, labels);
    if request.sort_regions {
        summary.sort_by_name();
    }

    Ok(RegionPlan::Ready { array, summary })
}

fn read_n_channels(document: &Document) -> Result<usize, SkipReason> {
    let element = document
        .find(N_CHANNELS_PATH)
        .ok_or(SkipReason::MissingSection(N_CHANNELS_PATH))?;
    let text = element.text().unwrap_or("").trim();
    text.parse::<usize>().map_err(|_| SkipReason::InvalidSection {
        path: N_CHANNELS_PATH,
        found: text.to_string(),
    })
}

/// Replaces `anatomicalDescription/channelGroups` with one `group` per
/// channel group, each channel marked `skip="0"`.
fn rebuild_channel_groups(document: &mut Document, groups: &[ChannelGroup]) {
    let anatomical = match document.find_mut(ANATOMICAL_DESCRIPTION) {
        Some(element) => element,
        None => return,
    };
    anatomical.remove_child(CHANNEL_GROUPS);

    let groups_element = anatomical.push_child(Element::new(CHANNEL_GROUPS));
    for group in groups {
        let group_element = groups_element.push_child(Element::new("group"));
        for channel in &group.channels {
            let channel_element =
                group_element.push_child(Element::with_text("channel", channel.to_string()));
            channel_element.set_attribute("skip", "0");
        }
    }
}

fn set_date(document: &mut Document, date: Option<&str>) -> StepOutcome {
    let date = match date {
        Some(date) => date,
        None => return StepOutcome::Skipped(SkipReason::NoInput),
    };

    if date.len() != 10 || NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
        warn!("Date {:?} is not in YYYY-MM-DD form, writing it as given", date);
    }

    match document.find_mut(DATE_PATH) {
        Some(element) => {
            element.set_text(date);
            info!("Set date to: {}", date);
            StepOutcome::Applied
        }
        None => {
            warn!("{} not found, date not set", DATE_PATH);
            StepOutcome::Skipped(SkipReason::MissingSection(DATE_PATH))
        }
    }
}

fn write_region_array(document: &mut Document, array: &[String]) -> StepOutcome {
    match document.find_mut(REGION_PATH) {
        Some(element) => {
            element.set_text(array.join(" "));
            info!("Set per-channel region array ({} channels)", array.len());
            StepOutcome::Applied
        }
        None => {
            warn!("{} section not found in template", REGION_PATH);
            StepOutcome::Skipped(SkipReason::MissingSection(REGION_PATH))
        }
    }
}

fn rebuild_brain_regions(document: &mut Document, summary: &RegionSummary) -> StepOutcome {
    let brain_regions = match document.find_mut(BRAIN_REGIONS_PATH) {
        Some(element) => element,
        None => {
            warn!("{} section not found in template", BRAIN_REGIONS_PATH);
            return StepOutcome::Skipped(SkipReason::MissingSection(BRAIN_REGIONS_PATH));
        }
    };

    brain_regions.clear();
    for (name, entry) in summary.iter() {
        let region = brain_regions.push_child(Element::new(name.as_str()));
        region.push_child(Element::with_text("channels", join_spaced(&entry.channels)));
        region.push_child(Element::with_text(
            "electrodeGroups",
            join_spaced(&entry.electrode_groups),
        ));
        info!(
            "Brain region '{}': {} channels, electrode groups {:?}",
            name,
            entry.channels.len(),
            entry.electrode_groups
        );
    }
    StepOutcome::Applied
}

use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// An ordered set of recording-channel indices belonging to one electrode group.
///
/// Indices are 0-based and use the same numbering as the session document.
/// The order is preserved when the group is written out.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChannelGroup {
    /// Channel indices in the order they should appear in the document
    pub channels: Vec<usize>,
}

impl ChannelGroup {
    /// Creates a group from anything that yields channel indices.
    pub fn new<I: IntoIterator<Item = usize>>(channels: I) -> Self {
        ChannelGroup {
            channels: channels.into_iter().collect(),
        }
    }

    /// Number of channels in the group
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Returns true if the group has no channels
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl From<Vec<usize>> for ChannelGroup {
    fn from(channels: Vec<usize>) -> Self {
        ChannelGroup { channels }
    }
}

/// Channels and electrode groups that map onto one brain region.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegionEntry {
    /// Union of all channel indices from the contributing groups
    pub channels: BTreeSet<usize>,
    /// Indices of the electrode groups labelled with this region
    pub electrode_groups: BTreeSet<usize>,
}

/// Region name to channels/electrode groups, in first-seen order.
///
/// Built fresh on every annotation run. Channel sets are the union over all
/// groups sharing a label, independent of which label a channel ends up with
/// in the flat per-channel array.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegionSummary {
    /// Region entries keyed by label
    pub regions: IndexMap<String, RegionEntry>,
}

impl RegionSummary {
    /// Number of distinct regions
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Returns true if no group carried a region label
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Looks up a region by name
    pub fn get(&self, name: &str) -> Option<&RegionEntry> {
        self.regions.get(name)
    }

    /// Iterates over regions in emission order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &RegionEntry)> {
        self.regions.iter()
    }

    /// Reorders the regions lexically by name.
    pub fn sort_by_name(&mut self) {
        self.regions.sort_keys();
    }
}

/// Why an optional annotation step did not run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The caller did not supply input for this step
    NoInput,
    /// A section the step needs is absent from the template
    MissingSection(&'static str),
    /// A section exists but its content could not be interpreted
    InvalidSection {
        /// Path of the offending section
        path: &'static str,
        /// The text found there
        found: String,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SkipReason::NoInput => write!(f, "no input supplied"),
            SkipReason::MissingSection(path) => write!(f, "{} not found in template", path),
            SkipReason::InvalidSection { path, found } => {
                write!(f, "{} has unusable value {:?}", path, found)
            }
        }
    }
}

/// Result of one guarded annotation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step ran and modified the document
    Applied,
    /// The step was skipped; the rest of the document is still annotated
    Skipped(SkipReason),
}

impl StepOutcome {
    /// Returns true if the step modified the document
    pub fn is_applied(&self) -> bool {
        matches!(self, StepOutcome::Applied)
    }
}

/// Summary of what an annotation run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationReport {
    /// Number of electrode groups written under `anatomicalDescription/channelGroups`
    pub group_count: usize,
    /// Total number of channel entries across all groups
    pub channel_count: usize,
    /// Outcome of the `generalInfo/date` overwrite
    pub date: StepOutcome,
    /// Outcome of the flat per-channel `region` array
    pub region_array: StepOutcome,
    /// Outcome of the `brainRegions` rebuild
    pub brain_regions: StepOutcome,
    /// Regions derived from the labels (empty if no labels were given)
    pub regions: RegionSummary,
}

/// Error types for the session annotator.
///
/// Validation errors are raised before the document is modified or any
/// output is written. Missing optional sections are not errors; they show
/// up as [`StepOutcome::Skipped`] in the [`AnnotationReport`].
#[derive(Error, Debug)]
pub enum AnnotateError {
    /// The number of region labels differs from the number of channel groups
    #[error("number of region labels ({labels}) must match number of channel groups ({groups})")]
    RegionCountMismatch { labels: usize, groups: usize },

    /// The template has no `anatomicalDescription` section to mount groups under
    #[error("no anatomicalDescription section found in template")]
    MissingAnatomicalDescription,

    /// A region label cannot be used as an element name
    #[error("region label {0:?} is not a valid XML element name")]
    InvalidRegionName(String),

    /// A labelled group refers to a channel beyond `nChannels`
    #[error("channel {channel} in group {group} is out of range for {n_channels} channels")]
    ChannelOutOfRange {
        channel: usize,
        group: usize,
        n_channels: usize,
    },

    /// The template is not well-formed XML
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// An attribute in the template is malformed
    #[error("XML attribute error: {0}")]
    XmlAttribute(#[from] quick_xml::events::attributes::AttrError),

    /// The template has no root element or unbalanced tags
    #[error("malformed document: {0}")]
    Malformed(String),

    /// An I/O error occurred reading the template or writing the output
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The output could not be moved into place
    #[error("failed to persist output to {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

//! TOML job files for the command-line tool.
//!
//! ```toml
//! template = "sample_xml_neuroscope.xml"
//! output = "session.xml"
//! date = "2025-11-17"
//! regions = ["CA1", "CA1", "PFC"]
//!
//! [groups]
//! positions = "channel_positions.npy"
//! x_threshold = 50.0
//! y_threshold = 50.0
//! ```
//!
//! Relative paths are resolved against the directory holding the job file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::annotator::AnnotationRequest;
use crate::grouping::{groups_from_positions, groups_from_shanks, load_channel_positions};
use crate::probe::{ProbeError, ProbeGeometry};
use crate::types::ChannelGroup;

const DEFAULT_THRESHOLD_UM: f32 = 50.0;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid job configuration: {0}")]
    Invalid(String),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Where the channel groups for a job come from. Exactly one source must be set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupsConfig {
    /// Groups listed directly in the job file
    #[serde(default)]
    pub inline: Option<Vec<Vec<usize>>>,
    /// Probe channel-map JSON; one group per shank
    #[serde(default)]
    pub probe: Option<PathBuf>,
    /// `channel_positions.npy`; groups found by position clustering
    #[serde(default)]
    pub positions: Option<PathBuf>,
    /// Maximum horizontal distance between linked channels (um)
    #[serde(default = "default_threshold")]
    pub x_threshold: f32,
    /// Maximum vertical distance between linked channels (um)
    #[serde(default = "default_threshold")]
    pub y_threshold: f32,
}

fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD_UM
}

impl Default for GroupsConfig {
    fn default() -> Self {
        GroupsConfig {
            inline: None,
            probe: None,
            positions: None,
            x_threshold: DEFAULT_THRESHOLD_UM,
            y_threshold: DEFAULT_THRESHOLD_UM,
        }
    }
}

impl GroupsConfig {
    /// Produces the channel groups from whichever source is configured.
    pub fn load_groups(&self) -> Result<Vec<ChannelGroup>, ConfigError> {
        match (&self.inline, &self.probe, &self.positions) {
            (Some(inline), None, None) => {
                Ok(inline.iter().cloned().map(ChannelGroup::from).collect())
            }
            (None, Some(probe), None) => Ok(groups_from_shanks(&ProbeGeometry::load(probe)?)),
            (None, None, Some(positions)) => {
                let positions = load_channel_positions(positions)?;
                Ok(groups_from_positions(
                    &positions,
                    self.x_threshold,
                    self.y_threshold,
                )?)
            }
            (None, None, None) => Err(ConfigError::Invalid(
                "no channel group source (set one of groups.inline, groups.probe, groups.positions)"
                    .to_string(),
            )),
            _ => Err(ConfigError::Invalid(
                "only one of groups.inline, groups.probe, groups.positions may be set".to_string(),
            )),
        }
    }
}

/// One annotation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Template session-description file
    pub template: PathBuf,
    /// Where to write the annotated copy
    pub output: PathBuf,
    /// Recording date (YYYY-MM-DD)
    #[serde(default)]
    pub date: Option<String>,
    /// One region label per channel group; "" leaves a group unassigned
    #[serde(default)]
    pub regions: Option<Vec<String>>,
    /// Emit brain regions in name order instead of first-seen order
    #[serde(default)]
    pub sort_regions: bool,
    #[serde(default)]
    pub groups: GroupsConfig,
}

impl JobConfig {
    /// Parses a job from TOML text. Paths are left as written.
    pub fn from_toml_str(contents: &str) -> Result<JobConfig, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Loads a job file and resolves its relative paths against the file's directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<JobConfig, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let mut job = JobConfig::from_toml_str(&contents)?;
        if let Some(base) = path.parent() {
            job.resolve_paths(base);
        }
        Ok(job)
    }

    /// Makes relative paths absolute with respect to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.template);
        resolve(&mut self.output);
        if let Some(p) = self.groups.probe.as_mut() {
            resolve(p);
        }
        if let Some(p) = self.groups.positions.as_mut() {
            resolve(p);
        }
    }

    /// Builds the annotation request, loading channel groups from their source.
    pub fn to_request(&self) -> Result<AnnotationRequest, ConfigError> {
        Ok(AnnotationRequest {
            channel_groups: self.groups.load_groups()?,
            date: self.date.clone(),
            region_labels: self.regions.clone(),
            sort_regions: self.sort_regions,
        })
    }
}

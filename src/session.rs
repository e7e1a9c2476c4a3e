use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::probe::ProbeError;

/// Channel count of a Neuropixels AP binary (384 recording channels plus sync).
pub const DEFAULT_N_CHAN_BIN: usize = 385;

const PROBE_SUFFIX: &str = "_ks_probe_chanmap.json";

/// File-system layout of one recording session.
///
/// The annotator and the external spike sorter only share files on disk;
/// this collects the names they agree on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    /// Path to the raw recording
    pub recording: PathBuf,
    /// Directory holding the recording
    pub directory: PathBuf,
    /// Session name with the `.bin` / `.ap` suffixes removed
    pub base_name: String,
}

impl SessionPaths {
    /// Derives session names from the recording path.
    ///
    /// # Examples
    ///
    /// ```
    /// use session_annotator::SessionPaths;
    ///
    /// let session = SessionPaths::from_recording("data/2024-06-10_15-45-00.bin.ap");
    /// assert_eq!(session.base_name, "2024-06-10_15-45-00");
    /// ```
    pub fn from_recording<P: AsRef<Path>>(recording: P) -> SessionPaths {
        let recording = recording.as_ref().to_path_buf();
        let directory = recording
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let mut base_name = recording
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        loop {
            let stripped = [".ap", ".bin", ".meta"]
                .iter()
                .find_map(|suffix| base_name.strip_suffix(*suffix).map(str::to_string));
            match stripped {
                Some(shorter) => base_name = shorter,
                None => break,
            }
        }

        SessionPaths {
            recording,
            directory,
            base_name,
        }
    }

    /// Where the probe channel map for this session lives.
    pub fn probe_path(&self) -> PathBuf {
        self.directory
            .join(format!("{}{}", self.base_name, PROBE_SUFFIX))
    }

    /// Default location for the annotated session-description file.
    pub fn session_xml_path(&self) -> PathBuf {
        self.directory.join(format!("{}.xml", self.base_name))
    }
}

/// Settings handed to the external spike sorter.
///
/// Only the fields this workflow sets are modelled; the sorter fills in the
/// rest from its own defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortingSettings {
    /// Recording to sort
    pub data_dir: PathBuf,
    /// Number of channels interleaved in the binary file
    pub n_chan_bin: usize,
    /// Probe channel map the sorter should load
    pub probe_path: PathBuf,
}

impl SortingSettings {
    pub fn for_session(session: &SessionPaths) -> SortingSettings {
        SortingSettings {
            data_dir: session.recording.clone(),
            n_chan_bin: DEFAULT_N_CHAN_BIN,
            probe_path: session.probe_path(),
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ProbeError> {
        fs::write(path.as_ref(), serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<SortingSettings, ProbeError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&contents)?)
    }
}

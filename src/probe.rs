use log::info;
use ndarray::Array2;
use ndarray_npy::ReadNpyError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Errors from reading, writing or validating probe geometry.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// The probe description is structurally inconsistent
    #[error("invalid probe geometry: {0}")]
    Invalid(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read NPY file: {0}")]
    Npy(#[from] ReadNpyError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Probe geometry in the Kilosort channel-map JSON layout.
///
/// All per-channel arrays are indexed by row and must have `n_chan` entries.
/// Positions are in micrometres.
///
/// # Examples
///
/// ```
/// use session_annotator::ProbeGeometry;
///
/// let probe = ProbeGeometry::new(vec![0, 1], vec![0.0, 32.0], vec![0.0, 0.0], vec![0.0, 0.0]).unwrap();
/// assert_eq!(probe.n_chan, 2);
/// assert_eq!(probe.positions().shape(), &[2, 2]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeGeometry {
    /// Channel index in the recording for each row
    #[serde(rename = "chanMap")]
    pub chan_map: Vec<usize>,
    /// Horizontal position of each row
    pub xc: Vec<f32>,
    /// Vertical position of each row
    pub yc: Vec<f32>,
    /// Shank (group) identifier of each row
    pub kcoords: Vec<f32>,
    /// Number of channels described
    pub n_chan: usize,
}

impl ProbeGeometry {
    /// Builds and validates a probe from its per-channel arrays.
    pub fn new(
        chan_map: Vec<usize>,
        xc: Vec<f32>,
        yc: Vec<f32>,
        kcoords: Vec<f32>,
    ) -> Result<ProbeGeometry, ProbeError> {
        let probe = ProbeGeometry {
            n_chan: chan_map.len(),
            chan_map,
            xc,
            yc,
            kcoords,
        };
        probe.validate()?;
        Ok(probe)
    }

    /// Loads and validates a probe file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<ProbeGeometry, ProbeError> {
        let contents = fs::read_to_string(path.as_ref())?;
        let probe: ProbeGeometry = serde_json::from_str(&contents)?;
        probe.validate()?;
        info!(
            "Loaded probe with {} channels from {}",
            probe.n_chan,
            path.as_ref().display()
        );
        Ok(probe)
    }

    /// Writes the probe as pretty-printed JSON after validating it.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ProbeError> {
        self.validate()?;
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Checks array lengths against `n_chan`, finite coordinates and a
    /// channel map without repeats.
    pub fn validate(&self) -> Result<(), ProbeError> {
        let lengths = [
            ("chanMap", self.chan_map.len()),
            ("xc", self.xc.len()),
            ("yc", self.yc.len()),
            ("kcoords", self.kcoords.len()),
        ];
        for (field, len) in lengths {
            if len != self.n_chan {
                return Err(ProbeError::Invalid(format!(
                    "{} has {} entries, expected n_chan = {}",
                    field, len, self.n_chan
                )));
            }
        }

        let mut seen = HashSet::with_capacity(self.n_chan);
        for &channel in &self.chan_map {
            if !seen.insert(channel) {
                return Err(ProbeError::Invalid(format!(
                    "channel {} appears more than once in chanMap",
                    channel
                )));
            }
        }

        let all_finite = self
            .xc
            .iter()
            .chain(&self.yc)
            .chain(&self.kcoords)
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(ProbeError::Invalid(
                "coordinates must be finite numbers".to_string(),
            ));
        }

        Ok(())
    }

    /// Channel positions as an (n_chan, 2) array of (x, y).
    pub fn positions(&self) -> Array2<f32> {
        Array2::from_shape_fn((self.n_chan, 2), |(row, col)| {
            if col == 0 {
                self.xc[row]
            } else {
                self.yc[row]
            }
        })
    }
}

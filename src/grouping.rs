//! Derivation of electrode groups from probe geometry.
//!
//! Groups can come from the shank assignment stored in a probe file, or
//! from channel positions alone (for example the `channel_positions.npy`
//! that Kilosort writes next to its results) by linking channels that sit
//! within a horizontal and vertical distance of each other.

use indexmap::IndexMap;
use log::info;
use ndarray::Array2;
use ndarray_npy::read_npy;
use std::path::Path;

use crate::probe::{ProbeError, ProbeGeometry};
use crate::types::ChannelGroup;

/// One group per distinct shank id, in the order shanks first appear.
///
/// Group members are the recording channel indices from `chanMap`.
pub fn groups_from_shanks(probe: &ProbeGeometry) -> Vec<ChannelGroup> {
    // f32 is not hashable, shank ids are compared bitwise
    let mut shanks: IndexMap<u32, Vec<usize>> = IndexMap::new();
    for (&channel, &shank) in probe.chan_map.iter().zip(&probe.kcoords) {
        shanks.entry(shank.to_bits()).or_default().push(channel);
    }

    let groups: Vec<ChannelGroup> = shanks.into_values().map(ChannelGroup::from).collect();
    info!(
        "Derived {} channel groups from {} probe channels",
        groups.len(),
        probe.n_chan
    );
    groups
}

/// Clusters channels by position.
///
/// Two channels are linked when both `|dx| <= x_threshold` and
/// `|dy| <= y_threshold`; groups are the connected components of that
/// relation. Channel `i` is row `i` of `positions`. Groups are ordered by
/// their leftmost x position, channels within a group ascending.
///
/// Fails with [`ProbeError::Invalid`] if `positions` has fewer than 2 columns.
pub fn groups_from_positions(
    positions: &Array2<f32>,
    x_threshold: f32,
    y_threshold: f32,
) -> Result<Vec<ChannelGroup>, ProbeError> {
    check_columns(positions)?;
    let n = positions.nrows();
    let mut sets = DisjointSet::new(n);

    for i in 0..n {
        for j in (i + 1)..n {
            let dx = (positions[[i, 0]] - positions[[j, 0]]).abs();
            let dy = (positions[[i, 1]] - positions[[j, 1]]).abs();
            if dx <= x_threshold && dy <= y_threshold {
                sets.union(i, j);
            }
        }
    }

    let mut components: IndexMap<usize, Vec<usize>> = IndexMap::new();
    for channel in 0..n {
        components.entry(sets.find(channel)).or_default().push(channel);
    }

    let mut groups: Vec<(f32, Vec<usize>)> = components
        .into_values()
        .map(|channels| {
            let min_x = channels
                .iter()
                .map(|&c| positions[[c, 0]])
                .fold(f32::INFINITY, f32::min);
            (min_x, channels)
        })
        .collect();
    groups.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1[0].cmp(&b.1[0])));

    info!(
        "Detected {} channel groups (x threshold {}, y threshold {})",
        groups.len(),
        x_threshold,
        y_threshold
    );
    Ok(groups
        .into_iter()
        .map(|(_, channels)| ChannelGroup::from(channels))
        .collect())
}

/// Reads an (n, 2) channel position array from a `.npy` file.
///
/// Both float32 and float64 files are accepted. Extra columns (e.g. z) are
/// ignored.
pub fn load_channel_positions<P: AsRef<Path>>(path: P) -> Result<Array2<f32>, ProbeError> {
    let path = path.as_ref();
    let positions: Array2<f32> = match read_npy::<_, Array2<f32>>(path) {
        Ok(positions) => positions,
        Err(_) => read_npy::<_, Array2<f64>>(path)?.mapv(|v| v as f32),
    };

    check_columns(&positions)?;
    Ok(positions)
}

fn check_columns(positions: &Array2<f32>) -> Result<(), ProbeError> {
    if positions.ncols() < 2 {
        return Err(ProbeError::Invalid(format!(
            "channel positions must have at least 2 columns, found {}",
            positions.ncols()
        )));
    }
    Ok(())
}

/// Union-find over channel rows.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        DisjointSet {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Smaller root wins so roots are stable
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}

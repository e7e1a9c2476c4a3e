//! Derivation of per-channel region labels and per-region summaries from
//! labelled channel groups.
//!
//! The flat array and the summary are built in two independent passes. On
//! overlapping groups the flat array keeps the label of the last group that
//! claims a channel, while the summary lists the channel under every region
//! whose groups contain it.

use crate::types::{AnnotateError, ChannelGroup, RegionSummary};

/// Builds the flat per-channel region array of length `n_channels`.
///
/// Channels not covered by any labelled group keep an empty label. Groups
/// with an empty label are ignored.
pub fn region_array<S: AsRef<str>>(
    groups: &[ChannelGroup],
    labels: &[S],
    n_channels: usize,
) -> Result<Vec<String>, AnnotateError> {
    let mut array = vec![String::new(); n_channels];

    for (group_idx, (group, label)) in groups.iter().zip(labels).enumerate() {
        let label = label.as_ref();
        if label.is_empty() {
            continue;
        }
        for &channel in &group.channels {
            let slot = array
                .get_mut(channel)
                .ok_or(AnnotateError::ChannelOutOfRange {
                    channel,
                    group: group_idx,
                    n_channels,
                })?;
            // Later groups overwrite earlier ones
            *slot = label.to_string();
        }
    }

    Ok(array)
}

/// Accumulates channels and electrode-group indices per region label,
/// keeping regions in the order they are first seen.
pub fn summarize<S: AsRef<str>>(groups: &[ChannelGroup], labels: &[S]) -> RegionSummary {
    let mut summary = RegionSummary::default();

    for (group_idx, (group, label)) in groups.iter().zip(labels).enumerate() {
        let label = label.as_ref();
        if label.is_empty() {
            continue;
        }
        let entry = summary.regions.entry(label.to_string()).or_default();
        entry.channels.extend(group.channels.iter().copied());
        entry.electrode_groups.insert(group_idx);
    }

    summary
}

/// Joins values with single spaces, the list format used throughout
/// NeuroScope session files.
pub fn join_spaced<I, T>(values: I) -> String
where
    I: IntoIterator<Item = T>,
    T: ToString,
{
    values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

//! Partitioning channels into output files.
//!
//! JPEG tiles hold at most three channels, so an `n`-channel image becomes
//! `ceil(n / 3)` files. The first file carries no suffix, later ones `_1`,
//! `_2`, ... in channel order.

use loopy_core::{LoopyError, Result};

/// Channel counts at or above this are rejected as an axis mix-up.
pub const MAX_CHANNELS: usize = 1000;

/// Consecutive channels written to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelGroup {
    /// File name suffix, empty for the first group.
    pub suffix: String,
    /// First channel index.
    pub start: usize,
    /// Number of channels.
    pub len: usize,
}

impl ChannelGroup {
    pub fn channels(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.len
    }
}

/// Split `n` channels into groups of `group_size`.
pub fn channel_groups(n: usize, group_size: usize) -> Result<Vec<ChannelGroup>> {
    if n == 0 || n >= MAX_CHANNELS {
        return Err(LoopyError::InvalidInput(format!(
            "channel count must be between 1 and {}, got {n}",
            MAX_CHANNELS - 1
        )));
    }
    if group_size == 0 {
        return Err(LoopyError::InvalidInput("group size must be positive".into()));
    }

    Ok((0..n)
        .step_by(group_size)
        .enumerate()
        .map(|(i, start)| ChannelGroup {
            suffix: if i == 0 { String::new() } else { format!("_{i}") },
            start,
            len: group_size.min(n - start),
        })
        .collect())
}

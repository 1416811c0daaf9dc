//! Per-stage checkpoint state (spec §3, §4.1).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Checkpoint for a single stage's NDJSON stream position and counters.
///
/// Written only after the corresponding output has been durably flushed,
/// so a crash never leaves a checkpoint ahead of the data it describes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Byte offset into the input NDJSON already consumed.
    pub byte_offset: u64,
    /// Ids already processed, for stages that dedup against a running set
    /// rather than relying purely on byte offset (e.g. S5's embedding cache).
    #[serde(default)]
    pub processed_ids: HashSet<String>,
    pub inserted: u64,
    pub updated: u64,
    pub errors: u64,
    pub skipped: u64,
}

impl Checkpoint {
    /// Reset to a fresh state when the on-disk offset exceeds the input
    /// file's current size (input was truncated/replaced since last run).
    pub fn reset_if_stale(&mut self, input_file_size: u64) {
        if self.byte_offset > input_file_size {
            tracing::warn!(
                checkpoint_offset = self.byte_offset,
                file_size = input_file_size,
                "checkpoint offset exceeds input size, resetting"
            );
            *self = Checkpoint::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_checkpoint_resets_to_default() {
        let mut cp = Checkpoint {
            byte_offset: 5000,
            inserted: 10,
            ..Default::default()
        };
        cp.reset_if_stale(100);
        assert_eq!(cp.byte_offset, 0);
        assert_eq!(cp.inserted, 0);
    }

    #[test]
    fn fresh_checkpoint_is_left_alone() {
        let mut cp = Checkpoint {
            byte_offset: 50,
            inserted: 10,
            ..Default::default()
        };
        cp.reset_if_stale(100);
        assert_eq!(cp.byte_offset, 50);
        assert_eq!(cp.inserted, 10);
    }
}

//! Continuity validation and layout.
//!
//! Reports whether a sequence fills its window exactly, overflows or
//! underflows, and computes each block's start offset within the window.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::sequence::{saturate, BlockId, TimeBlock, TimelineSequence};

/// Fill state of a sequence relative to its capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "minutes", rename_all = "snake_case")]
pub enum ContinuityState {
    Exact,
    Overflow(u32),
    Underflow(u32),
}

impl ContinuityState {
    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Exact)
    }

    /// Distance from an exact fill, in minutes.
    pub fn amount(&self) -> u32 {
        match self {
            Self::Exact => 0,
            Self::Overflow(n) | Self::Underflow(n) => *n,
        }
    }
}

/// Result of validating a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuityReport {
    pub state: ContinuityState,
    pub total_minutes: u64,
    pub capacity_minutes: u32,
}

impl ContinuityReport {
    pub(crate) fn from_total(total_minutes: u64, capacity_minutes: u32) -> Self {
        let capacity = u64::from(capacity_minutes);
        let state = if total_minutes > capacity {
            ContinuityState::Overflow(saturate(total_minutes - capacity))
        } else if total_minutes < capacity {
            ContinuityState::Underflow(saturate(capacity - total_minutes))
        } else {
            ContinuityState::Exact
        };
        Self {
            state,
            total_minutes,
            capacity_minutes,
        }
    }
}

/// Validate a sequence against its capacity. Pure and idempotent.
pub fn validate(sequence: &TimelineSequence) -> ContinuityReport {
    ContinuityReport::from_total(sequence.total_minutes(), sequence.capacity_minutes)
}

/// Position of a block inside the window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub id: BlockId,
    pub start_minute: u64,
    pub end_minute: u64,
}

/// Lay the blocks end to end from minute zero.
pub fn layout(sequence: &TimelineSequence) -> Vec<Placement> {
    let mut cursor = 0u64;
    sequence
        .blocks
        .iter()
        .map(|block| {
            let start = cursor;
            cursor += u64::from(block.duration_minutes);
            Placement {
                id: block.id.clone(),
                start_minute: start,
                end_minute: cursor,
            }
        })
        .collect()
}

fn start_offsets(blocks: &[TimeBlock]) -> HashMap<&str, u64> {
    let mut cursor = 0u64;
    blocks
        .iter()
        .map(|block| {
            let start = cursor;
            cursor += u64::from(block.duration_minutes);
            (block.id.as_str(), start)
        })
        .collect()
}

/// Ids present in both snapshots whose start offset differs, in `after` order.
pub fn shifted_ids(before: &[TimeBlock], after: &[TimeBlock]) -> Vec<BlockId> {
    let old = start_offsets(before);
    let mut cursor = 0u64;
    let mut shifted = Vec::new();
    for block in after {
        if let Some(&start) = old.get(block.id.as_str()) {
            if start != cursor {
                shifted.push(block.id.clone());
            }
        }
        cursor += u64::from(block.duration_minutes);
    }
    shifted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(capacity: u32, durations: &[u32]) -> TimelineSequence {
        let blocks = durations
            .iter()
            .enumerate()
            .map(|(i, d)| TimeBlock::new(format!("b{i}"), *d))
            .collect();
        TimelineSequence::new(capacity, blocks).unwrap()
    }

    #[test]
    fn test_exact_overflow_underflow() {
        assert_eq!(validate(&day(100, &[60, 40])).state, ContinuityState::Exact);
        assert_eq!(
            validate(&day(100, &[60, 50])).state,
            ContinuityState::Overflow(10)
        );
        assert_eq!(
            validate(&day(100, &[60, 30])).state,
            ContinuityState::Underflow(10)
        );
    }

    #[test]
    fn test_empty_sequence_underflows_by_capacity() {
        let report = validate(&TimelineSequence::empty(1440));
        assert_eq!(report.state, ContinuityState::Underflow(1440));
        assert_eq!(report.total_minutes, 0);
    }

    #[test]
    fn test_validate_is_idempotent() {
        let seq = day(1440, &[480, 240, 60]);
        let first = validate(&seq);
        let second = validate(&seq);
        assert_eq!(first, second);
        assert_eq!(first.state.amount(), 660);
    }

    #[test]
    fn test_layout_offsets() {
        let placements = layout(&day(1440, &[480, 240, 60]));
        let starts: Vec<u64> = placements.iter().map(|p| p.start_minute).collect();
        assert_eq!(starts, vec![0, 480, 720]);
        assert_eq!(placements[2].end_minute, 780);
    }

    #[test]
    fn test_shifted_ids_ignores_new_and_removed_blocks() {
        let before = day(100, &[10, 20, 30]).blocks;
        let mut after = before.clone();
        after.remove(1);
        after.push(TimeBlock::new("new", 5));
        assert_eq!(shifted_ids(&before, &after), vec!["b2".to_string()]);
    }
}

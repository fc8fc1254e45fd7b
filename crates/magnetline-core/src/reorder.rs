//! Block reordering.
//!
//! A reorder is a pure permutation: durations never change, so the window
//! stays exactly as full as it was. What changes is where blocks start, and
//! the ripple set tells the caller which blocks need re-syncing.

use serde::{Deserialize, Serialize};

use crate::error::TimelineError;
use crate::sequence::{BlockId, TimelineSequence};

/// Result of a reorder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderOutcome {
    pub sequence: TimelineSequence,
    /// Ids whose start offset changed: every block between the old and
    /// new position, inclusive
    pub ripple: Vec<BlockId>,
}

/// Move the block at `from` so that it ends up at index `to`.
pub fn reorder(
    sequence: &TimelineSequence,
    from: usize,
    to: usize,
) -> Result<ReorderOutcome, TimelineError> {
    let len = sequence.len();
    if from >= len {
        return Err(TimelineError::InvalidIndex { index: from, len });
    }
    if to >= len {
        return Err(TimelineError::InvalidIndex { index: to, len });
    }

    let mut blocks = sequence.blocks.clone();
    let moved = blocks.remove(from);
    blocks.insert(to, moved);

    let ripple = if from == to {
        Vec::new()
    } else {
        let (lo, hi) = (from.min(to), from.max(to));
        blocks[lo..=hi].iter().map(|b| b.id.clone()).collect()
    };

    Ok(ReorderOutcome {
        sequence: sequence.with_blocks(blocks),
        ripple,
    })
}

/// Move a block, addressed by id, to index `to`.
pub fn move_block(
    sequence: &TimelineSequence,
    id: &str,
    to: usize,
) -> Result<ReorderOutcome, TimelineError> {
    let from = sequence
        .index_of(id)
        .ok_or_else(|| TimelineError::BlockNotFound(id.to_string()))?;
    reorder(sequence, from, to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::continuity::shifted_ids;
    use crate::sequence::TimeBlock;

    fn sample() -> TimelineSequence {
        TimelineSequence::new(
            100,
            vec![
                TimeBlock::new("a", 10),
                TimeBlock::new("b", 20),
                TimeBlock::new("c", 30),
                TimeBlock::new("d", 40),
            ],
        )
        .unwrap()
    }

    fn order(seq: &TimelineSequence) -> Vec<String> {
        seq.ids()
    }

    #[test]
    fn test_move_forward() {
        let outcome = reorder(&sample(), 0, 2).unwrap();
        assert_eq!(order(&outcome.sequence), vec!["b", "c", "a", "d"]);
        assert_eq!(outcome.ripple, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_move_backward() {
        let outcome = reorder(&sample(), 3, 1).unwrap();
        assert_eq!(order(&outcome.sequence), vec!["a", "d", "b", "c"]);
        assert_eq!(outcome.ripple, vec!["d", "b", "c"]);
    }

    #[test]
    fn test_same_index_is_identity() {
        let seq = sample();
        let outcome = reorder(&seq, 2, 2).unwrap();
        assert_eq!(outcome.sequence, seq);
        assert!(outcome.ripple.is_empty());
    }

    #[test]
    fn test_ripple_matches_shifted_starts() {
        let seq = sample();
        for from in 0..seq.len() {
            for to in 0..seq.len() {
                let outcome = reorder(&seq, from, to).unwrap();
                assert_eq!(
                    outcome.ripple,
                    shifted_ids(&seq.blocks, &outcome.sequence.blocks),
                    "from {from} to {to}"
                );
            }
        }
    }

    #[test]
    fn test_durations_untouched() {
        let seq = sample();
        let outcome = reorder(&seq, 1, 3).unwrap();
        for block in &seq.blocks {
            let moved = outcome.sequence.get(&block.id).unwrap();
            assert_eq!(moved.duration_minutes, block.duration_minutes);
        }
        assert_eq!(outcome.sequence.total_minutes(), seq.total_minutes());
    }

    #[test]
    fn test_invalid_indices() {
        let seq = sample();
        assert_eq!(
            reorder(&seq, 4, 0).unwrap_err(),
            TimelineError::InvalidIndex { index: 4, len: 4 }
        );
        assert_eq!(
            reorder(&seq, 0, 9).unwrap_err(),
            TimelineError::InvalidIndex { index: 9, len: 4 }
        );
    }

    #[test]
    fn test_move_block_by_id() {
        let outcome = move_block(&sample(), "c", 0).unwrap();
        assert_eq!(order(&outcome.sequence), vec!["c", "a", "b", "d"]);
        assert!(matches!(
            move_block(&sample(), "zzz", 0),
            Err(TimelineError::BlockNotFound(_))
        ));
    }
}

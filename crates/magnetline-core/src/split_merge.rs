//! Duration-neutral splitting and merging of blocks.
//!
//! A split leaves the left half under the original id and records the
//! pre-split duration on it; the right half points back at its parent. A
//! merge is only accepted for such a pair while they still sit next to each
//! other, and restores the recorded duration.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::compression::DurationChange;
use crate::error::TimelineError;
use crate::sequence::{BlockId, Lineage, TimeBlock, TimelineSequence};

/// Result of a split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitOutcome {
    pub sequence: TimelineSequence,
    pub left_id: BlockId,
    pub right_id: BlockId,
}

/// Result of a merge, before capacity checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub sequence: TimelineSequence,
    /// Duration change of the surviving parent block
    pub restored: DurationChange,
    /// Id of the child that was absorbed
    pub absorbed_id: BlockId,
}

/// Split and merge operations
pub struct SplitMergeManager;

impl SplitMergeManager {
    /// Split `id` at `offset_minutes`, naming the right half `{id}.{n}`.
    pub fn split(
        sequence: &TimelineSequence,
        id: &str,
        offset_minutes: u32,
    ) -> Result<SplitOutcome, TimelineError> {
        let right_id = Self::next_child_id(sequence, id);
        Self::split_with_id(sequence, id, offset_minutes, right_id)
    }

    /// Split `id` at `offset_minutes`, using a caller-supplied id for the right half.
    pub fn split_with_id(
        sequence: &TimelineSequence,
        id: &str,
        offset_minutes: u32,
        right_id: impl Into<BlockId>,
    ) -> Result<SplitOutcome, TimelineError> {
        let right_id = right_id.into();
        let index = sequence
            .index_of(id)
            .ok_or_else(|| TimelineError::BlockNotFound(id.to_string()))?;
        let block = &sequence.blocks[index];

        if block.locked {
            return Err(TimelineError::BlockLocked(block.id.clone()));
        }
        if let Some(child) = block.lineage.child() {
            return Err(TimelineError::AlreadySplit {
                id: block.id.clone(),
                child_id: child.to_string(),
            });
        }
        if offset_minutes == 0 || offset_minutes >= block.duration_minutes {
            return Err(TimelineError::InvalidOffset {
                id: block.id.clone(),
                offset: offset_minutes,
                duration: block.duration_minutes,
            });
        }
        if sequence.contains(&right_id) {
            return Err(TimelineError::DuplicateBlockId(right_id));
        }

        let left = TimeBlock {
            duration_minutes: offset_minutes,
            lineage: block.lineage.with_child(right_id.clone(), block.duration_minutes),
            ..block.clone()
        };
        let right = TimeBlock {
            id: right_id.clone(),
            duration_minutes: block.duration_minutes - offset_minutes,
            lineage: Lineage::SplitRight {
                parent: block.id.clone(),
            },
            ..block.clone()
        };

        debug!(
            block = %block.id,
            offset_minutes,
            right = %right_id,
            "split block"
        );

        let mut blocks = sequence.blocks.clone();
        blocks[index] = left;
        blocks.insert(index + 1, right);

        Ok(SplitOutcome {
            sequence: sequence.with_blocks(blocks),
            left_id: id.to_string(),
            right_id,
        })
    }

    /// Merge a split child back into its parent.
    pub fn merge(
        sequence: &TimelineSequence,
        parent_id: &str,
        child_id: &str,
    ) -> Result<MergeOutcome, TimelineError> {
        let parent_index = sequence
            .index_of(parent_id)
            .ok_or_else(|| TimelineError::BlockNotFound(parent_id.to_string()))?;
        let child_index = sequence
            .index_of(child_id)
            .ok_or_else(|| TimelineError::BlockNotFound(child_id.to_string()))?;
        let parent = &sequence.blocks[parent_index];
        let child = &sequence.blocks[child_index];

        let lineage_matches = child.lineage.parent() == Some(parent_id)
            && parent.lineage.child() == Some(child_id);
        if !lineage_matches {
            return Err(TimelineError::MergeLineageMismatch {
                parent_id: parent_id.to_string(),
                child_id: child_id.to_string(),
            });
        }
        if child_index != parent_index + 1 {
            return Err(TimelineError::MergeNotAdjacent {
                parent_id: parent_id.to_string(),
                child_id: child_id.to_string(),
            });
        }
        if let Some(grandchild) = child.lineage.child() {
            return Err(TimelineError::MergeOrderViolation {
                child_id: child_id.to_string(),
                grandchild_id: grandchild.to_string(),
            });
        }
        if let Some(locked) = [parent, child].into_iter().find(|b| b.locked) {
            return Err(TimelineError::BlockLocked(locked.id.clone()));
        }

        let restored_minutes = parent
            .lineage
            .original_minutes()
            .unwrap_or(parent.duration_minutes + child.duration_minutes);
        let restored = DurationChange {
            id: parent.id.clone(),
            from_minutes: parent.duration_minutes,
            to_minutes: restored_minutes,
        };
        let merged = TimeBlock {
            duration_minutes: restored_minutes,
            lineage: parent.lineage.without_child(),
            ..parent.clone()
        };

        debug!(
            parent = %parent_id,
            child = %child_id,
            restored_minutes,
            "merged split pair"
        );

        let mut blocks = sequence.blocks.clone();
        blocks[parent_index] = merged;
        blocks.remove(child_index);

        Ok(MergeOutcome {
            sequence: sequence.with_blocks(blocks),
            restored,
            absorbed_id: child_id.to_string(),
        })
    }

    /// Clear lineage pointers that reference a block about to disappear.
    pub(crate) fn detach(blocks: &mut [TimeBlock], removed: &TimeBlock) {
        for block in blocks.iter_mut() {
            if removed.lineage.child() == Some(block.id.as_str()) {
                block.lineage = block.lineage.without_parent();
            } else if removed.lineage.parent() == Some(block.id.as_str()) {
                block.lineage = block.lineage.without_child();
            }
        }
    }

    fn next_child_id(sequence: &TimelineSequence, id: &str) -> BlockId {
        (1u32..)
            .map(|n| format!("{id}.{n}"))
            .find(|candidate| !sequence.contains(candidate))
            .unwrap_or_else(|| format!("{id}.{}", sequence.len() + 1))
    }
}

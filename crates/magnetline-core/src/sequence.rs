//! Timeline data model: blocks, split lineage and the sequence snapshot.
//!
//! A [`TimelineSequence`] is an immutable value as far as the engine is
//! concerned. Every operation takes a snapshot by reference and hands back a
//! new one; the caller owns storage and decides when to swap snapshots.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::TimelineError;

/// Identifier of a block, unique within its sequence.
pub type BlockId = String;

/// Minimum duration a block may be compressed to unless configured otherwise.
pub const DEFAULT_FLOOR_MINUTES: u32 = 5;

/// Size of the daily window.
pub const DEFAULT_CAPACITY_MINUTES: u32 = 1440;

fn default_floor_minutes() -> u32 {
    DEFAULT_FLOOR_MINUTES
}

/// Split relationship of a block.
///
/// Lineage is a shallow pointer to at most one parent and one child, so a
/// chain of splits can never form a cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Lineage {
    /// Never split, or merged back together
    #[default]
    Whole,
    /// Left-hand result of a split; remembers the pre-split duration
    SplitLeft {
        child: BlockId,
        original_minutes: u32,
    },
    /// Right-hand result of a split
    SplitRight { parent: BlockId },
    /// Right-hand result that was itself split again
    Interior {
        parent: BlockId,
        child: BlockId,
        original_minutes: u32,
    },
}

impl Lineage {
    /// Parent this block was split from, if any.
    pub fn parent(&self) -> Option<&str> {
        match self {
            Self::SplitRight { parent } | Self::Interior { parent, .. } => Some(parent),
            Self::Whole | Self::SplitLeft { .. } => None,
        }
    }

    /// Live split child of this block, if any.
    pub fn child(&self) -> Option<&str> {
        match self {
            Self::SplitLeft { child, .. } | Self::Interior { child, .. } => Some(child),
            Self::Whole | Self::SplitRight { .. } => None,
        }
    }

    /// Duration recorded when this block was split.
    pub fn original_minutes(&self) -> Option<u32> {
        match self {
            Self::SplitLeft {
                original_minutes, ..
            }
            | Self::Interior {
                original_minutes, ..
            } => Some(*original_minutes),
            Self::Whole | Self::SplitRight { .. } => None,
        }
    }

    /// Lineage after this block becomes the left half of a split.
    pub(crate) fn with_child(&self, child: BlockId, original_minutes: u32) -> Self {
        match self.parent() {
            Some(parent) => Self::Interior {
                parent: parent.to_string(),
                child,
                original_minutes,
            },
            None => Self::SplitLeft {
                child,
                original_minutes,
            },
        }
    }

    /// Lineage after the child has been merged back in (or removed).
    pub(crate) fn without_child(&self) -> Self {
        match self.parent() {
            Some(parent) => Self::SplitRight {
                parent: parent.to_string(),
            },
            None => Self::Whole,
        }
    }

    /// Lineage after the parent has been removed.
    pub(crate) fn without_parent(&self) -> Self {
        match self {
            Self::Interior {
                child,
                original_minutes,
                ..
            } => Self::SplitLeft {
                child: child.clone(),
                original_minutes: *original_minutes,
            },
            Self::SplitRight { .. } => Self::Whole,
            other => other.clone(),
        }
    }
}

/// A contiguous block of time on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBlock {
    pub id: BlockId,
    pub duration_minutes: u32,
    /// Eligible for compression
    #[serde(default)]
    pub flexible: bool,
    /// Duration is immutable to every operation
    #[serde(default)]
    pub locked: bool,
    #[serde(default = "default_floor_minutes")]
    pub floor_minutes: u32,
    #[serde(default)]
    pub lineage: Lineage,
    /// Opaque caller data (category, labels), passed through untouched
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

impl TimeBlock {
    /// Create a rigid, unlocked block with the default floor.
    pub fn new(id: impl Into<BlockId>, duration_minutes: u32) -> Self {
        Self {
            id: id.into(),
            duration_minutes,
            flexible: false,
            locked: false,
            floor_minutes: DEFAULT_FLOOR_MINUTES,
            lineage: Lineage::Whole,
            metadata: serde_json::Value::Null,
        }
    }

    /// Create a flexible block.
    pub fn flexible(id: impl Into<BlockId>, duration_minutes: u32) -> Self {
        Self {
            flexible: true,
            ..Self::new(id, duration_minutes)
        }
    }

    /// Create a locked block.
    pub fn locked(id: impl Into<BlockId>, duration_minutes: u32) -> Self {
        Self {
            locked: true,
            ..Self::new(id, duration_minutes)
        }
    }

    pub fn with_floor(mut self, floor_minutes: u32) -> Self {
        self.floor_minutes = floor_minutes;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Whether compression may shrink this block at all.
    pub fn is_compressible(&self) -> bool {
        self.flexible && !self.locked
    }

    /// Floor actually enforced; a block never shrinks to zero.
    pub fn effective_floor(&self) -> u32 {
        self.floor_minutes.max(1)
    }

    /// Minutes compression could take from this block.
    pub fn shrink_capacity(&self) -> u32 {
        if self.is_compressible() {
            self.duration_minutes.saturating_sub(self.effective_floor())
        } else {
            0
        }
    }

    pub fn parent_block_id(&self) -> Option<&str> {
        self.lineage.parent()
    }

    pub fn original_duration_minutes(&self) -> Option<u32> {
        self.lineage.original_minutes()
    }
}

/// Whether a sequence may sit below its capacity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnderflowPolicy {
    #[default]
    Tolerate,
    /// Commits that leave the window short are rejected
    Reject,
}

/// Ordered, gapless sequence of blocks filling a fixed window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineSequence {
    pub capacity_minutes: u32,
    /// Optimistic-concurrency token owned by the persistence layer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub underflow: UnderflowPolicy,
    #[serde(default)]
    pub blocks: Vec<TimeBlock>,
}

impl TimelineSequence {
    /// Build a sequence, rejecting duplicate ids and zero durations.
    pub fn new(capacity_minutes: u32, blocks: Vec<TimeBlock>) -> Result<Self, TimelineError> {
        let sequence = Self {
            capacity_minutes,
            version: None,
            underflow: UnderflowPolicy::default(),
            blocks,
        };
        sequence.check_well_formed()?;
        Ok(sequence)
    }

    pub fn empty(capacity_minutes: u32) -> Self {
        Self {
            capacity_minutes,
            version: None,
            underflow: UnderflowPolicy::default(),
            blocks: Vec::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_underflow(mut self, policy: UnderflowPolicy) -> Self {
        self.underflow = policy;
        self
    }

    /// Check the structural rules every operation relies on.
    pub fn check_well_formed(&self) -> Result<(), TimelineError> {
        let mut seen = HashSet::with_capacity(self.blocks.len());
        for block in &self.blocks {
            if !seen.insert(block.id.as_str()) {
                return Err(TimelineError::DuplicateBlockId(block.id.clone()));
            }
            if block.duration_minutes == 0 {
                return Err(TimelineError::InvalidDuration {
                    id: block.id.clone(),
                    duration: 0,
                });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Sum of all block durations.
    pub fn total_minutes(&self) -> u64 {
        total_minutes(&self.blocks)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.blocks.iter().position(|b| b.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&TimeBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> Vec<BlockId> {
        self.blocks.iter().map(|b| b.id.clone()).collect()
    }

    /// Same capacity, version and policy over a different block list.
    pub(crate) fn with_blocks(&self, blocks: Vec<TimeBlock>) -> Self {
        Self {
            capacity_minutes: self.capacity_minutes,
            version: self.version.clone(),
            underflow: self.underflow,
            blocks,
        }
    }
}

pub(crate) fn total_minutes(blocks: &[TimeBlock]) -> u64 {
    blocks.iter().map(|b| u64::from(b.duration_minutes)).sum()
}

/// Narrow a minute count to `u32`, saturating.
pub(crate) fn saturate(minutes: u64) -> u32 {
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_duplicate_ids() {
        let err = TimelineSequence::new(
            60,
            vec![TimeBlock::new("a", 30), TimeBlock::new("a", 30)],
        )
        .unwrap_err();
        assert_eq!(err, TimelineError::DuplicateBlockId("a".into()));
    }

    #[test]
    fn test_new_rejects_zero_duration() {
        let err = TimelineSequence::new(60, vec![TimeBlock::new("a", 0)]).unwrap_err();
        assert!(matches!(err, TimelineError::InvalidDuration { .. }));
    }

    #[test]
    fn test_shrink_capacity() {
        assert_eq!(TimeBlock::flexible("a", 30).shrink_capacity(), 25);
        assert_eq!(TimeBlock::new("b", 30).shrink_capacity(), 0);
        let locked_flexible = TimeBlock {
            flexible: true,
            ..TimeBlock::locked("c", 30)
        };
        assert_eq!(locked_flexible.shrink_capacity(), 0);
        assert_eq!(TimeBlock::flexible("d", 3).shrink_capacity(), 0);
        assert_eq!(TimeBlock::flexible("e", 3).with_floor(0).shrink_capacity(), 2);
    }

    #[test]
    fn test_lineage_transitions() {
        let whole = Lineage::Whole;
        let left = whole.with_child("a.1".into(), 90);
        assert_eq!(left.child(), Some("a.1"));
        assert_eq!(left.original_minutes(), Some(90));
        assert_eq!(left.without_child(), Lineage::Whole);

        let right = Lineage::SplitRight {
            parent: "a".into(),
        };
        let interior = right.with_child("a.1.1".into(), 50);
        assert_eq!(interior.parent(), Some("a"));
        assert_eq!(interior.child(), Some("a.1.1"));
        assert_eq!(interior.without_child(), right);
        assert_eq!(
            interior.without_parent(),
            Lineage::SplitLeft {
                child: "a.1.1".into(),
                original_minutes: 50
            }
        );
    }

    #[test]
    fn test_deserialize_defaults() {
        let json = r#"{"capacity_minutes": 1440, "blocks": [{"id": "sleep", "duration_minutes": 480}]}"#;
        let seq: TimelineSequence = serde_json::from_str(json).unwrap();
        let block = &seq.blocks[0];
        assert_eq!(block.floor_minutes, DEFAULT_FLOOR_MINUTES);
        assert_eq!(block.lineage, Lineage::Whole);
        assert!(!block.flexible);
        assert_eq!(seq.underflow, UnderflowPolicy::Tolerate);
        assert!(seq.version.is_none());
    }

    #[test]
    fn test_metadata_passes_through_serde() {
        let block = TimeBlock::flexible("work", 240)
            .with_metadata(serde_json::json!({"category": "deep-work", "labels": ["a"]}));
        let json = serde_json::to_string(&block).unwrap();
        let back: TimeBlock = serde_json::from_str(&json).unwrap();
        assert_eq!(back, block);
    }
}

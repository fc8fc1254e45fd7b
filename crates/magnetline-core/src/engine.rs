//! Engine façade: plan and commit operations over timeline snapshots.
//!
//! `plan_*` calls are side-effect free and cheap enough to run on every
//! pointer move of a drag preview. `commit_*` calls apply a caller-chosen
//! [`Resolution`] and hand back a new snapshot plus everything the
//! persistence layer needs to sync (changed durations, ripple, removals).
//! On any error the input snapshot is the canonical state; nothing is
//! partially applied.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::compression::{CompressionEngine, CompressionScope, DurationChange};
use crate::config::EngineConfig;
use crate::continuity::{self, shifted_ids, ContinuityReport, ContinuityState, Placement};
use crate::error::TimelineError;
use crate::reorder::{self, ReorderOutcome};
use crate::sequence::{
    saturate, total_minutes, BlockId, Lineage, TimeBlock, TimelineSequence, UnderflowPolicy,
};
use crate::split_merge::{SplitMergeManager, SplitOutcome};

/// Seed block handed over by the template/catalog collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockTemplate {
    pub id: BlockId,
    pub duration_minutes: u32,
    #[serde(default)]
    pub flexible: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub floor_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

/// Caller-chosen new duration for one block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualAdjustment {
    pub id: BlockId,
    pub duration_minutes: u32,
}

/// How a commit should deal with overflow.
///
/// Cancelling is simply not calling commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "adjustments", rename_all = "snake_case")]
pub enum Resolution {
    /// Commit only if nothing overflows
    #[default]
    Strict,
    /// Shrink the eligible flexible pool proportionally
    AutoCompress,
    /// Apply the caller's adjustments; they must clear the overflow.
    ///
    /// Adjustments are applied even when nothing overflows. They may not
    /// target the block being inserted or resized.
    Manual(Vec<ManualAdjustment>),
}

/// Outcome of a plan call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Plan {
    /// Fits without compression
    Feasible {
        sequence: TimelineSequence,
        report: ContinuityReport,
    },
    /// Needs a resolution before commit
    Overflow {
        overflow: u32,
        eligible_ids: Vec<BlockId>,
        /// Minutes the eligible pool can give up before hitting floors
        compressible_minutes: u64,
    },
}

impl Plan {
    pub fn is_feasible(&self) -> bool {
        matches!(self, Self::Feasible { .. })
    }

    pub fn overflow_amount(&self) -> Option<u32> {
        match self {
            Self::Feasible { .. } => None,
            Self::Overflow { overflow, .. } => Some(*overflow),
        }
    }

    /// Whether auto-compression would succeed.
    pub fn auto_compressible(&self) -> bool {
        match self {
            Self::Feasible { .. } => true,
            Self::Overflow {
                overflow,
                compressible_minutes,
                ..
            } => u64::from(*overflow) <= *compressible_minutes,
        }
    }
}

/// Result of a committed operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitOutcome {
    pub sequence: TimelineSequence,
    /// Blocks that were added
    #[serde(default)]
    pub added: Vec<BlockId>,
    /// Blocks that were removed
    #[serde(default)]
    pub removed: Vec<BlockId>,
    /// Duration changes on surviving blocks
    #[serde(default)]
    pub changes: Vec<DurationChange>,
    /// Surviving blocks that only moved
    #[serde(default)]
    pub ripple: Vec<BlockId>,
    pub report: ContinuityReport,
}

impl CommitOutcome {
    /// Every id the persistence layer has to touch.
    pub fn changed_ids(&self) -> Vec<BlockId> {
        let mut ids: Vec<BlockId> = self.added.clone();
        ids.extend(self.changes.iter().map(|c| c.id.clone()));
        ids.extend(self.ripple.iter().cloned());
        ids.extend(self.removed.iter().cloned());
        ids
    }
}

/// The timeline engine façade
pub struct TimelineEngine {
    config: EngineConfig,
}

impl TimelineEngine {
    /// Create an engine with default config
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    /// Create with custom config
    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Empty sequence using the configured capacity and underflow policy.
    pub fn new_sequence(&self) -> TimelineSequence {
        TimelineSequence::empty(self.config.default_capacity_minutes)
            .with_underflow(self.config.default_underflow)
    }

    /// Turn a template into a block, applying the configured default floor.
    pub fn block_from_template(&self, template: BlockTemplate) -> TimeBlock {
        TimeBlock {
            id: template.id,
            duration_minutes: template.duration_minutes,
            flexible: template.flexible,
            locked: template.locked,
            floor_minutes: template
                .floor_minutes
                .unwrap_or(self.config.default_floor_minutes),
            lineage: Lineage::Whole,
            metadata: template.metadata,
        }
    }

    pub fn validate(&self, sequence: &TimelineSequence) -> ContinuityReport {
        continuity::validate(sequence)
    }

    pub fn layout(&self, sequence: &TimelineSequence) -> Vec<Placement> {
        continuity::layout(sequence)
    }

    // ── Insertion ──────────────────────────────────────────────────────

    /// Check whether `block` fits at `index` without compression.
    pub fn plan_insert(
        &self,
        sequence: &TimelineSequence,
        index: usize,
        block: &TimeBlock,
    ) -> Result<Plan, TimelineError> {
        let projected = Self::project_insert(sequence, index, block)?;
        let plan = self.plan_projection(
            sequence,
            projected,
            CompressionScope::AllFlexible,
            Some(index),
        )?;
        debug!(block = %block.id, index, feasible = plan.is_feasible(), "planned insert");
        Ok(plan)
    }

    /// Insert `block` at `index`, resolving overflow as requested.
    pub fn commit_insert(
        &self,
        sequence: &TimelineSequence,
        index: usize,
        block: TimeBlock,
        resolution: &Resolution,
    ) -> Result<CommitOutcome, TimelineError> {
        let projected = Self::project_insert(sequence, index, &block)?;
        let (blocks, mut changes) = self.resolve(
            sequence,
            projected,
            CompressionScope::AllFlexible,
            Some(index),
            resolution,
        )?;
        changes.retain(|c| c.id != block.id);
        let outcome = self.finish(sequence, blocks, vec![block.id.clone()], Vec::new(), changes)?;
        debug!(block = %block.id, index, "committed insert");
        Ok(outcome)
    }

    fn project_insert(
        sequence: &TimelineSequence,
        index: usize,
        block: &TimeBlock,
    ) -> Result<Vec<TimeBlock>, TimelineError> {
        sequence.check_well_formed()?;
        if index > sequence.len() {
            return Err(TimelineError::InvalidIndex {
                index,
                len: sequence.len(),
            });
        }
        if block.duration_minutes == 0 {
            return Err(TimelineError::InvalidDuration {
                id: block.id.clone(),
                duration: 0,
            });
        }
        if sequence.contains(&block.id) {
            return Err(TimelineError::DuplicateBlockId(block.id.clone()));
        }

        let mut inserted = block.clone();
        inserted.lineage = Lineage::Whole;
        let mut blocks = sequence.blocks.clone();
        blocks.insert(index, inserted);
        Ok(blocks)
    }

    // ── Resize ─────────────────────────────────────────────────────────

    /// Check whether `id` can take `new_duration` minutes without compression.
    pub fn plan_resize(
        &self,
        sequence: &TimelineSequence,
        id: &str,
        new_duration: u32,
    ) -> Result<Plan, TimelineError> {
        let (index, projected) = Self::project_resize(sequence, id, new_duration)?;
        let plan =
            self.plan_projection(sequence, projected, self.config.resize_scope, Some(index))?;
        debug!(block = %id, new_duration, feasible = plan.is_feasible(), "planned resize");
        Ok(plan)
    }

    /// Resize `id` to `new_duration`, resolving overflow as requested.
    pub fn commit_resize(
        &self,
        sequence: &TimelineSequence,
        id: &str,
        new_duration: u32,
        resolution: &Resolution,
    ) -> Result<CommitOutcome, TimelineError> {
        let (index, projected) = Self::project_resize(sequence, id, new_duration)?;
        let old_duration = sequence.blocks[index].duration_minutes;
        let (blocks, mut changes) = self.resolve(
            sequence,
            projected,
            self.config.resize_scope,
            Some(index),
            resolution,
        )?;
        if old_duration != new_duration {
            changes.retain(|c| c.id != id);
            changes.insert(
                0,
                DurationChange {
                    id: id.to_string(),
                    from_minutes: old_duration,
                    to_minutes: new_duration,
                },
            );
        }
        let outcome = self.finish(sequence, blocks, Vec::new(), Vec::new(), changes)?;
        debug!(block = %id, old_duration, new_duration, "committed resize");
        Ok(outcome)
    }

    fn project_resize(
        sequence: &TimelineSequence,
        id: &str,
        new_duration: u32,
    ) -> Result<(usize, Vec<TimeBlock>), TimelineError> {
        sequence.check_well_formed()?;
        let index = sequence
            .index_of(id)
            .ok_or_else(|| TimelineError::BlockNotFound(id.to_string()))?;
        let block = &sequence.blocks[index];

        if block.locked {
            return Err(TimelineError::BlockLocked(block.id.clone()));
        }
        if new_duration == 0 {
            return Err(TimelineError::InvalidDuration {
                id: block.id.clone(),
                duration: 0,
            });
        }
        if new_duration < block.floor_minutes {
            return Err(TimelineError::ResizeBelowFloor {
                id: block.id.clone(),
                requested: new_duration,
                floor: block.floor_minutes,
            });
        }

        let mut blocks = sequence.blocks.clone();
        blocks[index].duration_minutes = new_duration;
        Ok((index, blocks))
    }

    // ── Split / merge / reorder / remove ───────────────────────────────

    /// Split a block in two. Duration-neutral, never compresses.
    pub fn split(
        &self,
        sequence: &TimelineSequence,
        id: &str,
        offset_minutes: u32,
    ) -> Result<SplitOutcome, TimelineError> {
        sequence.check_well_formed()?;
        SplitMergeManager::split(sequence, id, offset_minutes)
    }

    /// Split a block, naming the right half explicitly.
    pub fn split_with_id(
        &self,
        sequence: &TimelineSequence,
        id: &str,
        offset_minutes: u32,
        right_id: impl Into<BlockId>,
    ) -> Result<SplitOutcome, TimelineError> {
        sequence.check_well_formed()?;
        SplitMergeManager::split_with_id(sequence, id, offset_minutes, right_id)
    }

    /// Merge a split child back into its parent.
    ///
    /// If the pair was resized after the split, restoring the recorded
    /// duration changes the total; the result is then subject to the same
    /// overflow and underflow checks as any other commit.
    pub fn merge(
        &self,
        sequence: &TimelineSequence,
        parent_id: &str,
        child_id: &str,
    ) -> Result<CommitOutcome, TimelineError> {
        sequence.check_well_formed()?;
        let merged = SplitMergeManager::merge(sequence, parent_id, child_id)?;

        let report = continuity::validate(&merged.sequence);
        if let ContinuityState::Overflow(overflow) = report.state {
            if report.total_minutes > sequence.total_minutes() {
                let pool = CompressionEngine::eligible_pool(
                    &merged.sequence.blocks,
                    CompressionScope::AllFlexible,
                    None,
                );
                return Err(TimelineError::OverflowUnresolved {
                    overflow,
                    eligible_ids: pool.into_iter().map(|c| c.id).collect(),
                });
            }
        }

        let changes = if merged.restored.from_minutes == merged.restored.to_minutes {
            Vec::new()
        } else {
            vec![merged.restored]
        };
        self.finish(
            sequence,
            merged.sequence.blocks,
            Vec::new(),
            vec![merged.absorbed_id],
            changes,
        )
    }

    /// Move the block at `from` to index `to`.
    pub fn reorder(
        &self,
        sequence: &TimelineSequence,
        from: usize,
        to: usize,
    ) -> Result<ReorderOutcome, TimelineError> {
        sequence.check_well_formed()?;
        let outcome = reorder::reorder(sequence, from, to)?;
        debug!(from, to, ripple = outcome.ripple.len(), "reordered");
        Ok(outcome)
    }

    /// Remove a block, leaving a gap at the end of the window.
    pub fn remove(
        &self,
        sequence: &TimelineSequence,
        id: &str,
    ) -> Result<CommitOutcome, TimelineError> {
        sequence.check_well_formed()?;
        let index = sequence
            .index_of(id)
            .ok_or_else(|| TimelineError::BlockNotFound(id.to_string()))?;

        let mut blocks = sequence.blocks.clone();
        let removed = blocks.remove(index);
        SplitMergeManager::detach(&mut blocks, &removed);

        let outcome = self.finish(sequence, blocks, Vec::new(), vec![removed.id], Vec::new())?;
        debug!(block = %id, "removed block");
        Ok(outcome)
    }

    // ── Shared plumbing ────────────────────────────────────────────────

    fn plan_projection(
        &self,
        sequence: &TimelineSequence,
        projected: Vec<TimeBlock>,
        scope: CompressionScope,
        anchor: Option<usize>,
    ) -> Result<Plan, TimelineError> {
        let candidate = sequence.with_blocks(projected);
        let report = continuity::validate(&candidate);
        match report.state {
            ContinuityState::Overflow(overflow) => {
                let pool = CompressionEngine::eligible_pool(&candidate.blocks, scope, anchor);
                Ok(Plan::Overflow {
                    overflow,
                    compressible_minutes: CompressionEngine::pool_capacity(&pool),
                    eligible_ids: pool.into_iter().map(|c| c.id).collect(),
                })
            }
            ContinuityState::Underflow(underflow) if sequence.underflow == UnderflowPolicy::Reject => {
                Err(TimelineError::UnderflowRejected { underflow })
            }
            _ => Ok(Plan::Feasible {
                sequence: candidate,
                report,
            }),
        }
    }

    /// Clear any overflow in `projected` according to `resolution`.
    fn resolve(
        &self,
        sequence: &TimelineSequence,
        mut projected: Vec<TimeBlock>,
        scope: CompressionScope,
        anchor: Option<usize>,
        resolution: &Resolution,
    ) -> Result<(Vec<TimeBlock>, Vec<DurationChange>), TimelineError> {
        let capacity = u64::from(sequence.capacity_minutes);
        let overflow_of = |blocks: &[TimeBlock]| saturate(total_minutes(blocks).saturating_sub(capacity));
        let overflow = overflow_of(&projected);

        match resolution {
            Resolution::Manual(adjustments) => {
                let subject = anchor.map(|i| projected[i].id.clone());
                let changes = Self::apply_manual(&mut projected, adjustments, subject.as_deref())?;
                let remaining = overflow_of(&projected);
                if remaining > 0 {
                    return Err(TimelineError::OverflowUnresolved {
                        overflow: remaining,
                        eligible_ids: adjustments.iter().map(|a| a.id.clone()).collect(),
                    });
                }
                Ok((projected, changes))
            }
            _ if overflow == 0 => Ok((projected, Vec::new())),
            Resolution::Strict => {
                let pool = CompressionEngine::eligible_pool(&projected, scope, anchor);
                Err(TimelineError::OverflowUnresolved {
                    overflow,
                    eligible_ids: pool.into_iter().map(|c| c.id).collect(),
                })
            }
            Resolution::AutoCompress => {
                let pool = CompressionEngine::eligible_pool(&projected, scope, anchor);
                let plan = CompressionEngine::compress(overflow, &pool)?;
                debug!(
                    overflow,
                    shrunk = plan.changes.len(),
                    rounds = plan.rounds,
                    "auto-compressed"
                );
                CompressionEngine::apply(&mut projected, &plan);
                Ok((projected, plan.changes))
            }
        }
    }

    fn apply_manual(
        blocks: &mut [TimeBlock],
        adjustments: &[ManualAdjustment],
        subject: Option<&str>,
    ) -> Result<Vec<DurationChange>, TimelineError> {
        let mut changes: Vec<DurationChange> = Vec::with_capacity(adjustments.len());
        for adjustment in adjustments {
            if subject == Some(adjustment.id.as_str()) {
                return Err(TimelineError::AdjustsEditedBlock(adjustment.id.clone()));
            }
            let block = blocks
                .iter_mut()
                .find(|b| b.id == adjustment.id)
                .ok_or_else(|| TimelineError::BlockNotFound(adjustment.id.clone()))?;
            if block.locked {
                return Err(TimelineError::BlockLocked(block.id.clone()));
            }
            if adjustment.duration_minutes < block.effective_floor() {
                return Err(TimelineError::ResizeBelowFloor {
                    id: block.id.clone(),
                    requested: adjustment.duration_minutes,
                    floor: block.effective_floor(),
                });
            }
            if block.duration_minutes == adjustment.duration_minutes {
                continue;
            }

            match changes.iter_mut().find(|c| c.id == block.id) {
                Some(change) => change.to_minutes = adjustment.duration_minutes,
                None => changes.push(DurationChange {
                    id: block.id.clone(),
                    from_minutes: block.duration_minutes,
                    to_minutes: adjustment.duration_minutes,
                }),
            }
            block.duration_minutes = adjustment.duration_minutes;
        }
        Ok(changes)
    }

    /// Apply the underflow policy and assemble the commit outcome.
    fn finish(
        &self,
        before: &TimelineSequence,
        blocks: Vec<TimeBlock>,
        added: Vec<BlockId>,
        removed: Vec<BlockId>,
        changes: Vec<DurationChange>,
    ) -> Result<CommitOutcome, TimelineError> {
        let sequence = before.with_blocks(blocks);
        let report = continuity::validate(&sequence);
        if let ContinuityState::Underflow(underflow) = report.state {
            if sequence.underflow == UnderflowPolicy::Reject {
                return Err(TimelineError::UnderflowRejected { underflow });
            }
        }

        let ripple = shifted_ids(&before.blocks, &sequence.blocks)
            .into_iter()
            .filter(|id| !changes.iter().any(|c| &c.id == id))
            .collect();

        Ok(CommitOutcome {
            sequence,
            added,
            removed,
            changes,
            ripple,
            report,
        })
    }
}

impl Default for TimelineEngine {
    fn default() -> Self {
        Self::new()
    }
}

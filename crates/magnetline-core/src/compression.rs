//! Proportional, floor-aware compression of flexible blocks.
//!
//! Overflow is spread over the eligible pool in proportion to each block's
//! duration, flexbox-shrink style:
//!
//! 1. `ratio = remaining / F` over the blocks still in play.
//! 2. Any block whose proportional shrink would cross its floor is clamped
//!    to the floor and leaves the pool; the overflow it could not absorb
//!    stays in `remaining`.
//! 3. Repeat until no block violates its floor (success) or the pool is
//!    empty while overflow remains (infeasible).
//!
//! All arithmetic is exact integer math on `duration * remaining / F`.
//! Whole minutes lost to truncation are handed out by largest remainder,
//! ties going to the longer block and then to the earlier one, so the
//! applied shrink always sums to the overflow exactly.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use tracing::trace;

use crate::error::TimelineError;
use crate::sequence::{saturate, BlockId, TimeBlock};

/// Which blocks absorb the overflow of a resize
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionScope {
    /// Only the block adjacent to the dragged edge (the next block, or the
    /// previous one when the resized block is last)
    Neighbor,
    /// Every flexible, unlocked block other than the resized one
    #[default]
    AllFlexible,
}

/// A block that compression may shrink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionCandidate {
    pub id: BlockId,
    pub duration_minutes: u32,
    pub floor_minutes: u32,
}

impl CompressionCandidate {
    fn from_block(block: &TimeBlock) -> Self {
        Self {
            id: block.id.clone(),
            duration_minutes: block.duration_minutes,
            floor_minutes: block.effective_floor(),
        }
    }

    fn capacity(&self) -> u64 {
        u64::from(self.duration_minutes.saturating_sub(self.floor_minutes))
    }
}

/// Duration change applied to one block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationChange {
    pub id: BlockId,
    pub from_minutes: u32,
    pub to_minutes: u32,
}

impl DurationChange {
    /// Minutes removed (positive) or added (negative).
    pub fn shrink_minutes(&self) -> i64 {
        i64::from(self.from_minutes) - i64::from(self.to_minutes)
    }
}

/// Shrink schedule that absorbs an overflow exactly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionPlan {
    pub overflow: u32,
    /// Blocks that actually shrink, in pool order
    pub changes: Vec<DurationChange>,
    /// Number of clamp rounds it took to settle
    pub rounds: u32,
}

impl CompressionPlan {
    pub fn absorbed_minutes(&self) -> u64 {
        self.changes
            .iter()
            .map(|c| u64::from(c.from_minutes - c.to_minutes))
            .sum()
    }
}

/// Compression calculator
pub struct CompressionEngine;

impl CompressionEngine {
    /// Collect the pool of blocks eligible to absorb overflow.
    ///
    /// `anchor` is the index of the block being resized; it is never part of
    /// the pool, and `Neighbor` scope picks relative to it. Without an anchor
    /// every compressible block is eligible.
    pub fn eligible_pool(
        blocks: &[TimeBlock],
        scope: CompressionScope,
        anchor: Option<usize>,
    ) -> Vec<CompressionCandidate> {
        match (scope, anchor) {
            (CompressionScope::Neighbor, Some(index)) => {
                let neighbor = if index + 1 < blocks.len() {
                    index + 1
                } else if index > 0 {
                    index - 1
                } else {
                    return Vec::new();
                };
                blocks
                    .get(neighbor)
                    .filter(|b| b.shrink_capacity() > 0)
                    .map(CompressionCandidate::from_block)
                    .into_iter()
                    .collect()
            }
            _ => blocks
                .iter()
                .enumerate()
                .filter(|(i, b)| Some(*i) != anchor && b.shrink_capacity() > 0)
                .map(|(_, b)| CompressionCandidate::from_block(b))
                .collect(),
        }
    }

    /// Total minutes the pool can give up before every block hits its floor.
    pub fn pool_capacity(pool: &[CompressionCandidate]) -> u64 {
        pool.iter().map(CompressionCandidate::capacity).sum()
    }

    /// Compute a shrink plan absorbing exactly `overflow` minutes.
    pub fn compress(
        overflow: u32,
        pool: &[CompressionCandidate],
    ) -> Result<CompressionPlan, TimelineError> {
        let mut shrink = vec![0u64; pool.len()];
        let mut active: Vec<usize> = (0..pool.len())
            .filter(|&i| pool[i].capacity() > 0)
            .collect();
        let mut remaining = u64::from(overflow);
        let mut rounds = 0u32;

        while remaining > 0 {
            if active.is_empty() {
                return Err(TimelineError::OverflowInfeasible {
                    overflow,
                    shortfall: saturate(remaining),
                    considered_ids: pool.iter().map(|c| c.id.clone()).collect(),
                });
            }
            rounds += 1;

            let flex_total: u64 = active
                .iter()
                .map(|&i| u64::from(pool[i].duration_minutes))
                .sum();

            // d * remaining / F > d - floor  <=>  d * remaining > (d - floor) * F
            // Both sides can exceed u64 once F sums several large durations.
            let (clamped, kept): (Vec<usize>, Vec<usize>) = active.iter().partition(|&&i| {
                let d = u128::from(pool[i].duration_minutes);
                d * u128::from(remaining) > u128::from(pool[i].capacity()) * u128::from(flex_total)
            });

            trace!(
                round = rounds,
                remaining,
                flex_total,
                clamped = clamped.len(),
                "compression round"
            );

            if clamped.is_empty() {
                Self::distribute(pool, &kept, remaining, flex_total, &mut shrink);
                remaining = 0;
                break;
            }

            for &i in &clamped {
                let capacity = pool[i].capacity();
                shrink[i] = capacity;
                remaining -= capacity;
            }
            active = kept;
        }

        let changes = pool
            .iter()
            .zip(&shrink)
            .filter(|(_, s)| **s > 0)
            .map(|(c, &s)| DurationChange {
                id: c.id.clone(),
                from_minutes: c.duration_minutes,
                to_minutes: c.duration_minutes - saturate(s),
            })
            .collect();

        debug_assert_eq!(remaining, 0);
        Ok(CompressionPlan {
            overflow,
            changes,
            rounds,
        })
    }

    /// Split `remaining` across `kept` proportionally, exact to the minute.
    fn distribute(
        pool: &[CompressionCandidate],
        kept: &[usize],
        remaining: u64,
        flex_total: u64,
        shrink: &mut [u64],
    ) {
        let mut remainders = Vec::with_capacity(kept.len());
        let mut assigned = 0u64;
        for &i in kept {
            let scaled = u64::from(pool[i].duration_minutes) * remaining;
            shrink[i] = scaled / flex_total;
            assigned += shrink[i];
            remainders.push((i, scaled % flex_total));
        }

        let leftover = remaining - assigned;
        remainders.sort_by_key(|&(i, rem)| (Reverse(rem), Reverse(pool[i].duration_minutes), i));
        for &(i, _) in remainders.iter().take(saturate(leftover) as usize) {
            shrink[i] += 1;
        }
    }

    /// Apply a plan to a block list. Ids missing from `blocks` are ignored.
    pub fn apply(blocks: &mut [TimeBlock], plan: &CompressionPlan) {
        for change in &plan.changes {
            if let Some(block) = blocks.iter_mut().find(|b| b.id == change.id) {
                block.duration_minutes = change.to_minutes;
            }
        }
    }
}

//! Property tests for the timeline invariants.

use magnetline_core::{
    CompressionEngine, CompressionScope, ContinuityState, Resolution, TimeBlock, TimelineEngine,
    TimelineError, TimelineSequence,
};
use proptest::prelude::*;

fn arb_block(index: usize) -> impl Strategy<Value = TimeBlock> {
    (1u32..=300, any::<bool>(), any::<bool>(), 0u32..=30).prop_map(
        move |(duration, flexible, locked, floor)| TimeBlock {
            flexible,
            locked,
            ..TimeBlock::new(format!("b{index}"), duration).with_floor(floor)
        },
    )
}

fn arb_blocks() -> impl Strategy<Value = Vec<TimeBlock>> {
    (1usize..8).prop_flat_map(|len| (0..len).map(arb_block).collect::<Vec<_>>())
}

/// A sequence filled exactly to capacity.
fn arb_exact_sequence() -> impl Strategy<Value = TimelineSequence> {
    arb_blocks().prop_map(|blocks| {
        let total: u32 = blocks.iter().map(|b| b.duration_minutes).sum();
        TimelineSequence::new(total, blocks).unwrap()
    })
}

proptest! {
    #[test]
    fn validate_is_idempotent(seq in arb_exact_sequence(), slack in 0u32..100) {
        let seq = TimelineSequence { capacity_minutes: seq.capacity_minutes + slack, ..seq };
        let engine = TimelineEngine::new();
        prop_assert_eq!(engine.validate(&seq), engine.validate(&seq));
    }

    #[test]
    fn auto_compress_conserves_minutes(
        seq in arb_exact_sequence(),
        extra in 1u32..200,
        position in any::<prop::sample::Index>(),
    ) {
        let engine = TimelineEngine::new();
        let index = position.index(seq.len() + 1);
        let block = TimeBlock::locked("incoming", extra);

        match engine.commit_insert(&seq, index, block, &Resolution::AutoCompress) {
            Ok(outcome) => {
                let removed: i64 = outcome.changes.iter().map(|c| c.shrink_minutes()).sum();
                prop_assert_eq!(removed, i64::from(extra));
                prop_assert_eq!(outcome.report.state, ContinuityState::Exact);
                for change in &outcome.changes {
                    let block = outcome.sequence.get(&change.id).unwrap();
                    prop_assert!(block.duration_minutes >= block.effective_floor());
                    prop_assert!(block.flexible && !block.locked);
                }
            }
            Err(TimelineError::OverflowInfeasible { overflow, shortfall, .. }) => {
                prop_assert_eq!(overflow, extra);
                let capacity: u32 = seq.blocks.iter().map(TimeBlock::shrink_capacity).sum();
                prop_assert_eq!(shortfall, extra - capacity);
            }
            Err(other) => prop_assert!(false, "unexpected error {other:?}"),
        }
    }

    #[test]
    fn locked_blocks_never_change(
        seq in arb_exact_sequence(),
        extra in 1u32..200,
        target in any::<prop::sample::Index>(),
    ) {
        let engine = TimelineEngine::new();
        let target = &seq.blocks[target.index(seq.len())];
        let attempts = [
            engine
                .commit_insert(&seq, 0, TimeBlock::new("incoming", extra), &Resolution::AutoCompress)
                .map(|o| o.sequence),
            engine
                .commit_resize(&seq, &target.id, target.duration_minutes + extra, &Resolution::AutoCompress)
                .map(|o| o.sequence),
            engine.split(&seq, &target.id, 1).map(|o| o.sequence),
        ];
        for result in attempts.into_iter().flatten() {
            for block in seq.blocks.iter().filter(|b| b.locked) {
                let after = result.get(&block.id).unwrap();
                prop_assert_eq!(after.duration_minutes, block.duration_minutes);
            }
        }
    }

    #[test]
    fn split_merge_round_trip(seq in arb_exact_sequence(), target in any::<prop::sample::Index>(), cut in any::<prop::sample::Index>()) {
        let engine = TimelineEngine::new();
        let block = &seq.blocks[target.index(seq.len())];
        prop_assume!(!block.locked && block.duration_minutes >= 2);
        let offset = 1 + cut.index(block.duration_minutes as usize - 1) as u32;

        let split = engine.split(&seq, &block.id, offset).unwrap();
        prop_assert_eq!(split.sequence.total_minutes(), seq.total_minutes());
        let merged = engine.merge(&split.sequence, &split.left_id, &split.right_id).unwrap();
        prop_assert_eq!(merged.sequence, seq);
    }

    #[test]
    fn reorder_is_a_pure_permutation(
        seq in arb_exact_sequence(),
        from in any::<prop::sample::Index>(),
        to in any::<prop::sample::Index>(),
    ) {
        let engine = TimelineEngine::new();
        let (from, to) = (from.index(seq.len()), to.index(seq.len()));
        let outcome = engine.reorder(&seq, from, to).unwrap();

        prop_assert_eq!(outcome.sequence.len(), seq.len());
        for block in &seq.blocks {
            let after = outcome.sequence.get(&block.id).unwrap();
            prop_assert_eq!(after.duration_minutes, block.duration_minutes);
        }
        let expected = if from == to { 0 } else { from.abs_diff(to) + 1 };
        prop_assert_eq!(outcome.ripple.len(), expected);
    }

    #[test]
    fn compression_never_crosses_floors(blocks in arb_blocks(), overflow in 0u32..600) {
        let pool = CompressionEngine::eligible_pool(&blocks, CompressionScope::AllFlexible, None);
        let capacity = CompressionEngine::pool_capacity(&pool);
        match CompressionEngine::compress(overflow, &pool) {
            Ok(plan) => {
                prop_assert!(u64::from(overflow) <= capacity);
                prop_assert_eq!(plan.absorbed_minutes(), u64::from(overflow));
                for change in &plan.changes {
                    let candidate = pool.iter().find(|c| c.id == change.id).unwrap();
                    prop_assert!(change.to_minutes >= candidate.floor_minutes);
                }
            }
            Err(_) => prop_assert!(u64::from(overflow) > capacity),
        }
    }
}

//! Integration tests for end-to-end timeline scenarios.

use magnetline_core::{
    ContinuityState, Plan, Resolution, TimeBlock, TimelineEngine, TimelineError, TimelineSequence,
    UnderflowPolicy,
};

fn base_day(capacity: u32) -> TimelineSequence {
    TimelineSequence::new(
        capacity,
        vec![
            TimeBlock::locked("sleep", 480),
            TimeBlock::flexible("work", 240),
            TimeBlock::flexible("lunch", 60),
        ],
    )
    .unwrap()
}

#[test]
fn test_insert_with_room_needs_no_compression() {
    let engine = TimelineEngine::new();
    let seq = base_day(1440);
    let meeting = TimeBlock::locked("meeting", 90);

    let plan = engine.plan_insert(&seq, 1, &meeting).unwrap();
    assert!(plan.is_feasible());

    let outcome = engine
        .commit_insert(&seq, 1, meeting, &Resolution::Strict)
        .unwrap();
    assert_eq!(outcome.sequence.len(), 4);
    assert!(outcome.changes.is_empty());
    assert_eq!(outcome.report.total_minutes, 870);
    assert_eq!(outcome.ripple, vec!["work".to_string(), "lunch".to_string()]);
}

#[test]
fn test_tight_window_auto_compresses_exactly() {
    let engine = TimelineEngine::new();
    let seq = base_day(780);
    let meeting = TimeBlock::new("meeting", 90);

    let plan = engine.plan_insert(&seq, 1, &meeting).unwrap();
    let Plan::Overflow {
        overflow,
        eligible_ids,
        ..
    } = plan
    else {
        panic!("expected overflow plan");
    };
    assert_eq!(overflow, 90);
    assert_eq!(eligible_ids, vec!["work".to_string(), "lunch".to_string()]);

    let outcome = engine
        .commit_insert(&seq, 1, meeting, &Resolution::AutoCompress)
        .unwrap();
    let work = outcome.sequence.get("work").unwrap();
    let lunch = outcome.sequence.get("lunch").unwrap();
    assert_eq!(240 - work.duration_minutes, 72);
    assert_eq!(60 - lunch.duration_minutes, 18);
    assert_eq!(engine.validate(&outcome.sequence).state, ContinuityState::Exact);
}

#[test]
fn test_merge_without_shared_lineage_is_rejected() {
    let engine = TimelineEngine::new();
    let seq = base_day(780);
    let err = engine.merge(&seq, "work", "lunch").unwrap_err();
    assert!(matches!(err, TimelineError::MergeLineageMismatch { .. }));
    assert_eq!(seq, base_day(780));
}

#[test]
fn test_resize_beyond_pool_is_infeasible() {
    let engine = TimelineEngine::new();
    let seq = base_day(780);
    // lunch is the only other flexible block after work; the pool is work alone
    // when resizing lunch, and work can give at most 235 minutes.
    let err = engine
        .commit_resize(&seq, "lunch", 400, &Resolution::AutoCompress)
        .unwrap_err();
    assert_eq!(
        err,
        TimelineError::OverflowInfeasible {
            overflow: 340,
            shortfall: 105,
            considered_ids: vec!["work".into()],
        }
    );
    assert_eq!(seq, base_day(780));
}

#[test]
fn test_split_then_merge_restores_block_and_position() {
    let engine = TimelineEngine::new();
    let seq = base_day(780);
    let before = engine.layout(&seq);

    let split = engine.split(&seq, "work", 95).unwrap();
    assert_eq!(split.sequence.total_minutes(), seq.total_minutes());

    let merged = engine
        .merge(&split.sequence, &split.left_id, &split.right_id)
        .unwrap();
    assert_eq!(merged.sequence, seq);
    assert_eq!(engine.layout(&merged.sequence), before);
    assert_eq!(merged.removed, vec![split.right_id]);
}

#[test]
fn test_reorder_between_split_and_merge_blocks_merge() {
    let engine = TimelineEngine::new();
    let split = engine.split(&base_day(780), "work", 120).unwrap();
    let moved = engine.reorder(&split.sequence, 3, 2).unwrap();
    assert_eq!(moved.ripple, vec!["lunch".to_string(), "work.1".to_string()]);
    let err = engine
        .merge(&moved.sequence, "work", "work.1")
        .unwrap_err();
    assert!(matches!(err, TimelineError::MergeNotAdjacent { .. }));

    // Moving it back makes the pair adjacent again
    let back = engine.reorder(&moved.sequence, 3, 2).unwrap();
    assert!(engine.merge(&back.sequence, "work", "work.1").is_ok());
}

#[test]
fn test_exact_fill_sequence_rejects_removal() {
    let engine = TimelineEngine::new();
    let seq = base_day(780).with_underflow(UnderflowPolicy::Reject);
    assert_eq!(
        engine.remove(&seq, "lunch").unwrap_err(),
        TimelineError::UnderflowRejected { underflow: 60 }
    );
    // Duration-neutral operations are unaffected
    assert!(engine.split(&seq, "lunch", 30).is_ok());
    assert!(engine.reorder(&seq, 0, 2).is_ok());
}

#[test]
fn test_version_and_metadata_pass_through() {
    let engine = TimelineEngine::new();
    let seq = TimelineSequence::new(
        100,
        vec![TimeBlock::flexible("focus", 100)
            .with_metadata(serde_json::json!({"labels": ["deep"]}))],
    )
    .unwrap()
    .with_version("v7");

    let outcome = engine
        .commit_insert(&seq, 0, TimeBlock::new("standup", 15), &Resolution::AutoCompress)
        .unwrap();
    assert_eq!(outcome.sequence.version.as_deref(), Some("v7"));
    let focus = outcome.sequence.get("focus").unwrap();
    assert_eq!(focus.duration_minutes, 85);
    assert_eq!(focus.metadata["labels"][0], "deep");
}

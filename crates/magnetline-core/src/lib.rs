//! # Magnetline Core Library
//!
//! This library provides the layout engine behind a magnetic timeline: a
//! gapless sequence of time blocks filling a fixed daily window. It is a
//! pure functional core; persistence, gesture translation and rendering
//! live in the surrounding application, which hands snapshots in and gets
//! new snapshots (or typed errors) back.
//!
//! ## Architecture
//!
//! - **Sequence**: blocks, split lineage and the immutable snapshot
//! - **Continuity**: exact / overflow / underflow reporting and layout
//! - **Compression**: proportional, floor-aware shrinking of flexible blocks
//! - **Split/Merge**: duration-neutral division and lineage-checked reunion
//! - **Reorder**: pure permutation with ripple reporting
//! - **Engine**: plan/commit façade tying the above together
//!
//! ## Key Components
//!
//! - [`TimelineEngine`]: plan and commit operations
//! - [`TimelineSequence`]: the snapshot every operation consumes and returns
//! - [`CompressionEngine`]: overflow absorption
//! - [`EngineConfig`]: engine defaults, persisted as TOML

pub mod compression;
pub mod config;
pub mod continuity;
pub mod engine;
pub mod error;
pub mod reorder;
pub mod sequence;
pub mod split_merge;

pub use compression::{CompressionEngine, CompressionPlan, CompressionScope, DurationChange};
pub use config::EngineConfig;
pub use continuity::{layout, validate, ContinuityReport, ContinuityState, Placement};
pub use engine::{BlockTemplate, CommitOutcome, ManualAdjustment, Plan, Resolution, TimelineEngine};
pub use error::{ConfigError, CoreError, TimelineError};
pub use reorder::ReorderOutcome;
pub use sequence::{BlockId, Lineage, TimeBlock, TimelineSequence, UnderflowPolicy};
pub use split_merge::{MergeOutcome, SplitMergeManager, SplitOutcome};

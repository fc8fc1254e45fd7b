//! Core error types for magnetline-core.
//!
//! Engine operations never panic and never partially mutate: every
//! infeasible request comes back as a [`TimelineError`] carrying exactly the
//! amounts and block ids the orchestration layer needs to offer the
//! compress / adjust manually / cancel choice.

use std::path::PathBuf;
use thiserror::Error;

use crate::sequence::BlockId;

/// Core error type for magnetline-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Timeline operation rejected by the engine
    #[error("Timeline error: {0}")]
    Timeline(#[from] TimelineError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Typed, non-fatal outcome of an infeasible engine operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimelineError {
    /// Overflow remains after every eligible block has been shrunk to its floor
    #[error(
        "Overflow of {overflow} min cannot be absorbed: {shortfall} min short after shrinking {considered_ids:?} to their floors"
    )]
    OverflowInfeasible {
        overflow: u32,
        shortfall: u32,
        considered_ids: Vec<BlockId>,
    },

    /// The requested resolution left overflow in place
    #[error("Overflow of {overflow} min left unresolved (eligible: {eligible_ids:?})")]
    OverflowUnresolved {
        overflow: u32,
        eligible_ids: Vec<BlockId>,
    },

    /// The sequence requires exact fill and the result would fall short
    #[error("Sequence would underflow by {underflow} min and underflow is rejected")]
    UnderflowRejected { underflow: u32 },

    /// Merge pair does not share split lineage
    #[error("Block '{child_id}' is not the split child of '{parent_id}'")]
    MergeLineageMismatch { parent_id: BlockId, child_id: BlockId },

    /// Merge pair is no longer adjacent
    #[error("Block '{child_id}' does not directly follow '{parent_id}'")]
    MergeNotAdjacent { parent_id: BlockId, child_id: BlockId },

    /// Merge child still has a split child of its own
    #[error("Block '{child_id}' must first be merged with its own child '{grandchild_id}'")]
    MergeOrderViolation {
        child_id: BlockId,
        grandchild_id: BlockId,
    },

    /// Resize target below the block's floor
    #[error("Cannot resize '{id}' to {requested} min: floor is {floor} min")]
    ResizeBelowFloor {
        id: BlockId,
        requested: u32,
        floor: u32,
    },

    /// Index out of bounds
    #[error("Index {index} out of bounds (length: {len})")]
    InvalidIndex { index: usize, len: usize },

    /// Split offset outside the open interval (0, duration)
    #[error("Offset {offset} is not strictly inside block '{id}' ({duration} min)")]
    InvalidOffset {
        id: BlockId,
        offset: u32,
        duration: u32,
    },

    /// Durations must be positive
    #[error("Block '{id}' has invalid duration {duration}")]
    InvalidDuration { id: BlockId, duration: u32 },

    #[error("Block '{0}' not found")]
    BlockNotFound(BlockId),

    #[error("Block '{0}' is locked")]
    BlockLocked(BlockId),

    #[error("Duplicate block id '{0}'")]
    DuplicateBlockId(BlockId),

    /// Block already has a live split child
    #[error("Block '{id}' is already split (child '{child_id}')")]
    AlreadySplit { id: BlockId, child_id: BlockId },

    /// Manual adjustment aimed at the block being inserted or resized
    #[error("Block '{0}' is the subject of this edit and cannot be adjusted manually")]
    AdjustsEditedBlock(BlockId),
}

impl TimelineError {
    /// Overflow minutes carried by this error, if any.
    pub fn overflow_amount(&self) -> Option<u32> {
        match self {
            Self::OverflowInfeasible { overflow, .. } | Self::OverflowUnresolved { overflow, .. } => {
                Some(*overflow)
            }
            _ => None,
        }
    }

    /// Block ids the error refers to.
    pub fn affected_ids(&self) -> Vec<BlockId> {
        match self {
            Self::OverflowInfeasible { considered_ids, .. } => considered_ids.clone(),
            Self::OverflowUnresolved { eligible_ids, .. } => eligible_ids.clone(),
            Self::UnderflowRejected { .. } | Self::InvalidIndex { .. } => Vec::new(),
            Self::MergeLineageMismatch { parent_id, child_id }
            | Self::MergeNotAdjacent { parent_id, child_id } => {
                vec![parent_id.clone(), child_id.clone()]
            }
            Self::MergeOrderViolation {
                child_id,
                grandchild_id,
            } => vec![child_id.clone(), grandchild_id.clone()],
            Self::AlreadySplit { id, child_id } => vec![id.clone(), child_id.clone()],
            Self::ResizeBelowFloor { id, .. }
            | Self::InvalidOffset { id, .. }
            | Self::InvalidDuration { id, .. } => vec![id.clone()],
            Self::BlockNotFound(id)
            | Self::BlockLocked(id)
            | Self::DuplicateBlockId(id)
            | Self::AdjustsEditedBlock(id) => {
                vec![id.clone()]
            }
        }
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

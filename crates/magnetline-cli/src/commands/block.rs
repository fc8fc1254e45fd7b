use clap::{Args, Subcommand, ValueEnum};
use magnetline_core::{
    BlockTemplate, CommitOutcome, EngineConfig, ManualAdjustment, Resolution, TimelineEngine,
    TimelineSequence,
};
use magnetline_core::error::Result;
use std::path::PathBuf;

use super::{load_sequence, print_json, store_sequence};

#[derive(Clone, Copy, ValueEnum)]
pub enum ResolutionArg {
    /// Fail if the change overflows the window
    Strict,
    /// Shrink flexible blocks proportionally
    Auto,
    /// Use the --adjust values
    Manual,
}

/// Shared flags for operations that write a new snapshot.
#[derive(Args)]
pub struct WriteArgs {
    /// Timeline JSON file
    pub path: PathBuf,
    /// Persist the result back to the file
    #[arg(long)]
    pub write: bool,
}

/// Shared flags for operations that may overflow.
#[derive(Args)]
pub struct ResolveArgs {
    /// How to resolve overflow on commit
    #[arg(long, value_enum, default_value = "strict")]
    pub resolution: ResolutionArg,
    /// Manual adjustment as `id=minutes` (repeatable)
    #[arg(long = "adjust", value_parser = parse_adjustment)]
    pub adjustments: Vec<ManualAdjustment>,
    /// Only plan; print feasibility without committing
    #[arg(long)]
    pub plan: bool,
}

impl ResolveArgs {
    fn resolution(&self) -> Resolution {
        match self.resolution {
            ResolutionArg::Strict => Resolution::Strict,
            ResolutionArg::Auto => Resolution::AutoCompress,
            ResolutionArg::Manual => Resolution::Manual(self.adjustments.clone()),
        }
    }
}

fn parse_adjustment(raw: &str) -> Result<ManualAdjustment, String> {
    let (id, minutes) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected id=minutes, got '{raw}'"))?;
    let duration_minutes = minutes
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid minutes in '{raw}': {e}"))?;
    Ok(ManualAdjustment {
        id: id.trim().to_string(),
        duration_minutes,
    })
}

#[derive(Subcommand)]
pub enum BlockAction {
    /// Insert a new block at an index
    Insert {
        #[command(flatten)]
        target: WriteArgs,
        /// Position to insert at (0 = start of day)
        index: usize,
        /// Duration in minutes
        #[arg(long)]
        duration: u32,
        /// Block id (random if omitted)
        #[arg(long)]
        id: Option<String>,
        /// Block may be compressed
        #[arg(long)]
        flexible: bool,
        /// Block duration is fixed
        #[arg(long)]
        locked: bool,
        /// Minimum duration under compression (defaults to config)
        #[arg(long)]
        floor: Option<u32>,
        /// Opaque JSON metadata
        #[arg(long)]
        metadata: Option<String>,
        #[command(flatten)]
        resolve: ResolveArgs,
    },
    /// Change a block's duration
    Resize {
        #[command(flatten)]
        target: WriteArgs,
        /// Block id
        id: String,
        /// New duration in minutes
        minutes: u32,
        #[command(flatten)]
        resolve: ResolveArgs,
    },
    /// Split a block at an offset
    Split {
        #[command(flatten)]
        target: WriteArgs,
        /// Block id
        id: String,
        /// Offset in minutes from the block start
        offset: u32,
        /// Id for the right-hand half
        #[arg(long)]
        right_id: Option<String>,
    },
    /// Merge a split child back into its parent
    Merge {
        #[command(flatten)]
        target: WriteArgs,
        /// Parent (left) block id
        parent: String,
        /// Child (right) block id
        child: String,
    },
    /// Move a block from one index to another
    Reorder {
        #[command(flatten)]
        target: WriteArgs,
        from: usize,
        to: usize,
    },
    /// Remove a block
    Remove {
        #[command(flatten)]
        target: WriteArgs,
        /// Block id
        id: String,
    },
}

fn persist(
    target: &WriteArgs,
    sequence: &TimelineSequence,
) -> Result<()> {
    if target.write {
        store_sequence(&target.path, sequence)?;
        eprintln!("saved {}", target.path.display());
    }
    Ok(())
}

fn finish_commit(
    target: &WriteArgs,
    outcome: &CommitOutcome,
) -> Result<()> {
    print_json(outcome)?;
    persist(target, &outcome.sequence)
}

pub fn run(action: BlockAction) -> Result<()> {
    let engine = TimelineEngine::with_config(EngineConfig::load_or_default());
    match action {
        BlockAction::Insert {
            target,
            index,
            duration,
            id,
            flexible,
            locked,
            floor,
            metadata,
            resolve,
        } => {
            let sequence = load_sequence(&target.path)?;
            let metadata = match metadata {
                Some(raw) => serde_json::from_str(&raw)?,
                None => serde_json::Value::Null,
            };
            let block = engine.block_from_template(BlockTemplate {
                id: id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                duration_minutes: duration,
                flexible,
                locked,
                floor_minutes: floor,
                metadata,
            });
            if resolve.plan {
                return print_json(&engine.plan_insert(&sequence, index, &block)?);
            }
            let outcome = engine.commit_insert(&sequence, index, block, &resolve.resolution())?;
            finish_commit(&target, &outcome)?;
        }
        BlockAction::Resize {
            target,
            id,
            minutes,
            resolve,
        } => {
            let sequence = load_sequence(&target.path)?;
            if resolve.plan {
                return print_json(&engine.plan_resize(&sequence, &id, minutes)?);
            }
            let outcome = engine.commit_resize(&sequence, &id, minutes, &resolve.resolution())?;
            finish_commit(&target, &outcome)?;
        }
        BlockAction::Split {
            target,
            id,
            offset,
            right_id,
        } => {
            let sequence = load_sequence(&target.path)?;
            let outcome = match right_id {
                Some(right_id) => engine.split_with_id(&sequence, &id, offset, right_id)?,
                None => engine.split(&sequence, &id, offset)?,
            };
            print_json(&outcome)?;
            persist(&target, &outcome.sequence)?;
        }
        BlockAction::Merge {
            target,
            parent,
            child,
        } => {
            let sequence = load_sequence(&target.path)?;
            let outcome = engine.merge(&sequence, &parent, &child)?;
            finish_commit(&target, &outcome)?;
        }
        BlockAction::Reorder { target, from, to } => {
            let sequence = load_sequence(&target.path)?;
            let outcome = engine.reorder(&sequence, from, to)?;
            print_json(&outcome)?;
            persist(&target, &outcome.sequence)?;
        }
        BlockAction::Remove { target, id } => {
            let sequence = load_sequence(&target.path)?;
            let outcome = engine.remove(&sequence, &id)?;
            finish_commit(&target, &outcome)?;
        }
    }
    Ok(())
}

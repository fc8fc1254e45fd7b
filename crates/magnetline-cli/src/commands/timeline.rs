use clap::Subcommand;
use magnetline_core::{EngineConfig, TimelineEngine, UnderflowPolicy};
use magnetline_core::error::Result;
use std::path::PathBuf;

use super::{clock_label, load_sequence, print_json, store_sequence};

#[derive(Subcommand)]
pub enum TimelineAction {
    /// Create an empty timeline file
    New {
        /// Output JSON file
        path: PathBuf,
        /// Window size in minutes (defaults to config)
        #[arg(long)]
        capacity: Option<u32>,
        /// Reject commits that leave the window short
        #[arg(long)]
        exact: bool,
        /// Opaque version token to stamp on the snapshot
        #[arg(long)]
        version: Option<String>,
    },
    /// Report whether the timeline is exact, overflowing or underflowing
    Validate {
        /// Timeline JSON file
        path: PathBuf,
    },
    /// Show each block's start and end within the window
    Layout {
        /// Timeline JSON file
        path: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: TimelineAction) -> Result<()> {
    let engine = TimelineEngine::with_config(EngineConfig::load_or_default());
    match action {
        TimelineAction::New {
            path,
            capacity,
            exact,
            version,
        } => {
            let mut sequence = engine.new_sequence();
            if let Some(capacity) = capacity {
                sequence.capacity_minutes = capacity;
            }
            if exact {
                sequence = sequence.with_underflow(UnderflowPolicy::Reject);
            }
            if let Some(version) = version {
                sequence = sequence.with_version(version);
            }
            store_sequence(&path, &sequence)?;
            println!("timeline created: {}", path.display());
        }
        TimelineAction::Validate { path } => {
            let sequence = load_sequence(&path)?;
            print_json(&engine.validate(&sequence))?;
        }
        TimelineAction::Layout { path, json } => {
            let sequence = load_sequence(&path)?;
            let placements = engine.layout(&sequence);
            if json {
                print_json(&placements)?;
                return Ok(());
            }
            for (placement, block) in placements.iter().zip(&sequence.blocks) {
                let mut flags = Vec::new();
                if block.locked {
                    flags.push("locked");
                }
                if block.flexible {
                    flags.push("flexible");
                }
                println!(
                    "{}-{}  {:<24} {:>4} min  {}",
                    clock_label(placement.start_minute),
                    clock_label(placement.end_minute),
                    block.id,
                    block.duration_minutes,
                    flags.join(",")
                );
            }
            let report = engine.validate(&sequence);
            println!("{:?} ({} / {} min)", report.state, report.total_minutes, report.capacity_minutes);
        }
    }
    Ok(())
}

pub mod block;
pub mod config;
pub mod timeline;

use magnetline_core::error::Result;
use magnetline_core::TimelineSequence;
use serde::Serialize;
use std::path::Path;

/// Read a sequence snapshot from a JSON file.
pub fn load_sequence(path: &Path) -> Result<TimelineSequence> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        std::io::Error::new(e.kind(), format!("cannot read {}: {e}", path.display()))
    })?;
    let sequence: TimelineSequence = serde_json::from_str(&content)?;
    sequence.check_well_formed()?;
    tracing::debug!(path = %path.display(), blocks = sequence.len(), "loaded timeline");
    Ok(sequence)
}

/// Write a sequence snapshot back as pretty JSON.
pub fn store_sequence(path: &Path, sequence: &TimelineSequence) -> Result<()> {
    let json = serde_json::to_string_pretty(sequence)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Render a minute offset as a wall-clock label (`HH:MM`).
pub fn clock_label(minute: u64) -> String {
    u32::try_from(minute * 60)
        .ok()
        .and_then(|secs| chrono::NaiveTime::from_num_seconds_from_midnight_opt(secs, 0))
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_else(|| format!("{:02}:{:02}", minute / 60, minute % 60))
}

#[cfg(test)]
mod tests {
    use super::*;

    use magnetline_core::{CoreError, TimeBlock, TimelineError};

    #[test]
    fn test_load_sequence_rejects_duplicate_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("day.json");
        let mut sequence = TimelineSequence::empty(1440);
        sequence.blocks = vec![TimeBlock::new("a", 30), TimeBlock::new("a", 45)];
        store_sequence(&path, &sequence).unwrap();

        assert!(matches!(
            load_sequence(&path),
            Err(CoreError::Timeline(TimelineError::DuplicateBlockId(id))) if id == "a"
        ));
    }

    #[test]
    fn test_load_sequence_missing_file_is_io() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_sequence(&dir.path().join("nope.json")),
            Err(CoreError::Io(_))
        ));
    }

    #[test]
    fn test_clock_label() {
        assert_eq!(clock_label(0), "00:00");
        assert_eq!(clock_label(570), "09:30");
        assert_eq!(clock_label(1440), "24:00");
    }
}

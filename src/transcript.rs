use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::context::ConversationTurn;

/// Write-only, one file per session, timestamp-named. The core never reads
/// it back, and a write failure never fails the session.
pub struct TranscriptWriter {
    path: PathBuf,
}

impl TranscriptWriter {
    pub fn create(dir: &Path) -> std::io::Result<Self> {
        fs::create_dir_all(dir)?;
        let name = format!("curio-{}.txt", Local::now().format("%Y%m%d-%H%M%S"));
        Ok(Self {
            path: dir.join(name),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends turns as `Role: content` lines in chronological order.
    /// Errors are logged and swallowed.
    pub fn append(&self, turns: &[ConversationTurn]) {
        if let Err(e) = self.try_append(turns) {
            tracing::warn!("failed to append to transcript {}: {e}", self.path.display());
        }
    }

    fn try_append(&self, turns: &[ConversationTurn]) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        for turn in turns {
            writeln!(file, "{}: {}", turn.role, turn.content)?;
        }
        Ok(())
    }
}

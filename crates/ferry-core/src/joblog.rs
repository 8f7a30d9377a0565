use crate::events::now_timestamp;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

const LOG_FILE_NAME: &str = "ferry-log.txt";

/// Append-only human-readable log alongside the mirrors. One timestamped
/// line per lifecycle/debug/error entry. Write failures degrade to a
/// tracing warning; they never fail the job.
#[derive(Clone)]
pub struct JobLog {
    path: PathBuf,
}

impl JobLog {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(LOG_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, line: &str) {
        if let Err(err) = self.try_append(line) {
            warn!(path = %self.path.display(), error = %err, "failed to write job log");
        }
    }

    fn try_append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{} {}", now_timestamp(), line)
    }
}

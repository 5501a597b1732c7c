//! JSONL event logger.
//!
//! One line per event:
//!
//! ```text
//! {"timestamp":"2026-10-16T09:12:03.512+00:00","index":0,"id":"54c-ce6-DualSense Wireless Controller","event":"buttonDown","button":3}
//! ```
//!
//! Files are named `events_<UTC date>_<UTC time>_<seq>.jsonl` so that a plain
//! name sort is also a chronological sort.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::TelemetryConfig;
use crate::error::Result;
use crate::gamepad::GamepadEvent;

const FILE_PREFIX: &str = "events_";
const FILE_EXTENSION: &str = "jsonl";

/// One logged event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    /// RFC 3339 UTC timestamp
    pub timestamp: String,
    pub index: Option<usize>,
    pub id: String,
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button: Option<usize>,
}

impl EventRecord {
    /// Record for an event published on a gamepad's channel.
    pub fn gamepad(id: &str, index: Option<usize>, event: &GamepadEvent) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            index,
            id: id.to_string(),
            event: event.name().to_string(),
            button: event.button(),
        }
    }

    /// Record for a newly attached gamepad.
    pub fn connected(id: &str, index: Option<usize>) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            index,
            id: id.to_string(),
            event: "gamepadConnected".to_string(),
            button: None,
        }
    }
}

/// Appends [`EventRecord`]s to rotating JSONL files.
#[derive(Debug)]
pub struct EventLogger {
    log_dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    writer: Option<BufWriter<File>>,
    current_file: Option<PathBuf>,
    records_in_file: usize,
    file_seq: u64,
}

impl EventLogger {
    /// Creates the log directory if needed. The first file is opened lazily.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the directory cannot be created.
    pub fn new(config: &TelemetryConfig) -> Result<Self> {
        let log_dir = PathBuf::from(&config.log_dir);
        fs::create_dir_all(&log_dir)?;
        debug!("Event log directory: {}", log_dir.display());

        Ok(Self {
            log_dir,
            max_records_per_file: config.max_records_per_file.max(1),
            max_files_to_keep: config.max_files_to_keep.max(1),
            writer: None,
            current_file: None,
            records_in_file: 0,
            file_seq: 0,
        })
    }

    /// Appends one record, rotating first if the current file is full.
    ///
    /// # Errors
    ///
    /// Returns `Io` or `Serialization` errors; the logger stays usable.
    pub fn log(&mut self, record: &EventRecord) -> Result<()> {
        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        let line = serde_json::to_string(record)?;
        if let Some(writer) = self.writer.as_mut() {
            writeln!(writer, "{}", line)?;
            writer.flush()?;
        }
        self.records_in_file += 1;
        Ok(())
    }

    /// File currently being written.
    pub fn current_file(&self) -> Option<&Path> {
        self.current_file.as_deref()
    }

    /// Log files in the directory, oldest first.
    pub fn log_files(&self) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.log_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| is_log_file(path))
            .collect();
        files.sort();
        Ok(files)
    }

    fn rotate(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }

        let name = format!(
            "{}{}_{:04}.{}",
            FILE_PREFIX,
            Utc::now().format("%Y%m%d_%H%M%S"),
            self.file_seq,
            FILE_EXTENSION
        );
        self.file_seq += 1;

        let path = self.log_dir.join(name);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!("Opened event log {}", path.display());

        self.writer = Some(BufWriter::new(file));
        self.current_file = Some(path);
        self.records_in_file = 0;

        self.prune()
    }

    /// Deletes the oldest files beyond `max_files_to_keep`.
    fn prune(&self) -> Result<()> {
        let files = self.log_files()?;
        let excess = files.len().saturating_sub(self.max_files_to_keep);

        for path in files.iter().take(excess) {
            if Some(path.as_path()) == self.current_file() {
                continue;
            }
            if let Err(e) = fs::remove_file(path) {
                warn!("Failed to remove old event log {}: {}", path.display(), e);
            } else {
                debug!("Removed old event log {}", path.display());
            }
        }
        Ok(())
    }
}

fn is_log_file(path: &Path) -> bool {
    let name_matches = path
        .file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with(FILE_PREFIX));
    let extension_matches = path
        .extension()
        .is_some_and(|extension| extension == FILE_EXTENSION);
    name_matches && extension_matches
}

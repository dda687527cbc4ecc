//! Storage layer for dayplan
//!
//! All state lives under `.dayplan/` in the planner root:
//!
//! ```text
//! .dayplan/
//!   planner.json          # Snapshot of lists, labels, tasks and children
//!   planner.json.lock     # Guards read-modify-write of the snapshot
//!   activity.jsonl        # Append-only activity log
//!   activity.jsonl.lock
//!   events.jsonl          # Default file for change events
//! ```

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::lock::{self, FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::model::{Attachment, Label, Subtask, Task, TaskList, TaskTemplate};

/// Name of the data directory under the planner root
pub const DATA_DIR: &str = ".dayplan";

pub const STATE_VERSION: u32 = 1;

/// Everything the store persists in one snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlannerState {
    #[serde(default = "default_state_version")]
    pub version: u32,
    #[serde(default)]
    pub lists: Vec<TaskList>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub templates: Vec<TaskTemplate>,
}

fn default_state_version() -> u32 {
    STATE_VERSION
}

impl Default for PlannerState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            lists: Vec::new(),
            labels: Vec::new(),
            tasks: Vec::new(),
            subtasks: Vec::new(),
            attachments: Vec::new(),
            templates: Vec::new(),
        }
    }
}

/// Paths and file helpers for one planner root.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the `.dayplan/` directory
    pub fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_DIR)
    }

    pub fn planner_file(&self) -> PathBuf {
        self.data_dir().join("planner.json")
    }

    pub fn activity_file(&self) -> PathBuf {
        self.data_dir().join("activity.jsonl")
    }

    pub fn events_file(&self) -> PathBuf {
        self.data_dir().join("events.jsonl")
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Create the data directory and an empty snapshot if none exists.
    ///
    /// Returns true when a new snapshot was written.
    pub fn init(&self) -> Result<bool> {
        fs::create_dir_all(self.data_dir())?;
        let path = self.planner_file();
        let _lock = FileLock::for_data_file(&path, DEFAULT_LOCK_TIMEOUT_MS)?;
        if path.exists() {
            return Ok(false);
        }
        self.write_json(&path, &PlannerState::default())?;
        Ok(true)
    }

    // =========================================================================
    // File I/O helpers
    // =========================================================================

    /// Pretty JSON via temp file and rename
    pub fn write_json<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        lock::write_atomic(path, json.as_bytes())
    }

    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Append one record as a JSON line. Callers hold the file's lock.
    pub fn append_jsonl<T: Serialize>(&self, path: &Path, record: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string(record)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(file, "{json}")?;
        file.sync_all()?;
        Ok(())
    }

    /// Read every record of a JSONL file; a missing file reads as empty.
    pub fn read_jsonl<T: DeserializeOwned>(&self, path: &Path) -> Result<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }

    // =========================================================================
    // Planner snapshot
    // =========================================================================

    pub fn load_state(&self) -> Result<PlannerState> {
        let path = self.planner_file();
        if !path.exists() {
            return Err(Error::NotInitialized(self.root.clone()));
        }
        let _lock = FileLock::for_data_file(&path, DEFAULT_LOCK_TIMEOUT_MS)?;
        self.read_json(&path)
    }

    /// Locked read-modify-write of the snapshot.
    ///
    /// The snapshot is only written back when `f` succeeds.
    pub fn update_state<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PlannerState) -> Result<T>,
    {
        let path = self.planner_file();
        if !path.exists() {
            return Err(Error::NotInitialized(self.root.clone()));
        }
        let _lock = FileLock::for_data_file(&path, DEFAULT_LOCK_TIMEOUT_MS)?;

        let mut state: PlannerState = self.read_json(&path)?;
        let result = f(&mut state)?;
        self.write_json(&path, &state)?;
        Ok(result)
    }
}

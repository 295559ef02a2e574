//! Recently resolved addresses.
//!
//! Entries are canonical addresses, de-duplicated by exact string equality and
//! kept oldest first. Stores are bounded: appending past the limit evicts the
//! least recently appended entry.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

/// File stem under which history is persisted.
pub const HISTORY_NAMESPACE: &str = "address-history";

pub trait HistoryStore: Send + Sync {
    /// Record `address` as the most recent entry. Appending an existing
    /// address moves it to the end instead of duplicating it.
    fn append(&self, address: &str) -> Result<()>;

    fn remove(&self, address: &str) -> Result<()>;

    /// Stored addresses, oldest first.
    fn list(&self) -> Result<Vec<String>>;

    fn clear(&self) -> Result<()>;
}

fn push_bounded(entries: &mut Vec<String>, address: &str, limit: usize) {
    entries.retain(|a| a != address);
    entries.push(address.to_string());
    if entries.len() > limit {
        let excess = entries.len() - limit;
        entries.drain(..excess);
    }
}

/// In-process history, used by tests and one-shot runs.
#[derive(Debug)]
pub struct MemoryHistory {
    entries: Mutex<Vec<String>>,
    limit: usize,
}

impl MemoryHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            limit: limit.max(1),
        }
    }
}

impl HistoryStore for MemoryHistory {
    fn append(&self, address: &str) -> Result<()> {
        push_bounded(&mut self.entries.lock(), address, self.limit);
        Ok(())
    }

    fn remove(&self, address: &str) -> Result<()> {
        self.entries.lock().retain(|a| a != address);
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(self.entries.lock().clone())
    }

    fn clear(&self) -> Result<()> {
        self.entries.lock().clear();
        Ok(())
    }
}

/// History persisted as a JSON array of strings.
#[derive(Debug)]
pub struct FileHistory {
    path: PathBuf,
    limit: usize,
    // Serializes read-modify-write cycles on the file.
    lock: Mutex<()>,
}

impl FileHistory {
    pub fn new(path: impl Into<PathBuf>, limit: usize) -> Self {
        Self {
            path: path.into(),
            limit: limit.max(1),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read history file: {}", self.path.display()))?;

        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse history file: {}", self.path.display()))
    }

    fn write(&self, entries: &[String]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create history directory: {}", parent.display())
            })?;
        }

        let json = serde_json::to_string_pretty(entries).context("Failed to serialize history")?;

        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write history file: {}", self.path.display()))
    }
}

impl HistoryStore for FileHistory {
    fn append(&self, address: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let mut entries = self.read()?;
        if entries.last().map(String::as_str) == Some(address) {
            return Ok(());
        }
        push_bounded(&mut entries, address, self.limit);
        debug!("Recorded '{}' in search history", address);
        self.write(&entries)
    }

    fn remove(&self, address: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let mut entries = self.read()?;
        let before = entries.len();
        entries.retain(|a| a != address);
        if entries.len() == before {
            return Ok(());
        }
        self.write(&entries)
    }

    fn list(&self) -> Result<Vec<String>> {
        let _guard = self.lock.lock();
        self.read()
    }

    fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock();
        self.write(&[])
    }
}

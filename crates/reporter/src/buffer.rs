//! Unsent kill reports, persisted as JSON between runs.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use killtrack_protocol::BufferedKill;
use tracing::debug;

use crate::error::ReportError;

/// Default number of unsent kills kept.
pub const DEFAULT_BUFFER_CAPACITY: usize = 500;

/// Bounded FIFO of kills waiting for delivery. When full, the oldest entry
/// is dropped.
#[derive(Debug)]
pub struct KillBuffer {
    path: Option<PathBuf>,
    entries: VecDeque<BufferedKill>,
    capacity: usize,
}

impl KillBuffer {
    /// An empty buffer persisted to `path`, or kept in memory when `None`.
    pub fn new(path: Option<PathBuf>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            path,
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    /// Loads a buffer from `path`. A missing file is an empty buffer; a file
    /// holding more than `capacity` entries keeps the newest.
    pub fn load(path: PathBuf, capacity: usize) -> Result<Self, ReportError> {
        let entries: Vec<BufferedKill> = if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            if data.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&data)?
            }
        } else {
            Vec::new()
        };
        debug!("loaded {} unsent kill(s) from {:?}", entries.len(), path);

        let mut buffer = Self::new(Some(path), capacity);
        for entry in entries {
            buffer.push(entry);
        }
        Ok(buffer)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Appends a kill, returning the entry evicted to make room.
    pub fn push(&mut self, kill: BufferedKill) -> Option<BufferedKill> {
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(kill);
        evicted
    }

    /// Oldest unsent kill.
    pub fn front(&self) -> Option<&BufferedKill> {
        self.entries.front()
    }

    pub fn pop_front(&mut self) -> Option<BufferedKill> {
        self.entries.pop_front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BufferedKill> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Writes the buffer to disk. No-op for in-memory buffers.
    pub fn persist(&self) -> Result<(), ReportError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&self.entries)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        debug!("persisted {} unsent kill(s) to {:?}", self.entries.len(), path);
        Ok(())
    }
}

//! Processed-set tracking for idempotent reruns

use fs2::FileExt;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{EnrichError, Result};

/// Identifiers whose enrichment has been written.
///
/// `mark` must only be called after the store confirmed the write.
pub trait ProcessedSet {
    fn contains(&self, id: &str) -> bool;

    fn mark(&mut self, id: &str) -> Result<()>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProcessedSet for HashSet<String> {
    fn contains(&self, id: &str) -> bool {
        HashSet::contains(self, id)
    }

    fn mark(&mut self, id: &str) -> Result<()> {
        self.insert(id.to_string());
        Ok(())
    }

    fn len(&self) -> usize {
        HashSet::len(self)
    }
}

/// Append-only log file, one identifier per line.
///
/// The file stays exclusively locked while open, so two runs cannot append
/// to the same log at once.
pub struct ProcessedLog {
    path: PathBuf,
    file: File,
    ids: HashSet<String>,
}

impl ProcessedLog {
    /// Open (or create) the log and read every identifier already in it.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        file.try_lock_exclusive().map_err(|_| {
            EnrichError::Config(format!(
                "processed log {} is locked by another run",
                path.display()
            ))
        })?;

        let mut content = String::new();
        file.read_to_string(&mut content)?;

        // A crash mid-append can leave a partial last line; start the next id on a fresh one
        if !content.is_empty() && !content.ends_with('\n') {
            file.write_all(b"\n")?;
            file.flush()?;
        }

        let ids = parse_ids(&content);

        debug!("Loaded {} processed ids from {}", ids.len(), path.display());

        Ok(Self {
            path: path.to_path_buf(),
            file,
            ids,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the identifiers in a log without locking it. A missing file is empty.
    pub fn read_ids(path: &Path) -> Result<HashSet<String>> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(parse_ids(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashSet::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether an id can be stored on a single log line
    pub fn is_trackable(id: &str) -> bool {
        !id.trim().is_empty() && !id.contains(&['\n', '\r'][..]) && id.trim() == id
    }
}

fn parse_ids(content: &str) -> HashSet<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

impl ProcessedSet for ProcessedLog {
    fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    fn mark(&mut self, id: &str) -> Result<()> {
        if !Self::is_trackable(id) {
            return Err(EnrichError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("id {:?} cannot be written to the processed log", id),
            )));
        }
        if self.ids.contains(id) {
            return Ok(());
        }

        writeln!(self.file, "{}", id)?;
        self.file.flush()?;
        self.file.sync_data()?;
        self.ids.insert(id.to_string());
        Ok(())
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

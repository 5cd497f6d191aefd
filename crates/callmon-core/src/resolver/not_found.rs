//! Persisted set of numbers the reverse lookup has no name for
//!
//! Entries are only ever added during a run. The file is a newline separated
//! list, read at startup and rewritten in full whenever the set grew.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::error::Result;

#[derive(Debug)]
pub struct NotFoundStore {
    path: Option<PathBuf>,
    inner: Mutex<NotFoundSet>,
}

#[derive(Debug, Default)]
struct NotFoundSet {
    ordered: Vec<String>,
    index: HashSet<String>,
    /// Number of entries the file holds after the last successful write
    persisted: usize,
}

impl NotFoundSet {
    fn from_lines(text: &str) -> Self {
        let mut set = Self::default();
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            set.insert(line);
        }
        set.persisted = set.ordered.len();
        set
    }

    fn insert(&mut self, number: &str) -> bool {
        if self.index.contains(number) {
            return false;
        }
        self.index.insert(number.to_string());
        self.ordered.push(number.to_string());
        true
    }
}

impl NotFoundStore {
    /// A store that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            inner: Mutex::new(NotFoundSet::default()),
        }
    }

    /// Read the list from `path`, creating an empty file when it is missing.
    ///
    /// A file that cannot be created is logged; the run continues on the
    /// in-memory set and later [`persist`](Self::persist) calls try again.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let set = match tokio::fs::read_to_string(&path).await {
            Ok(text) => NotFoundSet::from_lines(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("{} not found, starting with an empty list", path.display());
                if let Err(e) = tokio::fs::write(&path, "").await {
                    error!("Cannot create {}: {}", path.display(), e);
                }
                NotFoundSet::default()
            }
            Err(e) => return Err(e.into()),
        };
        debug!("Loaded {} unresolvable numbers from {}", set.ordered.len(), path.display());
        Ok(Self {
            path: Some(path),
            inner: Mutex::new(set),
        })
    }

    pub async fn contains(&self, number: &str) -> bool {
        self.inner.lock().await.index.contains(number)
    }

    /// Add a number; returns `false` when it was already listed
    pub async fn insert(&self, number: &str) -> bool {
        self.inner.lock().await.insert(number)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.ordered.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// All entries in insertion order
    pub async fn snapshot(&self) -> Vec<String> {
        self.inner.lock().await.ordered.clone()
    }

    /// Rewrite the file if the set grew since the last write.
    ///
    /// Write failures are logged; the in-memory set stays authoritative for
    /// the rest of the run. Returns whether the file was written.
    pub async fn persist(&self) -> bool {
        let Some(path) = &self.path else {
            return false;
        };
        // The lock is held across the write so concurrent callers cannot
        // interleave partial files.
        let mut set = self.inner.lock().await;
        if set.ordered.len() <= set.persisted {
            return false;
        }
        match tokio::fs::write(path, set.ordered.join("\n")).await {
            Ok(()) => {
                debug!(
                    "Saved {} unresolvable numbers to {}",
                    set.ordered.len(),
                    path.display()
                );
                set.persisted = set.ordered.len();
                true
            }
            Err(e) => {
                error!("Cannot write {}: {}", path.display(), e);
                false
            }
        }
    }
}

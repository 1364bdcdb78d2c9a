//! Persistence adapter for tree snapshots
//!
//! A store owns one durable slot holding the serialized tree. Loading is
//! infallible from the caller's point of view: a missing or corrupt slot
//! yields an empty tree (and a log line), never an error in the UI path.
//! Saving is best-effort; the in-memory snapshot stays authoritative.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::models::Tree;

/// Errors from the persistence boundary. Callers log these; they are never
/// surfaced as a failed user intent.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Durable slot for one tree snapshot.
pub trait TreeStore: Send + Sync {
    /// Loads the stored snapshot, or an empty tree when the slot is missing
    /// or its contents cannot be deserialized.
    fn load(&self) -> Tree;

    /// Writes the snapshot to the slot.
    fn save(&self, tree: &Tree) -> Result<(), StoreError>;
}

/// JSON-file-backed store.
///
/// The slot is a single JSON file holding the ordered list of root tasks.
/// Writes go through a sibling temp file and a rename so an interrupted
/// write never truncates the previous snapshot.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Gets the slot path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TreeStore for JsonFileStore {
    fn load(&self) -> Tree {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Tree::new(),
            Err(e) => {
                tracing::warn!("could not read {}: {e}; starting empty", self.path.display());
                return Tree::new();
            }
        };

        let tree: Tree = match serde_json::from_str(&raw) {
            Ok(tree) => tree,
            Err(e) => {
                tracing::warn!(
                    "could not parse {}: {e}; starting empty",
                    self.path.display()
                );
                return Tree::new();
            }
        };

        // Duplicate ids would make every id-based lookup ambiguous, so a
        // tampered slot is treated the same as an unparseable one.
        if let Err(e) = tree.verify() {
            tracing::warn!("integrity check failed for {}: {e}; starting empty", self.path.display());
            return Tree::new();
        }

        tree
    }

    fn save(&self, tree: &Tree) -> Result<(), StoreError> {
        let serialized = serde_json::to_string_pretty(tree)?;

        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(serialized.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-memory store used by tests and by `serve --ephemeral`.
#[derive(Default)]
pub struct MemoryStore {
    slot: Mutex<Option<Tree>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TreeStore for MemoryStore {
    fn load(&self) -> Tree {
        let slot = match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.clone().unwrap_or_default()
    }

    fn save(&self, tree: &Tree) -> Result<(), StoreError> {
        let mut slot = match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(tree.clone());
        Ok(())
    }
}

//! Ancestor chain resolution
//!
//! Turns a directory into the ordered list of its ancestors, root first and
//! the directory itself last, each paired with whatever the store holds for
//! exactly that path.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::store::{ConfigStore, VariableSet};

/// One level of an ancestor chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainEntry {
    /// Store key for this directory
    pub path: String,

    /// Variables stored for exactly this directory (None when absent)
    pub vars: Option<VariableSet>,
}

/// Root-to-target ordered ancestor chain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AncestorChain {
    entries: Vec<ChainEntry>,
}

impl AncestorChain {
    /// Build a chain from entries already in root-to-target order
    pub fn from_entries(entries: Vec<ChainEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ChainEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChainEntry> {
        self.entries.iter()
    }

    /// Entries that have a stored set, in chain order
    pub fn present(&self) -> impl Iterator<Item = (&str, &VariableSet)> {
        self.entries
            .iter()
            .filter_map(|e| e.vars.as_ref().map(|vars| (e.path.as_str(), vars)))
    }

    /// The deepest entry (the directory the chain was resolved for)
    pub fn target(&self) -> Option<&ChainEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Make `path` absolute against `cwd` and lexically drop `.` and `..`.
///
/// `..` never climbs above the root. Symlinks are left alone.
pub fn absolutize(path: &Path, cwd: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                normalized.push(component.as_os_str());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
        }
    }
    normalized
}

/// Ancestors of `path` from the root down to `path` itself
pub fn ancestors(path: &Path) -> Vec<PathBuf> {
    let mut levels = Vec::new();
    let mut current = Some(path);

    while let Some(dir) = current {
        if !dir.as_os_str().is_empty() {
            levels.push(dir.to_path_buf());
        }
        current = dir.parent();
    }

    levels.reverse();
    levels
}

/// Store key for a directory
pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Resolve the ancestor chain of `dir` against the store
pub fn chain(store: &ConfigStore, dir: &Path) -> AncestorChain {
    let entries: Vec<ChainEntry> = ancestors(dir)
        .iter()
        .map(|level| {
            let path = path_key(level);
            let vars = store.get_set(&path).cloned();
            ChainEntry { path, vars }
        })
        .collect();

    debug!(
        dir = %dir.display(),
        levels = entries.len(),
        present = entries.iter().filter(|e| e.vars.is_some()).count(),
        "resolved ancestor chain"
    );

    AncestorChain { entries }
}

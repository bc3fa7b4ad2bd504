//! Persisted variable store
//!
//! The store is a single JSON document mapping absolute directory paths to
//! the variables set directly on that directory:
//!
//! ```json
//! { "/home/u/proj": { "DATABASE_URL": "postgres://localhost/dev" } }
//! ```
//!
//! The default location is `~/.config/envshell/conf.json`. Writes go to a
//! uniquely named temp file in the same directory which is then renamed over
//! the document, so a failed or concurrent write never leaves a truncated
//! document behind.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::Builder;
use tracing::{debug, warn};

/// Variables set directly on one directory (name -> value)
pub type VariableSet = BTreeMap<String, String>;

/// Environment variable that overrides the store location
pub const CONFIG_ENV_VAR: &str = "ENVSHELL_CONFIG";

/// Directory name under the user config dir
pub const CONFIG_DIR_NAME: &str = "envshell";

/// File name of the store document
pub const CONFIG_FILE_NAME: &str = "conf.json";

/// Errors that can occur when loading or writing the store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Cannot determine config directory: {0}")]
    NoConfigDir(String),

    #[error("Error reading from {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("Error writing to {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },
}

impl StoreError {
    fn unreadable(path: &Path, reason: impl ToString) -> Self {
        StoreError::Unreadable {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    fn write_failed(path: &Path, reason: impl ToString) -> Self {
        StoreError::WriteFailed {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// In-memory copy of the store document, bound to the file it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigStore {
    path: PathBuf,
    sets: BTreeMap<String, VariableSet>,
    created: Vec<PathBuf>,
}

impl ConfigStore {
    /// Create an empty store bound to `path` without touching the filesystem
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sets: BTreeMap::new(),
            created: Vec::new(),
        }
    }

    /// Get the default store path
    ///
    /// `$ENVSHELL_CONFIG` wins, then `$XDG_CONFIG_HOME/envshell/conf.json`,
    /// then `~/.config/envshell/conf.json`.
    pub fn default_path() -> Result<PathBuf, StoreError> {
        if let Some(path) = non_empty_var(CONFIG_ENV_VAR) {
            return Ok(PathBuf::from(path));
        }
        Ok(Self::user_config_dir()?
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME))
    }

    #[cfg(not(windows))]
    fn user_config_dir() -> Result<PathBuf, StoreError> {
        if let Some(xdg) = non_empty_var("XDG_CONFIG_HOME") {
            return Ok(PathBuf::from(xdg));
        }
        let home = non_empty_var("HOME")
            .ok_or_else(|| StoreError::NoConfigDir("HOME environment variable not set".into()))?;
        Ok(PathBuf::from(home).join(".config"))
    }

    #[cfg(windows)]
    fn user_config_dir() -> Result<PathBuf, StoreError> {
        non_empty_var("APPDATA")
            .map(PathBuf::from)
            .ok_or_else(|| StoreError::NoConfigDir("APPDATA environment variable not set".into()))
    }

    /// Load the store from `path`, creating an empty document first if the
    /// file does not exist yet
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let created = Self::ensure_exists(path)?;

        let content = fs::read_to_string(path).map_err(|e| StoreError::unreadable(path, e))?;
        let mut sets = Self::parse(&content).map_err(|e| StoreError::unreadable(path, e))?;
        drop_unexportable_names(&mut sets);

        debug!(path = %path.display(), entries = sets.len(), "loaded store");

        Ok(Self {
            path: path.to_path_buf(),
            sets,
            created,
        })
    }

    /// Create the parent directory and an empty `{}` document as needed.
    /// Returns the paths that were created.
    fn ensure_exists(path: &Path) -> Result<Vec<PathBuf>, StoreError> {
        let mut created = Vec::new();

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            if dir.exists() && !dir.is_dir() {
                return Err(StoreError::unreadable(dir, "not a directory"));
            }
            if !dir.exists() {
                fs::create_dir_all(dir).map_err(|e| StoreError::unreadable(dir, e))?;
                created.push(dir.to_path_buf());
            }
        }

        if !path.exists() {
            fs::write(path, "{}").map_err(|e| StoreError::unreadable(path, e))?;
            created.push(path.to_path_buf());
        }

        Ok(created)
    }

    /// Parse a store document
    pub fn parse(content: &str) -> Result<BTreeMap<String, VariableSet>, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Serialize the whole store document
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.sets)
    }

    /// Write the whole store atomically (write-then-rename)
    pub fn persist(&self) -> Result<(), StoreError> {
        let json = self
            .to_json()
            .map_err(|e| StoreError::write_failed(&self.path, e))?;

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| StoreError::write_failed(&self.path, e))?;
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| CONFIG_FILE_NAME.to_string());

        // Unique per writer, so concurrent invocations never share a temp file
        let mut temp = Builder::new()
            .prefix(&format!(".{}.", file_name))
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| StoreError::write_failed(&self.path, e))?;

        temp.write_all(json.as_bytes())
            .and_then(|()| temp.as_file().sync_all())
            .map_err(|e| StoreError::write_failed(&self.path, e))?;

        // On failure the temp file is dropped and removed
        temp.persist(&self.path)
            .map_err(|e| StoreError::write_failed(&self.path, e.error))?;

        debug!(path = %self.path.display(), entries = self.sets.len(), "persisted store");
        Ok(())
    }

    /// File this store is read from and written to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Paths created while loading (config directory and/or empty document)
    pub fn created(&self) -> &[PathBuf] {
        &self.created
    }

    /// Get the variables stored for exactly `path`
    pub fn get_set(&self, path: &str) -> Option<&VariableSet> {
        self.sets.get(path)
    }

    /// Replace (or insert) the variables stored for exactly `path`
    pub fn put_set(&mut self, path: impl Into<String>, set: VariableSet) {
        self.sets.insert(path.into(), set);
    }

    /// Drop the entry for `path`, making it absent again
    pub fn remove_set(&mut self, path: &str) -> Option<VariableSet> {
        self.sets.remove(path)
    }

    /// All stored paths, sorted
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }

    /// Number of stored paths
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Whether no path has a stored set
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Whether `name` can be exported into a process environment
pub fn is_exportable_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('=') && !name.contains('\0')
}

/// Hand-edited documents may hold names no process environment accepts
fn drop_unexportable_names(sets: &mut BTreeMap<String, VariableSet>) {
    for (path, vars) in sets.iter_mut() {
        vars.retain(|name, _| {
            let keep = is_exportable_name(name);
            if !keep {
                warn!(path = %path, name = %name, "ignoring stored variable with invalid name");
            }
            keep
        });
    }
}

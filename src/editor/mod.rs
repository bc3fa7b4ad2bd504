//! Variable editing
//!
//! `set` and `clear` touch only the set stored for exactly the target
//! directory, never an ancestor's. Each edit is followed by one full persist
//! of the store; if the persist fails the in-memory edit is rolled back.

use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::resolve::path_key;
use crate::store::{is_exportable_name, ConfigStore, StoreError, VariableSet};

/// Value argument meaning "read the value from stdin"
pub const STDIN_SENTINEL: &str = "-";

/// Errors from editing commands
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("Variable name must not be empty")]
    EmptyName,

    #[error("Invalid variable name '{0}': must not contain '=' or NUL")]
    InvalidName(String),

    #[error("The variable {name} is not set in {path}")]
    NotSet { name: String, path: String },

    #[error("Failed to read value from stdin: {0}")]
    ReadInput(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a successful `set`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetOutcome {
    pub path: String,
    pub name: String,
    pub value: String,
    /// Value that was replaced, if the variable was already set here
    pub previous: Option<String>,
}

/// Result of a successful `clear`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearOutcome {
    pub path: String,
    pub name: String,
    pub previous: String,
    /// Whether the directory's entry was dropped because it became empty
    pub removed_entry: bool,
}

/// Check that `name` can be exported as an environment variable
pub fn validate_name(name: &str) -> Result<(), EditError> {
    if name.is_empty() {
        return Err(EditError::EmptyName);
    }
    if !is_exportable_name(name) {
        return Err(EditError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Resolve the value argument, reading `reader` to end-of-stream when the
/// argument is the stdin sentinel. One trailing newline is stripped.
pub fn read_value(arg: &str, mut reader: impl Read) -> Result<String, EditError> {
    if arg != STDIN_SENTINEL {
        return Ok(arg.to_string());
    }

    let mut value = String::new();
    reader.read_to_string(&mut value)?;
    if value.ends_with('\n') {
        value.pop();
        if value.ends_with('\r') {
            value.pop();
        }
    }
    debug!(bytes = value.len(), "read value from stdin");
    Ok(value)
}

/// Set `name` to `value` on exactly `dir`, then persist the store
pub fn set(
    store: &mut ConfigStore,
    dir: &Path,
    name: &str,
    value: &str,
) -> Result<SetOutcome, EditError> {
    validate_name(name)?;

    let key = path_key(dir);
    let before = store.get_set(&key).cloned();

    let mut vars = before.clone().unwrap_or_default();
    let previous = vars.insert(name.to_string(), value.to_string());
    store.put_set(key.clone(), vars);

    persist_or_restore(store, &key, before)?;

    debug!(path = %key, name, "set variable");
    Ok(SetOutcome {
        path: key,
        name: name.to_string(),
        value: value.to_string(),
        previous,
    })
}

/// Remove `name` from exactly `dir`, then persist the store.
///
/// A set left empty is dropped so the directory reads as absent again.
pub fn clear(store: &mut ConfigStore, dir: &Path, name: &str) -> Result<ClearOutcome, EditError> {
    let key = path_key(dir);
    let not_set = || EditError::NotSet {
        name: name.to_string(),
        path: key.clone(),
    };

    let before = store.get_set(&key).cloned().ok_or_else(not_set)?;
    if !before.contains_key(name) {
        return Err(not_set());
    }

    let mut vars = before.clone();
    let previous = vars.remove(name).unwrap_or_default();
    let removed_entry = vars.is_empty();
    if removed_entry {
        store.remove_set(&key);
    } else {
        store.put_set(key.clone(), vars);
    }

    persist_or_restore(store, &key, Some(before))?;

    debug!(path = %key, name, removed_entry, "cleared variable");
    Ok(ClearOutcome {
        path: key,
        name: name.to_string(),
        previous,
        removed_entry,
    })
}

fn persist_or_restore(
    store: &mut ConfigStore,
    key: &str,
    before: Option<VariableSet>,
) -> Result<(), EditError> {
    if let Err(e) = store.persist() {
        match before {
            Some(vars) => store.put_set(key, vars),
            None => {
                store.remove_set(key);
            }
        }
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn vars(pairs: &[(&str, &str)]) -> VariableSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn temp_store() -> (TempDir, ConfigStore) {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::load(&dir.path().join("conf.json")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_set_into_absent_entry() {
        let (_tmp, mut store) = temp_store();

        let outcome = set(&mut store, Path::new("/x"), "FOO", "bar").unwrap();

        assert_eq!(outcome.previous, None);
        assert_eq!(store.get_set("/x"), Some(&vars(&[("FOO", "bar")])));
    }

    #[test]
    fn test_set_overwrites_and_reports_previous() {
        let (_tmp, mut store) = temp_store();
        set(&mut store, Path::new("/x"), "FOO", "bar").unwrap();

        let outcome = set(&mut store, Path::new("/x"), "FOO", "baz").unwrap();

        assert_eq!(outcome.previous.as_deref(), Some("bar"));
        assert_eq!(store.get_set("/x"), Some(&vars(&[("FOO", "baz")])));
    }

    #[test]
    fn test_set_persists_whole_store() {
        let (_tmp, mut store) = temp_store();
        store.put_set("/other", vars(&[("A", "1")]));

        set(&mut store, Path::new("/x"), "FOO", "bar").unwrap();

        let reloaded = ConfigStore::load(store.path()).unwrap();
        assert_eq!(reloaded.get_set("/x"), Some(&vars(&[("FOO", "bar")])));
        assert_eq!(reloaded.get_set("/other"), Some(&vars(&[("A", "1")])));
    }

    #[test]
    fn test_set_does_not_touch_ancestors() {
        let (_tmp, mut store) = temp_store();
        store.put_set("/home/u", vars(&[("A", "1")]));

        set(&mut store, Path::new("/home/u/proj"), "A", "2").unwrap();

        assert_eq!(store.get_set("/home/u"), Some(&vars(&[("A", "1")])));
        assert_eq!(store.get_set("/home"), None);
        assert_eq!(store.get_set("/"), None);
    }

    #[test]
    fn test_set_rejects_bad_names() {
        let (_tmp, mut store) = temp_store();

        assert!(matches!(
            set(&mut store, Path::new("/x"), "", "v"),
            Err(EditError::EmptyName)
        ));
        assert!(matches!(
            set(&mut store, Path::new("/x"), "A=B", "v"),
            Err(EditError::InvalidName(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_keeps_empty_and_multiline_values() {
        let (_tmp, mut store) = temp_store();

        set(&mut store, Path::new("/x"), "EMPTY", "").unwrap();
        set(&mut store, Path::new("/x"), "CERT", "line1\nline2").unwrap();

        let reloaded = ConfigStore::load(store.path()).unwrap();
        assert_eq!(
            reloaded.get_set("/x"),
            Some(&vars(&[("CERT", "line1\nline2"), ("EMPTY", "")]))
        );
    }

    #[test]
    fn test_set_then_clear_restores_absent() {
        let (_tmp, mut store) = temp_store();
        let before = store.clone();

        set(&mut store, Path::new("/x"), "FOO", "bar").unwrap();
        let outcome = clear(&mut store, Path::new("/x"), "FOO").unwrap();

        assert!(outcome.removed_entry);
        assert_eq!(outcome.previous, "bar");
        assert_eq!(store.get_set("/x"), before.get_set("/x"));
    }

    #[test]
    fn test_set_then_clear_restores_existing_set() {
        let (_tmp, mut store) = temp_store();
        store.put_set("/x", vars(&[("A", "1")]));

        set(&mut store, Path::new("/x"), "FOO", "bar").unwrap();
        let outcome = clear(&mut store, Path::new("/x"), "FOO").unwrap();

        assert!(!outcome.removed_entry);
        assert_eq!(store.get_set("/x"), Some(&vars(&[("A", "1")])));
    }

    #[test]
    fn test_clear_missing_name_leaves_store_unchanged() {
        let (_tmp, mut store) = temp_store();
        store.put_set("/x", vars(&[("A", "1")]));
        store.persist().unwrap();
        let on_disk = fs::read_to_string(store.path()).unwrap();
        let before = store.clone();

        let err = clear(&mut store, Path::new("/x"), "B").unwrap_err();

        assert!(matches!(err, EditError::NotSet { .. }));
        assert_eq!(store, before);
        assert_eq!(fs::read_to_string(store.path()).unwrap(), on_disk);
    }

    #[test]
    fn test_clear_absent_path_is_not_set() {
        let (_tmp, mut store) = temp_store();
        let before = store.clone();

        let err = clear(&mut store, Path::new("/nowhere"), "A").unwrap_err();

        assert!(matches!(err, EditError::NotSet { ref name, .. } if name == "A"));
        assert_eq!(store, before);
    }

    #[test]
    fn test_clear_does_not_reach_ancestors() {
        let (_tmp, mut store) = temp_store();
        store.put_set("/home/u", vars(&[("A", "1")]));

        let err = clear(&mut store, Path::new("/home/u/proj"), "A").unwrap_err();

        assert!(matches!(err, EditError::NotSet { .. }));
        assert_eq!(store.get_set("/home/u"), Some(&vars(&[("A", "1")])));
    }

    #[test]
    fn test_failed_persist_rolls_back() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("conf.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "").unwrap();
        let mut store = ConfigStore::new(&path);

        let err = set(&mut store, Path::new("/x"), "FOO", "bar").unwrap_err();

        assert!(matches!(err, EditError::Store(StoreError::WriteFailed { .. })));
        assert_eq!(store.get_set("/x"), None);
    }

    #[test]
    fn test_read_value_plain_argument() {
        let value = read_value("bar", std::io::empty()).unwrap();
        assert_eq!(value, "bar");
    }

    #[test]
    fn test_read_value_from_stdin() {
        let input = b"line1\nline2\n".as_slice();
        assert_eq!(read_value("-", input).unwrap(), "line1\nline2");
    }

    #[test]
    fn test_read_value_strips_one_crlf() {
        let input = b"value\r\n\r\n".as_slice();
        assert_eq!(read_value("-", input).unwrap(), "value\r\n");
    }

    #[test]
    fn test_read_value_empty_stdin() {
        assert_eq!(read_value("-", std::io::empty()).unwrap(), "");
    }
}

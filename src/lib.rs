//! envshell - directory-scoped environment variables
//!
//! Variables are stored per absolute directory in a single JSON document.
//! Resolving a directory walks its ancestors from the root down, and the
//! variable sets found along the way are merged so that the deepest
//! directory wins on key collision. The merged environment is exported into
//! an interactive shell.

pub mod editor;
pub mod error;
pub mod merge;
pub mod present;
pub mod resolve;
pub mod shell;
pub mod store;

pub use editor::{ClearOutcome, EditError, SetOutcome};
pub use error::EnvshellError;
pub use merge::{merge, EffectiveEnvironment};
pub use resolve::{chain, AncestorChain, ChainEntry};
pub use shell::{ShellError, ShellLaunch};
pub use store::{ConfigStore, StoreError, VariableSet};

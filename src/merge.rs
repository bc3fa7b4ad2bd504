//! Environment merge logic
//!
//! Folds an ancestor chain into one effective environment:
//! - Levels are applied root first, so the deepest directory wins
//! - Non-colliding keys accumulate
//! - Absent levels contribute nothing

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::resolve::AncestorChain;
use crate::store::VariableSet;

/// Merged variables plus the directory each winning value came from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EffectiveEnvironment {
    vars: VariableSet,
    origins: BTreeMap<String, String>,
}

impl EffectiveEnvironment {
    /// Merged variables
    pub fn vars(&self) -> &VariableSet {
        &self.vars
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Directory whose value for `name` won the merge
    pub fn origin(&self, name: &str) -> Option<&str> {
        self.origins.get(name).map(String::as_str)
    }

    /// `(name, value, origin)` in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.vars.iter().map(|(name, value)| {
            let origin = self.origins.get(name).map(String::as_str).unwrap_or("");
            (name.as_str(), value.as_str(), origin)
        })
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn into_vars(self) -> VariableSet {
        self.vars
    }
}

/// Overlay one variable set onto another; overlay values win
pub fn overlay(mut base: VariableSet, overlay: &VariableSet) -> VariableSet {
    for (name, value) in overlay {
        base.insert(name.clone(), value.clone());
    }
    base
}

/// Merge an ancestor chain into the effective environment
pub fn merge(chain: &AncestorChain) -> EffectiveEnvironment {
    let env = chain
        .present()
        .fold(EffectiveEnvironment::default(), |env, (path, vars)| {
            let mut origins = env.origins;
            for name in vars.keys() {
                origins.insert(name.clone(), path.to_string());
            }
            EffectiveEnvironment {
                vars: overlay(env.vars, vars),
                origins,
            }
        });

    debug!(variables = env.len(), "merged environment");
    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::ChainEntry;

    fn vars(pairs: &[(&str, &str)]) -> VariableSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn entry(path: &str, set: Option<VariableSet>) -> ChainEntry {
        ChainEntry {
            path: path.to_string(),
            vars: set,
        }
    }

    #[test]
    fn test_root_only() {
        let chain = AncestorChain::from_entries(vec![
            entry("/", Some(vars(&[("A", "1")]))),
            entry("/home", None),
            entry("/home/u", None),
        ]);

        let env = merge(&chain);
        assert_eq!(env.vars(), &vars(&[("A", "1")]));
        assert_eq!(env.origin("A"), Some("/"));
    }

    #[test]
    fn test_deepest_wins() {
        let chain = AncestorChain::from_entries(vec![
            entry("/", Some(vars(&[("A", "1")]))),
            entry("/x", Some(vars(&[("A", "2")]))),
        ]);

        let env = merge(&chain);
        assert_eq!(env.get("A"), Some("2"));
        assert_eq!(env.origin("A"), Some("/x"));
    }

    #[test]
    fn test_non_colliding_keys_accumulate() {
        let chain = AncestorChain::from_entries(vec![
            entry("/", Some(vars(&[("A", "1")]))),
            entry("/x", Some(vars(&[("B", "2")]))),
        ]);

        let env = merge(&chain);
        assert_eq!(env.vars(), &vars(&[("A", "1"), ("B", "2")]));
        assert_eq!(env.origin("A"), Some("/"));
        assert_eq!(env.origin("B"), Some("/x"));
    }

    #[test]
    fn test_absent_level_is_not_a_reset() {
        let chain = AncestorChain::from_entries(vec![
            entry("/", Some(vars(&[("A", "1")]))),
            entry("/x", None),
            entry("/x/y", Some(VariableSet::new())),
        ]);

        let env = merge(&chain);
        assert_eq!(env.vars(), &vars(&[("A", "1")]));
    }

    #[test]
    fn test_empty_value_overrides() {
        let chain = AncestorChain::from_entries(vec![
            entry("/", Some(vars(&[("A", "1")]))),
            entry("/x", Some(vars(&[("A", "")]))),
        ]);

        assert_eq!(merge(&chain).get("A"), Some(""));
    }

    #[test]
    fn test_merge_is_deterministic() {
        let chain = AncestorChain::from_entries(vec![
            entry("/", Some(vars(&[("A", "1"), ("B", "1")]))),
            entry("/x", Some(vars(&[("B", "2"), ("C", "2")]))),
            entry("/x/y", Some(vars(&[("C", "3")]))),
        ]);

        let first = merge(&chain);
        let second = merge(&chain);
        assert_eq!(first, second);
        assert_eq!(first.vars(), &vars(&[("A", "1"), ("B", "2"), ("C", "3")]));
    }

    #[test]
    fn test_empty_chain() {
        assert!(merge(&AncestorChain::default()).is_empty());
    }

    #[test]
    fn test_overlay_wins_and_keeps_base_only_keys() {
        let base = vars(&[("A", "1"), ("B", "1")]);
        let top = vars(&[("A", "3"), ("C", "3")]);

        let merged = overlay(base, &top);
        assert_eq!(merged, vars(&[("A", "3"), ("B", "1"), ("C", "3")]));
    }

    #[test]
    fn test_iter_reports_origin() {
        let chain = AncestorChain::from_entries(vec![
            entry("/", Some(vars(&[("A", "1")]))),
            entry("/x", Some(vars(&[("B", "2")]))),
        ]);

        let env = merge(&chain);
        let rows: Vec<_> = env.iter().collect();
        assert_eq!(rows, vec![("A", "1", "/"), ("B", "2", "/x")]);
    }
}

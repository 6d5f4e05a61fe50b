//! Key Builder Module
//!
//! Deterministic, namespaced cache keys of the form
//! `<namespace>:<kind>:<scope>[:<id>]`, e.g. `paper:list:user-1` or
//! `paper:detail:user-1:p42`.
//!
//! Keys are the de facto schema shared between writers and invalidators:
//! code that populates the cache and code that invalidates after a mutation
//! must build keys through the same `KeySpace` so prefix invalidation
//! removes exactly the intended entries.

/// Separator between key segments. Segments themselves must not contain it.
pub const KEY_SEPARATOR: char = ':';

// == Key Space ==
/// Builds namespaced cache keys.
///
/// Two calls with identical arguments always produce identical strings, and
/// prefixes produced by [`KeySpace::prefix`] carry a trailing separator so
/// scope `user-1` never matches keys belonging to `user-12`.
#[derive(Debug, Clone)]
pub struct KeySpace {
    namespace: String,
}

impl KeySpace {
    /// Creates a key space for the given namespace, e.g. `"paper"`.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Returns the namespace this key space prepends to every key.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    // == Key ==
    /// Builds a scope-level key: `<namespace>:<kind>:<scope>`.
    ///
    /// Used for collection lookups, e.g. `key("list", "user-1")` →
    /// `paper:list:user-1`.
    pub fn key(&self, kind: &str, scope: &str) -> String {
        format!("{}:{}:{}", self.namespace, kind, scope)
    }

    // == Entity Key ==
    /// Builds an entity-level key: `<namespace>:<kind>:<scope>:<id>`.
    ///
    /// Used for detail lookups, e.g. `entity("detail", "user-1", "p42")` →
    /// `paper:detail:user-1:p42`.
    pub fn entity(&self, kind: &str, scope: &str, id: &str) -> String {
        format!("{}:{}:{}:{}", self.namespace, kind, scope, id)
    }

    // == Prefix ==
    /// Builds an invalidation prefix covering every entity key of a kind
    /// within a scope: `<namespace>:<kind>:<scope>:`.
    ///
    /// The trailing separator keeps sibling scopes with a shared string
    /// prefix (`user-1` vs `user-12`) from matching each other.
    pub fn prefix(&self, kind: &str, scope: &str) -> String {
        format!("{}:{}:{}:", self.namespace, kind, scope)
    }

    // == Scope Matcher ==
    /// Returns a predicate matching every key of this namespace whose scope
    /// segment equals `scope`, across all kinds.
    ///
    /// Covers both scope-level keys (`paper:list:user-1`) and entity keys
    /// (`paper:detail:user-1:p42`); used for "everything this user owns"
    /// invalidation after a mutation that does not know every derived key.
    pub fn scope_matcher(&self, scope: &str) -> impl Fn(&str) -> bool {
        let namespace = self.namespace.clone();
        let scope = scope.to_string();
        move |key: &str| {
            let mut segments = key.split(KEY_SEPARATOR);
            segments.next() == Some(namespace.as_str())
                && segments.next().is_some()
                && segments.next() == Some(scope.as_str())
        }
    }
}

//! Scopes: operation classes a `ScopedClient` may be permitted
//! to perform. Checked before every engine call, never after.

use std::collections::HashSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    Create,
    Exec,
    Remove,
}

/// An immutable (post-construction) allowlist of scopes.
#[derive(Clone, Debug)]
pub struct ScopeSet(HashSet<Scope>);

impl ScopeSet {
    pub fn new(scopes: impl IntoIterator<Item = Scope>) -> Self {
        Self(scopes.into_iter().collect())
    }

    pub fn all() -> Self {
        Self::new([Scope::Create, Scope::Exec, Scope::Remove])
    }

    pub fn contains(&self, scope: Scope) -> bool {
        self.0.contains(&scope)
    }
}

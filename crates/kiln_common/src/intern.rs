//! Interned capability names.
//!
//! Capability and requirement matching compares `(kind, value)` string pairs
//! many times per build. Both halves are interned once and compared as
//! interner keys afterwards, which also keeps the dependency index keys
//! small.

use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Serialize};

/// An interned capability atom (a `kind` or a `value` string).
///
/// A thin wrapper over the interner's key, giving O(1) equality and O(1)
/// cloning. Names are only meaningful relative to the [`NameTable`] that
/// produced them; persisted state stores the resolved strings and re-interns
/// on load.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Name(Spur);

/// Thread-safe string interner for capability atoms, backed by
/// [`lasso::ThreadedRodeo`].
///
/// One table lives for the duration of a build context; every capability
/// kind and value that flows through the engine is interned here.
pub struct NameTable {
    rodeo: ThreadedRodeo,
}

impl NameTable {
    /// Creates a new empty name table.
    pub fn new() -> Self {
        Self {
            rodeo: ThreadedRodeo::new(),
        }
    }

    /// Interns a string, returning its [`Name`]. Re-interning an already
    /// known string returns the existing name without allocating.
    pub fn intern(&self, s: &str) -> Name {
        Name(self.rodeo.get_or_intern(s))
    }

    /// Resolves a [`Name`] back to its string value.
    ///
    /// # Panics
    ///
    /// Panics if the `Name` was not created by this table.
    pub fn resolve(&self, name: Name) -> &str {
        self.rodeo.resolve(&name.0)
    }
}

impl Default for NameTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_resolve_roundtrip() {
        let table = NameTable::new();
        let name = table.intern("jdt.type");
        assert_eq!(table.resolve(name), "jdt.type");
    }

    #[test]
    fn same_string_same_name() {
        let table = NameTable::new();
        let a = table.intern("com.example.Widget");
        let b = table.intern("com.example.Widget");
        assert_eq!(a, b);
    }

    #[test]
    fn different_strings_different_names() {
        let table = NameTable::new();
        let a = table.intern("Widget");
        let b = table.intern("Gadget");
        assert_ne!(a, b);
    }
}

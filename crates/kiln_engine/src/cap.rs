//! Interned `(kind, value)` capability pairs.

use kiln_common::{Name, NameTable};

/// A named thing an artifact provides or a unit depends on.
///
/// `kind` partitions the namespace (for example `type` vs `simpleType` in a
/// Java-like compiler) and `value` is the name within it. The engine treats
/// both as opaque: the only operation is equality, which is O(1) because
/// both halves are interned.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Cap {
    /// Interned capability kind.
    pub kind: Name,
    /// Interned capability value.
    pub value: Name,
}

impl Cap {
    /// Interns a `(kind, value)` string pair into a `Cap`.
    pub fn intern(names: &NameTable, kind: &str, value: &str) -> Self {
        Self {
            kind: names.intern(kind),
            value: names.intern(value),
        }
    }

    /// Resolves the pair back to owned strings.
    pub fn resolve(&self, names: &NameTable) -> (String, String) {
        (
            names.resolve(self.kind).to_string(),
            names.resolve(self.value).to_string(),
        )
    }
}

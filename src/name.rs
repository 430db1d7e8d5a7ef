use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Interned type or member name.
///
/// Type names use the slash-separated internal form (`com/example/Foo`);
/// member names and descriptors are plain strings. Within one index-build
/// session every textually equal name shares a single allocation, so
/// equality usually resolves with a pointer comparison. Hashing stays
/// value-based so names reloaded from a persisted index compare and hash
/// identically to freshly parsed ones.
#[derive(Clone)]
pub struct Name(Arc<str>);

impl Name {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unqualified part of a slash-qualified type name.
    pub fn local(&self) -> &str {
        match self.0.rsplit_once('/') {
            Some((_, local)) => local,
            None => &self.0,
        }
    }

    #[cfg(test)]
    pub(crate) fn shares_allocation(&self, other: &Name) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.0)
    }
}

/// Session-scoped canonicalization table for [`Name`].
#[derive(Default)]
pub struct Interner {
    table: HashSet<Arc<str>>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the canonical [`Name`] for `text`, allocating it on first use.
    pub fn intern(&mut self, text: &str) -> Name {
        if let Some(existing) = self.table.get(text) {
            return Name(Arc::clone(existing));
        }
        let interned: Arc<str> = Arc::from(text);
        self.table.insert(Arc::clone(&interned));
        Name(interned)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_returns_identical_allocation_for_equal_text() {
        let mut interner = Interner::new();
        let first = interner.intern("com/example/Foo");
        let second = interner.intern("com/example/Foo");

        assert!(first.shares_allocation(&second));
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn names_from_separate_sessions_compare_by_value() {
        let mut left = Interner::new();
        let mut right = Interner::new();
        let a = left.intern("com/example/Foo");
        let b = right.intern("com/example/Foo");

        assert!(!a.shares_allocation(&b));
        assert_eq!(a, b);
    }

    #[test]
    fn local_strips_package_qualifier() {
        let mut interner = Interner::new();
        assert_eq!(interner.intern("com/example/Foo").local(), "Foo");
        assert_eq!(interner.intern("Foo").local(), "Foo");
    }
}

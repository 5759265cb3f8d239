//! Interned names. Methods, blocks, and parameter debug names all share
//! one global symbol table, so an [`Id`] is a copyable handle that
//! compares and hashes in O(1).
use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Id(symbol_table::GlobalSymbol);

impl Id {
    pub fn new<S: AsRef<str>>(name: S) -> Self {
        Id(symbol_table::GlobalSymbol::from(name.as_ref()))
    }

    /// The interned string. Symbols live for the whole process.
    pub fn as_str(&self) -> &'static str {
        self.0.as_str()
    }
}

/// The empty name; placeholder for values that never had a debug name.
impl Default for Id {
    fn default() -> Self {
        Id::new("")
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Id {
    fn from(name: &str) -> Self {
        Id::new(name)
    }
}

impl From<String> for Id {
    fn from(name: String) -> Self {
        Id::new(name)
    }
}

/// Name comparisons in tests and lookups read better against plain
/// string literals.
impl PartialEq<&str> for Id {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// A trait representing something in the IR that has a name.
pub trait GetName {
    /// Return a reference to the object's name
    fn name(&self) -> Id;
}

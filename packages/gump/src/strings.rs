//! Interned string table sent alongside a compiled layout.

use std::collections::HashMap;


/// Ordered, de-duplicated table of strings. Layout tokens reference text by
/// index into this table rather than inlining it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringTable {
    lines: Vec<String>,
    index: HashMap<String, usize>,
}

impl StringTable {
    /// A table with no strings in it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the index of `text`, appending it if not already present.
    pub fn intern(&mut self, text: &str) -> usize {
        if let Some(&idx) = self.index.get(text) {
            return idx;
        }
        let idx = self.lines.len();
        self.lines.push(text.to_owned());
        self.index.insert(text.to_owned(), idx);
        idx
    }

    /// Index of `text` if it has been interned.
    pub fn lookup(&self, text: &str) -> Option<usize> {
        self.index.get(text).copied()
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.lines.get(idx).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Iterate through strings in index order.
    pub fn iter(&self) -> impl Iterator<Item=&str> + '_ {
        self.lines.iter().map(String::as_str)
    }
}


#[test]
fn test_intern_idempotent() {
    let mut table = StringTable::new();
    let a = table.intern("Next page");
    let b = table.intern("Next page");
    assert_eq!(a, b);
    assert_eq!(table.len(), 1);
}

#[test]
fn test_intern_distinct() {
    let mut table = StringTable::new();
    let a = table.intern("Accept");
    let b = table.intern("Decline");
    let c = table.intern("Accept");
    assert_ne!(a, b);
    assert_eq!(a, c);
    assert_eq!(table.get(a), Some("Accept"));
    assert_eq!(table.get(b), Some("Decline"));
    assert_eq!(table.iter().collect::<Vec<_>>(), vec!["Accept", "Decline"]);
}

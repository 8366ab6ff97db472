//! Raw entries, ordered result sets, and match cardinality.
//!
//! A search produces an [`EntrySet`]: a mapping from distinguished name to
//! [`Entry`] that preserves cursor arrival order. Directory DNs are unique in
//! practice; a duplicate DN overwrites the earlier value as a defensive
//! invariant. [`Match`] makes the "exactly one result" idiom explicit so
//! callers can tell an ambiguous match from no match at all.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A raw directory entry as returned by a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Distinguished name of the entry.
    pub dn: String,
    /// Attribute map (value order preserved from the server).
    pub attributes: HashMap<String, Vec<String>>,
}

impl Entry {
    /// Creates an entry with no attributes.
    #[must_use]
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: HashMap::new(),
        }
    }

    /// Returns the first value of the attribute if present.
    #[must_use]
    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.attributes
            .get(attribute)
            .and_then(|values| values.first().map(|value| value.as_str()))
    }

    /// Returns all values for the attribute.
    #[must_use]
    pub fn values(&self, attribute: &str) -> Option<&[String]> {
        self.attributes
            .get(attribute)
            .map(|values| values.as_slice())
    }
}

/// Result of a lookup that expects exactly one value.
///
/// Zero and multiple matches are distinct variants; [`Match::into_option`]
/// collapses both to absent for callers that only care about the unambiguous
/// case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match<T> {
    /// Nothing matched.
    None,
    /// Exactly one value matched.
    One(T),
    /// More than one value matched.
    Many,
}

impl<T> Match<T> {
    /// Returns the value iff exactly one matched.
    #[must_use]
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::One(value) => Some(value),
            Self::None | Self::Many => None,
        }
    }

    /// Returns true for exactly one match.
    #[must_use]
    pub const fn is_one(&self) -> bool {
        matches!(self, Self::One(_))
    }

    /// Maps the matched value, preserving cardinality.
    #[must_use]
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Match<U> {
        match self {
            Self::One(value) => Match::One(f(value)),
            Self::None => Match::None,
            Self::Many => Match::Many,
        }
    }
}

/// Ordered mapping from distinguished name to [`Entry`].
///
/// Iteration follows insertion order, i.e. result-cursor arrival order. The
/// set is scoped to a single search execution and never cached across calls.
#[derive(Debug, Clone, Default)]
pub struct EntrySet {
    order: Vec<String>,
    entries: HashMap<String, Entry>,
}

impl EntrySet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry keyed by its DN, returning the previous entry for
    /// that DN if any. A duplicate keeps its original position.
    pub fn insert(&mut self, entry: Entry) -> Option<Entry> {
        let dn = entry.dn.clone();
        let previous = self.entries.insert(dn.clone(), entry);
        if previous.is_none() {
            self.order.push(dn);
        }
        previous
    }

    /// Number of entries in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if the set holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Looks up an entry by distinguished name.
    #[must_use]
    pub fn get(&self, dn: &str) -> Option<&Entry> {
        self.entries.get(dn)
    }

    /// Returns true if the DN is a key of the set.
    #[must_use]
    pub fn contains_dn(&self, dn: &str) -> bool {
        self.entries.contains_key(dn)
    }

    /// Iterates distinguished names in insertion order.
    pub fn dns(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.order.iter().filter_map(|dn| self.entries.get(dn))
    }

    /// Returns the single entry iff the set holds exactly one.
    #[must_use]
    pub fn single(&self) -> Match<&Entry> {
        match self.order.as_slice() {
            [] => Match::None,
            [dn] => self
                .entries
                .get(dn)
                .map_or(Match::None, Match::One),
            _ => Match::Many,
        }
    }

    /// Consumes the set, returning the single entry iff it holds exactly one.
    #[must_use]
    pub fn into_single(mut self) -> Match<Entry> {
        match self.order.as_slice() {
            [] => Match::None,
            [dn] => self
                .entries
                .remove(dn.as_str())
                .map_or(Match::None, Match::One),
            _ => Match::Many,
        }
    }
}

impl IntoIterator for EntrySet {
    type Item = Entry;
    type IntoIter = std::vec::IntoIter<Entry>;

    fn into_iter(mut self) -> Self::IntoIter {
        let entries: Vec<Entry> = self
            .order
            .iter()
            .filter_map(|dn| self.entries.remove(dn))
            .collect();
        entries.into_iter()
    }
}

impl FromIterator<Entry> for EntrySet {
    fn from_iter<I: IntoIterator<Item = Entry>>(iter: I) -> Self {
        let mut set = Self::new();
        for entry in iter {
            set.insert(entry);
        }
        set
    }
}

//! Sealable ordered sets of models and columns.
//!
//! Expression nodes memoize the models and columns they touch. Once a set
//! is shared it is sealed: in-place mutation fails, and the persistent
//! operations (`add`, `union`) hand back a new unsealed set instead.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{Error, Result};

use super::{ColumnId, ModelId};

/// An ordered set that can be frozen.
#[derive(Clone)]
pub struct SealedSet<T: Ord + Copy> {
    items: BTreeSet<T>,
    sealed: bool,
}

/// Models an expression touches.
pub type ModelSet = SealedSet<ModelId>;

/// Columns an expression touches.
pub type ColumnSet = SealedSet<ColumnId>;

impl<T: Ord + Copy> SealedSet<T> {
    pub fn empty() -> Self {
        Self {
            items: BTreeSet::new(),
            sealed: false,
        }
    }

    pub fn of(item: T) -> Self {
        let mut items = BTreeSet::new();
        items.insert(item);
        Self {
            items,
            sealed: false,
        }
    }

    /// Insert in place. Fails once the set is sealed.
    pub fn insert(&mut self, item: T) -> Result<bool> {
        if self.sealed {
            return Err(Error::SealedSet);
        }
        Ok(self.items.insert(item))
    }

    /// A set with `item` added. Returns `self` unchanged if already present.
    pub fn add(&self, item: T) -> Self {
        if self.items.contains(&item) {
            return self.clone();
        }
        let mut items = self.items.clone();
        items.insert(item);
        Self {
            items,
            sealed: false,
        }
    }

    /// The union of both sets. Returns `self` unchanged if `other` adds nothing.
    pub fn union(&self, other: &Self) -> Self {
        if other.items.is_subset(&self.items) {
            return self.clone();
        }
        if self.items.is_subset(&other.items) {
            return Self {
                items: other.items.clone(),
                sealed: false,
            };
        }
        Self {
            items: self.items.union(&other.items).copied().collect(),
            sealed: false,
        }
    }

    /// Freeze the set. Sealing twice is a no-op.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Builder-style [`seal`](Self::seal).
    pub fn sealed(mut self) -> Self {
        self.seal();
        self
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.items.iter().copied()
    }
}

impl<T: Ord + Copy> Default for SealedSet<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Equality is by content; the sealed flag is not part of a set's value.
impl<T: Ord + Copy> PartialEq for SealedSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl<T: Ord + Copy> Eq for SealedSet<T> {}

impl<T: Ord + Copy + fmt::Debug> fmt::Debug for SealedSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.items.iter()).finish()
    }
}

impl<T: Ord + Copy> FromIterator<T> for SealedSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
            sealed: false,
        }
    }
}

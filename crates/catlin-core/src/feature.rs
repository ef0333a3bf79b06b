//! Feature values as delivered by a symbolic feature extractor.
//!
//! A feature extractor produces, for every training or prediction example, a
//! [`FeatureVector`]: an ordered list of [`FeatureSlot`]s whose order is fixed
//! for the lifetime of a model. Every slot carries a [`FeatureCode`] and the
//! number of distinct codes the slot can take (its cardinality).
//!
//! # Overview
//!
//! - [`FeatureCode`]: A single code, a set of codes, or the null value.
//! - [`FeatureSlot`]: One named position in a feature vector.
//! - [`FeatureVector`]: The ordered slots of one example.
//!
//! # Example
//!
//! ```
//! use catlin_core::feature::{FeatureCode, FeatureVector};
//!
//! let fv = FeatureVector::new()
//!     .with_slot("pos", FeatureCode::Single(1), 3)
//!     .with_slot("morph", FeatureCode::multiple([0, 1]), 2);
//!
//! assert_eq!(fv.len(), 2);
//! assert_eq!(fv.get(1).unwrap().code().codes().collect::<Vec<_>>(), vec![0, 1]);
//! ```

use std::collections::btree_set;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// The value of one feature slot.
///
/// Multi-valued codes are kept in a [`BTreeSet`], so every consumer sees
/// them in ascending numeric order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureCode {
    /// A single categorical code.
    Single(u32),
    /// A set of categorical codes (set-valued feature).
    Multiple(BTreeSet<u32>),
    /// The null value. The extractor still reserves a code for it, which is
    /// used whenever null values are not excluded.
    Null(u32),
}

impl FeatureCode {
    /// Creates a multi-valued code from any collection of codes.
    pub fn multiple(codes: impl IntoIterator<Item = u32>) -> Self {
        Self::Multiple(codes.into_iter().collect())
    }

    /// Returns true if this is the null value.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null(_))
    }

    /// Iterates over the codes carried by this value, in ascending order for
    /// multi-valued codes. A null value yields its reserved code.
    pub fn codes(&self) -> Codes<'_> {
        match self {
            Self::Single(code) | Self::Null(code) => Codes::One(Some(*code)),
            Self::Multiple(codes) => Codes::Many(codes.iter()),
        }
    }
}

/// Iterator over the codes of a [`FeatureCode`].
#[derive(Debug, Clone)]
pub enum Codes<'a> {
    /// At most one remaining code.
    One(Option<u32>),
    /// The remaining codes of a set.
    Many(btree_set::Iter<'a, u32>),
}

impl Iterator for Codes<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        match self {
            Codes::One(code) => code.take(),
            Codes::Many(iter) => iter.next().copied(),
        }
    }
}

/// One named position in a feature vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSlot {
    /// The feature name (for logging and debugging).
    name: String,

    /// The current value of the slot.
    code: FeatureCode,

    /// The number of distinct codes this slot can take.
    cardinality: u32,
}

impl FeatureSlot {
    /// Creates a new feature slot.
    ///
    /// # Arguments
    ///
    /// * `name` - The feature name.
    /// * `code` - The current value.
    /// * `cardinality` - The declared size of the slot's value space.
    pub fn new(name: impl Into<String>, code: FeatureCode, cardinality: u32) -> Self {
        Self {
            name: name.into(),
            code,
            cardinality,
        }
    }

    /// Returns the feature name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current value.
    #[inline]
    pub fn code(&self) -> &FeatureCode {
        &self.code
    }

    /// Returns the declared cardinality.
    #[inline]
    pub fn cardinality(&self) -> u32 {
        self.cardinality
    }

    /// Replaces the current value, keeping the slot's identity.
    pub fn set_code(&mut self, code: FeatureCode) {
        self.code = code;
    }
}

/// The ordered feature slots of one example.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureVector {
    slots: Vec<FeatureSlot>,
}

impl FeatureVector {
    /// Creates an empty feature vector.
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Creates a feature vector from existing slots.
    pub fn from_slots(slots: Vec<FeatureSlot>) -> Self {
        Self { slots }
    }

    /// Appends a slot, builder style.
    pub fn with_slot(
        mut self,
        name: impl Into<String>,
        code: FeatureCode,
        cardinality: u32,
    ) -> Self {
        self.push(FeatureSlot::new(name, code, cardinality));
        self
    }

    /// Appends a slot.
    pub fn push(&mut self, slot: FeatureSlot) {
        self.slots.push(slot);
    }

    /// Returns the number of slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if the vector has no slots.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the slot at `index`.
    pub fn get(&self, index: usize) -> Option<&FeatureSlot> {
        self.slots.get(index)
    }

    /// Returns a mutable reference to the slot at `index`.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut FeatureSlot> {
        self.slots.get_mut(index)
    }

    /// Iterates over the slots in order.
    pub fn iter(&self) -> std::slice::Iter<'_, FeatureSlot> {
        self.slots.iter()
    }
}

impl<'a> IntoIterator for &'a FeatureVector {
    type Item = &'a FeatureSlot;
    type IntoIter = std::slice::Iter<'a, FeatureSlot>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.iter()
    }
}

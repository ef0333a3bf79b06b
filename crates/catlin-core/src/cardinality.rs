//! Per-slot cardinalities and the one-hot offset table derived from them.
//!
//! The cardinality vector fixes the flat index space every slot is mapped
//! into. It is computed once from a training-time [`FeatureVector`] and
//! persisted next to the trained model, because the live feature extractor
//! is not guaranteed to report the same value-space sizes after training.
//!
//! # Index Space
//!
//! The index space is 1-based; index 0 is reserved. Slot `i` owns the
//! contiguous range `offset[i] .. offset[i] + cardinality[i]`, where
//!
//! ```text
//! offset[0]   = 1
//! offset[i+1] = offset[i] + cardinality[i]
//! ```
//!
//! # Persisted Form
//!
//! A single line of comma-separated non-negative integers, e.g. `3,2\n`.
//!
//! # Example
//!
//! ```
//! use catlin_core::cardinality::Cardinalities;
//!
//! let cards = Cardinalities::new(vec![3, 2]);
//! let offsets = cards.offsets().unwrap();
//! assert_eq!(offsets.offset(0), 1);
//! assert_eq!(offsets.offset(1), 4);
//! assert_eq!(offsets.global_index(1, 1), Some(5));
//! assert_eq!(cards.to_line(), "3,2");
//!
//! // The whole index space, bias index included, must fit in a u32.
//! assert!(Cardinalities::new(vec![u32::MAX, 2]).offsets().is_err());
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CatlinError, Result};
use crate::feature::FeatureVector;

/// The number of distinct codes each feature slot can take.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cardinalities(Vec<u32>);

impl Cardinalities {
    /// Creates a cardinality vector from raw values.
    pub fn new(values: Vec<u32>) -> Self {
        Self(values)
    }

    /// Reads the declared value-space size of every slot.
    pub fn from_feature_vector(fv: &FeatureVector) -> Self {
        Self(fv.iter().map(|slot| slot.cardinality()).collect())
    }

    /// Returns the number of slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no slots.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the cardinality of `slot`.
    #[inline]
    pub fn get(&self, slot: usize) -> Option<u32> {
        self.0.get(slot).copied()
    }

    /// Returns the raw values.
    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    /// Returns a copy without the slot at `slot`.
    ///
    /// Used for sub-logs produced by partitioning, whose records no longer
    /// carry the partitioning column.
    pub fn without_slot(&self, slot: usize) -> Self {
        let mut values = self.0.clone();
        if slot < values.len() {
            values.remove(slot);
        }
        Self(values)
    }

    /// Derives the offset table.
    pub fn offsets(&self) -> Result<OffsetTable> {
        OffsetTable::new(self)
    }

    /// Renders the persisted form (without the trailing newline).
    pub fn to_line(&self) -> String {
        self.0
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Parses the persisted form.
    ///
    /// `path` is only used for error context.
    pub fn parse_line(line: &str, path: impl AsRef<Path>) -> Result<Self> {
        let line = line.trim_end_matches(['\n', '\r']);
        if line.is_empty() {
            return Ok(Self::default());
        }
        line.split(',')
            .map(|item| {
                item.trim().parse::<u32>().map_err(|_| {
                    CatlinError::malformed(
                        path.as_ref(),
                        1,
                        item,
                        "cardinality is not a non-negative integer",
                    )
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(Self)
            .and_then(|cards| match cards.offsets() {
                Ok(_) => Ok(cards),
                Err(_) => Err(CatlinError::malformed(
                    path.as_ref(),
                    1,
                    line,
                    "cardinalities overflow the index space",
                )),
            })
    }

    /// Writes the persisted form to `path`, replacing any previous content.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let write = || -> io::Result<()> {
            let mut file = fs::File::create(path)?;
            writeln!(file, "{}", self.to_line())?;
            file.flush()
        };
        write().map_err(|e| CatlinError::io(path, e))?;
        tracing::debug!(path = %path.display(), slots = self.len(), "Saved cardinalities");
        Ok(())
    }

    /// Loads the persisted form from `path`.
    ///
    /// Returns `Ok(None)` if the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => {
                let first = content.lines().next().unwrap_or("");
                Self::parse_line(first, path).map(Some)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CatlinError::io(path, e)),
        }
    }

    /// Loads the persisted cardinalities, or recomputes them from the live
    /// feature vector if none were persisted.
    ///
    /// The fallback is a degraded mode: if the live extractor now reports
    /// different value-space sizes than it did at training time, the index
    /// space no longer matches the model's and predictions are silently
    /// wrong.
    pub fn load_or_compute(path: impl AsRef<Path>, fv: &FeatureVector) -> Result<Self> {
        let path = path.as_ref();
        match Self::load(path)? {
            Some(cards) => Ok(cards),
            None => {
                tracing::warn!(
                    path = %path.display(),
                    "No persisted cardinalities, recomputing from the live feature vector"
                );
                Ok(Self::from_feature_vector(fv))
            }
        }
    }
}

impl From<Vec<u32>> for Cardinalities {
    fn from(values: Vec<u32>) -> Self {
        Self(values)
    }
}

/// Cumulative base index of every slot in the global sparse index space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetTable {
    offsets: Vec<u32>,
    end: u32,
}

impl OffsetTable {
    /// Derives the offsets from a cardinality vector.
    ///
    /// Fails with `InvalidParameter` if the index space, including the
    /// bias index [`end`](Self::end), does not fit in a `u32`.
    pub fn new(cardinalities: &Cardinalities) -> Result<Self> {
        let mut offsets = Vec::with_capacity(cardinalities.len());
        let mut offset = 1u32;
        for (slot, &cardinality) in cardinalities.as_slice().iter().enumerate() {
            offsets.push(offset);
            offset = offset.checked_add(cardinality).ok_or_else(|| {
                CatlinError::invalid(format!(
                    "cardinality {} of slot {} overflows the index space",
                    cardinality, slot
                ))
            })?;
        }
        Ok(Self {
            offsets,
            end: offset,
        })
    }

    /// Returns the base index of `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is out of range.
    #[inline]
    pub fn offset(&self, slot: usize) -> u32 {
        self.offsets[slot]
    }

    /// Maps code `code` of slot `slot` to its global index. Returns `None`
    /// for a slot out of range or an index past `u32::MAX`.
    #[inline]
    pub fn global_index(&self, slot: usize, code: u32) -> Option<u32> {
        self.offsets.get(slot)?.checked_add(code)
    }

    /// Number of slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Returns true if there are no slots.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Returns all offsets in slot order.
    pub fn as_slice(&self) -> &[u32] {
        &self.offsets
    }

    /// One past the largest index any slot can produce.
    #[inline]
    pub fn end(&self) -> u32 {
        self.end
    }

    /// Total dimensionality of the index space. With a bias term the extra
    /// bias feature occupies index [`end`](Self::end).
    pub fn dimensionality(&self, bias: bool) -> u32 {
        if bias {
            self.end
        } else {
            self.end - 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::FeatureCode;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn test_offsets_concrete() {
        let offsets = Cardinalities::new(vec![3, 2]).offsets().unwrap();
        assert_eq!(offsets.as_slice(), &[1, 4]);
        assert_eq!(offsets.end(), 6);
        assert_eq!(offsets.dimensionality(false), 5);
        assert_eq!(offsets.dimensionality(true), 6);
    }

    #[test]
    fn test_offsets_monotonic() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let n = rng.gen_range(1..20);
            let cards: Vec<u32> = (0..n).map(|_| rng.gen_range(1..50)).collect();
            let offsets = Cardinalities::new(cards.clone()).offsets().unwrap();
            for i in 0..n {
                let expected = 1 + cards[..i].iter().sum::<u32>();
                assert_eq!(offsets.offset(i), expected);
                if i > 0 {
                    assert!(offsets.offset(i) > offsets.offset(i - 1));
                }
            }
        }
    }

    #[test]
    fn test_empty_cardinalities() {
        let offsets = Cardinalities::default().offsets().unwrap();
        assert!(offsets.as_slice().is_empty());
        assert_eq!(offsets.end(), 1);
        assert_eq!(offsets.dimensionality(false), 0);
    }

    #[test]
    fn test_from_feature_vector() {
        let fv = FeatureVector::new()
            .with_slot("a", FeatureCode::Single(0), 3)
            .with_slot("b", FeatureCode::multiple([1]), 7);
        let cards = Cardinalities::from_feature_vector(&fv);
        assert_eq!(cards.as_slice(), &[3, 7]);
        assert_eq!(cards.len(), fv.len());
    }

    #[test]
    fn test_line_roundtrip_and_errors() {
        let cards = Cardinalities::new(vec![12, 0, 5]);
        assert_eq!(cards.to_line(), "12,0,5");
        assert_eq!(Cardinalities::parse_line("12,0,5\n", "x").unwrap(), cards);

        let err = Cardinalities::parse_line("3,a,2", "card.car").unwrap_err();
        assert!(matches!(
            err,
            CatlinError::MalformedInstanceRecord { ref token, .. } if token == "a"
        ));
        assert!(Cardinalities::parse_line("3,-1", "x").is_err());
    }

    #[test]
    fn test_index_space_overflow_is_rejected() {
        let err = Cardinalities::new(vec![u32::MAX, 2]).offsets().unwrap_err();
        assert!(matches!(err, CatlinError::InvalidParameter(_)));

        // The last index plus the bias index still fit.
        let edge = Cardinalities::new(vec![u32::MAX - 3, 2]).offsets().unwrap();
        assert_eq!(edge.end(), u32::MAX);
        assert_eq!(edge.global_index(1, 1), Some(u32::MAX - 1));
        assert_eq!(edge.global_index(1, 2), Some(u32::MAX));
        assert_eq!(edge.global_index(2, 0), None);

        let err = Cardinalities::parse_line("4294967295,2", "model.car").unwrap_err();
        assert!(matches!(err, CatlinError::MalformedInstanceRecord { line: 1, .. }));
    }

    #[test]
    fn test_without_slot() {
        let cards = Cardinalities::new(vec![3, 2, 4]);
        assert_eq!(cards.without_slot(1).as_slice(), &[3, 4]);
        assert_eq!(cards.without_slot(9).as_slice(), &[3, 2, 4]);
    }

    #[test]
    fn test_save_load_and_fallback() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("model.car");

        let fv = FeatureVector::new().with_slot("a", FeatureCode::Single(0), 9);
        assert!(Cardinalities::load(&path).unwrap().is_none());
        assert_eq!(
            Cardinalities::load_or_compute(&path, &fv).unwrap().as_slice(),
            &[9]
        );

        let cards = Cardinalities::new(vec![3, 2]);
        cards.save(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "3,2\n");
        assert_eq!(Cardinalities::load(&path).unwrap(), Some(cards.clone()));
        // Persisted values win over the live feature vector.
        assert_eq!(Cardinalities::load_or_compute(&path, &fv).unwrap(), cards);
    }
}

//! Encoding feature vectors into sparse one-hot vectors for prediction.
//!
//! Every slot is mapped into its own contiguous index range (see
//! [`OffsetTable`](crate::cardinality::OffsetTable)). Codes at or beyond the
//! cardinality recorded at training time are dropped silently: the trained
//! model's dimensionality is fixed, and an unseen category must not leak
//! into the index range of the next slot.
//!
//! # Example
//!
//! ```
//! use catlin_core::cardinality::Cardinalities;
//! use catlin_core::encode::SparseEncoder;
//! use catlin_core::feature::{FeatureCode, FeatureVector};
//!
//! let encoder = SparseEncoder::new(Cardinalities::new(vec![3, 2])).unwrap();
//! let fv = FeatureVector::new()
//!     .with_slot("a", FeatureCode::Single(1), 3)
//!     .with_slot("b", FeatureCode::Single(1), 2);
//! assert_eq!(encoder.encode(&fv).indices(), vec![2, 5]);
//! ```

use crate::cardinality::{Cardinalities, OffsetTable};
use crate::error::Result;
use crate::feature::{FeatureCode, FeatureVector};
use crate::sparse::{FeatureNode, SparseVector};

/// Encodes feature vectors against a fixed cardinality vector.
#[derive(Debug, Clone)]
pub struct SparseEncoder {
    cardinalities: Cardinalities,
    offsets: OffsetTable,
    exclude_nulls: bool,
}

impl SparseEncoder {
    /// Creates an encoder that keeps null values (their reserved code is
    /// encoded like any other code).
    ///
    /// Fails if the cardinalities do not fit the index space.
    pub fn new(cardinalities: Cardinalities) -> Result<Self> {
        let offsets = cardinalities.offsets()?;
        Ok(Self {
            cardinalities,
            offsets,
            exclude_nulls: false,
        })
    }

    /// Sets whether null slots are skipped entirely.
    pub fn with_exclude_nulls(mut self, exclude_nulls: bool) -> Self {
        self.exclude_nulls = exclude_nulls;
        self
    }

    /// Returns the cardinalities this encoder maps against.
    pub fn cardinalities(&self) -> &Cardinalities {
        &self.cardinalities
    }

    /// Returns whether null slots are skipped.
    pub fn exclude_nulls(&self) -> bool {
        self.exclude_nulls
    }

    /// Encodes `fv` into a sparse indicator vector.
    ///
    /// Slots beyond the length of the cardinality vector are ignored: they
    /// have no index range in the trained model.
    pub fn encode(&self, fv: &FeatureVector) -> SparseVector {
        let mut out = SparseVector::with_capacity(fv.len());
        self.encode_into(fv, &mut out);
        out
    }

    /// Encodes `fv`, appending to `out`. Lets callers reuse one buffer
    /// across many predictions.
    pub fn encode_into(&self, fv: &FeatureVector, out: &mut SparseVector) {
        let ranges = self
            .cardinalities
            .as_slice()
            .iter()
            .zip(self.offsets.as_slice());
        // code < cardinality keeps code + offset below the table's end.
        for (slot, (&cardinality, &offset)) in fv.iter().zip(ranges) {
            let code = slot.code();
            if self.exclude_nulls && code.is_null() {
                continue;
            }
            match code {
                FeatureCode::Single(c) | FeatureCode::Null(c) => {
                    if *c < cardinality {
                        out.push(FeatureNode::indicator(c + offset));
                    }
                }
                FeatureCode::Multiple(codes) => {
                    for &c in codes.iter().filter(|&&c| c < cardinality) {
                        out.push(FeatureNode::indicator(c + offset));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_slot(a: FeatureCode, b: FeatureCode) -> FeatureVector {
        FeatureVector::new().with_slot("a", a, 3).with_slot("b", b, 2)
    }

    #[test]
    fn test_concrete_scenarios() {
        let encoder = SparseEncoder::new(Cardinalities::new(vec![3, 2])).unwrap();

        let v = encoder.encode(&two_slot(FeatureCode::Single(1), FeatureCode::Single(1)));
        assert_eq!(
            v.as_slice(),
            &[FeatureNode::new(2, 1.0), FeatureNode::new(5, 1.0)]
        );

        let v = encoder.encode(&two_slot(FeatureCode::Single(3), FeatureCode::Single(0)));
        assert_eq!(v.as_slice(), &[FeatureNode::new(4, 1.0)]);
    }

    #[test]
    fn test_out_of_range_only_affects_its_slot() {
        let encoder = SparseEncoder::new(Cardinalities::new(vec![3, 2, 4])).unwrap();
        let fv = FeatureVector::new()
            .with_slot("a", FeatureCode::Single(2), 3)
            .with_slot("b", FeatureCode::multiple([0, 1, 2, 9]), 2)
            .with_slot("c", FeatureCode::Single(3), 4);
        // b's codes 2 and 9 are unseen; a and c are unaffected.
        assert_eq!(encoder.encode(&fv).indices(), vec![3, 4, 5, 9]);
    }

    #[test]
    fn test_null_handling() {
        let cards = Cardinalities::new(vec![3, 2]);
        let fv = two_slot(FeatureCode::Null(0), FeatureCode::Single(1));

        let keep = SparseEncoder::new(cards.clone()).unwrap();
        assert_eq!(keep.encode(&fv).indices(), vec![1, 5]);

        let skip = SparseEncoder::new(cards).unwrap().with_exclude_nulls(true);
        assert_eq!(skip.encode(&fv).indices(), vec![5]);
    }

    #[test]
    fn test_output_strictly_increasing() {
        let encoder = SparseEncoder::new(Cardinalities::new(vec![4, 4, 4])).unwrap();
        let fv = FeatureVector::new()
            .with_slot("a", FeatureCode::multiple([3, 0, 2]), 4)
            .with_slot("b", FeatureCode::multiple([1, 3]), 4)
            .with_slot("c", FeatureCode::Single(0), 4);
        let v = encoder.encode(&fv);
        assert!(v.is_strictly_increasing());
        assert_eq!(v.indices(), vec![1, 3, 4, 6, 8, 9]);
    }

    #[test]
    fn test_encode_into_reuses_buffer() {
        let encoder = SparseEncoder::new(Cardinalities::new(vec![3, 2])).unwrap();
        let mut buf = SparseVector::new();
        encoder.encode_into(
            &two_slot(FeatureCode::Single(0), FeatureCode::Single(0)),
            &mut buf,
        );
        assert_eq!(buf.indices(), vec![1, 4]);
    }

    #[test]
    fn test_cardinalities_past_the_index_space_are_rejected() {
        assert!(SparseEncoder::new(Cardinalities::new(vec![u32::MAX, 2])).is_err());

        // Largest codes at the top of the index space encode without overflow.
        let encoder = SparseEncoder::new(Cardinalities::new(vec![u32::MAX - 3, 2])).unwrap();
        let fv = FeatureVector::new()
            .with_slot("a", FeatureCode::Single(u32::MAX - 4), u32::MAX - 3)
            .with_slot("b", FeatureCode::multiple([1, u32::MAX]), 2);
        assert_eq!(encoder.encode(&fv).indices(), vec![u32::MAX - 3, u32::MAX - 1]);
    }
}

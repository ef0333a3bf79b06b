//! Categorical feature codes and their one-hot sparse encoding.
//!
//! This crate provides the foundational types shared by the catlin data and
//! training crates:
//!
//! - **Feature values**: [`FeatureCode`], [`FeatureSlot`] and [`FeatureVector`]
//!   as delivered by a symbolic feature extractor.
//! - **Index space**: [`Cardinalities`] (persisted beside a trained model) and
//!   the derived [`OffsetTable`].
//! - **Sparse vectors**: [`FeatureNode`] and [`SparseVector`].
//! - **Encoding**: [`SparseEncoder`] for prediction-time encoding.
//! - **Error types**: [`CatlinError`] with file/line context.
//!
//! # Example
//!
//! ```
//! use catlin_core::{Cardinalities, FeatureCode, FeatureVector, SparseEncoder};
//!
//! let fv = FeatureVector::new()
//!     .with_slot("pos", FeatureCode::Single(1), 3)
//!     .with_slot("deprel", FeatureCode::Single(1), 2);
//!
//! // Computed once before training and persisted with the model.
//! let cards = Cardinalities::from_feature_vector(&fv);
//! assert_eq!(cards.offsets().unwrap().as_slice(), &[1, 4]);
//!
//! let encoded = SparseEncoder::new(cards).unwrap().encode(&fv);
//! assert_eq!(encoded.indices(), vec![2, 5]);
//! ```
//!
//! # Modules
//!
//! - [`feature`]: Feature codes, slots and vectors.
//! - [`cardinality`]: Cardinality vectors and offset tables.
//! - [`sparse`]: Sparse vector types.
//! - [`encode`]: Prediction-time encoding.
//! - [`error`]: Error types for the library.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cardinality;
pub mod encode;
pub mod error;
pub mod feature;
pub mod sparse;

// Re-export commonly used types at the crate root for convenience
pub use cardinality::{Cardinalities, OffsetTable};
pub use encode::SparseEncoder;
pub use error::{CatlinError, Result};
pub use feature::{FeatureCode, FeatureSlot, FeatureVector};
pub use sparse::{FeatureNode, SparseVector};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_reexports() {
        let fv = FeatureVector::new().with_slot("a", FeatureCode::Single(0), 2);
        let cards = Cardinalities::from_feature_vector(&fv);
        let _offsets: OffsetTable = cards.offsets().unwrap();
        let v: SparseVector = SparseEncoder::new(cards).unwrap().encode(&fv);
        assert_eq!(v.as_slice(), &[FeatureNode::indicator(1)]);

        let _err: Result<()> = Err(CatlinError::invalid("x"));
    }
}

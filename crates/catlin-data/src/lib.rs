//! Instance logs and the training problems built from them.
//!
//! This crate sits between a symbolic feature extractor and a linear
//! trainer. During the accumulation phase labelled examples are appended to
//! an [`InstanceLog`]; once the phase is over the log is either converted
//! into the sparse exchange format consumed by an external trainer, or read
//! into an in-memory [`Problem`].
//!
//! ```no_run
//! use catlin_core::{Cardinalities, FeatureCode, FeatureVector};
//! use catlin_data::{InstanceLog, ModelFiles, ProblemBuilder};
//!
//! let files = ModelFiles::new("/tmp/models", "odm0.");
//! let fv = FeatureVector::new()
//!     .with_slot("pos", FeatureCode::Single(2), 3)
//!     .with_slot("deprel", FeatureCode::Null(0), 2);
//!
//! let mut log = InstanceLog::create(files.instance_log(), true).unwrap();
//! log.append(1, &fv).unwrap();
//! log.close().unwrap();
//!
//! let cards = Cardinalities::from_feature_vector(&fv);
//! let problem = ProblemBuilder::new(&cards, 1.0).unwrap().build(&mut log).unwrap();
//! assert_eq!(problem.len(), 1);
//! ```
//!
//! # Modules
//!
//! - [`files`] - Stable file keys for the artifacts of one model
//! - [`record`] - The textual instance record format
//! - [`store`] - The append-only instance log and its example count
//! - [`convert`] - Conversion into the sparse exchange format
//! - [`problem`] - In-memory training problems
//! - [`partition`] - Splitting, tallying and merging logs by feature value

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod convert;
pub mod files;
pub mod partition;
pub mod problem;
pub mod record;
pub mod store;

pub use convert::{
    convert_log, convert_log_file, convert_log_line, exchange_line, ExchangeConverter,
};
pub use files::ModelFiles;
pub use partition::{count_by_feature, move_all_instances, partition_by_feature, PartitionKey};
pub use problem::{Problem, ProblemBuilder};
pub use record::{Column, InstanceRecord};
pub use store::{ExampleCount, InstanceLog, LogLines};

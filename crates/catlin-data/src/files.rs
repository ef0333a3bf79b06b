//! Stable file keys for the artifacts of one model.
//!
//! Every artifact lives in one directory and is named after the model and
//! the learning method, followed by a fixed suffix:
//!
//! | suffix     | contents                                   |
//! |------------|--------------------------------------------|
//! | `.ins`     | instance log (accumulation phase)          |
//! | `.ins.tmp` | exchange-format copy for external trainers |
//! | `.car`     | persisted cardinalities                    |
//! | `.mod`     | trained model artifact                     |

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Suffix of the instance log.
pub const INSTANCE_SUFFIX: &str = ".ins";
/// Suffix of the exchange-format file handed to an external trainer.
pub const EXCHANGE_SUFFIX: &str = ".ins.tmp";
/// Suffix of the persisted cardinalities.
pub const CARDINALITY_SUFFIX: &str = ".car";
/// Suffix of the model artifact.
pub const MODEL_SUFFIX: &str = ".mod";

/// Default learning method name.
pub const DEFAULT_METHOD: &str = "liblinear";

/// Resolves the artifact paths of one model.
///
/// # Example
///
/// ```
/// use catlin_data::files::ModelFiles;
/// use std::path::Path;
///
/// let files = ModelFiles::new("/tmp/cfg", "odm0.");
/// assert_eq!(files.instance_log(), Path::new("/tmp/cfg/odm0.liblinear.ins"));
/// assert_eq!(files.model(), Path::new("/tmp/cfg/odm0.liblinear.mod"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelFiles {
    dir: PathBuf,
    model_name: String,
    method_name: String,
}

impl ModelFiles {
    /// Creates file keys for `model_name` using the default method name.
    pub fn new(dir: impl Into<PathBuf>, model_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            model_name: model_name.into(),
            method_name: DEFAULT_METHOD.to_string(),
        }
    }

    /// Overrides the learning method name.
    pub fn with_method(mut self, method_name: impl Into<String>) -> Self {
        self.method_name = method_name.into();
        self
    }

    /// Returns the directory holding all artifacts.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the model name.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Returns the learning method name.
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// Resolves `<dir>/<model><method><suffix>`.
    pub fn file(&self, suffix: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}{}", self.model_name, self.method_name, suffix))
    }

    /// Path of the instance log.
    pub fn instance_log(&self) -> PathBuf {
        self.file(INSTANCE_SUFFIX)
    }

    /// Path of the exchange-format file.
    pub fn exchange(&self) -> PathBuf {
        self.file(EXCHANGE_SUFFIX)
    }

    /// Path of the persisted cardinalities.
    pub fn cardinalities(&self) -> PathBuf {
        self.file(CARDINALITY_SUFFIX)
    }

    /// Path of the model artifact.
    pub fn model(&self) -> PathBuf {
        self.file(MODEL_SUFFIX)
    }

    /// File keys of the sub-model trained on the partition `key`.
    ///
    /// Its instance log is `<dir>/<model with '.' as '_'><key>.<method>.ins`.
    pub fn partition(&self, key: &str) -> ModelFiles {
        ModelFiles {
            dir: self.dir.clone(),
            model_name: format!("{}{}.", self.model_name.replace('.', "_"), key),
            method_name: self.method_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let files = ModelFiles::new("/cfg", "m.").with_method("lin");
        assert_eq!(files.instance_log(), PathBuf::from("/cfg/m.lin.ins"));
        assert_eq!(files.exchange(), PathBuf::from("/cfg/m.lin.ins.tmp"));
        assert_eq!(files.cardinalities(), PathBuf::from("/cfg/m.lin.car"));
        assert_eq!(files.model(), PathBuf::from("/cfg/m.lin.mod"));
    }

    #[test]
    fn test_partition_keys() {
        let files = ModelFiles::new("/cfg", "odm0.");
        let sub = files.partition("17");
        assert_eq!(sub.instance_log(), PathBuf::from("/cfg/odm0_17.liblinear.ins"));
        assert_eq!(sub.model(), PathBuf::from("/cfg/odm0_17.liblinear.mod"));
        assert_eq!(
            files.partition("other").instance_log(),
            PathBuf::from("/cfg/odm0_other.liblinear.ins")
        );
    }
}

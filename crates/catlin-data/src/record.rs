//! The textual instance record format.
//!
//! One record per line, tab-separated:
//!
//! ```text
//! label<TAB>col1<TAB>col2<TAB>...
//! ```
//!
//! Each column is a single code, `-1` (feature absent) or a pipe-joined set
//! of codes (`2|0|5`). There is no header.
//!
//! # Example
//!
//! ```
//! use catlin_data::record::{Column, InstanceRecord};
//!
//! let record = InstanceRecord::parse("-1\t2|0\t-1", "mem", 1).unwrap();
//! assert_eq!(record.label(), -1);
//! assert_eq!(record.columns()[0], Column::Codes(vec![2, 0]));
//! assert_eq!(record.columns()[1], Column::Absent);
//! assert_eq!(record.to_string(), "-1\t2|0\t-1");
//! ```

use std::fmt;
use std::path::Path;

use catlin_core::error::{CatlinError, Result};
use catlin_core::feature::{FeatureCode, FeatureVector};

/// Column value marking an absent feature.
pub const ABSENT: &str = "-1";

/// One column of an instance record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    /// The feature is absent (`-1`).
    Absent,
    /// One or more codes, in the order they were written.
    Codes(Vec<u32>),
}

impl Column {
    /// Returns the codes of this column (none if absent).
    pub fn codes(&self) -> &[u32] {
        match self {
            Column::Absent => &[],
            Column::Codes(codes) => codes,
        }
    }

    fn parse(token: &str, path: &Path, line: usize) -> Result<Self> {
        let mut codes = Vec::new();
        for item in token.split('|') {
            if item == ABSENT {
                continue;
            }
            let code = item.parse::<u32>().map_err(|_| {
                CatlinError::malformed(
                    path,
                    line,
                    item,
                    "feature code is not a non-negative integer",
                )
            })?;
            codes.push(code);
        }
        if codes.is_empty() {
            Ok(Column::Absent)
        } else {
            Ok(Column::Codes(codes))
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Column::Absent => f.write_str(ABSENT),
            Column::Codes(codes) => {
                for (i, code) in codes.iter().enumerate() {
                    if i > 0 {
                        f.write_str("|")?;
                    }
                    write!(f, "{}", code)?;
                }
                Ok(())
            }
        }
    }
}

/// One logged example: a label and one column per feature slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRecord {
    label: i32,
    columns: Vec<Column>,
}

impl InstanceRecord {
    /// Creates a record from parts.
    pub fn new(label: i32, columns: Vec<Column>) -> Self {
        Self { label, columns }
    }

    /// Encodes a feature vector into a record.
    ///
    /// Null slots become [`Column::Absent`] when `exclude_nulls` is set;
    /// otherwise their reserved code is written. Multi-valued slots are
    /// written in ascending order, and an empty set is written as absent.
    pub fn from_features(label: i32, fv: &FeatureVector, exclude_nulls: bool) -> Self {
        let columns = fv
            .iter()
            .map(|slot| match slot.code() {
                code if exclude_nulls && code.is_null() => Column::Absent,
                FeatureCode::Single(c) | FeatureCode::Null(c) => Column::Codes(vec![*c]),
                FeatureCode::Multiple(codes) if codes.is_empty() => Column::Absent,
                FeatureCode::Multiple(codes) => Column::Codes(codes.iter().copied().collect()),
            })
            .collect();
        Self { label, columns }
    }

    /// Parses one line of an instance log.
    ///
    /// `path` and `line` (1-based) are used for error context. A trailing
    /// empty column, left by writers that end every column with a tab, is
    /// ignored.
    pub fn parse(text: &str, path: impl AsRef<Path>, line: usize) -> Result<Self> {
        let path = path.as_ref();
        let text = text.trim_end_matches(['\n', '\r']);
        let mut tokens = split_columns(text);
        let label_token = tokens.next().unwrap_or("");
        let label = label_token.parse::<i32>().map_err(|_| {
            CatlinError::malformed(path, line, label_token, "label is not an integer")
        })?;
        let columns = tokens
            .map(|token| Column::parse(token, path, line))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { label, columns })
    }

    /// Returns the label.
    #[inline]
    pub fn label(&self) -> i32 {
        self.label
    }

    /// Returns the feature columns.
    #[inline]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns the number of feature columns.
    #[inline]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the record has no feature columns.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl fmt::Display for InstanceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)?;
        for column in &self.columns {
            write!(f, "\t{}", column)?;
        }
        Ok(())
    }
}

/// Splits a record line into its tab-separated tokens, dropping one
/// trailing empty token.
pub(crate) fn split_columns(text: &str) -> impl Iterator<Item = &str> {
    let text = text.strip_suffix('\t').unwrap_or(text);
    text.split('\t')
}

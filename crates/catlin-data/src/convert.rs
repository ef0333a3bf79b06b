//! Conversion of instance logs into the sparse exchange format.
//!
//! The exchange format is the plain text input of liblinear-style trainers:
//!
//! ```text
//! label index:1 index:1 ...
//! ```
//!
//! Column `j` of a record maps code `v` to global index `v + offset[j]`,
//! where the offsets accumulate the cardinalities of the preceding columns
//! starting at 1. Absent values (`-1`) produce nothing. Codes inside a pipe
//! set keep the order in which they were logged.
//!
//! # Example
//!
//! ```
//! use catlin_core::cardinality::{Cardinalities, OffsetTable};
//! use catlin_data::convert::convert_log_line;
//!
//! let cards = Cardinalities::new(vec![3, 2]);
//! assert_eq!(convert_log_line("1\t0\t1", &cards).unwrap(), "1 1:1 4:1");
//! assert_eq!(convert_log_line("-1\t2|0\t-1", &cards).unwrap(), "-1 3:1 1:1");
//! ```

use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use catlin_core::cardinality::{Cardinalities, OffsetTable};
use catlin_core::error::{CatlinError, Result};
use catlin_core::sparse::SparseVector;

use crate::record::{split_columns, ABSENT};

/// Streams instance logs into the exchange format for a fixed cardinality
/// vector.
#[derive(Debug, Clone)]
pub struct ExchangeConverter {
    cardinalities: Cardinalities,
    offsets: OffsetTable,
}

impl ExchangeConverter {
    /// Creates a converter. Fails if the cardinalities do not fit the
    /// index space.
    pub fn new(cardinalities: Cardinalities) -> Result<Self> {
        let offsets = cardinalities.offsets()?;
        Ok(Self {
            cardinalities,
            offsets,
        })
    }

    /// Returns the cardinalities used for the offsets.
    pub fn cardinalities(&self) -> &Cardinalities {
        &self.cardinalities
    }

    /// Converts one record line, appending the exchange line to `out`
    /// (without a newline).
    pub fn convert_line_into(
        &self,
        text: &str,
        path: &Path,
        line: usize,
        out: &mut String,
    ) -> Result<()> {
        let start = out.len();
        let label = decode_record(text, &self.offsets, path, line, |index| {
            // Writing into a String cannot fail.
            let _ = write!(out, " {}:1", index);
        })?;
        out.insert_str(start, &label.to_string());
        Ok(())
    }

    /// Converts a whole log read from `reader` into `writer`.
    ///
    /// Blank lines are skipped. `source` and `target` name the two streams
    /// in errors. Returns the number of converted records.
    pub fn convert<R: BufRead, W: Write>(
        &self,
        reader: R,
        mut writer: W,
        source: &Path,
        target: &Path,
    ) -> Result<usize> {
        let mut converted = 0usize;
        let mut buf = String::new();
        for (i, text) in reader.lines().enumerate() {
            let text = text.map_err(|e| CatlinError::io(source, e))?;
            if text.trim().is_empty() {
                continue;
            }
            buf.clear();
            self.convert_line_into(&text, source, i + 1, &mut buf)?;
            buf.push('\n');
            writer
                .write_all(buf.as_bytes())
                .map_err(|e| CatlinError::io(target, e))?;
            converted += 1;
        }
        writer.flush().map_err(|e| CatlinError::io(target, e))?;
        Ok(converted)
    }

    /// Converts the log at `log_path` into a new exchange file at
    /// `exchange_path`.
    pub fn convert_file(&self, log_path: &Path, exchange_path: &Path) -> Result<usize> {
        let input = File::open(log_path).map_err(|e| CatlinError::io(log_path, e))?;
        let output = File::create(exchange_path).map_err(|e| CatlinError::io(exchange_path, e))?;
        let converted = self.convert(
            BufReader::new(input),
            BufWriter::new(output),
            log_path,
            exchange_path,
        )?;
        tracing::debug!(
            log = %log_path.display(),
            exchange = %exchange_path.display(),
            instances = converted,
            "Converted instance log"
        );
        Ok(converted)
    }
}

/// Converts one instance log line into an exchange line.
pub fn convert_log_line(line: &str, cardinalities: &Cardinalities) -> Result<String> {
    let mut out = String::new();
    ExchangeConverter::new(cardinalities.clone())?.convert_line_into(
        line,
        Path::new("<line>"),
        1,
        &mut out,
    )?;
    Ok(out)
}

/// Converts a log stream; see [`ExchangeConverter::convert`].
pub fn convert_log<R: BufRead, W: Write>(
    reader: R,
    writer: W,
    cardinalities: &Cardinalities,
    source: &Path,
    target: &Path,
) -> Result<usize> {
    ExchangeConverter::new(cardinalities.clone())?.convert(reader, writer, source, target)
}

/// Converts a log file; see [`ExchangeConverter::convert_file`].
pub fn convert_log_file(
    log_path: impl AsRef<Path>,
    exchange_path: impl AsRef<Path>,
    cardinalities: &Cardinalities,
) -> Result<usize> {
    ExchangeConverter::new(cardinalities.clone())?
        .convert_file(log_path.as_ref(), exchange_path.as_ref())
}

/// Renders an encoded example as an exchange line.
pub fn exchange_line(label: i32, vector: &SparseVector) -> String {
    let mut out = label.to_string();
    for node in vector {
        let _ = write!(out, " {}:1", node.index);
    }
    out
}

/// Decodes one record line, calling `emit` with the global index of every
/// present code in textual order. Returns the label.
///
/// The number of feature columns must equal the number of slots in
/// `offsets`.
pub(crate) fn decode_record(
    text: &str,
    offsets: &OffsetTable,
    path: &Path,
    line: usize,
    mut emit: impl FnMut(u32),
) -> Result<i32> {
    let text = text.trim_end_matches(['\n', '\r']);
    let mut tokens = split_columns(text);
    let label_token = tokens.next().unwrap_or("");
    let label = label_token
        .parse::<i32>()
        .map_err(|_| CatlinError::malformed(path, line, label_token, "label is not an integer"))?;

    let slots = offsets.as_slice();
    let mut columns = 0usize;
    for token in tokens {
        let Some(&offset) = slots.get(columns) else {
            return Err(shape_error(path, line, text, columns + 1, slots.len()));
        };
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
            let index = code.checked_add(offset).ok_or_else(|| {
                CatlinError::malformed(path, line, item, "feature index overflows")
            })?;
            emit(index);
        }
        columns += 1;
    }
    if columns != slots.len() {
        return Err(shape_error(path, line, text, columns, slots.len()));
    }
    Ok(label)
}

fn shape_error(path: &Path, line: usize, text: &str, found: usize, expected: usize) -> CatlinError {
    CatlinError::malformed(
        path,
        line,
        text,
        format!("expected {expected} feature columns, found {found}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_concrete_scenario() {
        let cards = Cardinalities::new(vec![3, 2]);
        assert_eq!(convert_log_line("1\t0\t1", &cards).unwrap(), "1 1:1 4:1");
        assert_eq!(convert_log_line("-1\t2|0\t-1", &cards).unwrap(), "-1 3:1 1:1");
    }

    #[test]
    fn test_all_absent_keeps_label() {
        let cards = Cardinalities::new(vec![3, 2]);
        assert_eq!(convert_log_line("5\t-1\t-1\t", &cards).unwrap(), "5");
    }

    #[test]
    fn test_shape_mismatch_is_malformed() {
        let cards = Cardinalities::new(vec![3, 2]);
        for text in ["1\t0", "1\t0\t1\t1"] {
            let err = convert_log_line(text, &cards).unwrap_err();
            assert!(
                matches!(err, CatlinError::MalformedInstanceRecord { .. }),
                "{text}"
            );
        }
    }

    #[test]
    fn test_bad_tokens_are_malformed() {
        let cards = Cardinalities::new(vec![3, 2]);
        for text in ["x\t0\t1", "1\t0\ta", "1\t-2\t0", "1\t0|\t0"] {
            assert!(convert_log_line(text, &cards).is_err(), "{text}");
        }
    }

    #[test]
    fn test_convert_stream_skips_blank_lines() {
        let cards = Cardinalities::new(vec![3, 2]);
        let input = "1\t0\t1\n\n-1\t2|0\t-1\n";
        let mut output = Vec::new();
        let n = convert_log(
            Cursor::new(input),
            &mut output,
            &cards,
            Path::new("in"),
            Path::new("out"),
        )
        .unwrap();
        assert_eq!(n, 2);
        assert_eq!(String::from_utf8(output).unwrap(), "1 1:1 4:1\n-1 3:1 1:1\n");
    }

    #[test]
    fn test_convert_stream_reports_line_number() {
        let cards = Cardinalities::new(vec![2]);
        let err = convert_log(
            Cursor::new("1\t0\n\n1\tq\n"),
            Vec::new(),
            &cards,
            Path::new("log.ins"),
            Path::new("out"),
        )
        .unwrap_err();
        match err {
            CatlinError::MalformedInstanceRecord { line, token, .. } => {
                assert_eq!(line, 3);
                assert_eq!(token, "q");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_cardinalities_past_the_index_space_are_rejected() {
        let cards = Cardinalities::new(vec![u32::MAX, 2]);
        let err = convert_log_line("1\t0\t1", &cards).unwrap_err();
        assert!(matches!(err, CatlinError::InvalidParameter(_)));

        // Logged codes are not range-checked, but their index must fit.
        let cards = Cardinalities::new(vec![3, 2]);
        let err = convert_log_line("1\t4294967295\t0", &cards).unwrap_err();
        assert!(matches!(err, CatlinError::MalformedInstanceRecord { .. }));
    }

    #[test]
    fn test_exchange_line() {
        let v: SparseVector = [1, 4]
            .into_iter()
            .map(catlin_core::sparse::FeatureNode::indicator)
            .collect();
        assert_eq!(exchange_line(1, &v), "1 1:1 4:1");
        assert_eq!(exchange_line(-3, &SparseVector::new()), "-3");
    }
}

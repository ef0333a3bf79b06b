//! Splitting, tallying and merging instance logs by a feature's value.
//!
//! A model can be specialised per value of one feature (say one classifier
//! per part-of-speech tag). [`partition_by_feature`] splits a log into one
//! sub-log per known value plus an overflow sub-log, dropping the
//! partitioning column from every record. [`count_by_feature`] tallies the
//! values beforehand so the caller can choose which ones are worth a
//! sub-model, and [`move_all_instances`] folds a sub-log back into another
//! log, re-inserting the value it was keyed by.
//!
//! None of these operations is transactional: a failure part-way through
//! leaves the sub-logs written so far on disk, and the operation is simply
//! re-run.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use catlin_core::error::{CatlinError, Result};

use crate::files::ModelFiles;
use crate::record::split_columns;
use crate::store::InstanceLog;

/// The bucket a record lands in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PartitionKey {
    /// One of the known values.
    Value(i64),
    /// Everything else, under the given name.
    Overflow(String),
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionKey::Value(v) => write!(f, "{}", v),
            PartitionKey::Overflow(name) => f.write_str(name),
        }
    }
}

/// Splits `source` by the value of feature `feature_index` (0-based, not
/// counting the label column).
///
/// Every known value gets a sub-log under `files.partition(value)`, and
/// every other value goes to the sub-log under `files.partition(overflow_key)`.
/// All sub-logs are created even if they end up empty. Each source record
/// lands in exactly one sub-log, with the partitioning column removed and
/// every other column unchanged. The returned sub-logs are closed and carry
/// their example counts.
pub fn partition_by_feature(
    source: &InstanceLog,
    feature_index: usize,
    known_values: &BTreeSet<i64>,
    overflow_key: &str,
    files: &ModelFiles,
) -> Result<BTreeMap<PartitionKey, InstanceLog>> {
    let overflow = PartitionKey::Overflow(overflow_key.to_string());
    let overflow_path = files.partition(overflow_key).instance_log();
    let mut targets: Vec<_> = known_values
        .iter()
        .map(|&value| {
            let path = files.partition(&value.to_string()).instance_log();
            (PartitionKey::Value(value), path)
        })
        .collect();
    if targets.iter().any(|(_, path)| *path == overflow_path) {
        return Err(CatlinError::invalid(format!(
            "overflow key '{}' collides with a known value",
            overflow_key
        )));
    }
    targets.push((overflow.clone(), overflow_path));

    let exclude_nulls = source.exclude_nulls();
    let mut sinks = BTreeMap::new();
    for (key, path) in targets {
        sinks.insert(key, InstanceLog::create(path, exclude_nulls)?);
    }

    let column = feature_index + 1;
    let mut out = String::new();
    for item in source.lines()? {
        let (line, text) = item?;
        if text.trim().is_empty() {
            continue;
        }
        let value = column_value(&text, column, source, line)?;
        let key = if known_values.contains(&value) {
            PartitionKey::Value(value)
        } else {
            overflow.clone()
        };

        out.clear();
        for (i, token) in split_columns(&text).enumerate() {
            if i == column {
                continue;
            }
            if i > 0 {
                out.push('\t');
            }
            out.push_str(token);
        }
        if let Some(sink) = sinks.get_mut(&key) {
            sink.append_line(&out)?;
        }
    }

    for sink in sinks.values_mut() {
        sink.close()?;
    }
    tracing::info!(
        source = %source.path().display(),
        feature_index,
        partitions = sinks.len(),
        "Partitioned instance log"
    );
    Ok(sinks)
}

/// Tallies the values found in the given feature columns (0-based, not
/// counting the label column) over the whole log.
///
/// Members of a pipe set are counted individually. The log is not modified.
pub fn count_by_feature(
    log: &InstanceLog,
    feature_indices: &[usize],
) -> Result<BTreeMap<i64, u64>> {
    let mut counts = BTreeMap::new();
    for item in log.lines()? {
        let (line, text) = item?;
        if text.trim().is_empty() {
            continue;
        }
        let tokens: Vec<&str> = split_columns(&text).collect();
        for &feature_index in feature_indices {
            let token = tokens
                .get(feature_index + 1)
                .ok_or_else(|| missing_column(log, line, &text, feature_index + 1))?;
            for member in token.split('|') {
                let value = parse_value(member, log, line)?;
                *counts.entry(value).or_insert(0u64) += 1;
            }
        }
    }
    Ok(counts)
}

/// Moves every record of `source` into `destination`, inserting
/// `fixed_code` as a new column before each source feature column named in
/// `positions` (0-based, not counting the label column).
///
/// Positions refer to the columns of the source record, not of the growing
/// output: `[0, 1]` places one code before each of the first two source
/// features. Repeated positions insert once, and positions past the last
/// source feature append at the end.
///
/// The destination's count grows and the source's shrinks by one per moved
/// record. The source log is deleted afterwards. Returns the number of
/// moved records.
pub fn move_all_instances(
    source: &mut InstanceLog,
    destination: &mut InstanceLog,
    fixed_code: i64,
    positions: &[usize],
) -> Result<u64> {
    if source.path() == destination.path() {
        return Err(CatlinError::invalid(format!(
            "cannot move instances of {} into itself",
            source.path().display()
        )));
    }
    let mut positions = positions.to_vec();
    positions.sort_unstable();
    positions.dedup();
    let code = fixed_code.to_string();

    source.count()?;
    let mut moved = 0u64;
    for item in source.lines()? {
        let (_, text) = item?;
        if text.trim().is_empty() {
            continue;
        }
        let mut tokens = split_columns(&text);
        let mut out: Vec<&str> = Vec::with_capacity(positions.len() + 8);
        out.extend(tokens.next());
        let mut features = 0usize;
        for token in tokens {
            if positions.binary_search(&features).is_ok() {
                out.push(code.as_str());
            }
            out.push(token);
            features += 1;
        }
        let trailing = positions.iter().filter(|&&p| p >= features).count();
        out.extend(std::iter::repeat(code.as_str()).take(trailing));
        destination.append_line(&out.join("\t"))?;
        source.examples_mut().decrement();
        moved += 1;
    }
    source.delete()?;
    tracing::debug!(
        source = %source.path().display(),
        destination = %destination.path().display(),
        instances = moved,
        "Moved instances"
    );
    Ok(moved)
}

fn column_value(text: &str, column: usize, log: &InstanceLog, line: usize) -> Result<i64> {
    let token = split_columns(text)
        .nth(column)
        .ok_or_else(|| missing_column(log, line, text, column))?;
    parse_value(token, log, line)
}

fn parse_value(token: &str, log: &InstanceLog, line: usize) -> Result<i64> {
    token.parse::<i64>().map_err(|_| {
        CatlinError::malformed(log.path(), line, token, "feature value is not an integer")
    })
}

fn missing_column(log: &InstanceLog, line: usize, text: &str, column: usize) -> CatlinError {
    CatlinError::malformed(
        log.path(),
        line,
        text,
        format!("record has no column {}", column),
    )
}

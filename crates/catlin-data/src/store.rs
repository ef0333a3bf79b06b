//! The append-only instance log of one model.
//!
//! An [`InstanceLog`] accumulates [`InstanceRecord`]s during the accumulation
//! phase, one line per example, flushed after every append. Once the phase
//! is over the writer is closed (explicitly, or when the log is dropped) and
//! the log is read back in a single pass by the problem builder or the
//! exchange converter.
//!
//! The log owns the model's [`ExampleCount`]. After a process restart the
//! in-memory count is lost; [`InstanceLog::count`] recovers it with a line
//! count over the backing file.
//!
//! # Example
//!
//! ```no_run
//! use catlin_core::feature::{FeatureCode, FeatureVector};
//! use catlin_data::store::InstanceLog;
//!
//! let fv = FeatureVector::new()
//!     .with_slot("pos", FeatureCode::Single(1), 3)
//!     .with_slot("deprel", FeatureCode::multiple([0, 1]), 2);
//!
//! let mut log = InstanceLog::create("/tmp/odm0.liblinear.ins", true).unwrap();
//! log.append(4, &fv).unwrap();
//! log.close().unwrap();
//! assert_eq!(log.count().unwrap(), 1);
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use catlin_core::error::{CatlinError, Result};
use catlin_core::feature::FeatureVector;

use crate::record::InstanceRecord;

/// Number of examples held by an instance log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExampleCount(u64);

impl ExampleCount {
    /// Creates a count.
    pub const fn new(count: u64) -> Self {
        Self(count)
    }

    /// Returns the count.
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }

    /// Adds one example.
    #[inline]
    pub fn increment(&mut self) {
        self.0 += 1;
    }

    /// Removes one example. Saturates at zero.
    #[inline]
    pub fn decrement(&mut self) {
        self.0 = self.0.saturating_sub(1);
    }

    /// Forgets the count; the next [`InstanceLog::count`] recounts the file.
    pub fn reset(&mut self) {
        self.0 = 0;
    }
}

/// A file-backed, append-only store of instance records.
#[derive(Debug)]
pub struct InstanceLog {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    examples: ExampleCount,
    exclude_nulls: bool,
}

impl InstanceLog {
    /// Creates (or truncates) the log at `path` for a fresh accumulation
    /// phase. Missing parent directories are created.
    pub fn create(path: impl Into<PathBuf>, exclude_nulls: bool) -> Result<Self> {
        let path = path.into();
        ensure_parent(&path)?;
        let file = File::create(&path).map_err(|e| CatlinError::io(&path, e))?;
        tracing::debug!(path = %path.display(), "Created instance log");
        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            examples: ExampleCount::default(),
            exclude_nulls,
        })
    }

    /// Opens the log at `path` for appending, creating it if missing.
    ///
    /// The example count starts at zero and is recovered lazily by
    /// [`count`](Self::count).
    pub fn open_append(path: impl Into<PathBuf>, exclude_nulls: bool) -> Result<Self> {
        let path = path.into();
        ensure_parent(&path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| CatlinError::io(&path, e))?;
        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            examples: ExampleCount::default(),
            exclude_nulls,
        })
    }

    /// Opens an existing log for reading only. Appends fail with
    /// [`CatlinError::WriterClosed`].
    pub fn open_read(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
            examples: ExampleCount::default(),
            exclude_nulls: false,
        }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true while the writer is open.
    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    /// Returns whether null slots are logged as absent.
    pub fn exclude_nulls(&self) -> bool {
        self.exclude_nulls
    }

    /// Returns the in-memory example count without touching the file.
    pub fn examples(&self) -> ExampleCount {
        self.examples
    }

    /// Mutable access to the in-memory example count.
    pub fn examples_mut(&mut self) -> &mut ExampleCount {
        &mut self.examples
    }

    /// Encodes and appends one labelled example.
    pub fn append(&mut self, label: i32, fv: &FeatureVector) -> Result<()> {
        let record = InstanceRecord::from_features(label, fv, self.exclude_nulls);
        self.append_record(&record)
    }

    /// Appends an already encoded record.
    pub fn append_record(&mut self, record: &InstanceRecord) -> Result<()> {
        self.append_line(&record.to_string())
    }

    /// Appends one raw record line (without its newline) and flushes.
    pub fn append_line(&mut self, line: &str) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| CatlinError::WriterClosed {
            path: self.path.clone(),
        })?;
        let write = |w: &mut BufWriter<File>| -> io::Result<()> {
            w.write_all(line.as_bytes())?;
            w.write_all(b"\n")?;
            w.flush()
        };
        write(writer).map_err(|e| CatlinError::io(&self.path, e))?;
        self.examples.increment();
        Ok(())
    }

    /// Returns the number of examples in the log.
    ///
    /// Uses the in-memory count when it is nonzero. Otherwise counts the
    /// non-empty lines of the backing file and caches the result. A missing
    /// file holds no examples.
    pub fn count(&mut self) -> Result<u64> {
        if self.examples.get() > 0 {
            return Ok(self.examples.get());
        }
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(CatlinError::io(&self.path, e)),
        };
        let mut count = 0u64;
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| CatlinError::io(&self.path, e))?;
            if !line.trim().is_empty() {
                count += 1;
            }
        }
        tracing::debug!(path = %self.path.display(), instances = count, "Recounted instance log");
        self.examples = ExampleCount::new(count);
        Ok(count)
    }

    /// Streams the log as `(line_number, line)` pairs, 1-based.
    ///
    /// The file handle lives as long as the returned iterator.
    pub fn lines(&self) -> Result<LogLines> {
        let file = File::open(&self.path).map_err(|e| CatlinError::io(&self.path, e))?;
        Ok(LogLines {
            path: self.path.clone(),
            reader: BufReader::new(file),
            line: 0,
        })
    }

    /// Flushes and releases the writer. Calling it again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| CatlinError::io(&self.path, e))?;
            tracing::debug!(path = %self.path.display(), "Closed instance log");
        }
        Ok(())
    }

    /// Closes the writer and removes the backing file. A file that is
    /// already gone is not an error.
    pub fn delete(&mut self) -> Result<()> {
        self.close()?;
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "Deleted instance log");
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(CatlinError::io(&self.path, e)),
        }
        self.examples.reset();
        Ok(())
    }
}

impl Drop for InstanceLog {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "Failed to close instance log");
        }
    }
}

/// Iterator over the lines of an instance log.
#[derive(Debug)]
pub struct LogLines {
    path: PathBuf,
    reader: BufReader<File>,
    line: usize,
}

impl LogLines {
    /// Path of the log being read.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Iterator for LogLines {
    type Item = Result<(usize, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut buf = String::new();
        match self.reader.read_line(&mut buf) {
            Ok(0) => None,
            Ok(_) => {
                self.line += 1;
                let len = buf.trim_end_matches(['\n', '\r']).len();
                buf.truncate(len);
                Some(Ok((self.line, buf)))
            }
            Err(e) => Some(Err(CatlinError::io(&self.path, e))),
        }
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| CatlinError::io(parent, e))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catlin_core::feature::FeatureCode;
    use tempfile::tempdir;

    fn fv(a: FeatureCode, b: FeatureCode) -> FeatureVector {
        FeatureVector::new().with_slot("a", a, 3).with_slot("b", b, 2)
    }

    #[test]
    fn test_append_writes_one_line_per_example() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.ins");
        let mut log = InstanceLog::create(&path, true).unwrap();
        log.append(1, &fv(FeatureCode::Single(0), FeatureCode::Single(1)))
            .unwrap();
        log.append(-1, &fv(FeatureCode::multiple([2, 0]), FeatureCode::Null(0)))
            .unwrap();
        assert_eq!(log.examples().get(), 2);

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "1\t0\t1\n-1\t0|2\t-1\n");
    }

    #[test]
    fn test_count_without_restart_matches_appends() {
        let dir = tempdir().unwrap();
        let mut log = InstanceLog::create(dir.path().join("m.ins"), false).unwrap();
        for label in 0..7 {
            log.append_line(&format!("{label}\t0")).unwrap();
        }
        assert_eq!(log.count().unwrap(), 7);
    }

    #[test]
    fn test_count_recovers_after_restart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.ins");
        {
            let mut log = InstanceLog::create(&path, false).unwrap();
            for label in 0..5 {
                log.append_line(&format!("{label}\t1")).unwrap();
            }
        }
        let mut reopened = InstanceLog::open_append(&path, false).unwrap();
        assert_eq!(reopened.examples().get(), 0);
        assert_eq!(reopened.count().unwrap(), 5);
        assert_eq!(reopened.examples().get(), 5);

        reopened.append_line("9\t1").unwrap();
        assert_eq!(reopened.count().unwrap(), 6);
    }

    #[test]
    fn test_count_of_missing_log_is_zero() {
        let dir = tempdir().unwrap();
        let mut log = InstanceLog::open_read(dir.path().join("absent.ins"));
        assert_eq!(log.count().unwrap(), 0);
    }

    #[test]
    fn test_close_is_idempotent_and_blocks_appends() {
        let dir = tempdir().unwrap();
        let mut log = InstanceLog::create(dir.path().join("m.ins"), false).unwrap();
        log.close().unwrap();
        log.close().unwrap();
        assert!(!log.is_open());

        let err = log.append_line("1\t0").unwrap_err();
        assert!(matches!(err, CatlinError::WriterClosed { .. }));
        assert!(err.is_io());
    }

    #[test]
    fn test_lines_are_numbered_from_one() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.ins");
        fs::write(&path, "1\t0\r\n\n2\t1").unwrap();
        let lines = InstanceLog::open_read(&path)
            .lines()
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(
            lines,
            vec![
                (1, "1\t0".to_string()),
                (2, String::new()),
                (3, "2\t1".to_string())
            ]
        );
    }

    #[test]
    fn test_delete_removes_file_and_tolerates_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sub/m.ins");
        let mut log = InstanceLog::create(&path, false).unwrap();
        log.append_line("1\t0").unwrap();
        log.delete().unwrap();
        assert!(!path.exists());
        assert_eq!(log.examples().get(), 0);
        log.delete().unwrap();
    }

    #[test]
    fn test_drop_flushes_writer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.ins");
        {
            let mut log = InstanceLog::create(&path, false).unwrap();
            log.append_line("3\t2").unwrap();
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), "3\t2\n");
    }

    #[test]
    fn test_example_count_saturates() {
        let mut count = ExampleCount::new(1);
        count.decrement();
        count.decrement();
        assert_eq!(count.get(), 0);
    }
}

//! Count Command Implementation

use anyhow::{Context, Result};
use catlin_data::{count_by_feature, InstanceLog};
use clap::Args;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Tally the values of feature columns in an instance log
///
/// Prints one `value<TAB>count` line per distinct value, in ascending
/// value order.
///
/// # Example
///
/// ```bash
/// catlin count --log odm0.liblinear.ins --columns 0,2
/// ```
#[derive(Args, Debug, Clone)]
pub struct CountCommand {
    /// Instance log to read
    #[arg(long, short = 'l')]
    pub log: PathBuf,

    /// Feature columns to tally (0-based, label not counted)
    #[arg(long, value_delimiter = ',', required = true)]
    pub columns: Vec<usize>,
}

impl CountCommand {
    /// Execute the count command
    pub fn run(&self) -> Result<BTreeMap<i64, u64>> {
        let log = InstanceLog::open_read(&self.log);
        let counts = count_by_feature(&log, &self.columns)
            .with_context(|| format!("Failed to count {}", self.log.display()))?;
        for (value, count) in &counts {
            println!("{}\t{}", value, count);
        }
        Ok(counts)
    }
}

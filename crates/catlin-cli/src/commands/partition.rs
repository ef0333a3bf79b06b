//! Partition Command Implementation
//!
//! Splits a model's instance log into one sub-log per known value of a
//! feature plus an overflow sub-log, ready to train one sub-model each.

use anyhow::{Context, Result};
use catlin_data::{partition_by_feature, InstanceLog};
use clap::Args;
use std::collections::BTreeSet;
use tracing::info;

use super::ModelArgs;

/// Split an instance log by the value of one feature
///
/// Each sub-log drops the partitioning column. When the model has persisted
/// cardinalities, every sub-model gets a copy without that slot.
///
/// # Example
///
/// ```bash
/// catlin partition --dir /var/lib/parser --model odm0. --feature-index 0 --values 1,2,3
/// ```
#[derive(Args, Debug, Clone)]
pub struct PartitionCommand {
    #[command(flatten)]
    pub artifacts: ModelArgs,

    /// Feature column to partition by (0-based, label not counted)
    #[arg(long, short = 'f')]
    pub feature_index: usize,

    /// Values that get their own sub-log
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub values: Vec<i64>,

    /// Key of the sub-log collecting every other value
    #[arg(long, default_value = "other")]
    pub overflow: String,
}

impl PartitionCommand {
    /// Execute the partition command
    pub fn run(&self) -> Result<()> {
        let files = self.artifacts.files();
        let source = InstanceLog::open_read(files.instance_log());
        if !source.path().exists() {
            anyhow::bail!("Instance log {} does not exist", source.path().display());
        }
        let known: BTreeSet<i64> = self.values.iter().copied().collect();
        let mut parts = partition_by_feature(
            &source,
            self.feature_index,
            &known,
            &self.overflow,
            &files,
        )
        .with_context(|| format!("Failed to partition {}", source.path().display()))?;

        let reduced = catlin_core::Cardinalities::load(files.cardinalities())?
            .map(|cards| cards.without_slot(self.feature_index));
        for (key, log) in parts.iter_mut() {
            let sub = files.partition(&key.to_string());
            if let Some(cards) = &reduced {
                cards.save(sub.cardinalities())?;
            }
            let instances = log.count()?;
            info!(key = %key, log = %log.path().display(), instances, "Sub-log");
            println!("{}\t{}\t{}", key, instances, log.path().display());
        }
        Ok(())
    }
}

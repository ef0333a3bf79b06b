//! Convert Command Implementation
//!
//! Rewrites an instance log into the sparse exchange format read by
//! liblinear's `train`.

use anyhow::{Context, Result};
use catlin_core::Cardinalities;
use catlin_data::convert_log_file;
use clap::Args;
use std::path::PathBuf;
use tracing::info;

/// Convert an instance log to the exchange format
///
/// # Example
///
/// ```bash
/// catlin convert --log odm0.liblinear.ins --cardinalities odm0.liblinear.car --output train.txt
/// ```
#[derive(Args, Debug, Clone)]
pub struct ConvertCommand {
    /// Instance log to read
    #[arg(long, short = 'l')]
    pub log: PathBuf,

    /// Cardinalities file defining the index space
    #[arg(long, short = 'c')]
    pub cardinalities: PathBuf,

    /// Exchange file to write
    #[arg(long, short = 'o')]
    pub output: PathBuf,
}

impl ConvertCommand {
    /// Execute the convert command
    pub fn run(&self) -> Result<()> {
        let cards = Cardinalities::load(&self.cardinalities)?.with_context(|| {
            format!("Cardinalities file {} does not exist", self.cardinalities.display())
        })?;
        let records = convert_log_file(&self.log, &self.output, &cards)
            .with_context(|| format!("Failed to convert {}", self.log.display()))?;
        info!(
            log = %self.log.display(),
            output = %self.output.display(),
            records,
            "Converted instance log"
        );
        Ok(())
    }
}

//! Predict Command Implementation
//!
//! Ranks the classes of a trained model for one feature vector given on
//! the command line.

use anyhow::{Context, Result};
use catlin_core::{Cardinalities, FeatureCode, FeatureSlot, FeatureVector};
use catlin_training::{LinearLearner, RankedPrediction, TopK};
use clap::Args;

use super::{ModelArgs, SolverArgs};

/// Rank classes for one feature vector
///
/// `--codes` lists one entry per slot, separated by commas: a code, a
/// pipe-joined set of codes, or `-` for a null slot (left out of the
/// encoding).
///
/// # Example
///
/// ```bash
/// catlin predict --dir /var/lib/parser --model odm0. --codes "1,2|3,-" --k 3
/// ```
#[derive(Args, Debug, Clone)]
pub struct PredictCommand {
    #[command(flatten)]
    pub artifacts: ModelArgs,

    #[command(flatten)]
    pub solver: SolverArgs,

    /// Slot codes, e.g. "1,2|3,-"
    #[arg(long)]
    pub codes: String,

    /// Number of classes to print (all when omitted)
    #[arg(long, short = 'k')]
    pub k: Option<usize>,

    /// Print the ranking as JSON
    #[arg(long)]
    pub json: bool,
}

impl PredictCommand {
    /// Execute the predict command
    pub fn run(&self) -> Result<RankedPrediction> {
        let mut config = self.solver.learner_config()?;
        config.exclude_nulls = true;
        let cardinalities = self.artifacts.cardinalities()?;
        let fv = parse_codes(&self.codes, &cardinalities)?;

        let mut learner = LinearLearner::classify(self.artifacts.files(), config)?;
        let k = self.k.map_or(TopK::All, TopK::Limit);
        let ranked = learner
            .predict(&fv, k)
            .with_context(|| format!("Failed to predict with model {}", self.artifacts.model))?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&ranked)?);
        } else {
            for entry in ranked.entries() {
                match entry.score {
                    Some(score) => println!("{}\t{}", entry.label, score),
                    None => println!("{}", entry.label),
                }
            }
        }
        Ok(ranked)
    }
}

/// Parses comma-separated slot codes into a feature vector whose slots
/// carry the given cardinalities.
pub fn parse_codes(codes: &str, cardinalities: &Cardinalities) -> Result<FeatureVector> {
    let entries: Vec<&str> = codes.split(',').map(str::trim).collect();
    if entries.len() != cardinalities.len() {
        anyhow::bail!(
            "Expected {} slot codes, got {} in '{}'",
            cardinalities.len(),
            entries.len(),
            codes
        );
    }
    let mut fv = FeatureVector::new();
    for (slot, (entry, &cardinality)) in entries
        .iter()
        .zip(cardinalities.as_slice())
        .enumerate()
    {
        let code = if *entry == "-" {
            FeatureCode::Null(0)
        } else if entry.contains('|') {
            let set = entry
                .split('|')
                .map(|c| parse_code(c, slot))
                .collect::<Result<Vec<_>>>()?;
            FeatureCode::multiple(set)
        } else {
            FeatureCode::Single(parse_code(entry, slot)?)
        };
        fv.push(FeatureSlot::new(format!("slot{}", slot), code, cardinality));
    }
    Ok(fv)
}

fn parse_code(token: &str, slot: usize) -> Result<u32> {
    token
        .trim()
        .parse::<u32>()
        .with_context(|| format!("Invalid code '{}' for slot {}", token, slot))
}

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use matsql_fence::{with_retry, FenceStore, RetryPolicy};
use matsql_types::{Fence, KeyRange, MaterializationName};
use serde::Serialize;

use crate::config;

#[derive(Subcommand)]
pub enum FenceCommand {
    /// Claim a key range, fencing off its current holders
    Claim {
        #[command(flatten)]
        target: Target,
        /// Fence for a range that has never been claimed
        #[arg(long, default_value_t = 1)]
        initial_fence: i64,
        /// Checkpoint for a range that has never been claimed
        #[arg(long, default_value = "")]
        initial_checkpoint: String,
    },
    /// Commit a checkpoint under a previously claimed fence
    Commit {
        #[command(flatten)]
        target: Target,
        /// Fence returned by `claim`
        #[arg(long)]
        fence: i64,
        /// Checkpoint contents
        #[arg(long)]
        checkpoint: String,
    },
    /// List stored key ranges of a materialization
    List {
        /// Materialization name
        #[arg(short, long)]
        materialization: String,
    },
}

/// A key range of one materialization.
#[derive(Args)]
pub struct Target {
    /// Materialization name
    #[arg(short, long)]
    materialization: String,
    /// First key of the range, in hex
    #[arg(long, default_value = "00000000", value_parser = parse_key)]
    key_begin: u32,
    /// Last key of the range (inclusive), in hex
    #[arg(long, default_value = "ffffffff", value_parser = parse_key)]
    key_end: u32,
}

impl Target {
    fn resolve(&self) -> Result<(MaterializationName, KeyRange)> {
        let range = KeyRange::new(self.key_begin, self.key_end)?;
        Ok((MaterializationName::new(self.materialization.as_str()), range))
    }
}

fn parse_key(s: &str) -> Result<u32, String> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u32::from_str_radix(digits, 16).map_err(|e| format!("invalid hex key '{s}': {e}"))
}

/// Printable form of a stored fence.
#[derive(Debug, Serialize, PartialEq, Eq)]
struct FenceView {
    materialization: String,
    key_begin: String,
    key_end: String,
    fence: i64,
    checkpoint: String,
}

impl From<&Fence> for FenceView {
    fn from(f: &Fence) -> Self {
        Self {
            materialization: f.materialization.to_string(),
            key_begin: format!("{:08x}", f.range.begin),
            key_end: format!("{:08x}", f.range.end),
            fence: f.fence,
            checkpoint: String::from_utf8_lossy(&f.checkpoint).into_owned(),
        }
    }
}

/// Execute a `fence` subcommand against the configured checkpoint table.
pub fn execute(config_path: &Path, command: &FenceCommand) -> Result<()> {
    let config = config::parse_config(config_path)
        .with_context(|| format!("Failed to load config: {}", config_path.display()))?;
    let store = config
        .checkpoints
        .context("Config has no `checkpoints` section")?
        .open()?;

    let output = run(store.as_ref(), command, &RetryPolicy::default())?;
    println!("{output}");
    Ok(())
}

/// Run `command` on `store`, returning its JSON output.
fn run(store: &dyn FenceStore, command: &FenceCommand, policy: &RetryPolicy) -> Result<String> {
    let json = match command {
        FenceCommand::Claim {
            target,
            initial_fence,
            initial_checkpoint,
        } => {
            let (materialization, range) = target.resolve()?;
            let fence = with_retry(policy, || {
                store.claim(
                    &materialization,
                    range,
                    *initial_fence,
                    initial_checkpoint.as_bytes(),
                )
            })
            .context("Claim failed")?;
            tracing::info!(
                materialization = %materialization,
                range = %range,
                fence = fence.fence,
                "Claimed key range"
            );
            serde_json::to_string_pretty(&FenceView::from(&fence))?
        }
        FenceCommand::Commit {
            target,
            fence,
            checkpoint,
        } => {
            let (materialization, range) = target.resolve()?;
            with_retry(policy, || {
                store.commit(&materialization, range, *fence, checkpoint.as_bytes())
            })
            .context("Commit failed")?;
            tracing::info!(
                materialization = %materialization,
                range = %range,
                fence,
                "Committed checkpoint"
            );
            serde_json::to_string_pretty(&serde_json::json!({ "committed": true }))?
        }
        FenceCommand::List { materialization } => {
            let fences = with_retry(policy, || {
                store.list(&MaterializationName::new(materialization.as_str()))
            })
            .context("Listing fences failed")?;
            let views: Vec<FenceView> = fences.iter().map(FenceView::from).collect();
            serde_json::to_string_pretty(&views)?
        }
    };
    Ok(json)
}

mod commands;
mod config;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::fence::FenceCommand;

#[derive(Parser)]
#[command(
    name = "matsql",
    version,
    about = "Binding validation and write fencing for SQL materializations"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate proposed bindings against a destination snapshot
    Validate {
        /// Path to matsql YAML config
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Claim, commit, or inspect checkpoint table fences
    Fence {
        /// Path to matsql YAML config
        #[arg(short, long)]
        config: PathBuf,
        #[command(subcommand)]
        command: FenceCommand,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Validate { config } => commands::validate::execute(&config),
        Commands::Fence { config, command } => commands::fence::execute(&config, &command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_fence_claim() {
        let cli = Cli::try_parse_from([
            "matsql",
            "fence",
            "--config",
            "matsql.yaml",
            "claim",
            "-m",
            "acme/mat",
            "--key-end",
            "7fffffff",
        ])
        .unwrap();
        let Commands::Fence {
            command: FenceCommand::Claim { initial_fence, .. },
            ..
        } = cli.command
        else {
            panic!("expected fence claim");
        };
        assert_eq!(initial_fence, 1);
    }
}

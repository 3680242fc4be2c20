//! Cook CLI - markup cooking pipeline.
//!
//! Provides commands for:
//! - `render`: Cook a markup file (or stdin) to sanitized HTML
//! - `features`: List built-in features and which are enabled

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{FeaturesArgs, RenderArgs};
use output::Output;

/// Cook - extensible markup cooking pipeline.
#[derive(Parser)]
#[command(name = "cook", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cook markup to sanitized HTML.
    Render(RenderArgs),
    /// List built-in features.
    Features(FeaturesArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let verbose = matches!(&cli.command, Commands::Render(args) if args.verbose);
    let filter = if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Render(args) => args.execute(),
        Commands::Features(args) => args.execute(),
    };

    if let Err(err) = result {
        output.error(&err);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_render_flags() {
        let cli = Cli::try_parse_from([
            "cook",
            "render",
            "post.md",
            "--preview",
            "-f",
            "math",
            "--feature",
            "spoiler",
            "-v",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Render(args) if args.verbose));
    }

    #[test]
    fn test_parse_features() {
        let cli = Cli::try_parse_from(["cook", "features"]).unwrap();
        assert!(matches!(cli.command, Commands::Features(_)));
    }
}

//! `cook features` command implementation.

use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use cook_config::Config;
use cook_engine::features::BUILTIN_FEATURES;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the features command.
#[derive(Args)]
pub(crate) struct FeaturesArgs {
    /// Path to configuration file (default: auto-discover cook.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl FeaturesArgs {
    /// List built-in features, marking the ones the configuration enables.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let config = Config::load(self.config.as_deref(), None)?;
        let context = config.render_context()?;

        match &config.config_path {
            Some(path) => output.heading(&format!("Features enabled by {}", path.display())),
            None => output.heading("Features enabled by default"),
        }

        let mut stdout = std::io::stdout().lock();
        for name in BUILTIN_FEATURES {
            let marker = if context.features.is_enabled(name) { '*' } else { ' ' };
            writeln!(stdout, "{marker} {name}")?;
        }
        output.hint("(* = enabled)");
        Ok(())
    }
}

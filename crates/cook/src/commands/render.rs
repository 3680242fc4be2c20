//! `cook render` command implementation.

use std::io::{Read, Write};
use std::path::PathBuf;

use clap::Args;
use cook_config::{CliSettings, Config};
use cook_engine::features::BUILTIN_FEATURES;
use cook_engine::{CookEnv, Engine};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the render command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Markup file to cook (default: read stdin).
    file: Option<PathBuf>,

    /// Path to configuration file (default: auto-discover cook.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Render for the composer preview.
    #[arg(long)]
    preview: bool,

    /// Enable a feature in addition to the configured ones.
    #[arg(short, long = "feature", value_name = "NAME")]
    features: Vec<String>,

    /// Disable HTML sanitization. Only for trusted input.
    #[arg(long)]
    no_sanitize: bool,

    /// Enable verbose output (engine build and cook logs).
    #[arg(short, long)]
    pub verbose: bool,
}

impl RenderArgs {
    /// Execute the render command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails, the engine cannot be built,
    /// or input/output fails.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            features: self.features,
            sanitize: self.no_sanitize.then_some(false),
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        if let Some(path) = &config.config_path {
            tracing::info!(path = %path.display(), "Loaded configuration");
        }

        let context = config.render_context()?;
        for name in context.features.iter() {
            if !BUILTIN_FEATURES.contains(&name) {
                output.warning(&format!("Unknown feature `{name}` ignored"));
            }
        }
        if !context.sanitize {
            output.warning("HTML sanitization is disabled");
        }

        let raw = read_input(self.file.as_ref())?;
        let engine = Engine::new(context)?;
        let env = if self.preview {
            CookEnv::preview()
        } else {
            CookEnv::default()
        };
        let html = engine.cook_with(&raw, &env);

        let mut stdout = std::io::stdout().lock();
        stdout.write_all(html.as_bytes())?;
        stdout.write_all(b"\n")?;
        stdout.flush()?;
        Ok(())
    }
}

/// Read markup from a file, or from stdin when no file (or `-`) is given.
fn read_input(file: Option<&PathBuf>) -> Result<String, CliError> {
    match file {
        Some(path) if path.as_os_str() != "-" => {
            tracing::info!(path = %path.display(), "Reading markup");
            Ok(std::fs::read_to_string(path)?)
        }
        _ => {
            let mut raw = String::new();
            std::io::stdin().lock().read_to_string(&mut raw)?;
            Ok(raw)
        }
    }
}

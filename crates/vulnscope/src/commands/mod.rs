//! CLI command handlers.

pub mod check;
pub mod config;
pub mod start;

use std::path::PathBuf;

use anyhow::Result;
use vulnscope_config::LoadedConfig;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Extra config file from `--config`.
    pub config_path: Option<PathBuf>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Load the layered configuration and surface its warnings.
    pub fn load_config(&self) -> Result<LoadedConfig> {
        let loaded =
            vulnscope_config::load_config_with_options(None, None, self.config_path.as_deref())?;

        for warning in &loaded.warnings {
            eprintln!("warning: {}", warning);
        }

        if self.verbose && !self.json_output {
            let sources = loaded.loaded_from();
            if sources.is_empty() {
                println!("No config files found, using defaults");
            }
            for source in sources {
                println!("Loaded config: {}", source.display());
            }
            for var in &loaded.env_overrides {
                println!("Override from environment: {}", var);
            }
        }

        Ok(loaded)
    }
}

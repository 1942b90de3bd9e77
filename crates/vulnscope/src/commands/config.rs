//! Config command - configuration inspection and secrets.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: Option<ConfigCommand>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration with secrets redacted (default)
    Show,

    /// Show which config files are consulted and which were loaded
    Which,

    /// Show the user configuration file path
    Path,

    /// Store the engine API key in the system keyring
    SetSecret {
        /// Secret id (defaults to engine.secret_id)
        #[arg(long)]
        secret_id: Option<String>,
    },
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command.unwrap_or(ConfigCommand::Show) {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(ctx),
        ConfigCommand::Path => cmd_path(ctx),
        ConfigCommand::SetSecret { secret_id } => cmd_set_secret(ctx, secret_id),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&loaded.config.redacted())?);
        return Ok(());
    }

    let redacted = loaded.config.to_toml_redacted()?;

    println!("# Effective vulnscope configuration\n");
    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("# No config files loaded (using defaults)");
    }
    for source in sources {
        println!("# from {}", source.display());
    }
    for var in &loaded.env_overrides {
        println!("# env {}", var);
    }
    println!();
    print!("{}", redacted);
    Ok(())
}

fn cmd_which(ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;

    if ctx.json_output {
        let sources: Vec<_> = loaded
            .sources
            .iter()
            .map(|s| serde_json::json!({"path": s.path, "loaded": s.loaded}))
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "sources": sources,
                "env_overrides": loaded.env_overrides,
            }))?
        );
        return Ok(());
    }

    for source in &loaded.sources {
        let mark = if source.loaded { "loaded" } else { "absent" };
        println!("{:>7}  {}", mark, source.path.display());
    }
    for var in &loaded.env_overrides {
        println!("{:>7}  {}", "env", var);
    }
    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    let Some(path) = vulnscope_config::xdg_config_path() else {
        bail!("could not determine the user config directory");
    };
    if ctx.json_output {
        println!("{}", serde_json::json!({"path": path}));
    } else {
        println!("{}", path.display());
    }
    Ok(())
}

fn cmd_set_secret(ctx: &Context, secret_id: Option<String>) -> Result<()> {
    let secret_id = match secret_id {
        Some(id) => id,
        None => ctx.load_config()?.config.engine().secret_id,
    };

    let value = rpassword::prompt_password(format!("Value for '{}': ", secret_id))?;
    let value = value.trim();
    if value.is_empty() {
        bail!("no value entered");
    }

    vulnscope_config::store_in_keyring(&secret_id, value).map_err(anyhow::Error::msg)?;
    println!("Stored '{}' in the system keyring", secret_id);
    Ok(())
}

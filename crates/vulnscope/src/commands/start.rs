//! Start command - runs the HTTP server.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Args;

use vulnscope_config::VulnscopeConfig;
use vulnscope_server::{Server, ServerConfig};

use super::Context;
use crate::runtime;

/// Arguments for the start command.
///
/// CLI arguments override config file and environment values.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Address to bind to (overrides config)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// SQLite warehouse database (overrides config)
    #[arg(long, value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Directory for generated reports (overrides config)
    #[arg(long, value_name = "DIR")]
    pub reports_dir: Option<PathBuf>,

    /// Bearer token required on /v1 routes
    #[arg(long, env = "VULNSCOPE_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

impl StartArgs {
    fn apply(&self, config: &mut VulnscopeConfig) {
        if let Some(ref bind) = self.bind {
            config.server_mut().bind = bind.clone();
        }
        if let Some(port) = self.port {
            config.server_mut().port = port;
        }
        if let Some(ref db) = self.database {
            config.warehouse_mut().database = Some(db.clone());
        }
        if let Some(ref dir) = self.reports_dir {
            config.reports_mut().output_dir = Some(dir.clone());
        }
        if let Some(ref token) = self.token {
            config.server_mut().auth_token = Some(token.clone());
        }
    }
}

/// Socket address from the `[server]` section.
pub fn bind_address(config: &VulnscopeConfig) -> Result<SocketAddr> {
    let server = config.server();
    let ip: IpAddr = server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", server.bind))?;
    Ok(SocketAddr::new(ip, server.port))
}

fn link_base(addr: SocketAddr) -> String {
    format!("http://{}", addr)
}

/// Run the start command.
pub async fn run(args: StartArgs, ctx: &Context) -> Result<()> {
    let mut loaded = ctx.load_config()?;
    args.apply(&mut loaded.config);
    let config = &loaded.config;

    let engine = config.engine();
    let secret = runtime::resolve_secret(&engine)?;
    if ctx.verbose {
        println!("Backend: {}", engine.backend);
        println!("Model: {}", engine.model);
        println!("API key from: {}", secret.source);
    }
    let backend = runtime::create_backend(&engine, &secret.value)?;

    let addr = bind_address(config)?;
    let runtime::Runtime {
        orchestrator,
        links,
        audit_worker,
    } = runtime::build(config, backend, &link_base(addr)).await?;

    let server_section = config.server();
    let server_config = ServerConfig::new(server_section.auth_token.clone())
        .with_bind_address(addr)
        .with_rate_limiting(server_section.rate_limiting)
        .with_api_rpm(server_section.api_rpm)
        .with_request_logging(server_section.request_logging);

    if ctx.verbose {
        match server_config.auth_token {
            Some(_) => println!("Auth: bearer token required"),
            None => println!("Auth: disabled"),
        }
    }

    println!("vulnscope server starting on http://{}", addr);
    println!("Press Ctrl+C to stop");

    Server::new(orchestrator, links, server_config).run().await?;

    // The orchestrator is gone, so the audit queue is closed; let it drain.
    if let Some(worker) = audit_worker
        && tokio::time::timeout(Duration::from_secs(5), worker)
            .await
            .is_err()
    {
        eprintln!("warning: audit queue did not drain before shutdown");
    }

    Ok(())
}

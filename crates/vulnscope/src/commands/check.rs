//! Check command - verifies configuration, credentials and warehouse access.

use anyhow::{Result, bail};
use clap::Args;
use serde::Serialize;

use vulnscope_agent::preload_schemas;
use vulnscope_warehouse::{Warehouse, tables};

use super::Context;
use crate::runtime;

/// Arguments for the check command.
#[derive(Args, Debug)]
pub struct CheckArgs {}

#[derive(Debug, Serialize)]
struct CheckReport {
    config_files: Vec<String>,
    backend: String,
    model: String,
    api_key_source: Option<String>,
    namespace: String,
    tables: Vec<String>,
    schemas_preloaded: bool,
    reports_dir: Option<String>,
    audit_events_table: Option<String>,
    audit_sql_table: Option<String>,
    problems: Vec<String>,
}

/// Run the check command.
pub async fn run(_args: CheckArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let config = &loaded.config;
    let engine = config.engine();
    let warehouse_config = config.warehouse();
    let audit = config.audit();
    let mut problems = Vec::new();

    let api_key_source = match runtime::resolve_secret(&engine) {
        Ok(secret) => Some(secret.source.to_string()),
        Err(e) => {
            problems.push(format!("{e:#}"));
            None
        }
    };

    let namespace = tables::NAMESPACE.to_string();
    let (tables, schemas_preloaded) = match runtime::open_warehouse(&warehouse_config) {
        Ok(warehouse) => {
            let tables = match warehouse.list_tables(&namespace).await {
                Ok(tables) => tables,
                Err(e) => {
                    problems.push(format!("failed to list tables: {e}"));
                    Vec::new()
                }
            };
            let preloaded = !preload_schemas(&warehouse).await.is_empty();
            if !preloaded {
                problems.push("core table schemas could not be loaded".to_string());
            }
            (tables, preloaded)
        }
        Err(e) => {
            problems.push(format!("{e:#}"));
            (Vec::new(), false)
        }
    };

    let report = CheckReport {
        config_files: loaded
            .loaded_from()
            .iter()
            .map(|p| p.display().to_string())
            .collect(),
        backend: engine.backend.to_string(),
        model: engine.model.clone(),
        api_key_source,
        namespace,
        tables,
        schemas_preloaded,
        reports_dir: config
            .reports()
            .output_dir
            .map(|d| d.display().to_string()),
        audit_events_table: audit.events_table,
        audit_sql_table: audit.sql_table,
        problems,
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if !report.problems.is_empty() {
        bail!("{} problem(s) found", report.problems.len());
    }
    Ok(())
}

fn print_report(report: &CheckReport) {
    let or_none = |v: &Option<String>| v.clone().unwrap_or_else(|| "(not set)".to_string());

    if report.config_files.is_empty() {
        println!("Config:       defaults");
    } else {
        println!("Config:       {}", report.config_files.join(", "));
    }
    println!("Backend:      {} ({})", report.backend, report.model);
    println!("API key:      {}", or_none(&report.api_key_source));
    println!("Namespace:    {}", report.namespace);
    println!("Tables:       {}", report.tables.len());
    println!(
        "Schemas:      {}",
        if report.schemas_preloaded { "preloaded" } else { "missing" }
    );
    println!("Reports dir:  {}", or_none(&report.reports_dir));
    println!("Audit events: {}", or_none(&report.audit_events_table));
    println!("Audit SQL:    {}", or_none(&report.audit_sql_table));

    for problem in &report.problems {
        eprintln!("error: {}", problem);
    }
}

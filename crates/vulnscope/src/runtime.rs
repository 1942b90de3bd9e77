//! Startup wiring: secret → backend → warehouse → reports → audit →
//! schema preload → orchestrator.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use tokio::task::JoinHandle;

use vulnscope_agent::{
    AuditRecorder, AuditSink, CompactorConfig, Orchestrator, QueryValidator, WarehouseAuditSink,
    build_system_prompt, preload_schemas, tools,
};
use vulnscope_config::{Backend, EngineConfig, ResolvedSecret, VulnscopeConfig, WarehouseConfig};
use vulnscope_llm::{GeminiBackend, GeminiConfig, OpenAiBackend, OpenAiConfig, SharedBackend};
use vulnscope_reports::{LinkIssuer, ReportGenerator};
use vulnscope_warehouse::{SharedWarehouse, SqliteWarehouse, tables};

/// Everything the server needs, built once at startup.
pub struct Runtime {
    pub orchestrator: Orchestrator,
    pub links: Arc<LinkIssuer>,
    /// Audit drain task, when any audit channel is configured.
    pub audit_worker: Option<JoinHandle<()>>,
}

/// Resolve the engine API key, naming every place that was searched on failure.
pub fn resolve_secret(engine: &EngineConfig) -> Result<ResolvedSecret> {
    vulnscope_config::resolve_api_key(engine).with_context(|| {
        format!(
            "no API key for {}. Use 'vulnscope config set-secret', set {}, or add engine.api_key",
            engine.backend,
            engine.backend.env_var()
        )
    })
}

/// Create the reasoning-engine backend.
pub fn create_backend(engine: &EngineConfig, api_key: &str) -> Result<SharedBackend> {
    let timeout = Duration::from_secs(engine.timeout_secs);
    let backoff = Duration::from_millis(engine.retry_backoff_ms);

    match engine.backend {
        Backend::Gemini => {
            let mut config = GeminiConfig::new(api_key)
                .with_timeout(timeout)
                .with_max_retries(engine.retry_max);
            config.retry_backoff = backoff;
            if let Some(ref url) = engine.base_url {
                config = config.with_base_url(url);
            }
            Ok(Arc::new(GeminiBackend::new(config)?))
        }
        Backend::Openai => {
            let mut config = OpenAiConfig::openai(api_key)
                .with_timeout(timeout)
                .with_max_retries(engine.retry_max);
            config.retry_backoff = backoff;
            if let Some(ref url) = engine.base_url {
                config = config.with_base_url(url);
            }
            Ok(Arc::new(OpenAiBackend::new(config)?))
        }
    }
}

/// Open the configured warehouse, or an empty in-memory one.
pub fn open_warehouse(config: &WarehouseConfig) -> Result<SqliteWarehouse> {
    match config.database {
        Some(ref path) => SqliteWarehouse::open(path, tables::PROJECT, tables::DATASET)
            .with_context(|| format!("failed to open warehouse at {}", path.display())),
        None => {
            tracing::warn!("No warehouse database configured; using an empty in-memory store");
            Ok(SqliteWarehouse::open_in_memory(tables::PROJECT, tables::DATASET)?)
        }
    }
}

/// Audit recorder over the warehouse, disabled when no table is configured.
pub fn start_audit(
    config: &VulnscopeConfig,
    warehouse: SharedWarehouse,
) -> (AuditRecorder, Option<JoinHandle<()>>) {
    let audit = config.audit();
    if audit.events_table.is_none() && audit.sql_table.is_none() {
        tracing::warn!("No audit tables configured; audit logging disabled");
        return (AuditRecorder::disabled(), None);
    }

    let sink: Arc<dyn AuditSink> = Arc::new(WarehouseAuditSink::new(
        warehouse,
        audit.events_table,
        audit.sql_table,
    ));
    let (recorder, handle) = AuditRecorder::spawn(sink, audit.queue_capacity);
    (recorder, Some(handle))
}

/// Build the orchestrator and everything behind it.
///
/// `link_base` is the public root under which `/reports/{token}` is served.
pub async fn build(
    config: &VulnscopeConfig,
    backend: SharedBackend,
    link_base: &str,
) -> Result<Runtime> {
    let engine = config.engine();
    let warehouse_config = config.warehouse();
    let reports_config = config.reports();
    let agent_config = config.agent();

    let warehouse: SharedWarehouse = Arc::new(open_warehouse(&warehouse_config)?);

    let links = Arc::new(LinkIssuer::new(
        reports_config.base_url.as_deref().unwrap_or(link_base),
    ));
    if reports_config.output_dir.is_none() {
        tracing::warn!("No report output directory configured; report tools will fail");
    }
    let reports = Arc::new(
        ReportGenerator::new(warehouse.clone(), links.clone())
            .with_output_dir(reports_config.output_dir.clone())
            .with_concurrency(reports_config.concurrency),
    );

    let (audit, audit_worker) = start_audit(config, warehouse.clone());

    let schemas = preload_schemas(warehouse.as_ref()).await;
    let system_prompt = build_system_prompt(&schemas);

    let compactor = CompactorConfig {
        model: engine.summary_model.clone(),
        threshold: agent_config.compaction_threshold,
        ..CompactorConfig::default()
    };

    let orchestrator = Orchestrator::builder()
        .with_shared_backend(backend)
        .with_tools(tools::registry(warehouse, reports))
        .with_validator(QueryValidator::new(tables::NAMESPACE))
        .with_compactor_config(compactor)
        .with_audit(audit)
        .with_model(engine.model.clone())
        .with_system_prompt(system_prompt)
        .with_max_iterations(agent_config.max_iterations)
        .build()?;

    tracing::info!(
        model = %engine.model,
        namespace = tables::NAMESPACE,
        tools = orchestrator.tools().len(),
        "Orchestrator ready"
    );

    Ok(Runtime {
        orchestrator,
        links,
        audit_worker,
    })
}

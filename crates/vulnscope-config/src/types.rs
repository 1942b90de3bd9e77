//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [engine]      # reasoning engine: backend, models, credentials
//! [warehouse]   # database file
//! [reports]     # artifact directory and link base URL
//! [audit]       # audit tables
//! [agent]       # tool-call loop bounds
//! [server]      # bind address, rate limit, auth
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::Result;

pub mod defaults {
    pub const BIND: &str = "127.0.0.1";
    pub const PORT: u16 = 8080;
    pub const REQUESTS_PER_MINUTE: u32 = 120;
    pub const MODEL: &str = "gemini-2.5-flash";
    pub const SUMMARY_MODEL: &str = "gemini-2.5-flash-lite";
    pub const SECRET_ID: &str = "gemini_api_key";
    pub const MAX_ITERATIONS: u32 = 10;
    pub const REPORT_CONCURRENCY: usize = 20;
    pub const AUDIT_QUEUE_CAPACITY: usize = 1024;
}

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g. project-local
/// overrides) can be loaded and merged. Accessors fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VulnscopeConfig {
    pub engine: Option<EngineConfig>,
    pub warehouse: Option<WarehouseConfig>,
    pub reports: Option<ReportsConfig>,
    pub audit: Option<AuditConfig>,
    pub agent: Option<AgentConfig>,
    pub server: Option<ServerConfig>,
}

impl VulnscopeConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// TOML with every credential replaced by a marker.
    pub fn to_toml_redacted(&self) -> Result<String> {
        self.redacted().to_toml()
    }

    /// Copy with every credential replaced by a marker.
    pub fn redacted(&self) -> Self {
        let mut redacted = self.clone();
        if let Some(engine) = redacted.engine.as_mut()
            && engine.api_key.is_some()
        {
            engine.api_key = Some(REDACTED.to_string());
        }
        if let Some(server) = redacted.server.as_mut()
            && server.auth_token.is_some()
        {
            server.auth_token = Some(REDACTED.to_string());
        }
        redacted
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: VulnscopeConfig) {
        if other.engine.is_some() {
            self.engine = other.engine;
        }
        if other.warehouse.is_some() {
            self.warehouse = other.warehouse;
        }
        if other.reports.is_some() {
            self.reports = other.reports;
        }
        if other.audit.is_some() {
            self.audit = other.audit;
        }
        if other.agent.is_some() {
            self.agent = other.agent;
        }
        if other.server.is_some() {
            self.server = other.server;
        }
    }

    pub fn engine(&self) -> EngineConfig {
        self.engine.clone().unwrap_or_default()
    }

    pub fn warehouse(&self) -> WarehouseConfig {
        self.warehouse.clone().unwrap_or_default()
    }

    pub fn reports(&self) -> ReportsConfig {
        self.reports.clone().unwrap_or_default()
    }

    pub fn audit(&self) -> AuditConfig {
        self.audit.clone().unwrap_or_default()
    }

    pub fn agent(&self) -> AgentConfig {
        self.agent.clone().unwrap_or_default()
    }

    pub fn server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    pub fn engine_mut(&mut self) -> &mut EngineConfig {
        self.engine.get_or_insert_with(Default::default)
    }

    pub fn warehouse_mut(&mut self) -> &mut WarehouseConfig {
        self.warehouse.get_or_insert_with(Default::default)
    }

    pub fn reports_mut(&mut self) -> &mut ReportsConfig {
        self.reports.get_or_insert_with(Default::default)
    }

    pub fn audit_mut(&mut self) -> &mut AuditConfig {
        self.audit.get_or_insert_with(Default::default)
    }

    pub fn server_mut(&mut self) -> &mut ServerConfig {
        self.server.get_or_insert_with(Default::default)
    }
}

const REDACTED: &str = "<redacted>";

// ─────────────────────────────────────────────────────────────────────────────
// Engine Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Supported reasoning-engine backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Gemini,
    Openai,
}

impl Backend {
    /// Environment variable name for this backend's API key.
    pub fn env_var(&self) -> &'static str {
        match self {
            Backend::Gemini => "GEMINI_API_KEY",
            Backend::Openai => "OPENAI_API_KEY",
        }
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Backend::Gemini => "Gemini",
            Backend::Openai => "OpenAI",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Reasoning-engine settings.
///
/// ```toml
/// [engine]
/// backend = "gemini"
/// model = "gemini-2.5-flash"
/// summary_model = "gemini-2.5-flash-lite"
/// secret_id = "gemini_api_key"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub backend: Backend,
    /// Model for the tool-call loop.
    pub model: String,
    /// Model for history summaries.
    pub summary_model: String,
    /// Override the backend's API endpoint.
    pub base_url: Option<String>,
    /// Name the API key is stored under.
    pub secret_id: String,
    /// Directory holding one file per secret id.
    pub secrets_dir: Option<PathBuf>,
    /// Plaintext API key. Prefer the keyring, env or a secret file.
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub retry_max: u32,
    pub retry_backoff_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            model: defaults::MODEL.to_string(),
            summary_model: defaults::SUMMARY_MODEL.to_string(),
            base_url: None,
            secret_id: defaults::SECRET_ID.to_string(),
            secrets_dir: None,
            api_key: None,
            timeout_secs: 300,
            retry_max: 3,
            retry_backoff_ms: 500,
        }
    }
}

impl EngineConfig {
    pub fn has_plaintext_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Warehouse, Reports, Audit
// ─────────────────────────────────────────────────────────────────────────────

/// Warehouse location. Tables always live under the `gostlm.gost_bq`
/// namespace that queries, prompts and reports name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    /// SQLite database file. In-memory when unset.
    pub database: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportsConfig {
    /// Where report artifacts are written. Report tools fail when unset.
    pub output_dir: Option<PathBuf>,
    /// Public base URL for download links. Derived from the bind address
    /// when unset.
    pub base_url: Option<String>,
    /// Report queries in flight at once.
    pub concurrency: usize,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            base_url: None,
            concurrency: defaults::REPORT_CONCURRENCY,
        }
    }
}

/// Audit tables. An unset table disables that channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Tool-call and final-answer events.
    pub events_table: Option<String>,
    /// Legacy table holding executed SQL.
    pub sql_table: Option<String>,
    pub queue_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            events_table: None,
            sql_table: None,
            queue_capacity: defaults::AUDIT_QUEUE_CAPACITY,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent & Server
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Tool round-trips per request before failing.
    pub max_iterations: u32,
    /// Compact histories longer than this.
    pub compaction_threshold: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: defaults::MAX_ITERATIONS,
            compaction_threshold: 10,
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on.
    pub port: u16,
    /// Address to bind to.
    pub bind: String,
    /// Enable rate limiting.
    pub rate_limiting: bool,
    /// API rate limit: requests per minute.
    pub api_rpm: u32,
    /// Enable request logging.
    pub request_logging: bool,
    /// Bearer token required on API routes. Auth is off when unset.
    pub auth_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: defaults::PORT,
            bind: defaults::BIND.to_string(),
            rate_limiting: true,
            api_rpm: defaults::REQUESTS_PER_MINUTE,
            request_logging: true,
            auth_token: None,
        }
    }
}

//! Deployment environment variables layered over file configuration.
//!
//! | Variable | Field |
//! |----------|-------|
//! | `GOOGLE_APPLICATION_CREDENTIALS` | `warehouse.database` |
//! | `GEMINI_MODEL` | `engine.model` |
//! | `GEMINI_SECRET_ID` | `engine.secret_id` |
//! | `BG_AUDIT_LOG_TABLE` | `audit.sql_table` |
//! | `BG_AUDIT_LOG_TABLE_EVENTS` | `audit.events_table` |
//! | `GCS_BUCKET_NAME` | `reports.output_dir` |
//!
//! Empty values are ignored.

use std::path::PathBuf;

use crate::VulnscopeConfig;

pub const GEMINI_MODEL: &str = "GEMINI_MODEL";
pub const GEMINI_SECRET_ID: &str = "GEMINI_SECRET_ID";
pub const AUDIT_SQL_TABLE: &str = "BG_AUDIT_LOG_TABLE";
pub const AUDIT_EVENTS_TABLE: &str = "BG_AUDIT_LOG_TABLE_EVENTS";
pub const REPORTS_DIR: &str = "GCS_BUCKET_NAME";
pub const WAREHOUSE_DATABASE: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Apply overrides from the process environment.
pub fn apply_env_overrides(config: &mut VulnscopeConfig) -> Vec<&'static str> {
    apply_env_overrides_from(config, |name| std::env::var(name).ok())
}

/// Apply overrides using `lookup`. Returns the variables that took effect.
pub fn apply_env_overrides_from<F>(config: &mut VulnscopeConfig, lookup: F) -> Vec<&'static str>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
    let mut applied = Vec::new();

    if let Some(v) = get(WAREHOUSE_DATABASE) {
        config.warehouse_mut().database = Some(PathBuf::from(v));
        applied.push(WAREHOUSE_DATABASE);
    }
    if let Some(v) = get(GEMINI_MODEL) {
        config.engine_mut().model = v;
        applied.push(GEMINI_MODEL);
    }
    if let Some(v) = get(GEMINI_SECRET_ID) {
        config.engine_mut().secret_id = v;
        applied.push(GEMINI_SECRET_ID);
    }
    if let Some(v) = get(AUDIT_SQL_TABLE) {
        config.audit_mut().sql_table = Some(v);
        applied.push(AUDIT_SQL_TABLE);
    }
    if let Some(v) = get(AUDIT_EVENTS_TABLE) {
        config.audit_mut().events_table = Some(v);
        applied.push(AUDIT_EVENTS_TABLE);
    }
    if let Some(v) = get(REPORTS_DIR) {
        config.reports_mut().output_dir = Some(PathBuf::from(v));
        applied.push(REPORTS_DIR);
    }

    applied
}

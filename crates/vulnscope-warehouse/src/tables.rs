//! Fully-qualified names of the vulnerability tables.
//!
//! Every name lives under the `gostlm.gost_bq` namespace. The report
//! catalog and the system prompt refer to tables only through these.

/// Default project identifier.
pub const PROJECT: &str = "gostlm";

/// Default dataset identifier.
pub const DATASET: &str = "gost_bq";

/// `project.dataset` prefix every query must reference.
pub const NAMESPACE: &str = "gostlm.gost_bq";

pub const VULNERABILITIES_MASTER: &str = "gostlm.gost_bq.vulnerabilities_master";
pub const VULNERABILITIES: &str = "gostlm.gost_bq.vulnerabilities_light";
pub const GLOBAL_SEVERITY: &str = "gostlm.gost_bq.global_severity_state_service";
pub const MARKET_SEVERITY: &str = "gostlm.gost_bq.markets_severity_state_service";
pub const GLOBAL_KPI: &str = "gostlm.gost_bq.global_kpi_summary";
pub const MARKET_KPI: &str = "gostlm.gost_bq.market_kpi_summary";
pub const TIME_TO_OVERDUE: &str = "gostlm.gost_bq.vulnerabilities_time_to_overdue";
pub const GLOBAL_CURRENT_RISK: &str = "gostlm.gost_bq.global_current_risk_summary";
pub const MARKET_CURRENT_RISK: &str = "gostlm.gost_bq.market_current_risk_summary";
pub const STATE_CLOSED: &str = "gostlm.gost_bq.state_closed";
pub const STATE_OPEN: &str = "gostlm.gost_bq.state_open";
pub const STATE_PARKED: &str = "gostlm.gost_bq.state_parked";
pub const STATE_VALIDATING: &str = "gostlm.gost_bq.state_validating";
pub const UPDATE_HISTORY: &str = "gostlm.gost_bq.update_history";

/// Every catalogued table, in prompt order.
pub const ALL: &[&str] = &[
    VULNERABILITIES_MASTER,
    VULNERABILITIES,
    GLOBAL_SEVERITY,
    MARKET_SEVERITY,
    GLOBAL_KPI,
    MARKET_KPI,
    TIME_TO_OVERDUE,
    GLOBAL_CURRENT_RISK,
    MARKET_CURRENT_RISK,
    STATE_CLOSED,
    STATE_OPEN,
    STATE_PARKED,
    STATE_VALIDATING,
    UPDATE_HISTORY,
];

/// Strip the `project.dataset.` prefix from a catalogued name.
pub fn short_name(fully_qualified: &str) -> &str {
    fully_qualified
        .rsplit_once('.')
        .map(|(_, t)| t)
        .unwrap_or(fully_qualified)
}

//! Named report queries.
//!
//! Each query fills one report section, identified by a stable key. Market
//! scoped variants filter on `market LIKE @market`; the global variants run
//! unfiltered against the global summary tables.

use vulnscope_warehouse::QueryParam;
use vulnscope_warehouse::tables::{
    GLOBAL_CURRENT_RISK, GLOBAL_KPI, GLOBAL_SEVERITY, MARKET_CURRENT_RISK, MARKET_KPI,
    MARKET_SEVERITY, STATE_CLOSED, STATE_OPEN, TIME_TO_OVERDUE, UPDATE_HISTORY, VULNERABILITIES,
    VULNERABILITIES_MASTER,
};

/// Days before the SLA deadline at which a vulnerability counts as close to overdue.
pub const CLOSE_TO_OVERDUE_DAYS: i64 = 14;

/// Section keys shared between the catalog and the renderer.
pub mod section {
    pub const LAST_UPDATE: &str = "last_update";
    pub const HIGH_KPI: &str = "high_kpi_details";
    pub const LOW_KPI: &str = "low_kpi_details";
    pub const TOP_AFFECTED: &str = "top_affected";
    pub const RISK_SUMMARY: &str = "risk_summary";
    pub const CLOSE_TO_OVERDUE: &str = "vulns_to_overdue";
    pub const CRITICAL_HIGH_OPEN: &str = "critical_high_open";
    pub const MONTHLY_TREND: &str = "vulns_monthly_trend";
    pub const SERVICE_MONTHLY_TREND: &str = "service_monthly_trend";
    pub const VULN_TYPES: &str = "vuln_types";
    pub const AVG_TIME_CLOSED: &str = "avg_time_closed";
    pub const AVG_TIME_OPEN: &str = "avg_time_open";
    pub const TOTAL_COUNT: &str = "total_vulnerabilities_count";
    pub const OPEN_CLOSED_COUNT: &str = "open_closed_count";
    pub const SEVERITY_COUNT: &str = "severities_count";
    pub const SEVERITY_OPEN_COUNT: &str = "severities_open_count";
    pub const CLOSE_TO_OVERDUE_COUNT: &str = "vulns_close_to_overdue_count";
    pub const CRITICAL_HIGH_OPEN_COUNT: &str = "critical_high_open_count";

    pub const APP_SEVERITY_COUNT: &str = "app_severity_count";
    pub const APP_SEVERITY_SERVICE_COUNT: &str = "app_severity_service_count";
    pub const APP_CURRENT_RISK: &str = "app_current_risk";
    pub const BLACKBOX_CURRENT_RISK: &str = "black_current_risk";
    pub const WHITEBOX_CURRENT_RISK: &str = "white_current_risk";
    pub const RECOMMENDATIONS: &str = "recommendation";
    pub const APP_TOTAL_CURRENT_RISK: &str = "app_tot_current_risk";
    pub const APP_VULN_TYPES_RISK: &str = "app_vuln_types_risk";
}

/// A catalogued query bound to the section it fills.
#[derive(Debug, Clone)]
pub struct NamedQuery {
    pub section: &'static str,
    pub name: String,
    pub sql: String,
    pub params: Vec<QueryParam>,
}

impl NamedQuery {
    fn new(section: &'static str, name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            section,
            name: name.into(),
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    fn with_params(mut self, params: &[QueryParam]) -> Self {
        self.params = params.to_vec();
        self
    }
}

/// True when `market` selects the all-markets report.
pub fn is_global(market: &str) -> bool {
    market.to_lowercase() == "global"
}

fn severity_pivot(value: &str) -> String {
    ["Critical", "High", "Medium", "Low"]
        .iter()
        .map(|s| {
            format!(
                "SUM(CASE WHEN severity = '{s}' THEN {value} ELSE 0 END) AS {}",
                s.to_lowercase()
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn last_update() -> NamedQuery {
    NamedQuery::new(
        section::LAST_UPDATE,
        "LAST_UPDATE",
        format!("SELECT MAX(updated_at) AS last_update FROM `{UPDATE_HISTORY}`"),
    )
}

/// Queries for a market (or `global`) report.
pub fn market_queries(market: &str) -> Vec<NamedQuery> {
    let global = is_global(market);
    let prefix = if global { "GLOBAL" } else { "MARKET" };
    let params = if global {
        Vec::new()
    } else {
        vec![QueryParam::string("market", format!("%{market}%"))]
    };
    // `where_` starts a clause, `and` extends one.
    let (where_, and) = if global {
        (String::new(), String::new())
    } else {
        (
            " WHERE market LIKE @market".to_string(),
            " AND market LIKE @market".to_string(),
        )
    };
    let kpi = if global { GLOBAL_KPI } else { MARKET_KPI };
    let risk = if global { GLOBAL_CURRENT_RISK } else { MARKET_CURRENT_RISK };
    let severity = if global { GLOBAL_SEVERITY } else { MARKET_SEVERITY };
    let n = |name: &str| format!("{prefix}_{name}");

    let top = if global {
        NamedQuery::new(
            section::TOP_AFFECTED,
            "TOP_6_MARKET",
            format!(
                "SELECT market, COUNT(*) AS open_vulnerabilities FROM `{STATE_OPEN}`
                 GROUP BY market ORDER BY open_vulnerabilities DESC, market LIMIT 6"
            ),
        )
    } else {
        NamedQuery::new(
            section::TOP_AFFECTED,
            "TOP_6_ASSET",
            format!(
                "SELECT asset, COUNT(*) AS open_vulnerabilities FROM `{STATE_OPEN}`{where_}
                 GROUP BY asset ORDER BY open_vulnerabilities DESC, asset LIMIT 6"
            ),
        )
    };

    vec![
        last_update(),
        NamedQuery::new(
            section::HIGH_KPI,
            n("KPI_SUMMARY_HIGH"),
            format!("SELECT * FROM `{kpi}`{where_} ORDER BY kpi_score DESC LIMIT 1"),
        ),
        NamedQuery::new(
            section::LOW_KPI,
            n("KPI_SUMMARY_LOW"),
            format!("SELECT * FROM `{kpi}`{where_} ORDER BY kpi_score ASC LIMIT 1"),
        ),
        top,
        NamedQuery::new(
            section::RISK_SUMMARY,
            n("CURRENT_RISK"),
            format!("SELECT * FROM `{risk}`{where_} ORDER BY current_risk DESC"),
        ),
        NamedQuery::new(
            section::CLOSE_TO_OVERDUE,
            n("VULN_CLOSE_OVERDUE"),
            format!(
                "SELECT vuln_id, title, market, asset, severity, days_to_overdue
                 FROM `{TIME_TO_OVERDUE}`
                 WHERE days_to_overdue BETWEEN 0 AND {CLOSE_TO_OVERDUE_DAYS}{and}
                 ORDER BY days_to_overdue LIMIT 20"
            ),
        ),
        NamedQuery::new(
            section::CRITICAL_HIGH_OPEN,
            n("CRITICAL_HIGH_OPEN"),
            format!(
                "SELECT vuln_id, title, market, asset, severity, discovered_date
                 FROM `{STATE_OPEN}` WHERE severity IN ('Critical', 'High'){and}
                 ORDER BY discovered_date LIMIT 20"
            ),
        ),
        NamedQuery::new(
            section::MONTHLY_TREND,
            n("MONTHLY_TREND"),
            format!(
                "SELECT substr(discovered_date, 1, 7) AS month, COUNT(DISTINCT market) AS markets,
                        COUNT(*) AS discovered
                 FROM `{VULNERABILITIES}`{where_} GROUP BY month ORDER BY month"
            ),
        ),
        NamedQuery::new(
            section::SERVICE_MONTHLY_TREND,
            n("SERVICE_MONTHLY_TREND"),
            format!(
                "SELECT substr(discovered_date, 1, 7) AS month, COUNT(*) AS engagements,
                        SUM(CASE WHEN service = 'Black Box' THEN 1 ELSE 0 END) AS black_box,
                        SUM(CASE WHEN service = 'White Box' THEN 1 ELSE 0 END) AS white_box,
                        SUM(CASE WHEN service = 'Adversary Simulation' THEN 1 ELSE 0 END) AS adversary_sim
                 FROM `{VULNERABILITIES}`{where_} GROUP BY month ORDER BY month"
            ),
        ),
        NamedQuery::new(
            section::VULN_TYPES,
            n("VULN_TYPES"),
            format!(
                "SELECT vuln_type, COUNT(*) AS total FROM `{VULNERABILITIES}`{where_}
                 GROUP BY vuln_type ORDER BY total DESC, vuln_type LIMIT 10"
            ),
        ),
        NamedQuery::new(
            section::AVG_TIME_CLOSED,
            n("AVERAGE_TIME_PER_SEVERITY_CLOSED"),
            format!(
                "SELECT severity, sla_days, AVG(days_to_close) AS avg_days
                 FROM `{STATE_CLOSED}`{where_} GROUP BY severity, sla_days ORDER BY sla_days"
            ),
        ),
        NamedQuery::new(
            section::AVG_TIME_OPEN,
            n("AVERAGE_TIME_PER_SEVERITY_OPEN"),
            format!(
                "SELECT severity, sla_days, AVG(days_open) AS avg_days
                 FROM `{STATE_OPEN}`{where_} GROUP BY severity, sla_days ORDER BY sla_days"
            ),
        ),
        NamedQuery::new(
            section::TOTAL_COUNT,
            n("COUNT_TOT_VULNS"),
            format!("SELECT COUNT(*) AS total FROM `{VULNERABILITIES}`{where_}"),
        ),
        NamedQuery::new(
            section::OPEN_CLOSED_COUNT,
            n("COUNT_TOT_VULNS_OPEN_CLOSED"),
            format!(
                "SELECT SUM(CASE WHEN state = 'Open' THEN 1 ELSE 0 END) AS open,
                        SUM(CASE WHEN state = 'Closed' THEN 1 ELSE 0 END) AS closed
                 FROM `{VULNERABILITIES}`{where_}"
            ),
        ),
        NamedQuery::new(
            section::SEVERITY_COUNT,
            n("COUNT_TOT_VULNS_SEVERITY"),
            format!("SELECT {} FROM `{severity}`{where_}", severity_pivot("total")),
        ),
        NamedQuery::new(
            section::SEVERITY_OPEN_COUNT,
            n("COUNT_TOT_VULNS_SEVERITY_OPEN"),
            format!(
                "SELECT {} FROM `{severity}` WHERE state = 'Open'{and}",
                severity_pivot("total")
            ),
        ),
        NamedQuery::new(
            section::CLOSE_TO_OVERDUE_COUNT,
            n("COUNT_VULN_CLOSE_OVERDUE"),
            format!(
                "SELECT COUNT(*) AS close_to_overdue FROM `{TIME_TO_OVERDUE}`
                 WHERE days_to_overdue BETWEEN 0 AND {CLOSE_TO_OVERDUE_DAYS}{and}"
            ),
        ),
        NamedQuery::new(
            section::CRITICAL_HIGH_OPEN_COUNT,
            n("COUNT_CRITICAL_HIGH_OPEN"),
            format!(
                "SELECT COUNT(*) AS critical_high_open FROM `{STATE_OPEN}`
                 WHERE severity IN ('Critical', 'High'){and}"
            ),
        ),
    ]
    .into_iter()
    .map(|q| q.with_params(&params))
    .collect()
}

/// Queries for the application report.
pub fn application_queries() -> Vec<NamedQuery> {
    const APPS: &str = "asset_type = 'Application'";

    let risk_by_severity = |section: &'static str, name: &str, service: Option<&str>| {
        let service = service
            .map(|s| format!(" AND service = '{s}'"))
            .unwrap_or_default();
        NamedQuery::new(
            section,
            name,
            format!(
                "SELECT severity, COUNT(*) AS open_vulnerabilities, SUM(risk_score) AS current_risk
                 FROM `{VULNERABILITIES}` WHERE {APPS} AND state = 'Open'{service}
                 GROUP BY severity ORDER BY current_risk DESC"
            ),
        )
    };

    vec![
        last_update(),
        NamedQuery::new(
            section::VULN_TYPES,
            "APP_VULN_TYPES",
            format!(
                "SELECT vuln_type, COUNT(*) AS total FROM `{VULNERABILITIES}` WHERE {APPS}
                 GROUP BY vuln_type ORDER BY total DESC, vuln_type LIMIT 10"
            ),
        ),
        NamedQuery::new(
            section::TOTAL_COUNT,
            "APP_TOT_VULN_COUNT",
            format!("SELECT COUNT(*) AS total FROM `{VULNERABILITIES}` WHERE {APPS}"),
        ),
        NamedQuery::new(
            section::APP_SEVERITY_COUNT,
            "APP_SEVERITY_COUNT",
            format!(
                "SELECT {} FROM `{VULNERABILITIES}` WHERE {APPS}",
                severity_pivot("1")
            ),
        ),
        NamedQuery::new(
            section::APP_SEVERITY_SERVICE_COUNT,
            "APP_SEVERITY_SERVICE_COUNT",
            format!(
                "SELECT service, {} FROM `{VULNERABILITIES}` WHERE {APPS}
                 GROUP BY service ORDER BY service",
                severity_pivot("1")
            ),
        ),
        NamedQuery::new(
            section::RECOMMENDATIONS,
            "RECOMMENDATIONS",
            format!(
                "SELECT vuln_type, recommendation, COUNT(*) AS occurrences
                 FROM `{VULNERABILITIES_MASTER}`
                 WHERE {APPS} AND state = 'Open' AND recommendation IS NOT NULL
                 GROUP BY vuln_type, recommendation ORDER BY occurrences DESC, vuln_type LIMIT 10"
            ),
        ),
        risk_by_severity(section::APP_CURRENT_RISK, "APP_CURRENT_RISK", None),
        risk_by_severity(
            section::BLACKBOX_CURRENT_RISK,
            "BLACKBOX_CURRENT_RISK",
            Some("Black Box"),
        ),
        risk_by_severity(
            section::WHITEBOX_CURRENT_RISK,
            "WHITEBOX_CURRENT_RISK",
            Some("White Box"),
        ),
        NamedQuery::new(
            section::APP_TOTAL_CURRENT_RISK,
            "APP_TOT_CURRENT_RISK",
            format!(
                "SELECT state, COUNT(*) AS vulnerabilities, SUM(risk_score) AS risk
                 FROM `{VULNERABILITIES}` WHERE {APPS} GROUP BY state ORDER BY state"
            ),
        ),
        NamedQuery::new(
            section::APP_VULN_TYPES_RISK,
            "APP_VULN_TYPES_RISK",
            format!(
                "SELECT vuln_type, SUM(risk_score) AS current_risk FROM `{VULNERABILITIES}`
                 WHERE {APPS} AND state = 'Open'
                 GROUP BY vuln_type ORDER BY current_risk DESC LIMIT 10"
            ),
        ),
    ]
}

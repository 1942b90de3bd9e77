//! Seed data for tests in dependent crates.

use crate::error::Result;
use crate::sqlite::SqliteWarehouse;
use crate::tables;

/// Creates the catalogued tables and a handful of rows across two markets.
pub const SEED_SQL: &str = "
CREATE TABLE gostlm.gost_bq.vulnerabilities_light (
    vuln_id TEXT PRIMARY KEY,
    title TEXT,
    market TEXT NOT NULL,
    asset TEXT,
    asset_type TEXT,
    severity TEXT,
    state TEXT,
    service TEXT,
    vuln_type TEXT,
    risk_score REAL,
    discovered_date DATE,
    closed_date DATE
);
INSERT INTO gostlm.gost_bq.vulnerabilities_light VALUES
    ('V-1', 'SQL injection in login', 'IT-Milan', 'portal', 'Application', 'Critical', 'Open', 'White Box', 'Injection', 9.8, '2024-01-10', NULL),
    ('V-2', 'Outdated TLS', 'IT-Milan', 'gateway', 'Infrastructure', 'High', 'Closed', 'Black Box', 'Cryptography', 7.4, '2024-01-22', '2024-02-15'),
    ('V-3', 'Reflected XSS', 'IT-Rome', 'shop', 'Application', 'Medium', 'Open', 'Black Box', 'XSS', 5.4, '2024-02-03', NULL),
    ('V-4', 'Default credentials', 'DE-Berlin', 'router', 'Infrastructure', 'Critical', 'Open', 'Adversary Simulation', 'Authentication', 9.1, '2024-02-19', NULL),
    ('V-5', 'Verbose errors', 'DE-Berlin', 'api', 'Application', 'Low', 'Parked', 'White Box', 'Information Disclosure', 2.6, '2024-03-01', NULL);

CREATE TABLE gostlm.gost_bq.vulnerabilities_master AS
    SELECT v.*, 'Apply vendor guidance for ' || v.vuln_type AS recommendation
    FROM gostlm.gost_bq.vulnerabilities_light v;

CREATE TABLE gostlm.gost_bq.state_open AS
    SELECT vuln_id, title, market, asset, severity, service, discovered_date,
           CAST(julianday('2024-03-31') - julianday(discovered_date) AS INTEGER) AS days_open,
           CASE severity WHEN 'Critical' THEN 30 WHEN 'High' THEN 60 ELSE 90 END AS sla_days
    FROM gostlm.gost_bq.vulnerabilities_light WHERE state = 'Open';
CREATE TABLE gostlm.gost_bq.state_closed AS
    SELECT vuln_id, market, asset, severity, service,
           CAST(julianday(closed_date) - julianday(discovered_date) AS INTEGER) AS days_to_close,
           CASE severity WHEN 'Critical' THEN 30 WHEN 'High' THEN 60 ELSE 90 END AS sla_days
    FROM gostlm.gost_bq.vulnerabilities_light WHERE state = 'Closed';
CREATE TABLE gostlm.gost_bq.state_parked AS
    SELECT vuln_id, market, severity FROM gostlm.gost_bq.vulnerabilities_light WHERE state = 'Parked';
CREATE TABLE gostlm.gost_bq.state_validating (vuln_id TEXT, market TEXT, severity TEXT);

CREATE TABLE gostlm.gost_bq.vulnerabilities_time_to_overdue AS
    SELECT vuln_id, title, market, asset, severity, sla_days - days_open AS days_to_overdue
    FROM gostlm.gost_bq.state_open;

CREATE TABLE gostlm.gost_bq.global_severity_state_service AS
    SELECT severity, state, service, COUNT(*) AS total
    FROM gostlm.gost_bq.vulnerabilities_light GROUP BY severity, state, service;
CREATE TABLE gostlm.gost_bq.markets_severity_state_service AS
    SELECT market, severity, state, service, COUNT(*) AS total
    FROM gostlm.gost_bq.vulnerabilities_light GROUP BY market, severity, state, service;

CREATE TABLE gostlm.gost_bq.market_kpi_summary (
    market TEXT NOT NULL,
    kpi_score REAL,
    open_vulnerabilities INTEGER,
    overdue_vulnerabilities INTEGER,
    mean_days_to_close REAL
);
INSERT INTO gostlm.gost_bq.market_kpi_summary VALUES
    ('IT-Milan', 72.5, 1, 0, 24.0),
    ('IT-Rome', 81.0, 1, 0, NULL),
    ('DE-Berlin', 55.0, 1, 1, NULL);
CREATE TABLE gostlm.gost_bq.global_kpi_summary AS
    SELECT * FROM gostlm.gost_bq.market_kpi_summary;

CREATE TABLE gostlm.gost_bq.market_current_risk_summary AS
    SELECT market, severity, COUNT(*) AS open_vulnerabilities, SUM(risk_score) AS current_risk
    FROM gostlm.gost_bq.vulnerabilities_light WHERE state = 'Open' GROUP BY market, severity;
CREATE TABLE gostlm.gost_bq.global_current_risk_summary AS
    SELECT severity, COUNT(*) AS open_vulnerabilities, SUM(risk_score) AS current_risk
    FROM gostlm.gost_bq.vulnerabilities_light WHERE state = 'Open' GROUP BY severity;

CREATE TABLE gostlm.gost_bq.update_history (updated_at TIMESTAMP);
INSERT INTO gostlm.gost_bq.update_history VALUES ('2024-03-30T06:00:00'), ('2024-03-31T06:00:00');
";

/// In-memory warehouse under the default namespace with [`SEED_SQL`] applied.
pub fn seeded() -> Result<SqliteWarehouse> {
    let warehouse = SqliteWarehouse::open_in_memory(tables::PROJECT, tables::DATASET)?;
    warehouse.execute_batch(SEED_SQL)?;
    Ok(warehouse)
}

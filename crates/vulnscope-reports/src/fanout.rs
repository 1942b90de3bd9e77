//! Concurrent execution of a query catalog.

use std::collections::HashMap;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use serde_json::Value;
use vulnscope_warehouse::{QueryResult, Warehouse};

use crate::catalog::NamedQuery;

/// Upper bound on queries in flight for one report.
pub const DEFAULT_CONCURRENCY: usize = 20;

/// Rows kept per section.
pub const MAX_ROWS_PER_SECTION: usize = 100;

/// Section results keyed by section. A section whose query failed is absent.
#[derive(Debug, Default)]
pub struct ReportData {
    sections: HashMap<&'static str, QueryResult>,
}

impl ReportData {
    pub fn insert(&mut self, section: &'static str, result: QueryResult) {
        self.sections.insert(section, result);
    }

    pub fn get(&self, section: &str) -> Option<&QueryResult> {
        self.sections.get(section)
    }

    /// Rows of a section, empty when the section failed or returned nothing.
    pub fn rows(&self, section: &str) -> &[Vec<Value>] {
        self.get(section).map(|r| r.rows.as_slice()).unwrap_or_default()
    }

    /// Column/value pairs of the first row.
    pub fn first_row(&self, section: &str) -> Vec<(&str, &Value)> {
        match self.get(section) {
            Some(result) => match result.rows.first() {
                Some(row) => result
                    .columns
                    .iter()
                    .map(String::as_str)
                    .zip(row.iter())
                    .collect(),
                None => Vec::new(),
            },
            None => Vec::new(),
        }
    }

    pub fn scalar(&self, section: &str) -> Option<&Value> {
        self.get(section).and_then(|r| r.scalar())
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Run every query with at most `concurrency` in flight.
///
/// A failing query is logged and leaves its section empty; it never fails
/// the whole collection.
pub async fn collect(
    warehouse: &dyn Warehouse,
    queries: Vec<NamedQuery>,
    concurrency: usize,
) -> ReportData {
    let total = queries.len();
    let start = Instant::now();

    let results: Vec<(&'static str, Option<QueryResult>)> = stream::iter(queries)
        .map(|query| async move {
            match warehouse
                .run_query(&query.sql, &query.params, Some(MAX_ROWS_PER_SECTION))
                .await
            {
                Ok(result) => (query.section, Some(result)),
                Err(e) => {
                    tracing::warn!(query = %query.name, error = %e, "Report query failed");
                    (query.section, None)
                }
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut data = ReportData::default();
    for (section, result) in results {
        if let Some(result) = result {
            data.insert(section, result);
        }
    }

    tracing::debug!(
        queries = total,
        succeeded = data.len(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Report queries complete"
    );

    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{market_queries, section};
    use async_trait::async_trait;
    use serde_json::{Map, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vulnscope_warehouse::{QueryParam, TableSchema, WarehouseError};

    /// Tracks the peak number of concurrent queries and fails one by name.
    struct CountingWarehouse {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        fail_containing: &'static str,
    }

    #[async_trait]
    impl Warehouse for CountingWarehouse {
        async fn list_tables(&self, _: &str) -> vulnscope_warehouse::Result<Vec<String>> {
            Ok(vec![])
        }

        async fn table_schema(&self, t: &str) -> vulnscope_warehouse::Result<TableSchema> {
            Err(WarehouseError::TableNotFound(t.to_string()))
        }

        async fn run_query(
            &self,
            sql: &str,
            _: &[QueryParam],
            _: Option<usize>,
        ) -> vulnscope_warehouse::Result<QueryResult> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if sql.contains(self.fail_containing) {
                return Err(WarehouseError::Query("boom".into()));
            }
            Ok(QueryResult::new(vec!["n".into()], vec![vec![json!(1)]]))
        }

        async fn insert_rows(
            &self,
            _: &str,
            _: Vec<Map<String, Value>>,
        ) -> vulnscope_warehouse::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failed_query_leaves_section_empty() {
        let wh = CountingWarehouse {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            fail_containing: "MAX(updated_at)",
        };
        let queries = market_queries("IT");
        let total = queries.len();

        let data = collect(&wh, queries, DEFAULT_CONCURRENCY).await;
        assert_eq!(data.len(), total - 1);
        assert!(data.get(section::LAST_UPDATE).is_none());
        assert!(data.rows(section::LAST_UPDATE).is_empty());
        assert_eq!(data.scalar(section::TOTAL_COUNT), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let wh = CountingWarehouse {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            fail_containing: "never matches",
        };
        collect(&wh, market_queries("global"), 3).await;
        let peak = wh.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak {peak}");
        assert!(peak >= 1);
    }

    #[tokio::test]
    async fn test_seeded_market_sections() {
        let wh = vulnscope_warehouse::fixtures::seeded().unwrap();
        let data = collect(&wh, market_queries("IT"), DEFAULT_CONCURRENCY).await;

        assert_eq!(data.scalar(section::TOTAL_COUNT), Some(&json!(3)));
        assert_eq!(data.scalar(section::CRITICAL_HIGH_OPEN_COUNT), Some(&json!(1)));
        let top = data.first_row(section::TOP_AFFECTED);
        assert_eq!(top[0], ("asset", &json!("portal")));
    }
}

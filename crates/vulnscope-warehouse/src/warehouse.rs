use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::types::{QueryParam, QueryResult, TableSchema};

/// Read access to the analytical store plus append-only audit writes.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Table names in `dataset` (`project.dataset` or bare `dataset`).
    async fn list_tables(&self, dataset: &str) -> Result<Vec<String>>;

    /// Column schema for a fully-qualified table name.
    async fn table_schema(&self, fully_qualified: &str) -> Result<TableSchema>;

    /// Execute a read query, binding `@name` parameters, keeping at most
    /// `max_results` rows when given.
    async fn run_query(
        &self,
        sql: &str,
        params: &[QueryParam],
        max_results: Option<usize>,
    ) -> Result<QueryResult>;

    /// Append JSON rows to `table`.
    async fn insert_rows(&self, table: &str, rows: Vec<Map<String, Value>>) -> Result<()>;
}

pub type SharedWarehouse = Arc<dyn Warehouse>;

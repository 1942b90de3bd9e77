//! Warehouse tools: table listing, schema lookup and query execution.

use async_trait::async_trait;
use serde_json::{Value, json};
use vulnscope_warehouse::SharedWarehouse;

use crate::error::Result;
use crate::tool::{ParamExt, Tool, ToolContext, ToolKind};

/// Rows returned by `run_sql` when the engine does not say otherwise.
pub const DEFAULT_MAX_RESULTS: u64 = 1000;

pub struct ListTablesTool {
    warehouse: SharedWarehouse,
}

impl ListTablesTool {
    pub fn new(warehouse: SharedWarehouse) -> Self {
        Self { warehouse }
    }
}

#[async_trait]
impl Tool for ListTablesTool {
    fn name(&self) -> &str {
        ToolKind::ListTables.name()
    }

    fn description(&self) -> &str {
        "Lists all available tables in the specified dataset."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "dataset": {
                    "type": "string",
                    "description": "The dataset to list tables from, e.g., 'gostlm.gost_bq'"
                }
            },
            "required": ["dataset"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<Value> {
        let dataset = params.required_str("dataset", "pass a dataset such as 'gostlm.gost_bq'")?;
        let tables = self.warehouse.list_tables(dataset).await?;
        Ok(json!(tables))
    }
}

pub struct GetTableSchemaTool {
    warehouse: SharedWarehouse,
}

impl GetTableSchemaTool {
    pub fn new(warehouse: SharedWarehouse) -> Self {
        Self { warehouse }
    }
}

#[async_trait]
impl Tool for GetTableSchemaTool {
    fn name(&self) -> &str {
        ToolKind::GetTableSchema.name()
    }

    fn description(&self) -> &str {
        "Gets the schema (columns, types, modes) for a fully-qualified table name."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "fully_qualified": {
                    "type": "string",
                    "description": "The fully-qualified table name, e.g., 'gostlm.gost_bq.vulnerabilities_light'"
                }
            },
            "required": ["fully_qualified"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<Value> {
        let table = params.required_str(
            "fully_qualified",
            "pass a name such as 'gostlm.gost_bq.vulnerabilities_light'",
        )?;
        let schema = self.warehouse.table_schema(table).await?;
        Ok(serde_json::to_value(schema)?)
    }
}

/// Executes engine-written SQL. The query guard runs in the tool-call loop
/// before this tool is reached.
pub struct RunSqlTool {
    warehouse: SharedWarehouse,
}

impl RunSqlTool {
    pub fn new(warehouse: SharedWarehouse) -> Self {
        Self { warehouse }
    }
}

#[async_trait]
impl Tool for RunSqlTool {
    fn name(&self) -> &str {
        ToolKind::RunSql.name()
    }

    fn description(&self) -> &str {
        "Runs a BigQuery SQL query and returns the results as JSON."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "sql": {
                    "type": "string",
                    "description": "The SQL query to execute (must be SELECT only and reference gostlm.gost_bq)."
                },
                "max_results": {
                    "type": "integer",
                    "description": "The maximum number of rows to return. Default is 1000."
                }
            },
            "required": ["sql"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<Value> {
        let sql = params.required_str("sql", "pass a SELECT statement")?;
        let max_results = params.optional_u64("max_results", DEFAULT_MAX_RESULTS)?;
        let limit = usize::try_from(max_results).unwrap_or(usize::MAX);

        let result = self.warehouse.run_query(sql, &[], Some(limit)).await?;
        Ok(serde_json::to_value(result)?)
    }
}

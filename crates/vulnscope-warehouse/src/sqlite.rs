//! SQLite-backed warehouse.
//!
//! The tables live in a database attached under the dataset name, so a
//! warehouse reference such as `` `gostlm.gost_bq.state_open` `` becomes
//! `"gost_bq"."state_open"` before SQLite sees it.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use regex::{Captures, Regex};
use rusqlite::Connection;
use rusqlite::types::ValueRef;
use serde_json::{Map, Value};

use crate::error::{Result, WarehouseError};
use crate::types::{ColumnSchema, ParamValue, QueryParam, QueryResult, TableSchema};
use crate::warehouse::Warehouse;

/// Warehouse over a local SQLite file.
///
/// Thread-safe via an internal `Mutex<Connection>`; every call runs on the
/// blocking pool.
pub struct SqliteWarehouse {
    conn: Arc<Mutex<Connection>>,
    project: String,
    dataset: String,
    table_ref: Regex,
}

impl SqliteWarehouse {
    /// Open (or create) the database at `path` as `project.dataset`.
    pub fn open(path: &Path, project: &str, dataset: &str) -> Result<Self> {
        let location = path.to_string_lossy().into_owned();
        Self::attach(&location, project, dataset)
    }

    /// Open an in-memory warehouse (for testing).
    pub fn open_in_memory(project: &str, dataset: &str) -> Result<Self> {
        Self::attach(":memory:", project, dataset)
    }

    fn attach(location: &str, project: &str, dataset: &str) -> Result<Self> {
        validate_identifier(dataset)?;
        if project.is_empty() || project.contains('.') {
            return Err(WarehouseError::InvalidName(project.to_string()));
        }

        let conn = Connection::open_in_memory()?;
        conn.execute(
            &format!("ATTACH DATABASE ?1 AS \"{}\"", dataset),
            [location],
        )?;

        let table_ref = Regex::new(&format!(
            r"`?\b{}\.{}\.([A-Za-z_][A-Za-z0-9_]*)\b`?",
            regex::escape(project),
            regex::escape(dataset)
        ))
        .map_err(|e| WarehouseError::InvalidName(e.to_string()))?;

        tracing::debug!(location, project, dataset, "Opened SQLite warehouse");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            project: project.to_string(),
            dataset: dataset.to_string(),
            table_ref,
        })
    }

    /// `project.dataset`.
    pub fn namespace(&self) -> String {
        format!("{}.{}", self.project, self.dataset)
    }

    /// Rewrite fully-qualified warehouse references to SQLite form.
    pub fn rewrite_sql(&self, sql: &str) -> String {
        let dataset = &self.dataset;
        self.table_ref
            .replace_all(sql, |caps: &Captures| format!("\"{}\".\"{}\"", dataset, &caps[1]))
            .into_owned()
    }

    /// Run a batch of statements, rewriting table references first.
    /// Used for loading data and fixtures; never reachable from a tool.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        let sql = self.rewrite_sql(sql);
        self.conn.lock().execute_batch(&sql)?;
        Ok(())
    }

    fn resolve_dataset<'a>(&'a self, name: &str) -> Result<&'a str> {
        let name = name.trim_matches('`');
        let dataset = match name.split_once('.') {
            Some((project, dataset)) if project == self.project => dataset,
            Some(_) => return Err(WarehouseError::DatasetNotFound(name.to_string())),
            None => name,
        };
        if dataset == self.dataset {
            Ok(&self.dataset)
        } else {
            Err(WarehouseError::DatasetNotFound(name.to_string()))
        }
    }

    fn resolve_table(&self, name: &str) -> Result<String> {
        let trimmed = name.trim_matches('`');
        let parts: Vec<&str> = trimmed.split('.').collect();
        let table = match parts.as_slice() {
            [table] => *table,
            [dataset, table] => {
                self.resolve_dataset(dataset)?;
                *table
            }
            [project, dataset, table] => {
                self.resolve_dataset(&format!("{}.{}", project, dataset))?;
                *table
            }
            _ => return Err(WarehouseError::InvalidName(name.to_string())),
        };
        validate_identifier(table)?;
        Ok(table.to_string())
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut *guard)
        })
        .await
        .map_err(|e| WarehouseError::Task(e.to_string()))?
    }
}

#[async_trait]
impl Warehouse for SqliteWarehouse {
    async fn list_tables(&self, dataset: &str) -> Result<Vec<String>> {
        let schema = self.resolve_dataset(dataset)?.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT name FROM \"{}\".sqlite_master
                 WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%'
                 ORDER BY name",
                schema
            ))?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(names)
        })
        .await
    }

    async fn table_schema(&self, fully_qualified: &str) -> Result<TableSchema> {
        let table = self.resolve_table(fully_qualified)?;
        let schema = self.dataset.clone();
        let display = fully_qualified.trim_matches('`').to_string();

        self.with_conn(move |conn| {
            let mut stmt =
                conn.prepare(&format!("PRAGMA \"{}\".table_info(\"{}\")", schema, table))?;
            let columns = stmt
                .query_map([], |row| {
                    let name: String = row.get(1)?;
                    let declared: String = row.get::<_, Option<String>>(2)?.unwrap_or_default();
                    let not_null: bool = row.get(3)?;
                    let primary_key: i64 = row.get(5)?;
                    Ok(ColumnSchema {
                        name,
                        field_type: warehouse_type(&declared),
                        mode: if not_null || primary_key > 0 {
                            "REQUIRED".to_string()
                        } else {
                            "NULLABLE".to_string()
                        },
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            if columns.is_empty() {
                return Err(WarehouseError::TableNotFound(display));
            }
            Ok(TableSchema {
                table: display,
                schema: columns,
            })
        })
        .await
    }

    async fn run_query(
        &self,
        sql: &str,
        params: &[QueryParam],
        max_results: Option<usize>,
    ) -> Result<QueryResult> {
        let sql = self.rewrite_sql(sql);
        let params = params.to_vec();
        let limit = max_results.unwrap_or(usize::MAX);

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            if !stmt.readonly() || !is_query(&sql) {
                return Err(WarehouseError::ReadOnly(
                    "only SELECT statements may run against the warehouse".to_string(),
                ));
            }
            for param in &params {
                if let Some(idx) = stmt.parameter_index(&param.placeholder())? {
                    match &param.value {
                        ParamValue::String(s) => stmt.raw_bind_parameter(idx, s)?,
                        ParamValue::Int(i) => stmt.raw_bind_parameter(idx, i)?,
                        ParamValue::Float(f) => stmt.raw_bind_parameter(idx, f)?,
                        ParamValue::Bool(b) => stmt.raw_bind_parameter(idx, b)?,
                    }
                }
            }

            let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
            let width = columns.len();

            let mut rows = Vec::new();
            let mut cursor = stmt.raw_query();
            while rows.len() < limit {
                let Some(row) = cursor.next()? else { break };
                let mut values = Vec::with_capacity(width);
                for i in 0..width {
                    values.push(json_value(row.get_ref(i)?));
                }
                rows.push(values);
            }

            Ok(QueryResult::new(columns, rows))
        })
        .await
    }

    async fn insert_rows(&self, table: &str, rows: Vec<Map<String, Value>>) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let table = self.resolve_table(table)?;
        let schema = self.dataset.clone();

        let columns: BTreeSet<String> = rows.iter().flat_map(|r| r.keys().cloned()).collect();
        for column in &columns {
            validate_identifier(column)?;
        }

        self.with_conn(move |conn| {
            let column_list: Vec<String> = columns.iter().map(|c| format!("\"{}\"", c)).collect();
            conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS \"{}\".\"{}\" ({})",
                    schema,
                    table,
                    column_list
                        .iter()
                        .map(|c| format!("{} TEXT", c))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                [],
            )?;

            let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
            let insert = format!(
                "INSERT INTO \"{}\".\"{}\" ({}) VALUES ({})",
                schema,
                table,
                column_list.join(", "),
                placeholders.join(", ")
            );

            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(&insert)?;
                for row in &rows {
                    let values: Vec<Option<String>> = columns
                        .iter()
                        .map(|c| match row.get(c) {
                            None | Some(Value::Null) => None,
                            Some(Value::String(s)) => Some(s.clone()),
                            Some(other) => Some(other.to_string()),
                        })
                        .collect();
                    stmt.execute(rusqlite::params_from_iter(values.iter()))?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }
}

/// Leading keyword is SELECT, WITH or VALUES once comments are skipped.
///
/// `Statement::readonly` still reports ATTACH, DETACH and transaction
/// control as read-only, so those are refused here.
fn is_query(sql: &str) -> bool {
    let mut rest = sql;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '(');
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.split_once('\n').map(|(_, tail)| tail).unwrap_or("");
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map(|(_, tail)| tail).unwrap_or("");
        } else {
            break;
        }
    }
    let keyword: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();
    matches!(keyword.as_str(), "SELECT" | "WITH" | "VALUES")
}

fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(WarehouseError::InvalidName(name.to_string()))
    }
}

/// Map a SQLite declared type onto warehouse column types.
fn warehouse_type(declared: &str) -> String {
    let upper = declared.to_ascii_uppercase();
    let mapped = if upper.contains("INT") {
        "INTEGER"
    } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") || upper.contains("STRING") {
        "STRING"
    } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
        "FLOAT"
    } else if upper.contains("BOOL") {
        "BOOLEAN"
    } else if upper.contains("TIMESTAMP") {
        "TIMESTAMP"
    } else if upper.contains("DATETIME") {
        "DATETIME"
    } else if upper.contains("DATE") {
        "DATE"
    } else if upper.contains("NUMERIC") || upper.contains("DECIMAL") {
        "NUMERIC"
    } else if upper.is_empty() || upper.contains("BLOB") {
        "BYTES"
    } else {
        return upper;
    };
    mapped.to_string()
}

fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> SqliteWarehouse {
        let wh = SqliteWarehouse::open_in_memory("gostlm", "gost_bq").unwrap();
        wh.execute_batch(
            "CREATE TABLE gostlm.gost_bq.state_open (
                 id INTEGER PRIMARY KEY,
                 market TEXT NOT NULL,
                 severity VARCHAR(16),
                 score REAL,
                 discovered DATE
             );
             INSERT INTO gostlm.gost_bq.state_open (market, severity, score, discovered) VALUES
                 ('IT-Milan', 'Critical', 9.8, '2024-01-10'),
                 ('IT-Rome', 'High', 7.5, '2024-02-01'),
                 ('DE-Berlin', 'Low', 2.1, '2024-03-05');
             CREATE VIEW gostlm.gost_bq.update_history AS SELECT '2024-03-05' AS last_update;",
        )
        .unwrap();
        wh
    }

    #[test]
    fn test_rewrite_sql() {
        let wh = fixture();
        assert_eq!(
            wh.rewrite_sql("SELECT * FROM `gostlm.gost_bq.state_open` WHERE 1"),
            "SELECT * FROM \"gost_bq\".\"state_open\" WHERE 1"
        );
        assert_eq!(
            wh.rewrite_sql("SELECT * FROM gostlm.gost_bq.state_open a JOIN gostlm.gost_bq.state_closed b"),
            "SELECT * FROM \"gost_bq\".\"state_open\" a JOIN \"gost_bq\".\"state_closed\" b"
        );
        assert_eq!(
            wh.rewrite_sql("SELECT * FROM other.ds.t"),
            "SELECT * FROM other.ds.t"
        );
    }

    #[tokio::test]
    async fn test_list_tables() {
        let wh = fixture();
        let tables = wh.list_tables("gostlm.gost_bq").await.unwrap();
        assert_eq!(tables, vec!["state_open", "update_history"]);

        assert_eq!(wh.list_tables("gost_bq").await.unwrap().len(), 2);
        assert!(matches!(
            wh.list_tables("other.dataset").await,
            Err(WarehouseError::DatasetNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_table_schema() {
        let wh = fixture();
        let schema = wh.table_schema("gostlm.gost_bq.state_open").await.unwrap();
        assert_eq!(schema.table, "gostlm.gost_bq.state_open");

        let cols: Vec<(&str, &str, &str)> = schema
            .schema
            .iter()
            .map(|c| (c.name.as_str(), c.field_type.as_str(), c.mode.as_str()))
            .collect();
        assert_eq!(
            cols,
            vec![
                ("id", "INTEGER", "REQUIRED"),
                ("market", "STRING", "REQUIRED"),
                ("severity", "STRING", "NULLABLE"),
                ("score", "FLOAT", "NULLABLE"),
                ("discovered", "DATE", "NULLABLE"),
            ]
        );
    }

    #[tokio::test]
    async fn test_table_schema_missing() {
        let wh = fixture();
        let err = wh.table_schema("gostlm.gost_bq.nope").await.unwrap_err();
        assert!(matches!(err, WarehouseError::TableNotFound(_)));

        let err = wh.table_schema("gostlm.gost_bq.bad-name").await.unwrap_err();
        assert!(matches!(err, WarehouseError::InvalidName(_)));
    }

    #[tokio::test]
    async fn test_run_query_with_named_param() {
        let wh = fixture();
        let result = wh
            .run_query(
                "SELECT market, severity, score FROM `gostlm.gost_bq.state_open`
                 WHERE market LIKE @market ORDER BY score DESC",
                &[QueryParam::string("market", "%IT%")],
                None,
            )
            .await
            .unwrap();

        assert_eq!(result.columns, vec!["market", "severity", "score"]);
        assert_eq!(result.len(), 2);
        assert_eq!(result.rows[0], vec![json!("IT-Milan"), json!("Critical"), json!(9.8)]);
    }

    #[tokio::test]
    async fn test_run_query_caps_rows() {
        let wh = fixture();
        let result = wh
            .run_query("SELECT id FROM gostlm.gost_bq.state_open", &[], Some(1))
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
    }

    #[tokio::test]
    async fn test_run_query_error() {
        let wh = fixture();
        let err = wh
            .run_query("SELECT * FROM gostlm.gost_bq.missing", &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, WarehouseError::Database(_)));
    }

    async fn open_count(wh: &SqliteWarehouse) -> Value {
        wh.run_query("SELECT COUNT(*) FROM gostlm.gost_bq.state_open", &[], None)
            .await
            .unwrap()
            .rows[0][0]
            .clone()
    }

    #[tokio::test]
    async fn test_run_query_refuses_replace() {
        let wh = fixture();
        let err = wh
            .run_query(
                "REPLACE INTO gostlm.gost_bq.state_open (id, market) VALUES (99, 'X')",
                &[],
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WarehouseError::ReadOnly(_)));
        assert_eq!(open_count(&wh).await, json!(3));
    }

    #[tokio::test]
    async fn test_run_query_refuses_create_table_as() {
        let wh = fixture();
        let err = wh
            .run_query("CREATE TABLE gostlm.gost_bq.copied AS SELECT 1 AS x", &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, WarehouseError::ReadOnly(_)));
        assert!(!wh.list_tables("gost_bq").await.unwrap().contains(&"copied".to_string()));
    }

    #[tokio::test]
    async fn test_run_query_refuses_connection_statements() {
        let wh = fixture();
        for sql in [
            "ATTACH DATABASE ':memory:' AS extra -- gostlm.gost_bq",
            "PRAGMA gost_bq.user_version = 7",
            "BEGIN",
            "WITH x AS (SELECT 1) INSERT INTO gostlm.gost_bq.state_open (market) SELECT 'X' FROM x",
        ] {
            let err = wh.run_query(sql, &[], None).await.unwrap_err();
            assert!(matches!(err, WarehouseError::ReadOnly(_)), "{sql}: {err}");
        }
        assert_eq!(open_count(&wh).await, json!(3));
    }

    #[test]
    fn test_is_query_skips_comments() {
        assert!(is_query("-- count\n/* open */ SELECT 1"));
        assert!(is_query("  with x as (select 1) select * from x"));
        assert!(is_query("(SELECT 1)"));
        assert!(!is_query("/* SELECT */ REPLACE INTO t VALUES (1)"));
        assert!(!is_query("-- SELECT"));
    }

    #[tokio::test]
    async fn test_insert_rows_creates_table() {
        let wh = fixture();
        let mut row = Map::new();
        row.insert("conversation_id".into(), json!("conv_1"));
        row.insert("tool_args".into(), json!({"sql": "SELECT 1"}));
        row.insert("final_response".into(), Value::Null);

        wh.insert_rows("gostlm.gost_bq.audit_events", vec![row.clone(), row])
            .await
            .unwrap();

        let result = wh
            .run_query(
                "SELECT conversation_id, tool_args, final_response FROM gostlm.gost_bq.audit_events",
                &[],
                None,
            )
            .await
            .unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.rows[0][1], json!("{\"sql\":\"SELECT 1\"}"));
        assert_eq!(result.rows[0][2], Value::Null);
    }

    #[tokio::test]
    async fn test_file_backed_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warehouse.db");
        {
            let wh = SqliteWarehouse::open(&path, "gostlm", "gost_bq").unwrap();
            wh.execute_batch("CREATE TABLE gostlm.gost_bq.state_closed (id INTEGER);")
                .unwrap();
        }
        let wh = SqliteWarehouse::open(&path, "gostlm", "gost_bq").unwrap();
        assert_eq!(
            wh.list_tables("gostlm.gost_bq").await.unwrap(),
            vec!["state_closed"]
        );
    }

    #[test]
    fn test_warehouse_type_mapping() {
        assert_eq!(warehouse_type("BIGINT"), "INTEGER");
        assert_eq!(warehouse_type("double precision"), "FLOAT");
        assert_eq!(warehouse_type("TIMESTAMP"), "TIMESTAMP");
        assert_eq!(warehouse_type(""), "BYTES");
        assert_eq!(warehouse_type("JSON"), "JSON");
    }
}

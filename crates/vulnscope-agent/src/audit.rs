//! Background audit trail.
//!
//! The response path only enqueues; a single worker task drains the queue
//! into an [`AuditSink`]. A full or closed queue drops the record with a
//! warning, and sink failures are logged and swallowed.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use vulnscope_warehouse::SharedWarehouse;

use crate::error::{AgentError, Result};

/// Default queue capacity.
pub const DEFAULT_AUDIT_CAPACITY: usize = 1024;

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

/// One tool call or one final answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    pub event_timestamp: String,
    pub conversation_id: String,
    pub tool_name: Option<String>,
    /// Call arguments as JSON text.
    pub tool_args: Option<String>,
    /// Encoded tool result as fed back to the engine.
    pub tool_response: Option<String>,
    pub final_response: Option<String>,
}

impl AuditEvent {
    pub fn tool_call(
        conversation_id: &str,
        tool_name: &str,
        tool_args: &Value,
        tool_response: &str,
    ) -> Self {
        Self {
            event_timestamp: now(),
            conversation_id: conversation_id.to_string(),
            tool_name: Some(tool_name.to_string()),
            tool_args: Some(tool_args.to_string()),
            tool_response: Some(tool_response.to_string()),
            final_response: None,
        }
    }

    pub fn final_response(conversation_id: &str, text: &str) -> Self {
        Self {
            event_timestamp: now(),
            conversation_id: conversation_id.to_string(),
            tool_name: None,
            tool_args: None,
            tool_response: None,
            final_response: Some(text.to_string()),
        }
    }

    fn into_row(self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(AgentError::internal(format!(
                "audit event serialized to {other}"
            ))),
        }
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Everything the recorder carries.
#[derive(Debug, Clone, PartialEq)]
pub enum AuditRecord {
    /// Tool-call or final-answer event.
    Event(AuditEvent),
    /// Legacy row holding only the executed SQL text.
    Sql { query: String },
}

impl AuditRecord {
    pub fn channel(&self) -> AuditChannel {
        match self {
            AuditRecord::Event(_) => AuditChannel::Events,
            AuditRecord::Sql { .. } => AuditChannel::Sql,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditChannel {
    Events,
    Sql,
}

// ─────────────────────────────────────────────────────────────────────────────
// Sinks
// ─────────────────────────────────────────────────────────────────────────────

/// Where audit records end up.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persist one record.
    async fn write(&self, record: AuditRecord) -> Result<()>;

    /// Whether records of this channel are persisted at all.
    fn accepts(&self, channel: AuditChannel) -> bool;
}

/// Appends audit rows to warehouse tables.
pub struct WarehouseAuditSink {
    warehouse: SharedWarehouse,
    events_table: Option<String>,
    sql_table: Option<String>,
}

impl WarehouseAuditSink {
    /// A `None` table disables that channel.
    pub fn new(
        warehouse: SharedWarehouse,
        events_table: Option<String>,
        sql_table: Option<String>,
    ) -> Self {
        if events_table.is_none() {
            tracing::warn!("BG_AUDIT_LOG_TABLE_EVENTS not set, tool-call event auditing disabled");
        }
        if sql_table.is_none() {
            tracing::warn!("BG_AUDIT_LOG_TABLE not set, SQL query auditing disabled");
        }
        Self {
            warehouse,
            events_table,
            sql_table,
        }
    }

    fn table_for(&self, channel: AuditChannel) -> Option<&str> {
        match channel {
            AuditChannel::Events => self.events_table.as_deref(),
            AuditChannel::Sql => self.sql_table.as_deref(),
        }
    }
}

#[async_trait]
impl AuditSink for WarehouseAuditSink {
    async fn write(&self, record: AuditRecord) -> Result<()> {
        let Some(table) = self.table_for(record.channel()) else {
            return Ok(());
        };
        let row = match record {
            AuditRecord::Event(event) => event.into_row()?,
            AuditRecord::Sql { query } => {
                let mut row = Map::new();
                row.insert("query".to_string(), Value::String(query));
                row
            }
        };
        self.warehouse.insert_rows(table, vec![row]).await?;
        Ok(())
    }

    fn accepts(&self, channel: AuditChannel) -> bool {
        self.table_for(channel).is_some()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Recorder
// ─────────────────────────────────────────────────────────────────────────────

/// Non-blocking handle onto the audit queue. Cheap to clone.
#[derive(Clone, Debug, Default)]
pub struct AuditRecorder {
    tx: Option<mpsc::Sender<AuditRecord>>,
}

impl AuditRecorder {
    /// Start the worker. The returned handle completes once every recorder
    /// clone has been dropped and the queue is drained.
    pub fn spawn(sink: Arc<dyn AuditSink>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(drain(sink, rx));
        (Self { tx: Some(tx) }, handle)
    }

    /// A recorder that drops everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Enqueue a record without waiting.
    pub fn record(&self, record: AuditRecord) {
        let Some(tx) = &self.tx else {
            return;
        };
        if let Err(e) = tx.try_send(record) {
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => "queue full",
                mpsc::error::TrySendError::Closed(_) => "worker stopped",
            };
            tracing::warn!(reason, "Dropping audit record");
        }
    }

    pub fn record_event(&self, event: AuditEvent) {
        self.record(AuditRecord::Event(event));
    }

    pub fn record_sql(&self, query: impl Into<String>) {
        self.record(AuditRecord::Sql {
            query: query.into(),
        });
    }
}

async fn drain(sink: Arc<dyn AuditSink>, mut rx: mpsc::Receiver<AuditRecord>) {
    while let Some(record) = rx.recv().await {
        let channel = record.channel();
        if !sink.accepts(channel) {
            continue;
        }
        if let Err(e) = sink.write(record).await {
            tracing::error!(?channel, error = %e, "Failed to write audit record");
        }
    }
    tracing::debug!("Audit worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use vulnscope_warehouse::{SqliteWarehouse, Warehouse};

    #[derive(Default)]
    struct RecordingSink {
        records: Mutex<Vec<AuditRecord>>,
        fail: bool,
    }

    #[async_trait]
    impl AuditSink for RecordingSink {
        async fn write(&self, record: AuditRecord) -> Result<()> {
            self.records.lock().unwrap().push(record);
            if self.fail {
                return Err(AgentError::internal("sink down"));
            }
            Ok(())
        }

        fn accepts(&self, _channel: AuditChannel) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_records_reach_sink_in_order() {
        let sink = Arc::new(RecordingSink::default());
        let (recorder, handle) = AuditRecorder::spawn(sink.clone(), 8);

        recorder.record_sql("SELECT 1");
        recorder.record_event(AuditEvent::final_response("conv_1", "done"));
        drop(recorder);
        handle.await.unwrap();

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0],
            AuditRecord::Sql {
                query: "SELECT 1".into()
            }
        );
        assert_eq!(records[1].channel(), AuditChannel::Events);
    }

    #[tokio::test]
    async fn test_sink_errors_are_swallowed() {
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..Default::default()
        });
        let (recorder, handle) = AuditRecorder::spawn(sink.clone(), 8);
        recorder.record_sql("a");
        recorder.record_sql("b");
        drop(recorder);
        handle.await.unwrap();

        assert_eq!(sink.records.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        // Current-thread runtime: the worker cannot run until we yield.
        let sink = Arc::new(RecordingSink::default());
        let (recorder, handle) = AuditRecorder::spawn(sink.clone(), 1);
        for i in 0..5 {
            recorder.record_sql(format!("q{i}"));
        }
        drop(recorder);
        handle.await.unwrap();

        assert_eq!(sink.records.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_disabled_recorder_is_noop() {
        let recorder = AuditRecorder::disabled();
        assert!(!recorder.is_enabled());
        recorder.record_sql("SELECT 1");
    }

    #[test]
    fn test_event_constructors() {
        let call = AuditEvent::tool_call("conv_1", "run_sql", &json!({"sql": "x"}), "\"[]\"");
        assert_eq!(call.tool_args.as_deref(), Some(r#"{"sql":"x"}"#));
        assert!(call.final_response.is_none());
        assert!(chrono::DateTime::parse_from_rfc3339(&call.event_timestamp).is_ok());

        let done = AuditEvent::final_response("conv_1", "answer");
        assert!(done.tool_name.is_none());
        assert_eq!(done.final_response.as_deref(), Some("answer"));
    }

    #[tokio::test]
    async fn test_warehouse_sink_writes_rows() {
        let warehouse = Arc::new(SqliteWarehouse::open_in_memory("gostlm", "gost_bq").unwrap());
        let sink = WarehouseAuditSink::new(
            warehouse.clone(),
            Some("gostlm.gost_bq.audit_events".into()),
            None,
        );
        assert!(sink.accepts(AuditChannel::Events));
        assert!(!sink.accepts(AuditChannel::Sql));

        sink.write(AuditRecord::Event(AuditEvent::tool_call(
            "conv_1",
            "list_tables",
            &json!({"dataset": "gostlm.gost_bq"}),
            "[]",
        )))
        .await
        .unwrap();
        sink.write(AuditRecord::Event(AuditEvent::final_response("conv_1", "ok")))
            .await
            .unwrap();
        // Disabled channel is a silent no-op.
        sink.write(AuditRecord::Sql { query: "SELECT 1".into() })
            .await
            .unwrap();

        let result = warehouse
            .run_query(
                "SELECT tool_name, final_response FROM gostlm.gost_bq.audit_events",
                &[],
                None,
            )
            .await
            .unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.cell(0, "tool_name"), Some(&json!("list_tables")));
        assert_eq!(result.cell(1, "final_response"), Some(&json!("ok")));
        assert_eq!(result.cell(1, "tool_name"), Some(&Value::Null));
    }
}

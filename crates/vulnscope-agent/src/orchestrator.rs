//! The tool-call loop.
//!
//! An [`Orchestrator`] is built once at startup and shared across requests.
//! Each [`Orchestrator::chat`] call compacts the supplied history, then
//! alternates between the reasoning engine and the tool registry until the
//! engine answers in plain text.
//!
//! ```text
//! messages ─▶ compact ─▶ engine ──text──▶ reply
//!                          ▲  │
//!                          │  └─tool call─▶ guard ─▶ registry ─▶ encode
//!                          └──────────────── tool result ◀───────┘
//! ```

use std::time::Instant;

use serde_json::{Value, json};
use vulnscope_llm::{
    CompletionRequest, ContentBlock, LlmBackend, Message, SharedBackend, ToolResultBlock,
};

use crate::audit::{AuditEvent, AuditRecorder};
use crate::compaction::{CompactorConfig, HistoryCompactor};
use crate::error::{AgentError, Result};
use crate::tool::{ToolContext, ToolKind, ToolRegistry};
use crate::types::{ChatMessage, ChatReply, GenerationSettings};
use crate::validator::QueryValidator;

/// Default engine model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default bound on tool round-trips per request.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Expiry note shown alongside report links.
pub const REPORT_EXPIRY_MESSAGE: &str = "Report generated. The link expires in 5 minutes.";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Engine model for the main loop.
    pub model: String,
    /// System prompt sent with every engine call.
    pub system_prompt: Option<String>,
    /// Tool round-trips allowed before the request fails.
    pub max_iterations: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            system_prompt: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────────────────────────────────────

/// Immutable request-handling context: engine, tools, guard, compactor and
/// audit queue.
pub struct Orchestrator {
    backend: SharedBackend,
    tools: ToolRegistry,
    validator: QueryValidator,
    compactor: HistoryCompactor,
    audit: AuditRecorder,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn backend(&self) -> SharedBackend {
        self.backend.clone()
    }

    /// Answer one chat request.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        settings: GenerationSettings,
    ) -> Result<ChatReply> {
        let conversation_id = format!("conv_{}", uuid::Uuid::new_v4());
        let started = Instant::now();

        tracing::info!(
            %conversation_id,
            messages = messages.len(),
            "Chat request started"
        );

        let history = self.compactor.compact(&conversation_id, messages).await;
        if history.latest_user_query().is_none() {
            return Err(AgentError::NoUserMessage);
        }

        // The newest entry is sent as the opening user content; the rest
        // form the session.
        let mut turns = history.to_messages();
        let Some(newest) = turns.pop() else {
            return Err(AgentError::NoUserMessage);
        };
        turns.push(Message::user(newest.content.to_text()));

        let tool_definitions = self.tools.to_llm_definitions();
        let ctx = ToolContext::new(&conversation_id);
        let mut tool_calls = 0u32;
        let mut iteration = 0u32;

        loop {
            iteration += 1;

            let mut request = CompletionRequest::new(&self.config.model, turns.clone(), settings.max_tokens)
                .with_tools(tool_definitions.clone())
                .with_temperature(settings.temperature);
            if let Some(system) = &self.config.system_prompt {
                request = request.with_system(system.clone());
            }

            tracing::debug!(
                %conversation_id,
                iteration,
                messages = turns.len(),
                model = %request.model,
                "Calling engine"
            );

            let call_start = Instant::now();
            let response = self.backend.complete(request).await.map_err(|e| {
                tracing::error!(%conversation_id, iteration, error = %e, "Engine call failed");
                AgentError::from(e)
            })?;
            tracing::debug!(
                %conversation_id,
                iteration,
                stop_reason = ?response.stop_reason,
                has_tool_use = response.has_tool_use(),
                duration_ms = call_start.elapsed().as_millis() as u64,
                "Engine response received"
            );

            let Some(call) = response.first_tool_use() else {
                let text = response.text_checked().unwrap_or_else(|e| {
                    tracing::warn!(%conversation_id, error = %e, "Final response was blocked");
                    format!("My response was blocked. (Error: {})", e)
                });
                self.audit
                    .record_event(AuditEvent::final_response(&conversation_id, &text));

                tracing::info!(
                    %conversation_id,
                    iterations = iteration,
                    tool_calls,
                    response_len = text.len(),
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Chat request completed"
                );
                return Ok(ChatReply {
                    conversation_id,
                    content: text,
                    tool_calls,
                });
            };

            if tool_calls >= self.config.max_iterations {
                tracing::warn!(
                    %conversation_id,
                    tool = %call.name,
                    max_iterations = self.config.max_iterations,
                    "Tool-call bound reached"
                );
                return Err(AgentError::MaxIterations(self.config.max_iterations));
            }
            if !self.tools.contains(&call.name) {
                tracing::warn!(%conversation_id, tool = %call.name, "Engine requested an unknown tool");
                return Err(AgentError::UnknownTool(call.name));
            }
            let kind = ToolKind::from_name(&call.name);

            if kind.is_some_and(ToolKind::is_query) {
                let sql = call.input.get("sql").and_then(Value::as_str).unwrap_or_default();
                self.validator.validate(sql)?;
                tracing::info!(%conversation_id, sql, "SQL_QUERY_LOG");
                self.audit.record_sql(sql);
            } else {
                tracing::info!(%conversation_id, tool = %call.name, args = %call.input, "Running tool");
            }

            let tool_start = Instant::now();
            let result = match self.tools.execute(&call.name, call.input.clone(), &ctx).await {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(%conversation_id, tool = %call.name, error = %e, "Tool failed");
                    json!({ "error": tool_error_message(e) })
                }
            };
            let result = if kind.is_some_and(ToolKind::is_report) {
                wrap_report_link(result)
            } else {
                result
            };
            let result_json = serde_json::to_string(&result)?;
            tool_calls += 1;

            tracing::debug!(
                %conversation_id,
                tool = %call.name,
                iteration,
                result_len = result_json.len(),
                duration_ms = tool_start.elapsed().as_millis() as u64,
                "Tool completed"
            );

            self.audit.record_event(AuditEvent::tool_call(
                &conversation_id,
                &call.name,
                &call.input,
                &result_json,
            ));

            turns.push(Message::assistant_blocks(executed_turn(response.content)));
            turns.push(Message::tool_results(vec![ToolResultBlock::new(
                call.id,
                call.name,
                json!({ "result": result_json }),
            )]));
        }
    }
}

/// Report tools hand back a URL string; the engine gets it wrapped with an
/// expiry note.
pub fn wrap_report_link(result: Value) -> Value {
    match result {
        Value::String(url) => json!({
            "status": "Success",
            "markdown_link": format!("[Click here to download your report]({})", url),
            "message": REPORT_EXPIRY_MESSAGE,
        }),
        other => other,
    }
}

/// The assistant turn as replayed: its text plus the one call that ran.
/// Every replayed call must be answered by a tool result.
fn executed_turn(content: Vec<ContentBlock>) -> Vec<ContentBlock> {
    let mut seen_call = false;
    content
        .into_iter()
        .filter(|block| match block {
            ContentBlock::ToolUse { .. } if seen_call => false,
            ContentBlock::ToolUse { .. } => {
                seen_call = true;
                true
            }
            _ => true,
        })
        .collect()
}

fn tool_error_message(err: AgentError) -> String {
    match err {
        AgentError::Tool(msg) => msg,
        other => other.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for [`Orchestrator`].
#[derive(Default)]
pub struct OrchestratorBuilder {
    backend: Option<SharedBackend>,
    summary_backend: Option<SharedBackend>,
    tools: ToolRegistry,
    validator: QueryValidator,
    compactor: CompactorConfig,
    audit: AuditRecorder,
    config: OrchestratorConfig,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(self, backend: impl LlmBackend + 'static) -> Self {
        self.with_shared_backend(std::sync::Arc::new(backend))
    }

    pub fn with_shared_backend(mut self, backend: SharedBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Engine used for summaries. Defaults to the main backend.
    pub fn with_summary_backend(mut self, backend: SharedBackend) -> Self {
        self.summary_backend = Some(backend);
        self
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_validator(mut self, validator: QueryValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_compactor_config(mut self, config: CompactorConfig) -> Self {
        self.compactor = config;
        self
    }

    pub fn with_audit(mut self, audit: AuditRecorder) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    pub fn build(self) -> Result<Orchestrator> {
        let backend = self
            .backend
            .ok_or_else(|| AgentError::Config("LLM backend is required".to_string()))?;
        let summary_backend = self.summary_backend.unwrap_or_else(|| backend.clone());

        Ok(Orchestrator {
            backend,
            tools: self.tools,
            validator: self.validator,
            compactor: HistoryCompactor::new(summary_backend, self.compactor),
            audit: self.audit,
            config: self.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditChannel, AuditRecord, AuditSink};
    use crate::tools;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use vulnscope_llm::{
        CompletionResponse, Content, LlmError, MockBackend, MockResponse, Role,
        StopReason, Usage,
    };
    use vulnscope_reports::ReportService;
    use vulnscope_warehouse::fixtures;

    fn text_response(text: &str) -> CompletionResponse {
        CompletionResponse::new(
            "msg",
            "gemini-2.5-flash",
            vec![ContentBlock::text(text)],
            StopReason::EndTurn,
            Usage::new(10, 20),
        )
    }

    fn call_response(name: &str, args: Value) -> CompletionResponse {
        CompletionResponse::new(
            "msg",
            "gemini-2.5-flash",
            vec![ContentBlock::tool_use("call_1", name, args)],
            StopReason::ToolUse,
            Usage::new(10, 20),
        )
    }

    struct StubReports {
        url: String,
    }

    #[async_trait]
    impl ReportService for StubReports {
        async fn market_report(&self, _market: &str) -> vulnscope_reports::Result<String> {
            Ok(self.url.clone())
        }

        async fn application_report(&self) -> vulnscope_reports::Result<String> {
            Err(vulnscope_reports::ReportError::NotConfigured)
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        records: Mutex<Vec<AuditRecord>>,
    }

    #[async_trait]
    impl AuditSink for RecordingSink {
        async fn write(&self, record: AuditRecord) -> Result<()> {
            self.records.lock().unwrap().push(record);
            Ok(())
        }

        fn accepts(&self, _channel: AuditChannel) -> bool {
            true
        }
    }

    fn registry() -> ToolRegistry {
        tools::registry(
            Arc::new(fixtures::seeded().unwrap()),
            Arc::new(StubReports {
                url: "https://x/y.pdf".to_string(),
            }),
        )
    }

    fn orchestrator(backend: Arc<MockBackend>) -> Orchestrator {
        Orchestrator::builder()
            .with_shared_backend(backend)
            .with_tools(registry())
            .with_system_prompt("be terse")
            .build()
            .unwrap()
    }

    fn ask(question: &str) -> Vec<ChatMessage> {
        vec![ChatMessage::user(question)]
    }

    /// Decoded `result` payload of the tool-result turn in a request.
    fn fed_back_result(backend: &MockBackend, request: usize) -> Value {
        let requests = backend.requests();
        let turn = requests[request].messages.last().unwrap().clone();
        assert_eq!(turn.role, Role::User);
        let block = turn.content.blocks().into_iter().next().unwrap();
        let ContentBlock::ToolResult { response, .. } = block else {
            panic!("expected a tool result, got {block:?}");
        };
        serde_json::from_str(response["result"].as_str().unwrap()).unwrap()
    }

    fn tool_result_turns(backend: &MockBackend, request: usize) -> usize {
        backend.requests()[request]
            .messages
            .iter()
            .filter(|m| {
                m.content
                    .blocks()
                    .iter()
                    .any(|b| matches!(b, ContentBlock::ToolResult { .. }))
            })
            .count()
    }

    #[test]
    fn test_builder_requires_backend() {
        let result = Orchestrator::builder().build();
        assert!(matches!(result, Err(AgentError::Config(_))));
    }

    #[tokio::test]
    async fn test_plain_text_single_round_trip() {
        let backend = Arc::new(MockBackend::with_text("Nothing to see here."));
        let orch = orchestrator(backend.clone());

        let reply = orch
            .chat(&ask("hello"), GenerationSettings::default())
            .await
            .unwrap();

        assert_eq!(reply.content, "Nothing to see here.");
        assert_eq!(reply.tool_calls, 0);
        assert!(reply.conversation_id.starts_with("conv_"));
        assert_eq!(backend.request_count(), 1);

        let req = &backend.requests()[0];
        assert_eq!(req.model, DEFAULT_MODEL);
        assert_eq!(req.system.as_deref(), Some("be terse"));
        assert_eq!(req.temperature, Some(0.0));
        assert_eq!(req.max_tokens, 65536);
        assert_eq!(req.tools.len(), 5);
        assert_eq!(req.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_run_sql_round_trip() {
        let backend = Arc::new(MockBackend::new(vec![
            call_response(
                "run_sql",
                json!({"sql": "SELECT COUNT(*) AS n FROM `gostlm.gost_bq.vulnerabilities_light`"}),
            ),
            text_response("Five. Thrilling."),
        ]));
        let orch = orchestrator(backend.clone());

        let reply = orch
            .chat(&ask("how many vulns?"), GenerationSettings::default())
            .await
            .unwrap();

        assert_eq!(reply.content, "Five. Thrilling.");
        assert_eq!(reply.tool_calls, 1);
        assert_eq!(backend.request_count(), 2);
        assert_eq!(tool_result_turns(&backend, 1), 1);

        let result = fed_back_result(&backend, 1);
        assert_eq!(result["columns"], json!(["n"]));
        assert_eq!(result["rows"], json!([[5]]));

        // user question, assistant call, tool result
        let second = &backend.requests()[1];
        assert_eq!(second.messages.len(), 3);
        assert_eq!(second.messages[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_only_first_call_is_executed() {
        let response = CompletionResponse::new(
            "msg",
            "m",
            vec![
                ContentBlock::tool_use("a", "list_tables", json!({"dataset": "gostlm.gost_bq"})),
                ContentBlock::tool_use("b", "no_such_tool", json!({})),
            ],
            StopReason::ToolUse,
            Usage::default(),
        );
        let backend = Arc::new(MockBackend::new(vec![response, text_response("done")]));
        let orch = orchestrator(backend.clone());

        let reply = orch.chat(&ask("tables?"), GenerationSettings::default()).await.unwrap();
        assert_eq!(reply.tool_calls, 1);
        assert!(fed_back_result(&backend, 1).as_array().unwrap().len() == 14);
    }

    #[tokio::test]
    async fn test_replayed_turn_keeps_only_executed_call() {
        let response = CompletionResponse::new(
            "msg",
            "m",
            vec![
                ContentBlock::text("Let me look."),
                ContentBlock::tool_use("a", "list_tables", json!({"dataset": "gostlm.gost_bq"})),
                ContentBlock::tool_use("b", "list_tables", json!({"dataset": "gostlm.gost_bq"})),
            ],
            StopReason::ToolUse,
            Usage::default(),
        );
        let backend = Arc::new(MockBackend::new(vec![response, text_response("done")]));
        orchestrator(backend.clone())
            .chat(&ask("tables?"), GenerationSettings::default())
            .await
            .unwrap();

        let replay = &backend.requests()[1].messages;
        let call_ids: Vec<String> = replay[1]
            .content
            .blocks()
            .into_iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, .. } => Some(id),
                _ => None,
            })
            .collect();
        let answered_ids: Vec<String> = replay[2]
            .content
            .blocks()
            .into_iter()
            .filter_map(|b| match b {
                ContentBlock::ToolResult { tool_use_id, .. } => Some(tool_use_id),
                _ => None,
            })
            .collect();
        assert_eq!(call_ids, vec!["a"]);
        assert_eq!(answered_ids, call_ids);
        assert_eq!(replay[1].content.blocks()[0], ContentBlock::text("Let me look."));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_client_error() {
        let backend = Arc::new(MockBackend::new(vec![call_response("drop_everything", json!({}))]));
        let orch = orchestrator(backend);

        let err = orch.chat(&ask("hi"), GenerationSettings::default()).await.unwrap_err();
        assert!(err.is_client_error());
        assert_eq!(err.to_string(), "Unknown tool: drop_everything");
    }

    #[tokio::test]
    async fn test_rejected_query_fails_without_executing() {
        let backend = Arc::new(MockBackend::new(vec![call_response(
            "run_sql",
            json!({"sql": "drop table gostlm.gost_bq.vulnerabilities_light"}),
        )]));
        let sink = Arc::new(RecordingSink::default());
        let (audit, handle) = crate::audit::AuditRecorder::spawn(sink.clone(), 16);
        let orch = Orchestrator::builder()
            .with_shared_backend(backend.clone())
            .with_tools(registry())
            .with_audit(audit)
            .build()
            .unwrap();

        let err = orch.chat(&ask("hi"), GenerationSettings::default()).await.unwrap_err();
        assert!(err.is_client_error());
        assert_eq!(err.to_string(), "Only SELECT queries are allowed.");
        assert_eq!(backend.request_count(), 1);

        drop(orch);
        handle.await.unwrap();
        assert!(sink.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_query_outside_namespace_rejected() {
        let backend = Arc::new(MockBackend::new(vec![call_response(
            "run_sql",
            json!({"sql": "SELECT * FROM other.table"}),
        )]));
        let err = orchestrator(backend)
            .chat(&ask("hi"), GenerationSettings::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Query must reference gostlm.gost_bq tables.");
    }

    #[tokio::test]
    async fn test_tool_failure_is_fed_back() {
        let backend = Arc::new(MockBackend::new(vec![
            call_response("get_table_schema", json!({"fully_qualified": "gostlm.gost_bq.nope"})),
            text_response("No such table, obviously."),
        ]));
        let orch = orchestrator(backend.clone());

        let reply = orch.chat(&ask("schema?"), GenerationSettings::default()).await.unwrap();
        assert_eq!(reply.content, "No such table, obviously.");

        let result = fed_back_result(&backend, 1);
        let error = result["error"].as_str().unwrap();
        assert!(error.contains("Not found: Table"), "{error}");
    }

    #[tokio::test]
    async fn test_write_past_validator_is_refused_by_store() {
        let backend = Arc::new(MockBackend::new(vec![
            call_response(
                "run_sql",
                json!({"sql": "CREATE TABLE gostlm.gost_bq.copied AS SELECT 1 AS x"}),
            ),
            call_response("list_tables", json!({"dataset": "gostlm.gost_bq"})),
            text_response("Nothing changed."),
        ]));
        let orch = orchestrator(backend.clone());

        let reply = orch.chat(&ask("copy it"), GenerationSettings::default()).await.unwrap();
        assert_eq!(reply.tool_calls, 2);

        let refused = fed_back_result(&backend, 1);
        assert!(refused["error"].as_str().unwrap().starts_with("Read-only warehouse"));
        let tables = fed_back_result(&backend, 2);
        assert!(!tables.as_array().unwrap().contains(&json!("copied")));
    }

    #[tokio::test]
    async fn test_report_link_is_wrapped() {
        let backend = Arc::new(MockBackend::new(vec![
            call_response("generate_report", json!({"market": "IT"})),
            text_response("Here, it expires in 5 minutes."),
        ]));
        let orch = orchestrator(backend.clone());
        orch.chat(&ask("report for IT"), GenerationSettings::default()).await.unwrap();

        assert_eq!(
            fed_back_result(&backend, 1),
            json!({
                "status": "Success",
                "markdown_link": "[Click here to download your report](https://x/y.pdf)",
                "message": "Report generated. The link expires in 5 minutes."
            })
        );
    }

    #[tokio::test]
    async fn test_report_error_is_not_wrapped() {
        let backend = Arc::new(MockBackend::new(vec![
            call_response("application_report", json!({})),
            text_response("No reports for you."),
        ]));
        let orch = orchestrator(backend.clone());
        orch.chat(&ask("app report"), GenerationSettings::default()).await.unwrap();

        assert_eq!(
            fed_back_result(&backend, 1),
            json!({"error": "Report output directory is not configured."})
        );
    }

    #[tokio::test]
    async fn test_blocked_final_answer_is_degraded() {
        let blocked = CompletionResponse::new("msg", "m", vec![], StopReason::Safety, Usage::default());
        let backend = Arc::new(MockBackend::new(vec![blocked]));
        let reply = orchestrator(backend)
            .chat(&ask("hi"), GenerationSettings::default())
            .await
            .unwrap();
        assert!(reply.content.starts_with("My response was blocked. (Error: "));
    }

    #[tokio::test]
    async fn test_engine_failure_is_server_error() {
        let backend = Arc::new(MockBackend::with_results(vec![MockResponse::Error(
            LlmError::Backend("upstream 503".into()),
        )]));
        let err = orchestrator(backend)
            .chat(&ask("hi"), GenerationSettings::default())
            .await
            .unwrap_err();
        assert!(!err.is_client_error());
        assert!(err.to_string().contains("upstream 503"));
    }

    #[tokio::test]
    async fn test_iteration_bound() {
        let responses = (0..4)
            .map(|_| call_response("list_tables", json!({"dataset": "gostlm.gost_bq"})))
            .collect();
        let backend = Arc::new(MockBackend::new(responses));
        let orch = Orchestrator::builder()
            .with_shared_backend(backend.clone())
            .with_tools(registry())
            .with_max_iterations(3)
            .build()
            .unwrap();

        let err = orch.chat(&ask("loop"), GenerationSettings::default()).await.unwrap_err();
        assert!(matches!(err, AgentError::MaxIterations(3)));
        assert_eq!(err.to_string(), "Maximum tool-call iterations (3) exceeded");
        assert_eq!(backend.request_count(), 4);
    }

    #[tokio::test]
    async fn test_no_user_message() {
        let backend = Arc::new(MockBackend::new(vec![]));
        let orch = orchestrator(backend.clone());
        let err = orch
            .chat(&[ChatMessage::assistant("hi")], GenerationSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::NoUserMessage));
        assert_eq!(backend.request_count(), 0);

        let err = orch.chat(&[], GenerationSettings::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "No user message provided.");
    }

    #[tokio::test]
    async fn test_last_entry_sent_as_user_content() {
        let backend = Arc::new(MockBackend::with_text("ok"));
        let orch = orchestrator(backend.clone());
        let messages = vec![
            ChatMessage::user("question"),
            ChatMessage::assistant("answer"),
        ];
        orch.chat(&messages, GenerationSettings::default()).await.unwrap();

        let req = &backend.requests()[0];
        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[1].role, Role::User);
        assert_eq!(req.messages[1].content, Content::Text("answer".into()));
    }

    #[tokio::test]
    async fn test_long_history_is_compacted_first() {
        let mut messages = Vec::new();
        for i in 0..6 {
            messages.push(ChatMessage::user(format!("q{i}")));
            messages.push(ChatMessage::assistant(format!("a{i}")));
        }
        messages.push(ChatMessage::user("latest"));

        let backend = Arc::new(MockBackend::new(vec![
            text_response("Summary of previous conversation: nothing useful."),
            text_response("Still nothing useful."),
        ]));
        let orch = orchestrator(backend.clone());
        let reply = orch.chat(&messages, GenerationSettings::default()).await.unwrap();
        assert_eq!(reply.content, "Still nothing useful.");

        let requests = backend.requests();
        assert_eq!(requests[0].model, "gemini-2.5-flash-lite");
        let main = &requests[1];
        // summary turn plus the four most recent raw turns
        assert_eq!(main.messages.len(), 5);
        assert!(main.messages[0].content.to_text().starts_with("<system_summary>"));
        assert_eq!(main.messages[4].content.to_text(), "latest");
    }

    #[tokio::test]
    async fn test_audit_events_recorded() {
        let backend = Arc::new(MockBackend::new(vec![
            call_response(
                "run_sql",
                json!({"sql": "SELECT market FROM gostlm.gost_bq.market_kpi_summary"}),
            ),
            text_response("Markets."),
        ]));
        let sink = Arc::new(RecordingSink::default());
        let (audit, handle) = crate::audit::AuditRecorder::spawn(sink.clone(), 16);
        let orch = Orchestrator::builder()
            .with_shared_backend(backend)
            .with_tools(registry())
            .with_audit(audit)
            .build()
            .unwrap();

        let reply = orch.chat(&ask("markets"), GenerationSettings::default()).await.unwrap();
        drop(orch);
        handle.await.unwrap();

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(
            records[0],
            AuditRecord::Sql {
                query: "SELECT market FROM gostlm.gost_bq.market_kpi_summary".into()
            }
        );
        let AuditRecord::Event(call) = &records[1] else {
            panic!("expected event");
        };
        assert_eq!(call.conversation_id, reply.conversation_id);
        assert_eq!(call.tool_name.as_deref(), Some("run_sql"));
        assert!(call.tool_response.as_deref().unwrap().contains("columns"));
        let AuditRecord::Event(done) = &records[2] else {
            panic!("expected event");
        };
        assert_eq!(done.final_response.as_deref(), Some("Markets."));
    }

    #[test]
    fn test_wrap_report_link_passes_through_non_strings() {
        let err = json!({"error": "boom"});
        assert_eq!(wrap_report_link(err.clone()), err);
    }
}

//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use serde_json::Value;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use vulnscope_agent::{Orchestrator, tools};
use vulnscope_llm::{
    CompletionRequest, CompletionResponse, ContentBlock, MockBackend, StopReason, Usage,
};
use vulnscope_reports::{LinkIssuer, ReportGenerator};
use vulnscope_server::{Server, ServerConfig};
use vulnscope_warehouse::fixtures;

/// A real server on a free port, wired to the seeded warehouse, a report
/// generator writing into a temp directory and a scripted engine.
pub struct TestServer {
    pub addr: SocketAddr,
    pub token: String,
    pub client: Client,
    /// Scripted engine; inspect `requests()` to see what the loop sent.
    pub backend: Arc<MockBackend>,
    pub reports_dir: PathBuf,
    _handle: JoinHandle<()>,
    _temp_dir: TempDir,
}

impl TestServer {
    /// Start with engine replies given as plain text.
    pub async fn start_with_responses(responses: Vec<&str>) -> Result<Self> {
        let scripted = responses
            .into_iter()
            .enumerate()
            .map(|(i, text)| text_reply(&format!("mock_msg_{i}"), text))
            .collect();
        Self::start_with_script(scripted).await
    }

    /// Start with a full engine script (tool calls and text).
    pub async fn start_with_script(script: Vec<CompletionResponse>) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let reports_dir = temp_dir.path().join("reports");
        let token = "test-token".to_string();
        let addr = find_available_port().await?;

        let backend = Arc::new(MockBackend::new(script));
        let warehouse = Arc::new(fixtures::seeded()?);
        let links = Arc::new(LinkIssuer::new(format!("http://{addr}")));
        let reports = Arc::new(
            ReportGenerator::new(warehouse.clone(), links.clone())
                .with_output_dir(Some(reports_dir.clone())),
        );

        let orchestrator = Orchestrator::builder()
            .with_shared_backend(backend.clone())
            .with_tools(tools::registry(warehouse, reports))
            .with_model("gemini-2.5-flash")
            .build()?;

        let config = ServerConfig::new(Some(token.clone()))
            .with_bind_address(addr)
            .with_rate_limiting(false)
            .with_request_logging(false);

        let server = Server::new(orchestrator, links, config);
        let handle = tokio::spawn(async move {
            let _ = server.run_on(addr).await;
        });

        let client = Client::new();
        wait_for_server(&client, addr).await?;

        Ok(Self {
            addr,
            token,
            client,
            backend,
            reports_dir,
            _handle: handle,
            _temp_dir: temp_dir,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Authenticated GET.
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url(), path))
            .bearer_auth(&self.token)
    }

    /// Authenticated POST.
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url(), path))
            .bearer_auth(&self.token)
    }

    /// Send a single-turn chat and return status plus body.
    pub async fn chat(&self, question: &str) -> Result<(u16, Value)> {
        let resp = self
            .post("/v1/chat/completions")
            .json(&serde_json::json!({
                "messages": [{"role": "user", "content": question}]
            }))
            .send()
            .await?;
        let status = resp.status().as_u16();
        Ok((status, resp.json().await?))
    }
}

pub fn text_reply(id: &str, text: &str) -> CompletionResponse {
    CompletionResponse::new(
        id,
        "mock-model",
        vec![ContentBlock::text(text)],
        StopReason::EndTurn,
        Usage::default(),
    )
}

pub fn tool_call(id: &str, name: &str, input: Value) -> CompletionResponse {
    CompletionResponse::new(
        id,
        "mock-model",
        vec![ContentBlock::tool_use(format!("call_{id}"), name, input)],
        StopReason::ToolUse,
        Usage::default(),
    )
}

/// Decoded payload of the newest tool result in `request`.
pub fn last_tool_result(request: &CompletionRequest) -> Option<Value> {
    request
        .messages
        .iter()
        .rev()
        .flat_map(|m| m.content.blocks())
        .find_map(|block| match block {
            ContentBlock::ToolResult { response, .. } => response["result"]
                .as_str()
                .and_then(|encoded| serde_json::from_str(encoded).ok()),
            _ => None,
        })
}

async fn find_available_port() -> Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}

async fn wait_for_server(client: &Client, addr: SocketAddr) -> Result<()> {
    let url = format!("http://{addr}/healthz");
    timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(resp) = client.get(&url).send().await
                && resp.status().is_success()
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .map_err(|_| anyhow::anyhow!("server at {addr} did not become ready"))
}

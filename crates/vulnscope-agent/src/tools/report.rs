//! Report tools. Both return the download URL as a JSON string.

use async_trait::async_trait;
use serde_json::{Value, json};
use vulnscope_reports::SharedReportService;

use crate::error::Result;
use crate::tool::{ParamExt, Tool, ToolContext, ToolKind};

pub struct GenerateReportTool {
    reports: SharedReportService,
}

impl GenerateReportTool {
    pub fn new(reports: SharedReportService) -> Self {
        Self { reports }
    }
}

#[async_trait]
impl Tool for GenerateReportTool {
    fn name(&self) -> &str {
        ToolKind::GenerateReport.name()
    }

    fn description(&self) -> &str {
        "Generates a comprehensive downloadable summary report for a specific market or 'global'. \
         Use this when the user asks for a 'report', 'summary', or 'overview'. \
         Runs many hardcoded queries."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "market": {
                    "type": "string",
                    "description": "The market to generate the report for. Use 'global' for an overview of all markets."
                }
            },
            "required": ["market"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<Value> {
        let market = params.required_str("market", "pass a market name or 'global'")?;
        let url = self.reports.market_report(market).await?;
        Ok(Value::String(url))
    }
}

pub struct ApplicationReportTool {
    reports: SharedReportService,
}

impl ApplicationReportTool {
    pub fn new(reports: SharedReportService) -> Self {
        Self { reports }
    }
}

#[async_trait]
impl Tool for ApplicationReportTool {
    fn name(&self) -> &str {
        ToolKind::ApplicationReport.name()
    }

    fn description(&self) -> &str {
        "Generates a comprehensive downloadable summary report for application. \
         Use this when the user asks for a 'report', 'summary', or 'overview' for the `applications`. \
         Runs many hardcoded queries."
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _params: Value, _ctx: &ToolContext) -> Result<Value> {
        let url = self.reports.application_report().await?;
        Ok(Value::String(url))
    }
}

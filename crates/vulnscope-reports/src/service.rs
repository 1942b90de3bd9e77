use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;
use vulnscope_warehouse::SharedWarehouse;

use crate::catalog;
use crate::error::{ReportError, Result};
use crate::fanout::{self, DEFAULT_CONCURRENCY};
use crate::links::{FAILURE_LINK_TTL, LinkIssuer, SUCCESS_LINK_TTL};
use crate::render;

/// Produces report artifacts and returns a download link.
///
/// On success the returned string is the URL. When generation fails after
/// the output location is known, an error artifact is written instead and
/// the string reads `Failed to generate report. Error log: {url}`.
#[async_trait]
pub trait ReportService: Send + Sync {
    /// Report for one market, or all markets when `market` is `global`.
    async fn market_report(&self, market: &str) -> Result<String>;

    /// Report over application assets.
    async fn application_report(&self) -> Result<String>;
}

pub type SharedReportService = Arc<dyn ReportService>;

/// Warehouse-backed [`ReportService`] writing Markdown artifacts to disk.
pub struct ReportGenerator {
    warehouse: SharedWarehouse,
    links: Arc<LinkIssuer>,
    output_dir: Option<PathBuf>,
    concurrency: usize,
}

impl ReportGenerator {
    pub fn new(warehouse: SharedWarehouse, links: Arc<LinkIssuer>) -> Self {
        Self {
            warehouse,
            links,
            output_dir: None,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_output_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.output_dir = dir;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn links(&self) -> &Arc<LinkIssuer> {
        &self.links
    }

    async fn publish<F>(&self, file_name: String, title: &str, build: F) -> Result<String>
    where
        F: Future<Output = Result<String>> + Send,
    {
        let dir = self.output_dir.as_ref().ok_or(ReportError::NotConfigured)?;
        let path = dir.join(&file_name);

        let outcome: Result<()> = async {
            let markdown = build.await?;
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&path, markdown).await?;
            Ok::<(), ReportError>(())
        }
        .await;

        match outcome {
            Ok(()) => {
                tracing::info!(file = %file_name, "Report written");
                Ok(self.links.issue(path, SUCCESS_LINK_TTL))
            }
            Err(e) => {
                tracing::error!(file = %file_name, error = %e, "Failed to generate report");
                tokio::fs::create_dir_all(dir).await?;
                tokio::fs::write(&path, render::error_report(title, &e.to_string())).await?;
                let url = self.links.issue(path, FAILURE_LINK_TTL);
                Ok(format!("Failed to generate report. Error log: {}", url))
            }
        }
    }
}

fn file_component(market: &str) -> String {
    market
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn generated_at() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

#[async_trait]
impl ReportService for ReportGenerator {
    async fn market_report(&self, market: &str) -> Result<String> {
        tracing::info!(market, "Generating report");
        let file_name = format!(
            "VULNSCOPE_Report_{}_{}.md",
            file_component(market),
            Uuid::new_v4()
        );
        let title = format!("report for {}", market);

        self.publish(file_name, &title, async {
            let global = catalog::is_global(market);
            let data = fanout::collect(
                self.warehouse.as_ref(),
                catalog::market_queries(market),
                self.concurrency,
            )
            .await;
            Ok(render::market_report(market, global, &generated_at(), &data))
        })
        .await
    }

    async fn application_report(&self) -> Result<String> {
        tracing::info!("Generating application report");
        let file_name = format!("VULNSCOPE_Application_Report_{}.md", Uuid::new_v4());

        self.publish(file_name, "application report", async {
            let data = fanout::collect(
                self.warehouse.as_ref(),
                catalog::application_queries(),
                self.concurrency,
            )
            .await;
            Ok(render::application_report(&generated_at(), &data))
        })
        .await
    }
}

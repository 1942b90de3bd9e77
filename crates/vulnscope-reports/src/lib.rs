//! Vulnerability report generation.
//!
//! A report is a fixed catalog of named warehouse queries, run concurrently
//! with a bounded number in flight, rendered to Markdown and written to the
//! output directory. The caller receives a short-lived download link.

pub mod catalog;
pub mod error;
pub mod fanout;
pub mod links;
pub mod render;
pub mod service;

pub use error::{ReportError, Result};
pub use links::{FAILURE_LINK_TTL, LinkIssuer, SUCCESS_LINK_TTL};
pub use service::{ReportGenerator, ReportService, SharedReportService};

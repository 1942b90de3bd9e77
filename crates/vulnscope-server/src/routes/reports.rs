//! Report downloads behind expiring links.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};

use crate::error::{Result, ServerError};
use crate::state::AppState;

/// GET /reports/{token}
pub async fn download_report_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response> {
    let path = state
        .links
        .resolve(&token)
        .ok_or_else(|| ServerError::NotFound("report link is unknown or expired".into()))?;

    let body = match tokio::fs::read_to_string(&path).await {
        Ok(body) => body,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ServerError::NotFound("report artifact is missing".into()));
        }
        Err(e) => return Err(ServerError::Internal(format!("failed to read report: {e}"))),
    };

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("report.md")
        .to_string();

    tracing::info!(file = %filename, "Serving report");

    Ok((
        [
            (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response())
}

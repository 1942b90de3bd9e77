use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Report output directory is not configured.")]
    NotConfigured,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Warehouse error: {0}")]
    Warehouse(#[from] vulnscope_warehouse::WarehouseError),
}

pub type Result<T> = std::result::Result<T, ReportError>;

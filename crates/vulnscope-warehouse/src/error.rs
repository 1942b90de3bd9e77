use thiserror::Error;

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Not found: Table {0}")]
    TableNotFound(String),

    #[error("Not found: Dataset {0}")]
    DatasetNotFound(String),

    #[error("Invalid identifier: {0}")]
    InvalidName(String),

    #[error("Read-only warehouse: {0}")]
    ReadOnly(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WarehouseError>;

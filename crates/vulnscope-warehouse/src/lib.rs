//! Analytical warehouse access for vulnscope.
//!
//! The [`Warehouse`] trait is the seam the orchestrator's tools and the
//! report pipeline query through. [`SqliteWarehouse`] is the bundled
//! implementation; table names follow the `project.dataset.table` form
//! used throughout the prompts and report queries (see [`tables`]).

pub mod error;
pub mod sqlite;
pub mod tables;
pub mod types;
pub mod warehouse;

pub use error::{Result, WarehouseError};
pub use sqlite::SqliteWarehouse;
pub use types::{ColumnSchema, ParamValue, QueryParam, QueryResult, TableSchema};
pub use warehouse::{SharedWarehouse, Warehouse};

#[cfg(any(test, feature = "testing"))]
pub mod fixtures;

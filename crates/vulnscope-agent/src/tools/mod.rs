//! The five engine-callable tools.

mod report;
mod warehouse;

pub use report::{ApplicationReportTool, GenerateReportTool};
pub use warehouse::{DEFAULT_MAX_RESULTS, GetTableSchemaTool, ListTablesTool, RunSqlTool};

use vulnscope_reports::SharedReportService;
use vulnscope_warehouse::SharedWarehouse;

use crate::tool::ToolRegistry;

/// Registry holding every tool, wired to the given backends.
pub fn registry(warehouse: SharedWarehouse, reports: SharedReportService) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(ListTablesTool::new(warehouse.clone()));
    registry.register(GetTableSchemaTool::new(warehouse.clone()));
    registry.register(RunSqlTool::new(warehouse));
    registry.register(GenerateReportTool::new(reports.clone()));
    registry.register(ApplicationReportTool::new(reports));
    registry
}

//! Console plus rolling JSON file logging.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

const CRATES: &[&str] = &[
    "vulnscope",
    "vulnscope_agent",
    "vulnscope_llm",
    "vulnscope_server",
    "vulnscope_reports",
    "vulnscope_warehouse",
    "vulnscope_config",
];

fn directives(level: &str, fallback: &str) -> String {
    let mut parts: Vec<String> = CRATES.iter().map(|c| format!("{c}={level}")).collect();
    parts.push(fallback.to_string());
    parts.join(",")
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the console filter and `json` switches the console
/// to JSON lines. The file layer writes JSON lines to a daily log under the
/// platform data directory. The returned guard must live for the life of
/// the process.
pub fn init(verbose: bool, json: bool) -> Option<WorkerGuard> {
    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new(directives("debug", "info"))
        } else {
            EnvFilter::new(directives("info", "warn"))
        }
    });
    let console: Box<dyn Layer<Registry> + Send + Sync> = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    };

    let Some(log_dir) = vulnscope_config::log_dir() else {
        tracing_subscriber::registry().with(console).init();
        return None;
    };

    let file_appender = tracing_appender::rolling::daily(&log_dir, "vulnscope.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(console)
        .with(
            fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new(directives("trace", "info"))),
        )
        .init();

    Some(guard)
}

use anyhow::{Context, Result};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::Layer as FmtLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

const LOG_DIRECTORY: &str = ".logs";

/// Installs the global tracing subscriber
///
/// Console output is always enabled and filtered through `RUST_LOG` (default `info`).
/// With `log_inside_file` set, three daily-rotated files are written as well:
/// `combined` with everything, `warn` and `error` with the matching levels only.
pub fn setup_logger(log_inside_file: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = FmtLayer::new()
        .with_line_number(false)
        .with_target(false)
        .with_thread_ids(false);

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if !log_inside_file {
        registry.init();
        return Ok(());
    }

    let combined_layer = FmtLayer::new()
        .with_writer(rolling_appender("combined")?)
        .with_ansi(false)
        .with_thread_ids(false);

    let warn_layer = FmtLayer::new()
        .with_writer(rolling_appender("warn")?)
        .with_ansi(false)
        .with_thread_ids(false)
        .with_filter(EnvFilter::new("warn"));

    let error_layer = FmtLayer::new()
        .with_writer(rolling_appender("error")?)
        .with_ansi(false)
        .with_thread_ids(false)
        .with_filter(EnvFilter::new("error"));

    registry
        .with(combined_layer)
        .with(warn_layer)
        .with(error_layer)
        .init();

    Ok(())
}

fn rolling_appender(prefix: &str) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(LOG_DIRECTORY)
        .with_context(|| format!("Failed to create {} log appender", prefix))
}

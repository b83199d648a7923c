//! Tracing subscriber setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    Pretty,
    /// One JSON object per event, for log shippers.
    #[default]
    Json,
}

#[derive(Debug, Clone, clap::Args)]
pub struct LogArgs {
    /// Default log level; `RUST_LOG` takes precedence when set
    #[arg(long, global = true, default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,

    /// Log output format
    #[arg(long, global = true, default_value = "json", env = "LOG_FORMAT")]
    pub log_format: LogFormat,
}

/// Directive used when `RUST_LOG` is unset.
pub fn default_directive(level: &str) -> String {
    let level = level.trim().to_ascii_lowercase();
    let level = match level.as_str() {
        "warning" => "warn",
        "critical" | "fatal" => "error",
        "" => "info",
        other => other,
    };
    format!("smartdiary_deploy={level},smartdiary_deploy_core={level},warn")
}

/// Installs the global subscriber. Every event carries a timestamp.
pub fn init(args: &LogArgs) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directive(&args.log_level).into());

    let registry = tracing_subscriber::registry().with(filter);

    match args.log_format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
            .init(),
    }
}

use tracing_subscriber::EnvFilter;

use crate::lcams::tools::error::{Result, ToolError};

/// Installs the global subscriber. `RUST_LOG` wins when set; otherwise each
/// `-v` raises the crate's level from `warn` up to `trace`.
pub fn init(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("lcams_tools={level}").into()),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| ToolError::Logging(err.to_string()))
}

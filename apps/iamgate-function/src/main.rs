//! iamgate function - one signed upstream call per invocation.
//!
//! Reads a single JSON event from stdin, forwards the configured upstream
//! call with credentials taken from the environment, and writes the upstream
//! JSON to stdout. Logs are emitted as JSON lines on stderr. A failed call
//! exits non-zero with the failure's message.
//!
//! # Usage
//!
//! ```text
//! echo '{}' | AWS_ACCESS_KEY_ID=... AWS_SECRET_ACCESS_KEY=... AWS_SESSION_TOKEN=... iamgate-function
//! ```

mod handler;

use anyhow::{Context, Result};
use iamgate_core::ProxyConfig;
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::handler::FunctionHandler;

/// Initialize JSON logging on stderr.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Parse the invocation event; empty input is `null`.
fn parse_event(input: &str) -> Result<Value> {
    if input.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(input).context("invocation event is not valid JSON")
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ProxyConfig::from_env().context("invalid configuration")?;
    init_tracing(&config.log_level)?;

    let mut input = String::new();
    tokio::io::stdin()
        .read_to_string(&mut input)
        .await
        .context("failed to read invocation event")?;
    let event = parse_event(&input)?;

    let handler = FunctionHandler::from_config(&config)?;
    match handler.invoke(&event).await {
        Ok(data) => {
            println!("{data}");
            Ok(())
        }
        Err(err) => {
            error!(error = %err, "invocation failed");
            Err(err)
        }
    }
}

//! iamgate server - forwards requests to a private API Gateway.
//!
//! Every `GET /` resolves temporary credentials (from the instance metadata
//! service by default), signs the configured upstream call with SigV4 and
//! returns the upstream JSON response.
//!
//! # Usage
//!
//! ```text
//! API_GATEWAY_HOST=abc123.execute-api.ap-northeast-1.amazonaws.com PORT=8000 iamgate-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `PORT` | `8000` | Listen port |
//! | `LISTEN_HOST` | `0.0.0.0` | Bind host |
//! | `API_GATEWAY_HOST` | `xxxxxxxx.execute-api.ap-northeast-1.amazonaws.com` | Upstream host |
//! | `API_GATEWAY_STAGE` | `Dev` | Upstream stage |
//! | `CREDENTIAL_SOURCE` | `metadata` | `metadata` or `environment` |
//! | `METADATA_ENDPOINT` | `http://169.254.169.254` | Instance metadata base URL |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

mod gateway;
mod service;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use iamgate_auth::credential_source;
use iamgate_core::{CredentialOrigin, ProxyConfig};
use iamgate_proxy::{HttpForwarder, SigningProxy};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::gateway::{GatewayService, UpstreamCall};

/// Server version logged at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
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
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

/// Wire the credential source, forwarder and signing pipeline from `config`.
fn build_gateway(config: &ProxyConfig) -> Result<GatewayService> {
    let origin = config.credential_origin_or(CredentialOrigin::Metadata);
    let credentials =
        credential_source(origin, config).context("failed to build credential source")?;
    let forwarder = HttpForwarder::new().context("failed to build upstream HTTP client")?;

    info!(
        credential_origin = %origin,
        upstream_host = %config.api_gateway_host,
        stage = %config.api_gateway_stage,
        "configured signing pipeline"
    );

    let proxy = SigningProxy::new(config, credentials, Arc::new(forwarder));
    Ok(GatewayService::new(proxy, UpstreamCall::from_config(config)))
}

/// Run the accept loop, serving connections until a shutdown signal is received.
async fn serve(listener: TcpListener, service: GatewayService) -> Result<()> {
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.clone();
                let conn = http.serve_connection(TokioIo::new(stream), svc);
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    graceful.shutdown().await;
    info!("all connections drained, exiting");

    Ok(())
}

/// Query a running server's health endpoint.
///
/// Succeeds when the response is 200 OK and reports the server as running.
async fn run_health_check(addr: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;

    let (mut reader, mut writer) = stream.into_split();

    let request = format!("GET /health HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    writer.write_all(request.as_bytes()).await?;
    writer.shutdown().await?;

    let mut response = String::new();
    reader.read_to_string(&mut response).await?;

    if response.contains("200 OK") && response.contains("\"running\"") {
        Ok(())
    } else {
        anyhow::bail!("unhealthy response from {addr}")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ProxyConfig::from_env().context("invalid configuration")?;

    // Handle --health-check flag for container health checks.
    if std::env::args().any(|a| a == "--health-check") {
        let addr = config.listen_addr().replace("0.0.0.0", "127.0.0.1");
        let healthy = run_health_check(&addr).await.is_ok();
        std::process::exit(i32::from(!healthy));
    }

    init_tracing(&config.log_level)?;

    let gateway = build_gateway(&config)?;

    let listen_addr = config.listen_addr();
    let addr: SocketAddr = listen_addr
        .parse()
        .with_context(|| format!("invalid bind address: {listen_addr}"))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(%addr, version = VERSION, "starting iamgate server");

    serve(listener, gateway).await
}

//! Integration tests for iamgate.
//!
//! Each test starts an in-process HTTP stub standing in for the instance
//! metadata service or the upstream API Gateway, so the tests run as part of
//! a normal `cargo test`:
//!
//! ```text
//! cargo test -p iamgate-integration
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Once};

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// A request as received by a [`StubServer`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Request method.
    pub method: Method,
    /// Path and query string.
    pub path: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: String,
}

impl RecordedRequest {
    /// The value of header `name` as a string.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

type Responder = dyn Fn(&RecordedRequest) -> (StatusCode, String) + Send + Sync;

/// HTTP/1 server on a random local port answering with a fixed function.
pub struct StubServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: JoinHandle<()>,
}

impl StubServer {
    /// Start a server answering every request with `responder`.
    pub async fn start<F>(responder: F) -> Self
    where
        F: Fn(&RecordedRequest) -> (StatusCode, String) + Send + Sync + 'static,
    {
        init_tracing();

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind stub server");
        let addr = listener.local_addr().expect("stub server has no address");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let responder: Arc<Responder> = Arc::new(responder);

        let recorded = Arc::clone(&requests);
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let responder = Arc::clone(&responder);
                let recorded = Arc::clone(&recorded);

                tokio::spawn(async move {
                    let service = service_fn(move |req: http::Request<Incoming>| {
                        let responder = Arc::clone(&responder);
                        let recorded = Arc::clone(&recorded);
                        async move {
                            let (parts, body) = req.into_parts();
                            let bytes = body.collect().await?.to_bytes();
                            let path = parts
                                .uri
                                .path_and_query()
                                .map_or_else(|| parts.uri.path().to_owned(), ToString::to_string);
                            let request = RecordedRequest {
                                method: parts.method,
                                path,
                                headers: parts.headers,
                                body: String::from_utf8_lossy(&bytes).into_owned(),
                            };
                            tracing::debug!(method = %request.method, path = %request.path, "stub received request");

                            let (status, body) = responder.as_ref()(&request);
                            recorded.lock().push(request);

                            let mut response = http::Response::new(Full::new(Bytes::from(body)));
                            *response.status_mut() = status;
                            Ok::<_, hyper::Error>(response)
                        }
                    });

                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        Self {
            addr,
            requests,
            handle,
        }
    }

    /// Base URL of the server, without a trailing slash.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// `host:port` of the server.
    #[must_use]
    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    /// Requests received so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }
}

impl fmt::Debug for StubServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StubServer")
            .field("addr", &self.addr)
            .finish_non_exhaustive()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Address of a local port with nothing listening on it.
#[must_use]
pub fn closed_port_url() -> String {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .expect("failed to bind placeholder listener")
        .local_addr()
        .expect("placeholder listener has no address")
        .port();
    format!("http://127.0.0.1:{port}")
}

mod test_forward;
mod test_metadata;
mod test_pipeline;

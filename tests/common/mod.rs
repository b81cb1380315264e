//! Shared utilities for integration testing.

use parking_lot::Mutex;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use f5xc_exporter::client::ResilientClient;
use f5xc_exporter::config::{ClientConfig, RetryConfig, TenantConfig};
use f5xc_exporter::observability::MetricsRegistry;
use f5xc_exporter::resilience::CircuitBreaker;

/// Canned response returned by the mock tenant API.
#[derive(Clone, Debug)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

#[allow(dead_code)]
impl MockResponse {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: "{}".to_string(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// Handle to a running mock backend.
pub struct MockBackend {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    paths: Arc<Mutex<Vec<String>>>,
}

#[allow(dead_code)]
impl MockBackend {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of requests received so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Request paths (without query) in arrival order.
    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().clone()
    }
}

/// Start a programmable mock backend on an ephemeral port.
///
/// The handler receives the request path and decides the response.
pub async fn start_programmable_backend<F, Fut>(f: F) -> MockBackend
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MockResponse> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let paths = Arc::new(Mutex::new(Vec::new()));
    let f = Arc::new(f);

    let (h, p) = (hits.clone(), paths.clone());
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let (f, h, p) = (f.clone(), h.clone(), p.clone());
                    tokio::spawn(async move {
                        let _ = handle_connection(socket, f, h, p).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockBackend { addr, hits, paths }
}

async fn handle_connection<F, Fut>(
    mut socket: TcpStream,
    f: Arc<F>,
    hits: Arc<AtomicUsize>,
    paths: Arc<Mutex<Vec<String>>>,
) -> std::io::Result<()>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MockResponse> + Send + 'static,
{
    let Some(path) = read_request(&mut socket).await? else {
        return Ok(());
    };
    hits.fetch_add(1, Ordering::SeqCst);
    paths.lock().push(path.clone());

    let response = f(path).await;
    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
        response.status,
        reason(response.status),
        response.body.len()
    );
    for (name, value) in &response.headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str("\r\n");

    socket.write_all(head.as_bytes()).await?;
    socket.write_all(response.body.as_bytes()).await?;
    socket.shutdown().await?;
    tokio::time::sleep(Duration::from_millis(10)).await;
    Ok(())
}

/// Read one request (head plus Content-Length body) and return its path.
async fn read_request(socket: &mut TcpStream) -> std::io::Result<Option<String>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < head_end + content_length {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let path = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .map(|target| target.split('?').next().unwrap_or(target).to_string());
    Ok(path)
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        401 => "Unauthorized",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// Build a client against `backend` with millisecond backoff.
#[allow(dead_code)]
pub fn client_for(
    backend: &MockBackend,
    breaker: Arc<CircuitBreaker>,
    max_attempts: u32,
    registry: &MetricsRegistry,
) -> ResilientClient {
    ResilientClient::new(
        &TenantConfig {
            url: backend.url(),
            access_token: "test-token".to_string(),
        },
        &ClientConfig {
            request_timeout_secs: 5,
            max_concurrent_requests: 5,
        },
        &RetryConfig {
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 5,
        },
        breaker,
        registry,
    )
    .unwrap()
}

//! Shared harness for server integration tests.
//!
//! ISOLATION STRATEGY:
//! - Each test binds its own server on a unique port
//! - History and chaos settings live in that server only
//! - Metrics are process-global, so tests only check they are exposed

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::sleep;

use putter::config::ServerConfig;

/// Global port allocator for test isolation.
static TEST_PORT_COUNTER: AtomicU16 = AtomicU16::new(18700);

/// One running server.
pub struct TestServer {
    pub addr: SocketAddr,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a fresh server with `config` (its bind address is overridden).
    pub async fn start(config: ServerConfig) -> Self {
        let listener = loop {
            let port = TEST_PORT_COUNTER.fetch_add(1, Ordering::SeqCst);
            let addr: SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();
            if let Ok(listener) = TcpListener::bind(addr).await {
                break listener;
            }
        };
        let addr = listener.local_addr().unwrap();

        let config = ServerConfig {
            bind_addr: addr,
            ..config
        };
        let handle = tokio::spawn(async move {
            putter::server::listener::serve(listener, config).await.unwrap();
        });

        Self { addr, handle }
    }

    /// Send one HTTP/1.1 request on a fresh connection.
    pub async fn send(&self, method: &str, target: &str, body: &[u8]) -> HttpReply {
        send_raw(self.addr, method, target, body).await
    }

    /// Poll the inspection endpoint until it holds `expected` records.
    pub async fn wait_for_history(&self, expected: usize) -> String {
        for _ in 0..200 {
            let reply = self.send("GET", "/recordedRequests", b"").await;
            if reply.body.matches("\n--\n").count() >= expected {
                return reply.body;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("history never reached {} records", expected);
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Parsed response.
#[derive(Debug)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

pub async fn send_raw(addr: SocketAddr, method: &str, target: &str, body: &[u8]) -> HttpReply {
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let mut request = format!(
        "{} {} HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        method,
        target,
        body.len()
    )
    .into_bytes();
    // Single write so the server sees head and body together.
    request.extend_from_slice(body);
    stream.write_all(&request).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8_lossy(&raw).into_owned();

    let (head, body) = raw.split_once("\r\n\r\n").expect("malformed response");
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .expect("missing status code");

    HttpReply {
        status,
        body: body.to_string(),
    }
}

/// Record blocks from an inspection body, newest first.
pub fn record_lines(inspection: &str) -> Vec<String> {
    inspection
        .split("\n--\n")
        .filter_map(|block| block.trim_start_matches('\n').lines().next())
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
        .collect()
}

#![allow(dead_code)]

use reqwest::Method;
use searchlink_rs::{RawResponse, Transport, TransportError};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing_subscriber::EnvFilter;

/// Log to the test writer; `RUST_LOG` overrides the default filter
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("searchlink_rs=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Transport that answers from a closure of (call number, url) and records
/// every URL it was asked for.
pub struct ScriptedTransport<F> {
    respond: F,
    calls: Mutex<Vec<String>>,
}

impl<F> ScriptedTransport<F> {
    pub fn new(respond: F) -> Arc<Self>
    where
        F: Fn(usize, &str) -> Result<RawResponse, TransportError> + Send + Sync,
    {
        Arc::new(Self {
            respond,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl<F> Transport for ScriptedTransport<F>
where
    F: Fn(usize, &str) -> Result<RawResponse, TransportError> + Send + Sync,
{
    async fn perform(
        &self,
        _method: Method,
        url: &str,
        _body: Option<&[u8]>,
        _timeout: Duration,
    ) -> Result<RawResponse, TransportError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(url.to_string());
            calls.len() - 1
        };
        (self.respond)(call, url)
    }
}

pub fn ok(body: &str) -> Result<RawResponse, TransportError> {
    Ok(RawResponse::new(200, body))
}

pub fn refused() -> Result<RawResponse, TransportError> {
    Err(TransportError::connect("connection refused"))
}

/// Base URL (scheme, host and port) of a full request URL
pub fn base_of(url: &str) -> &str {
    let rest = url.strip_prefix("http://").unwrap_or(url);
    let host_len = rest.find('/').unwrap_or(rest.len());
    &url[..url.len() - rest.len() + host_len]
}

/// Address of a port nobody is listening on
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// Serve the same HTTP response to every connection, then close it
pub async fn spawn_canned_server(status: u16, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                if read_request(&mut stream).await.is_err() {
                    return;
                }
                let response = format!(
                    "HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    format!("http://{addr}")
}

/// Accept connections and never answer
pub async fn spawn_silent_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    format!("http://{addr}")
}

async fn read_request(stream: &mut TcpStream) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                return Ok(());
            }
        }
    }
}

//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;

use loopback_proxy::net::ConnectionId;
use loopback_proxy::{
    ConnectionHandler, HandlerLauncher, HandlerSpawnRecord, ProxyError, ProxyServer,
};

/// Start a mock HTTP backend that reads the request head, then answers with
/// a fixed body and closes.
pub async fn start_http_backend(addr: SocketAddr, body: &'static str) {
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                if read_until_blank_line(&mut socket).await.is_err() {
                    return;
                }
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
                // Drain so closing does not reset the connection.
                let mut sink = [0u8; 1024];
                while let Ok(n) = socket.read(&mut sink).await {
                    if n == 0 {
                        break;
                    }
                }
            });
        }
    });
}

/// Start a TCP echo server.
pub async fn start_echo_backend(addr: SocketAddr) {
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = socket.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });
}

/// Read up to and including the first `\r\n\r\n`.
pub async fn read_until_blank_line(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        let n = stream.read(&mut byte).await?;
        if n == 0 {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        head.push(byte[0]);
    }
    Ok(String::from_utf8_lossy(&head).into_owned())
}

/// Run `server.start()` on its own task and wait until it is listening.
pub async fn spawn_server(server: &ProxyServer) -> JoinHandle<Result<(), ProxyError>> {
    let task = tokio::spawn({
        let server = server.clone();
        async move { server.start().await }
    });

    for _ in 0..200 {
        if server.is_running() {
            return task;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("proxy on port {} never started", server.port());
}

/// Hands every spawn record to the test instead of running a handler.
pub struct RecordingLauncher {
    tx: mpsc::UnboundedSender<HandlerSpawnRecord>,
}

impl RecordingLauncher {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<HandlerSpawnRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl HandlerLauncher for RecordingLauncher {
    fn launch(&self, record: HandlerSpawnRecord) {
        let _ = self.tx.send(record);
    }
}

/// Echoes everything the client sends.
pub struct EchoHandler;

#[async_trait]
impl ConnectionHandler for EchoHandler {
    async fn handle(&self, record: HandlerSpawnRecord) {
        let mut stream = record.into_connection().into_stream();
        let (mut reader, mut writer) = stream.split();
        let _ = tokio::io::copy(&mut reader, &mut writer).await;
    }
}

/// Reports that it started, then waits for a permit before finishing.
pub struct GatedHandler {
    pub started: mpsc::UnboundedSender<ConnectionId>,
    pub gate: Arc<Semaphore>,
}

#[async_trait]
impl ConnectionHandler for GatedHandler {
    async fn handle(&self, record: HandlerSpawnRecord) {
        let _ = self.started.send(record.connection_id());
        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }
    }
}

pub async fn recv_within<T>(rx: &mut mpsc::UnboundedReceiver<T>, what: &str) -> T {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {}", what))
        .unwrap_or_else(|| panic!("channel closed waiting for {}", what))
}

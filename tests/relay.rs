//! End-to-end relaying through the reference handler.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use loopback_proxy::handler::{ContentProvider, Direction, SharedContentProvider};
use loopback_proxy::{ProxyServer, RelayHandler, ServerConfig, SpawnLauncher};

mod common;

fn client_via(proxy_port: u16) -> reqwest::Client {
    reqwest::Client::builder()
        .proxy(reqwest::Proxy::http(format!("http://127.0.0.1:{}", proxy_port)).unwrap())
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

#[derive(Default)]
struct ByteCounter {
    outbound: AtomicU64,
    inbound: AtomicU64,
}

impl ContentProvider for ByteCounter {
    fn filter(&self, direction: Direction, chunk: &[u8]) -> Option<Vec<u8>> {
        let counter = match direction {
            Direction::Outbound => &self.outbound,
            Direction::Inbound => &self.inbound,
        };
        counter.fetch_add(chunk.len() as u64, Ordering::SeqCst);
        None
    }
}

#[tokio::test]
async fn direct_http_request() {
    let backend: SocketAddr = "127.0.0.1:28501".parse().unwrap();
    common::start_http_backend(backend, "hello from backend").await;

    let server = ProxyServer::new(ServerConfig::new(28502));
    let task = common::spawn_server(&server).await;

    let res = client_via(28502)
        .get(format!("http://{}/greeting?x=1", backend))
        .send()
        .await
        .expect("proxy unreachable");
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "hello from backend");

    server.stop();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn connect_tunnel() {
    let backend: SocketAddr = "127.0.0.1:28511".parse().unwrap();
    common::start_echo_backend(backend).await;

    let server = ProxyServer::new(ServerConfig::new(28512));
    let task = common::spawn_server(&server).await;

    let mut client = TcpStream::connect("127.0.0.1:28512").await.unwrap();
    client
        .write_all(format!("CONNECT {0} HTTP/1.1\r\nHost: {0}\r\n\r\n", backend).as_bytes())
        .await
        .unwrap();
    let head = common::read_until_blank_line(&mut client).await.unwrap();
    assert!(head.starts_with("HTTP/1.1 200"), "unexpected reply {:?}", head);

    client.write_all(b"through the tunnel").await.unwrap();
    let mut buf = [0u8; 18];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"through the tunnel");

    server.stop();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn chained_through_upstream_proxy() {
    let backend: SocketAddr = "127.0.0.1:28521".parse().unwrap();
    common::start_http_backend(backend, "chained").await;

    let upstream = ProxyServer::new(ServerConfig::new(28522));
    let upstream_task = common::spawn_server(&upstream).await;

    let front = ProxyServer::new(ServerConfig::new(28523).with_forward("127.0.0.1", 28522));
    let front_task = common::spawn_server(&front).await;

    let res = client_via(28523)
        .get(format!("http://{}/", backend))
        .send()
        .await
        .expect("proxy chain unreachable");
    assert_eq!(res.text().await.unwrap(), "chained");

    front.stop();
    upstream.stop();
    front_task.await.unwrap().unwrap();
    upstream_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn malformed_request_gets_400() {
    let server = ProxyServer::new(ServerConfig::new(28531));
    let task = common::spawn_server(&server).await;

    let mut client = TcpStream::connect("127.0.0.1:28531").await.unwrap();
    client.write_all(b"garbage\r\n\r\n").await.unwrap();
    let mut reply = String::new();
    client.read_to_string(&mut reply).await.unwrap();
    assert!(reply.starts_with("HTTP/1.1 400"), "unexpected reply {:?}", reply);

    server.stop();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn unreachable_destination_gets_502() {
    let server = ProxyServer::new(ServerConfig::new(28541));
    let task = common::spawn_server(&server).await;

    let mut client = TcpStream::connect("127.0.0.1:28541").await.unwrap();
    // Nothing listens on 28549.
    client
        .write_all(b"CONNECT 127.0.0.1:28549 HTTP/1.1\r\n\r\n")
        .await
        .unwrap();
    let mut reply = String::new();
    client.read_to_string(&mut reply).await.unwrap();
    assert!(reply.starts_with("HTTP/1.1 502"), "unexpected reply {:?}", reply);

    server.stop();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn unreachable_upstream_proxy_gets_502() {
    let server = ProxyServer::new(ServerConfig::new(28542).with_forward("127.0.0.1", 28548));
    let task = common::spawn_server(&server).await;

    let mut client = TcpStream::connect("127.0.0.1:28542").await.unwrap();
    client
        .write_all(b"GET http://127.0.0.1:28501/ HTTP/1.1\r\n\r\n")
        .await
        .unwrap();
    let mut reply = String::new();
    client.read_to_string(&mut reply).await.unwrap();
    assert!(reply.starts_with("HTTP/1.1 502"), "unexpected reply {:?}", reply);

    server.stop();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn content_provider_sees_both_directions() {
    let backend: SocketAddr = "127.0.0.1:28551".parse().unwrap();
    common::start_http_backend(backend, "observed").await;

    let counter = Arc::new(ByteCounter::default());
    let server = ProxyServer::new(ServerConfig::new(28552));
    server.set_content_provider(Some(counter.clone() as SharedContentProvider));
    let task = common::spawn_server(&server).await;

    let body = client_via(28552)
        .get(format!("http://{}/", backend))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "observed");

    assert!(counter.outbound.load(Ordering::SeqCst) > 0);
    assert!(counter.inbound.load(Ordering::SeqCst) >= "observed".len() as u64);

    server.stop();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn idle_connection_is_closed_by_handler() {
    let config = ServerConfig::new(28561).with_timeout(Duration::from_millis(200));
    let server = ProxyServer::new(config);
    let task = common::spawn_server(&server).await;

    // Never send a request head; the handler should give up on its own.
    let mut client = TcpStream::connect("127.0.0.1:28561").await.unwrap();
    let mut buf = [0u8; 16];
    let n = tokio::time::timeout(Duration::from_secs(2), client.read(&mut buf))
        .await
        .expect("handler ignored its idle timeout")
        .unwrap_or(0);
    assert_eq!(n, 0);

    server.stop();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn header_with_obs_text_is_relayed() {
    let backend: SocketAddr = "127.0.0.1:28571".parse().unwrap();
    common::start_http_backend(backend, "latin-1 ok").await;

    let server = ProxyServer::new(ServerConfig::new(28572));
    let task = common::spawn_server(&server).await;

    let mut client = TcpStream::connect("127.0.0.1:28572").await.unwrap();
    let mut request =
        format!("GET http://{0}/ HTTP/1.1\r\nHost: {0}\r\nX-Name: caf", backend).into_bytes();
    request.extend_from_slice(b"\xE9\r\n\r\n");
    client.write_all(&request).await.unwrap();

    let mut reply = Vec::new();
    client.read_to_end(&mut reply).await.unwrap();
    let reply = String::from_utf8_lossy(&reply);
    assert!(reply.starts_with("HTTP/1.1 200"), "unexpected reply {:?}", reply);
    assert!(reply.ends_with("latin-1 ok"));

    server.stop();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn slow_destination_hits_connect_timeout() {
    let handler = RelayHandler::new().with_connect_timeout(Duration::from_millis(200));
    let server = ProxyServer::with_launcher(
        ServerConfig::new(28581),
        Arc::new(SpawnLauncher::new(handler)),
    );
    let task = common::spawn_server(&server).await;

    // Non-routable: either times out or fails fast, never connects.
    let mut client = TcpStream::connect("127.0.0.1:28581").await.unwrap();
    client
        .write_all(b"CONNECT 10.255.255.1:81 HTTP/1.1\r\n\r\n")
        .await
        .unwrap();
    let mut reply = String::new();
    tokio::time::timeout(Duration::from_secs(3), client.read_to_string(&mut reply))
        .await
        .expect("connect timeout not applied")
        .unwrap();
    assert!(reply.starts_with("HTTP/1.1 502"), "unexpected reply {:?}", reply);

    server.stop();
    task.await.unwrap().unwrap();
}

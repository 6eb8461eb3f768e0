//! Bidirectional byte pump with an idle timeout.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::handler::{Direction, SharedContentProvider};

const BUFFER_SIZE: usize = 16 * 1024;

/// Bytes written in each direction over the life of a tunnel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub outbound: u64,
    pub inbound: u64,
}

/// Last time either direction moved a byte.
struct Activity {
    started: Instant,
    last_ms: AtomicU64,
}

impl Activity {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            last_ms: AtomicU64::new(0),
        }
    }

    fn touch(&self) {
        let now = self.started.elapsed().as_millis() as u64;
        self.last_ms.store(now, Ordering::Relaxed);
    }

    fn idle_for(&self) -> Duration {
        let now = self.started.elapsed().as_millis() as u64;
        Duration::from_millis(now.saturating_sub(self.last_ms.load(Ordering::Relaxed)))
    }
}

/// Relay between `client` and `upstream` until both sides finish or the
/// tunnel has been idle in both directions for `idle`.
///
/// A zero `idle` disables the timeout. When a provider is attached every
/// chunk passes through it before being written.
pub async fn tunnel<C, U>(
    client: C,
    upstream: U,
    idle: Duration,
    provider: Option<SharedContentProvider>,
) -> io::Result<RelayStats>
where
    C: AsyncRead + AsyncWrite + Unpin,
    U: AsyncRead + AsyncWrite + Unpin,
{
    let (client_read, client_write) = tokio::io::split(client);
    let (upstream_read, upstream_write) = tokio::io::split(upstream);
    let activity = Activity::new();

    let (outbound, inbound) = tokio::join!(
        pump(client_read, upstream_write, Direction::Outbound, idle, &activity, provider.as_ref()),
        pump(upstream_read, client_write, Direction::Inbound, idle, &activity, provider.as_ref()),
    );

    Ok(RelayStats {
        outbound: outbound?,
        inbound: inbound?,
    })
}

/// Apply the provider, if any, and write the result.
pub async fn write_filtered<W>(
    writer: &mut W,
    direction: Direction,
    chunk: &[u8],
    provider: Option<&SharedContentProvider>,
) -> io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    match provider.and_then(|provider| provider.filter(direction, chunk)) {
        Some(replaced) => {
            writer.write_all(&replaced).await?;
            Ok(replaced.len() as u64)
        }
        None => {
            writer.write_all(chunk).await?;
            Ok(chunk.len() as u64)
        }
    }
}

async fn pump<R, W>(
    mut reader: R,
    mut writer: W,
    direction: Direction,
    idle: Duration,
    activity: &Activity,
    provider: Option<&SharedContentProvider>,
) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let read = if idle.is_zero() {
            reader.read(&mut buf).await
        } else {
            match tokio::time::timeout(idle, reader.read(&mut buf)).await {
                Ok(read) => read,
                // The other direction may still be busy.
                Err(_) if activity.idle_for() < idle => continue,
                Err(_) => {
                    tracing::trace!(%direction, "Tunnel idle, closing");
                    break;
                }
            }
        };

        let n = read?;
        if n == 0 {
            break;
        }
        activity.touch();
        total += write_filtered(&mut writer, direction, &buf[..n], provider).await?;
    }

    let _ = writer.shutdown().await;
    Ok(total)
}

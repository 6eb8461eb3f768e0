//! Request-head handling for direct mode.
//!
//! Only what is needed to find the destination is parsed: the request line
//! and raw header pairs. Header values stay bytes and bodies are never
//! inspected.

use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use url::Url;

/// Largest request head accepted before giving up.
pub const MAX_HEAD_SIZE: usize = 8 * 1024;

const MAX_HEADERS: usize = 64;

/// Headers that only concern the hop between client and proxy.
const HOP_HEADERS: [&str; 4] = [
    "proxy-connection",
    "proxy-authorization",
    "connection",
    "keep-alive",
];

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request head exceeds {0} bytes")]
    TooLarge(usize),

    #[error("connection closed before the request head was complete")]
    Incomplete,

    #[error("timed out waiting for the request head")]
    Timeout,

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("unsupported request target: {0}")]
    UnsupportedTarget(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl RequestError {
    /// True if the client should be told its request was bad.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RequestError::TooLarge(_)
                | RequestError::Malformed(_)
                | RequestError::UnsupportedTarget(_)
        )
    }
}

/// Where a direct-mode request wants to go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// `CONNECT host:port`: open a raw tunnel.
    Tunnel { authority: String },
    /// Absolute-form `http://` request: forward it in origin form.
    Forward { authority: String, path: String },
}

impl Destination {
    pub fn authority(&self) -> &str {
        match self {
            Destination::Tunnel { authority } | Destination::Forward { authority, .. } => authority,
        }
    }
}

/// Parsed request line plus raw headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    pub target: String,
    /// Minor version of `HTTP/1.x`.
    pub version: u8,
    pub headers: Vec<(String, Vec<u8>)>,
}

impl RequestHead {
    /// Parse a complete head including its terminating blank line.
    pub fn parse(head: &[u8]) -> Result<Self, RequestError> {
        match try_parse(head)? {
            Some((request, _)) => Ok(request),
            None => Err(RequestError::Malformed("incomplete request head".into())),
        }
    }

    fn from_parsed(request: &httparse::Request<'_, '_>) -> Result<Self, RequestError> {
        let (Some(method), Some(target), Some(version)) =
            (request.method, request.path, request.version)
        else {
            return Err(RequestError::Malformed("missing request line".into()));
        };

        let headers = request
            .headers
            .iter()
            .map(|header| (header.name.to_string(), header.value.to_vec()))
            .collect();

        Ok(Self {
            method: method.to_string(),
            target: target.to_string(),
            version,
            headers,
        })
    }

    /// First value of the named header, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_slice())
    }

    pub fn is_connect(&self) -> bool {
        self.method.eq_ignore_ascii_case("CONNECT")
    }

    /// Resolve the request target into a destination.
    pub fn destination(&self) -> Result<Destination, RequestError> {
        if self.is_connect() {
            let url = Url::parse(&format!("http://{}", self.target))
                .map_err(|_| RequestError::UnsupportedTarget(self.target.clone()))?;
            let host = url
                .host_str()
                .filter(|host| !host.is_empty())
                .ok_or_else(|| RequestError::UnsupportedTarget(self.target.clone()))?;
            // `Url` hides a port equal to the scheme default, so read it off
            // the raw target instead.
            let port = self
                .target
                .rsplit_once(':')
                .filter(|(_, port)| !port.contains(']'))
                .and_then(|(_, port)| port.parse::<u16>().ok())
                .unwrap_or(443);
            return Ok(Destination::Tunnel {
                authority: format!("{}:{}", host, port),
            });
        }

        let url = Url::parse(&self.target)
            .map_err(|_| RequestError::UnsupportedTarget(self.target.clone()))?;
        if url.scheme() != "http" {
            return Err(RequestError::UnsupportedTarget(self.target.clone()));
        }
        let host = url
            .host_str()
            .ok_or_else(|| RequestError::UnsupportedTarget(self.target.clone()))?;
        let port = url.port_or_known_default().unwrap_or(80);

        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }

        Ok(Destination::Forward {
            authority: format!("{}:{}", host, port),
            path,
        })
    }

    /// Serialize for the origin server: origin-form target, hop headers
    /// replaced by `Connection: close`.
    pub fn to_origin_form(&self, path: &str) -> Vec<u8> {
        let mut out =
            format!("{} {} HTTP/1.{}\r\n", self.method, path, self.version).into_bytes();
        for (name, value) in &self.headers {
            if HOP_HEADERS.iter().any(|hop| name.eq_ignore_ascii_case(hop)) {
                continue;
            }
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"Connection: close\r\n\r\n");
        out
    }
}

/// Parse as much of `buf` as has arrived.
///
/// `Ok(None)` means the head is not complete yet. On success the head length
/// is returned alongside the parsed request.
fn try_parse(buf: &[u8]) -> Result<Option<(RequestHead, usize)>, RequestError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut request = httparse::Request::new(&mut headers);

    match request.parse(buf) {
        Ok(httparse::Status::Complete(len)) => {
            Ok(Some((RequestHead::from_parsed(&request)?, len)))
        }
        Ok(httparse::Status::Partial) => Ok(None),
        Err(e) => Err(RequestError::Malformed(e.to_string())),
    }
}

/// Read until the request head is complete and parse it.
///
/// Returns the head plus any bytes that arrived after it in the same reads.
/// Each read is bounded by `idle` unless it is zero.
pub async fn read_head<R>(
    reader: &mut R,
    idle: Duration,
) -> Result<(RequestHead, Vec<u8>), RequestError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 2048];

    loop {
        let read = if idle.is_zero() {
            reader.read(&mut chunk).await
        } else {
            tokio::time::timeout(idle, reader.read(&mut chunk))
                .await
                .map_err(|_| RequestError::Timeout)?
        };
        let n = read?;
        if n == 0 {
            return Err(RequestError::Incomplete);
        }
        buf.extend_from_slice(&chunk[..n]);

        match try_parse(&buf)? {
            Some((_, len)) if len > MAX_HEAD_SIZE => {
                return Err(RequestError::TooLarge(MAX_HEAD_SIZE));
            }
            Some((head, len)) => {
                let rest = buf.split_off(len);
                return Ok((head, rest));
            }
            None if buf.len() > MAX_HEAD_SIZE => {
                return Err(RequestError::TooLarge(MAX_HEAD_SIZE));
            }
            None => {}
        }
    }
}

//! Byte-stream transports.
//!
//! The connection only needs something it can read and write. TLS, unix
//! sockets or in-memory pipes are plugged in by implementing
//! [`Connector`].

use std::fmt;
use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Where to connect and how the transport should be secured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    /// The connection must be encrypted.
    pub tls: bool,
    /// TLS connectors check the broker certificate when set.
    pub verify_peer: bool,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[async_trait]
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Open a stream to `endpoint`.
    async fn connect(&self, endpoint: &Endpoint) -> io::Result<Self::Stream>;

    /// Whether streams from this connector are encrypted.
    fn is_tls(&self) -> bool {
        false
    }
}

/// Plain TCP with Nagle disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, endpoint: &Endpoint) -> io::Result<TcpStream> {
        let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port)).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn tcp_connector_reaches_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = Endpoint {
            host: "127.0.0.1".into(),
            port: listener.local_addr().unwrap().port(),
            tls: false,
            verify_peer: true,
        };
        let (client, accepted) = tokio::join!(TcpConnector.connect(&endpoint), listener.accept());
        let client = client.unwrap();
        assert!(client.nodelay().unwrap());
        assert!(accepted.is_ok());
        assert!(!TcpConnector.is_tls());
        assert_eq!(endpoint.to_string(), format!("127.0.0.1:{}", endpoint.port));
    }
}

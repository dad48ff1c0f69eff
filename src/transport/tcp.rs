//! TCP connection source.
//!
//! # Example
//!
//! ```ignore
//! use shardcache_client::transport::{ConnectionSource, TcpConnector};
//! use shardcache_client::Destination;
//!
//! let connector = TcpConnector::default();
//! let stream = connector.acquire(&Destination::from("127.0.0.1:7788")).await;
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::net::TcpStream;

use super::ConnectionSource;
use crate::directory::Destination;

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Dials a new TCP connection per acquisition.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
    no_delay: bool,
}

impl TcpConnector {
    /// Create a connector.
    pub fn new(connect_timeout: Duration, no_delay: bool) -> Self {
        Self {
            connect_timeout,
            no_delay,
        }
    }

    /// Connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Whether `TCP_NODELAY` is set on new connections.
    pub fn no_delay(&self) -> bool {
        self.no_delay
    }

    async fn connect(&self, destination: &Destination) -> Option<TcpStream> {
        let connect = TcpStream::connect(destination.addr());
        let stream = match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                tracing::warn!("Connect to {} failed: {}", destination, e);
                return None;
            }
            Err(_) => {
                tracing::warn!(
                    "Connect to {} timed out after {:?}",
                    destination,
                    self.connect_timeout
                );
                return None;
            }
        };

        if let Err(e) = stream.set_nodelay(self.no_delay) {
            tracing::warn!("Failed to set TCP_NODELAY on {}: {}", destination, e);
        }
        Some(stream)
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT, true)
    }
}

impl ConnectionSource for TcpConnector {
    type Transport = TcpStream;

    fn acquire(&self, destination: &Destination) -> impl Future<Output = Option<TcpStream>> + Send {
        self.connect(destination)
    }

    fn abort(&self, destination: &Destination, transport: TcpStream) {
        // Zero linger turns the close into a reset.
        if let Err(e) = transport.set_linger(Some(Duration::ZERO)) {
            tracing::debug!("Failed to set SO_LINGER on {}: {}", destination, e);
        }
        drop(transport);
    }
}

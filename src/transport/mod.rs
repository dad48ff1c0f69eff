//! Transport module - connection supply for batch sessions.
//!
//! A batch asks its [`ConnectionSource`] for one ready transport per
//! destination, owns it exclusively for the duration of the call, and then
//! hands it back:
//! - [`ConnectionSource::release`] after a session finished cleanly
//! - [`ConnectionSource::abort`] when bytes may still be in flight
//!
//! Pooling policy belongs to the source; [`TcpConnector`] simply dials a
//! fresh TCP connection each time.

mod tcp;

use std::future::Future;
use std::io;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::directory::Destination;

pub use tcp::TcpConnector;

/// Supplies established transports for destinations.
pub trait ConnectionSource: Send + Sync {
    /// Connected byte stream.
    type Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Obtain a ready transport, or `None` if the destination is unreachable.
    fn acquire(
        &self,
        destination: &Destination,
    ) -> impl Future<Output = Option<Self::Transport>> + Send;

    /// Return a transport whose exchange completed.
    ///
    /// The default shuts the write side down cleanly and drops the stream.
    fn release(
        &self,
        _destination: &Destination,
        transport: Self::Transport,
    ) -> impl Future<Output = io::Result<()>> + Send {
        let mut transport = transport;
        async move { transport.shutdown().await }
    }

    /// Discard a transport immediately, abandoning unsent and unread bytes.
    fn abort(&self, _destination: &Destination, transport: Self::Transport) {
        drop(transport);
    }
}

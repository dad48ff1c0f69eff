//! # shardcache-client
//!
//! Batch client for a sharded cache service speaking a compact binary
//! protocol over TCP.
//!
//! Keys are mapped to nodes by a [`NodeDirectory`]; a batch of GET, SET or
//! DELETE items is split per node and every node's requests are pipelined
//! over one connection. All connections of a batch are driven from a single
//! task under one deadline, and each item comes back with its own
//! [`Outcome`].
//!
//! ## Architecture
//!
//! - **protocol**: request/response frames, send buffer, response decoder
//! - **batch**: per-connection sessions and the coordinator that multiplexes them
//! - **collaborators**: [`NodeDirectory`], [`ConnectionSource`], [`LocalCache`], [`Codec`]
//!
//! ## Example
//!
//! ```ignore
//! use shardcache_client::{BatchItem, ClientBuilder, RawCodec};
//! use bytes::Bytes;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ClientBuilder::new(RawCodec).build_tcp(["127.0.0.1:7788"])?;
//!
//!     let mut items = vec![BatchItem::delete("a"), BatchItem::delete("b")];
//!     let result = client
//!         .execute_batch_delete(&mut items, Duration::from_millis(500))
//!         .await?;
//!
//!     for item in &items {
//!         println!("{}: {:?}", item.key, item.outcome);
//!     }
//!     println!("{} deleted, last error: {:?}", result.success_count, result.last_error);
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod codec;
pub mod config;
pub mod directory;
pub mod error;
pub mod local_cache;
pub mod protocol;
pub mod transport;

mod client;

pub use batch::{
    BatchCoordinator, BatchDelete, BatchGet, BatchItem, BatchOperation, BatchResult, BatchSet,
    LocalError, Outcome,
};
pub use client::{CacheClient, ClientBuilder};
pub use codec::{Codec, MsgPackCodec, RawCodec};
pub use config::ClientConfig;
pub use directory::{Destination, HashDirectory, NodeDirectory};
pub use error::{CacheError, Result};
pub use local_cache::{CachedValue, LocalCache, MemoryLocalCache};
pub use protocol::ReasonCode;
pub use transport::{ConnectionSource, TcpConnector};

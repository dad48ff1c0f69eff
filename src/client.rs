//! Client builder and batch entry points.
//!
//! The [`ClientBuilder`] collects configuration and collaborators; the
//! [`CacheClient`] owns them and hands a borrowed [`BatchCoordinator`] to
//! every call, so concurrent calls share the directory, connection source,
//! codec and local cache without any process-wide state.
//!
//! # Example
//!
//! ```ignore
//! use shardcache_client::{BatchItem, ClientBuilder, MsgPackCodec};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ClientBuilder::new(MsgPackCodec::<String>::new())
//!         .group_id(315)
//!         .build_tcp(["10.0.0.1:7788", "10.0.0.2:7788"])?;
//!
//!     let mut items = vec![
//!         BatchItem::set("user:1", "alice".to_string()),
//!         BatchItem::set("user:2", "bob".to_string()),
//!     ];
//!     let result = client.execute_batch_set_default(&mut items).await?;
//!     println!("stored {} of {}", result.success_count, items.len());
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::batch::{BatchCoordinator, BatchDelete, BatchGet, BatchItem, BatchResult, BatchSet};
use crate::codec::Codec;
use crate::config::ClientConfig;
use crate::directory::{Destination, HashDirectory, NodeDirectory};
use crate::error::Result;
use crate::local_cache::{LocalCache, MemoryLocalCache};
use crate::transport::{ConnectionSource, TcpConnector};

enum LocalCacheSetting {
    /// Build a [`MemoryLocalCache`] from the configuration.
    Memory,
    Custom(Arc<dyn LocalCache>),
    Disabled,
}

/// Builder for configuring and creating a [`CacheClient`].
pub struct ClientBuilder<C> {
    codec: C,
    config: ClientConfig,
    local_cache: LocalCacheSetting,
}

impl<C: Codec> ClientBuilder<C> {
    /// Create a builder with default configuration.
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            config: ClientConfig::default(),
            local_cache: LocalCacheSetting::Memory,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the group identifier carried by every frame.
    ///
    /// Default: 0
    pub fn group_id(mut self, group_id: u32) -> Self {
        self.config.group_id = group_id;
        self
    }

    /// Set the deadline used by the `*_default` batch calls.
    ///
    /// Default: 5 seconds
    pub fn max_busy_time(mut self, timeout: Duration) -> Self {
        self.config.max_busy_time_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the TCP connect timeout used by [`build_tcp`](Self::build_tcp).
    ///
    /// Default: 3 seconds
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the per-session send buffer capacity.
    ///
    /// Default: 64 KiB
    pub fn write_buffer_size(mut self, size: usize) -> Self {
        self.config.write_buffer_size = size;
        self
    }

    /// Set the largest value accepted on encode or decode.
    ///
    /// Default: 16 MiB
    pub fn max_value_size(mut self, size: usize) -> Self {
        self.config.max_value_size = size;
        self
    }

    /// Use a caller-supplied local cache.
    pub fn local_cache(mut self, cache: Arc<dyn LocalCache>) -> Self {
        self.local_cache = LocalCacheSetting::Custom(cache);
        self
    }

    /// Run without a local cache.
    pub fn without_local_cache(mut self) -> Self {
        self.local_cache = LocalCacheSetting::Disabled;
        self
    }

    /// Build a client over the given directory and connection source.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Config`](crate::CacheError::Config) if the
    /// configuration is invalid.
    pub fn build<D, S>(self, directory: Arc<D>, source: Arc<S>) -> Result<CacheClient<D, S, C>>
    where
        D: NodeDirectory + ?Sized,
        S: ConnectionSource,
    {
        self.config.validate()?;

        let local_cache = match self.local_cache {
            LocalCacheSetting::Memory => {
                let cache = MemoryLocalCache::new(self.config.local_cache_max_size);
                cache.set_warning_rate(self.config.local_cache_warning_rate);
                Some(Arc::new(cache) as Arc<dyn LocalCache>)
            }
            LocalCacheSetting::Custom(cache) => Some(cache),
            LocalCacheSetting::Disabled => None,
        };

        Ok(CacheClient {
            directory,
            source,
            codec: self.codec,
            local_cache,
            config: self.config,
        })
    }

    /// Build a client that hashes keys over `nodes` and dials them over TCP.
    pub fn build_tcp<I, N>(self, nodes: I) -> Result<CacheClient<HashDirectory, TcpConnector, C>>
    where
        I: IntoIterator<Item = N>,
        N: Into<Destination>,
    {
        let directory = HashDirectory::new(nodes)?;
        let connector = TcpConnector::new(self.config.connect_timeout(), self.config.no_delay);
        self.build(Arc::new(directory), Arc::new(connector))
    }
}

/// A configured cache client.
///
/// Cheap to share behind an `Arc`; every batch call borrows it immutably.
pub struct CacheClient<D: ?Sized, S, C> {
    directory: Arc<D>,
    source: Arc<S>,
    codec: C,
    local_cache: Option<Arc<dyn LocalCache>>,
    config: ClientConfig,
}

impl<D, S, C> CacheClient<D, S, C>
where
    D: NodeDirectory + ?Sized,
    S: ConnectionSource,
    C: Codec,
{
    /// Active configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Codec used for keys and values.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Node directory.
    pub fn directory(&self) -> &Arc<D> {
        &self.directory
    }

    /// Local cache, if enabled.
    pub fn local_cache(&self) -> Option<&Arc<dyn LocalCache>> {
        self.local_cache.as_ref()
    }

    /// Borrowed coordinator for one call.
    pub fn coordinator(&self) -> BatchCoordinator<'_, D, S, C> {
        let coordinator = BatchCoordinator::new(&*self.directory, &*self.source, &self.codec)
            .group_id(self.config.group_id)
            .write_buffer_size(self.config.write_buffer_size)
            .max_value_size(self.config.max_value_size);
        match &self.local_cache {
            Some(cache) => coordinator.local_cache(cache.as_ref()),
            None => coordinator,
        }
    }

    /// Fetch every item's value within `timeout`.
    pub async fn execute_batch_get(
        &self,
        items: &mut [BatchItem<C::Value>],
        timeout: Duration,
    ) -> Result<BatchResult> {
        self.coordinator().execute::<BatchGet>(items, timeout).await
    }

    /// Store every item's value within `timeout`.
    pub async fn execute_batch_set(
        &self,
        items: &mut [BatchItem<C::Value>],
        timeout: Duration,
    ) -> Result<BatchResult> {
        self.coordinator().execute::<BatchSet>(items, timeout).await
    }

    /// Delete every item's key within `timeout`.
    pub async fn execute_batch_delete(
        &self,
        items: &mut [BatchItem<C::Value>],
        timeout: Duration,
    ) -> Result<BatchResult> {
        self.coordinator().execute::<BatchDelete>(items, timeout).await
    }

    /// [`execute_batch_get`](Self::execute_batch_get) with the configured deadline.
    pub async fn execute_batch_get_default(
        &self,
        items: &mut [BatchItem<C::Value>],
    ) -> Result<BatchResult> {
        self.execute_batch_get(items, self.config.max_busy_time()).await
    }

    /// [`execute_batch_set`](Self::execute_batch_set) with the configured deadline.
    pub async fn execute_batch_set_default(
        &self,
        items: &mut [BatchItem<C::Value>],
    ) -> Result<BatchResult> {
        self.execute_batch_set(items, self.config.max_busy_time()).await
    }

    /// [`execute_batch_delete`](Self::execute_batch_delete) with the configured deadline.
    pub async fn execute_batch_delete_default(
        &self,
        items: &mut [BatchItem<C::Value>],
    ) -> Result<BatchResult> {
        self.execute_batch_delete(items, self.config.max_busy_time()).await
    }
}

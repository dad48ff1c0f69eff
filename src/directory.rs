//! Node directory - maps keys to backend nodes.
//!
//! The batch engine only needs [`NodeDirectory::resolve`]. [`HashDirectory`]
//! is a ready-made implementation that spreads keys over a fixed node list
//! with jump consistent hashing, so adding a node moves roughly `1/n` of
//! the keys.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::{CacheError, Result};

/// A backend node, identified by `host:port`.
///
/// Cheap to clone; used as the grouping key for sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Destination(Arc<str>);

impl Destination {
    /// Create a destination from a `host:port` address.
    pub fn new(addr: impl Into<Arc<str>>) -> Self {
        Self(addr.into())
    }

    /// The `host:port` address.
    #[inline]
    pub fn addr(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Destination {
    fn from(addr: &str) -> Self {
        Self::new(addr)
    }
}

impl From<String> for Destination {
    fn from(addr: String) -> Self {
        Self::new(addr)
    }
}

/// Resolves a key to the node that owns it.
pub trait NodeDirectory: Send + Sync {
    /// Destination for `key`, or `None` if no node can serve it.
    fn resolve(&self, key: &str) -> Option<Destination>;
}

impl<D: NodeDirectory + ?Sized> NodeDirectory for Arc<D> {
    fn resolve(&self, key: &str) -> Option<Destination> {
        (**self).resolve(key)
    }
}

/// Stable 64-bit hash of a key.
///
/// `DefaultHasher::new()` uses fixed keys, so the result is the same across
/// processes built with the same standard library.
pub fn hash_key(key: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

/// Jump consistent hash (Lamping & Veach): bucket in `0..buckets`.
pub fn jump_hash(mut key: u64, buckets: u32) -> u32 {
    let mut b: i64 = -1;
    let mut j: i64 = 0;
    while j < buckets as i64 {
        b = j;
        key = key.wrapping_mul(2_862_933_555_777_941_757).wrapping_add(1);
        j = ((b + 1) as f64 * ((1u64 << 31) as f64 / ((key >> 33) + 1) as f64)) as i64;
    }
    b as u32
}

/// Directory over a fixed node list using jump consistent hashing.
#[derive(Debug, Clone)]
pub struct HashDirectory {
    nodes: Vec<Destination>,
}

impl HashDirectory {
    /// Create a directory over `nodes`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Config`] if the list is empty or has more nodes
    /// than a `u32` bucket index can address.
    pub fn new<I, N>(nodes: I) -> Result<Self>
    where
        I: IntoIterator<Item = N>,
        N: Into<Destination>,
    {
        let nodes: Vec<Destination> = nodes.into_iter().map(Into::into).collect();
        if nodes.is_empty() {
            return Err(CacheError::Config("node list is empty".to_string()));
        }
        if nodes.len() > u32::MAX as usize {
            return Err(CacheError::Config(format!(
                "too many nodes: {}",
                nodes.len()
            )));
        }
        Ok(Self { nodes })
    }

    /// Configured nodes, in bucket order.
    pub fn nodes(&self) -> &[Destination] {
        &self.nodes
    }
}

impl NodeDirectory for HashDirectory {
    fn resolve(&self, key: &str) -> Option<Destination> {
        let bucket = jump_hash(hash_key(key.as_bytes()), self.nodes.len() as u32);
        self.nodes.get(bucket as usize).cloned()
    }
}

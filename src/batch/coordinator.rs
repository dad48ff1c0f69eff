//! Batch coordinator: partition, multiplex, aggregate.
//!
//! One call runs entirely on the caller's task:
//! 1. Reset item state and reject items that cannot be encoded or routed
//! 2. Group the rest by destination, keeping input order within a group
//! 3. Acquire one transport per destination
//! 4. Poll every session from a single future until all are finished or the
//!    deadline passes
//! 5. Close every session, done or not
//!
//! The deadline is computed once; acquisition and the I/O loop share it.

use std::collections::HashMap;
use std::future::poll_fn;
use std::task::Poll;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::Instant;

use super::item::{BatchItem, BatchResult, LocalError, Outcome};
use super::ops::{BatchDelete, BatchGet, BatchOperation, BatchSet};
use super::session::{BatchEnv, Entry, Session};
use crate::codec::Codec;
use crate::directory::{Destination, NodeDirectory};
use crate::error::{CacheError, Result};
use crate::local_cache::LocalCache;
use crate::protocol::{DEFAULT_MAX_VALUE_SIZE, DEFAULT_WRITE_BUFFER_SIZE, MAX_KEY_LENGTH};
use crate::transport::ConnectionSource;

/// Runs batch calls against a directory and a connection source.
///
/// Borrowed view over the collaborators of a client; cheap to build per call.
pub struct BatchCoordinator<'a, D: ?Sized, S, C> {
    directory: &'a D,
    source: &'a S,
    codec: &'a C,
    local_cache: Option<&'a dyn LocalCache>,
    group_id: u32,
    write_buffer_size: usize,
    max_value_size: usize,
}

impl<'a, D, S, C> BatchCoordinator<'a, D, S, C>
where
    D: NodeDirectory + ?Sized,
    S: ConnectionSource,
    C: Codec,
{
    /// Create a coordinator with default limits and no local cache.
    pub fn new(directory: &'a D, source: &'a S, codec: &'a C) -> Self {
        Self {
            directory,
            source,
            codec,
            local_cache: None,
            group_id: 0,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            max_value_size: DEFAULT_MAX_VALUE_SIZE,
        }
    }

    /// Keep `cache` consistent with successful operations.
    pub fn local_cache(mut self, cache: &'a dyn LocalCache) -> Self {
        self.local_cache = Some(cache);
        self
    }

    /// Group identifier carried by every frame.
    pub fn group_id(mut self, group_id: u32) -> Self {
        self.group_id = group_id;
        self
    }

    /// Send buffer capacity per session.
    pub fn write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }

    /// Largest value accepted on encode or decode.
    pub fn max_value_size(mut self, size: usize) -> Self {
        self.max_value_size = size;
        self
    }

    /// Run one batch of operation `O`, bounded by `timeout`.
    ///
    /// Outcomes are written into `items`. Only an empty batch is a call-level
    /// error; everything else is reported per item.
    pub async fn execute<O: BatchOperation>(
        &self,
        items: &mut [BatchItem<C::Value>],
        timeout: Duration,
    ) -> Result<BatchResult> {
        if items.is_empty() {
            return Err(CacheError::EmptyBatch);
        }
        let deadline = Instant::now() + timeout;
        let mut last_error = None;

        tracing::debug!(
            "Batch {} of {} items, timeout {:?}",
            O::OPERATION,
            items.len(),
            timeout
        );

        let groups = self.partition::<O>(items, &mut last_error);
        if groups.is_empty() {
            return Ok(BatchResult {
                success_count: 0,
                last_error,
            });
        }

        let acquired = join_all(
            groups
                .iter()
                .map(|(dest, _)| tokio::time::timeout_at(deadline, self.source.acquire(dest))),
        )
        .await;
        if acquired.iter().any(|result| result.is_err()) {
            tracing::warn!(
                "Batch {} timed out acquiring {} connections",
                O::OPERATION,
                groups.len()
            );
            for ((destination, _), result) in groups.iter().zip(acquired) {
                if let Ok(Some(transport)) = result {
                    self.source.abort(destination, transport);
                }
            }
            return Ok(BatchResult {
                success_count: 0,
                last_error: Some(format!("timed out after {:?} acquiring connections", timeout)),
            });
        }
        let transports = acquired.into_iter().map(|result| result.ok().flatten());

        let mut sessions = Vec::with_capacity(groups.len());
        for ((destination, entries), transport) in groups.into_iter().zip(transports) {
            match transport {
                Some(transport) => sessions.push(Session::new(
                    destination,
                    transport,
                    O::OPERATION,
                    self.group_id,
                    entries,
                    self.write_buffer_size,
                    self.max_value_size,
                )),
                None => {
                    for entry in &entries {
                        items[entry.index].outcome =
                            Some(Outcome::Local(LocalError::NoConnection));
                    }
                    last_error = Some(format!("no connection to {}", destination));
                }
            }
        }

        let timed_out = if sessions.is_empty() {
            None
        } else {
            self.run::<O>(&mut sessions, items, deadline, timeout).await
        };

        let mut success_count = 0;
        for session in &mut sessions {
            success_count += session.success_count();
            if let Some(err) = session.take_last_error() {
                last_error = Some(err);
            }
        }
        if timed_out.is_some() {
            last_error = timed_out;
        }

        for session in sessions {
            let destination = session.destination().clone();
            if let Err(e) = session.close(self.source).await {
                tracing::warn!("Failed to close connection to {}: {}", destination, e);
                last_error = Some(format!("close {}: {}", destination, e));
            }
        }

        tracing::debug!(
            "Batch {} finished: {}/{} succeeded",
            O::OPERATION,
            success_count,
            items.len()
        );

        Ok(BatchResult {
            success_count,
            last_error,
        })
    }

    /// Batch GET.
    pub async fn get(
        &self,
        items: &mut [BatchItem<C::Value>],
        timeout: Duration,
    ) -> Result<BatchResult> {
        self.execute::<BatchGet>(items, timeout).await
    }

    /// Batch SET.
    pub async fn set(
        &self,
        items: &mut [BatchItem<C::Value>],
        timeout: Duration,
    ) -> Result<BatchResult> {
        self.execute::<BatchSet>(items, timeout).await
    }

    /// Batch DELETE.
    pub async fn delete(
        &self,
        items: &mut [BatchItem<C::Value>],
        timeout: Duration,
    ) -> Result<BatchResult> {
        self.execute::<BatchDelete>(items, timeout).await
    }

    /// Reset items, reject the ones that cannot be sent, and group the rest.
    fn partition<O: BatchOperation>(
        &self,
        items: &mut [BatchItem<C::Value>],
        last_error: &mut Option<String>,
    ) -> Vec<(Destination, Vec<Entry>)> {
        let mut groups: Vec<(Destination, Vec<Entry>)> = Vec::new();
        let mut slots: HashMap<Destination, usize> = HashMap::new();

        for (index, item) in items.iter_mut().enumerate() {
            item.reset();
            match self.prepare::<O>(index, item) {
                Ok((destination, entry)) => {
                    item.destination = Some(destination.clone());
                    let slot = *slots.entry(destination.clone()).or_insert_with(|| {
                        groups.push((destination, Vec::new()));
                        groups.len() - 1
                    });
                    groups[slot].1.push(entry);
                }
                Err(err) => {
                    tracing::debug!("Skipping {} {}: {}", O::OPERATION, item.key, err);
                    *last_error = Some(format!("{} {}: {}", O::OPERATION, item.key, err));
                    item.outcome = Some(Outcome::Local(err));
                }
            }
        }
        groups
    }

    fn prepare<O: BatchOperation>(
        &self,
        index: usize,
        item: &BatchItem<C::Value>,
    ) -> std::result::Result<(Destination, Entry), LocalError> {
        if item.key.is_empty() {
            return Err(LocalError::InvalidKey);
        }
        let key = self.codec.encode_key(&item.key).map_err(|e| {
            tracing::debug!("Failed to encode key {}: {}", item.key, e);
            LocalError::EncodeFailed
        })?;
        if key.is_empty() || key.len() > MAX_KEY_LENGTH {
            return Err(LocalError::InvalidKey);
        }

        let value = if O::OPERATION.carries_value() {
            let value = item.value.as_ref().ok_or(LocalError::MissingValue)?;
            let encoded = self.codec.encode_value(value).map_err(|e| {
                tracing::debug!("Failed to encode value of {}: {}", item.key, e);
                LocalError::EncodeFailed
            })?;
            if encoded.len() > self.max_value_size {
                return Err(LocalError::ValueTooLarge);
            }
            Some(encoded)
        } else {
            None
        };

        let destination = self
            .directory
            .resolve(&item.key)
            .ok_or(LocalError::Unroutable)?;

        Ok((
            destination,
            Entry {
                index,
                key,
                value,
                cache_id: item.cache_id,
            },
        ))
    }

    /// Poll all sessions until they finish or the deadline passes.
    ///
    /// Returns a description of the timeout, if one occurred.
    async fn run<O: BatchOperation>(
        &self,
        sessions: &mut [Session<S::Transport>],
        items: &mut [BatchItem<C::Value>],
        deadline: Instant,
        timeout: Duration,
    ) -> Option<String> {
        let env = BatchEnv {
            codec: self.codec,
            local_cache: self.local_cache,
        };
        let mut remaining = sessions.len();

        let drive = poll_fn(|cx| {
            for session in sessions.iter_mut() {
                if session.is_finished() {
                    continue;
                }
                if session.poll_drive::<O, C>(cx, items, &env).is_ready() {
                    remaining -= 1;
                }
            }
            if remaining == 0 {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        });
        let result = tokio::time::timeout_at(deadline, drive).await;

        if result.is_ok() {
            return None;
        }
        let unfinished: Vec<String> = sessions
            .iter()
            .filter(|session| !session.is_finished())
            .map(|session| {
                format!(
                    "{} ({}/{})",
                    session.destination(),
                    session.completed(),
                    session.len()
                )
            })
            .collect();
        tracing::warn!(
            "Batch {} timed out after {:?}, unfinished: {}",
            O::OPERATION,
            timeout,
            unfinished.join(", ")
        );
        Some(format!(
            "timed out after {:?} waiting for {}",
            timeout,
            unfinished.join(", ")
        ))
    }
}

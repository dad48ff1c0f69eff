//! Per-connection session of one batch call.
//!
//! A session owns one transport and the ordered entries routed to it. It is
//! polled by the coordinator and advances two independent cursors:
//!
//! - write side: `Filling -> Draining -> (Filling ...) -> Flushing -> Idle`.
//!   Frames are encoded into a bounded [`SendBuffer`] until the next frame
//!   would not fit, the chunk is written (partial writes resume at the exact
//!   byte), and the same buffer is reset for the next chunk.
//! - read side: bytes go through a [`ResponseDecoder`]; the Nth decoded
//!   response completes the Nth entry.
//!
//! `Poll::Pending` from the transport means "not ready now" and parks that
//! side until the next wakeup. EOF, an I/O error, or a malformed response
//! abandons the session; entries without a response keep `outcome == None`.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use super::item::{BatchItem, Outcome};
use super::ops::{BatchOperation, SuccessContext};
use crate::codec::Codec;
use crate::directory::Destination;
use crate::error::{CacheError, Result};
use crate::local_cache::LocalCache;
use crate::protocol::{Operation, RequestFrame, Response, ResponseDecoder, SendBuffer};
use crate::transport::ConnectionSource;

/// Size of a single socket read.
const READ_CHUNK_SIZE: usize = 16 * 1024;

/// An item prepared for the wire.
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    /// Position of the item in the caller's slice.
    pub index: usize,
    /// Encoded key.
    pub key: Bytes,
    /// Encoded value (SET only).
    pub value: Option<Bytes>,
    /// Version token sent with the request.
    pub cache_id: u64,
}

/// Collaborators shared by every session of a batch.
pub(crate) struct BatchEnv<'a, C> {
    pub codec: &'a C,
    pub local_cache: Option<&'a dyn LocalCache>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteState {
    Filling,
    Draining,
    Flushing,
    Idle,
}

/// Exchange with one destination.
pub(crate) struct Session<T> {
    destination: Destination,
    transport: T,
    operation: Operation,
    group_id: u32,
    entries: Vec<Entry>,

    write_state: WriteState,
    /// Next entry to encode.
    next_encode: usize,
    send_buffer: SendBuffer,

    /// Next entry awaiting its response.
    next_response: usize,
    decoder: ResponseDecoder,
    read_buf: Box<[u8]>,

    faulted: bool,
    success_count: usize,
    last_error: Option<String>,
}

impl<T> Session<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(
        destination: Destination,
        transport: T,
        operation: Operation,
        group_id: u32,
        entries: Vec<Entry>,
        write_buffer_size: usize,
        max_value_size: usize,
    ) -> Self {
        let write_state = if entries.is_empty() {
            WriteState::Idle
        } else {
            WriteState::Filling
        };
        Self {
            destination,
            transport,
            operation,
            group_id,
            entries,
            write_state,
            next_encode: 0,
            send_buffer: SendBuffer::with_limit(write_buffer_size),
            next_response: 0,
            decoder: ResponseDecoder::with_max_value_size(operation, max_value_size),
            read_buf: vec![0u8; READ_CHUNK_SIZE].into_boxed_slice(),
            faulted: false,
            success_count: 0,
            last_error: None,
        }
    }

    pub(crate) fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Every entry has a terminal outcome.
    pub(crate) fn is_done(&self) -> bool {
        self.next_response >= self.entries.len()
    }

    /// Done, or abandoned after a transport fault.
    pub(crate) fn is_finished(&self) -> bool {
        self.faulted || self.is_done()
    }

    pub(crate) fn success_count(&self) -> usize {
        self.success_count
    }

    pub(crate) fn take_last_error(&mut self) -> Option<String> {
        self.last_error.take()
    }

    /// Number of entries answered so far.
    pub(crate) fn completed(&self) -> usize {
        self.next_response
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drive both sides as far as the transport allows.
    ///
    /// Returns `Ready` once the session is finished.
    pub(crate) fn poll_drive<O, C>(
        &mut self,
        cx: &mut Context<'_>,
        items: &mut [BatchItem<C::Value>],
        env: &BatchEnv<'_, C>,
    ) -> Poll<()>
    where
        O: BatchOperation,
        C: Codec,
    {
        if self.is_finished() {
            return Poll::Ready(());
        }

        if let Poll::Ready(Err(e)) = self.poll_write_side(cx) {
            self.fault(e);
            return Poll::Ready(());
        }

        match self.poll_read_side::<O, C>(cx, items, env) {
            Poll::Ready(Ok(())) => Poll::Ready(()),
            Poll::Ready(Err(e)) => {
                self.fault(e);
                Poll::Ready(())
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn poll_write_side(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        loop {
            match self.write_state {
                WriteState::Filling => {
                    self.fill();
                    self.write_state = WriteState::Draining;
                }
                WriteState::Draining => {
                    while !self.send_buffer.is_drained() {
                        let n = ready!(
                            Pin::new(&mut self.transport).poll_write(cx, self.send_buffer.unsent())
                        )?;
                        if n == 0 {
                            return Poll::Ready(Err(io::Error::from(io::ErrorKind::WriteZero).into()));
                        }
                        self.send_buffer.advance(n);
                    }
                    self.write_state = if self.next_encode < self.entries.len() {
                        WriteState::Filling
                    } else {
                        WriteState::Flushing
                    };
                }
                WriteState::Flushing => {
                    ready!(Pin::new(&mut self.transport).poll_flush(cx))?;
                    self.write_state = WriteState::Idle;
                }
                WriteState::Idle => return Poll::Ready(Ok(())),
            }
        }
    }

    /// Encode entries from the write cursor until the buffer is full.
    fn fill(&mut self) {
        self.send_buffer.reset();
        let start = self.next_encode;
        while let Some(entry) = self.entries.get(self.next_encode) {
            let frame = RequestFrame {
                opcode: self.operation.request_opcode(),
                flags: self.operation.request_flags(),
                cache_id: entry.cache_id,
                group_id: self.group_id,
                key: &entry.key,
                value: entry.value.as_deref(),
            };
            if self.send_buffer.push(&frame).is_err() {
                break;
            }
            self.next_encode += 1;
        }
        tracing::trace!(
            "Encoded entries {}..{} for {} ({} bytes)",
            start,
            self.next_encode,
            self.destination,
            self.send_buffer.len()
        );
    }

    fn poll_read_side<O, C>(
        &mut self,
        cx: &mut Context<'_>,
        items: &mut [BatchItem<C::Value>],
        env: &BatchEnv<'_, C>,
    ) -> Poll<Result<()>>
    where
        O: BatchOperation,
        C: Codec,
    {
        while !self.is_done() {
            let mut buf = ReadBuf::new(&mut self.read_buf);
            ready!(Pin::new(&mut self.transport).poll_read(cx, &mut buf))?;
            let n = buf.filled().len();
            if n == 0 {
                return Poll::Ready(Err(
                    io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed by peer").into(),
                ));
            }

            self.decoder.extend(&self.read_buf[..n]);
            while let Some(response) = self.decoder.next_response()? {
                self.complete::<O, C>(items, env, response);
            }
        }
        Poll::Ready(Ok(()))
    }

    /// Attribute `response` to the oldest unanswered entry.
    fn complete<O, C>(
        &mut self,
        items: &mut [BatchItem<C::Value>],
        env: &BatchEnv<'_, C>,
        response: Response,
    ) where
        O: BatchOperation,
        C: Codec,
    {
        let Some(entry) = self.entries.get(self.next_response) else {
            tracing::warn!("Ignoring unsolicited response from {}", self.destination);
            return;
        };
        let item = &mut items[entry.index];

        let outcome = match response {
            Response::Error(reason) => {
                tracing::warn!(
                    "{} {} rejected by {}: {}",
                    self.operation,
                    item.key,
                    self.destination,
                    reason
                );
                Outcome::Failed(reason)
            }
            response => {
                let ctx = SuccessContext {
                    codec: env.codec,
                    local_cache: env.local_cache,
                    destination: &self.destination,
                    group_id: self.group_id,
                    written: entry.value.as_ref(),
                };
                O::on_success(&ctx, item, response)
            }
        };

        if outcome.is_success() {
            self.success_count += 1;
        } else {
            self.last_error = Some(format!("{} {}: {}", self.operation, item.key, outcome));
        }
        item.outcome = Some(outcome);
        self.next_response += 1;
    }

    fn fault(&mut self, err: CacheError) {
        tracing::warn!(
            "Abandoning session to {} after {}/{} responses: {}",
            self.destination,
            self.next_response,
            self.entries.len(),
            err
        );
        self.last_error = Some(format!("{}: {}", self.destination, err));
        self.faulted = true;
    }

    /// Hand the transport back: gracefully when done, forcibly otherwise.
    pub(crate) async fn close<S>(self, source: &S) -> io::Result<()>
    where
        S: ConnectionSource<Transport = T>,
    {
        if self.is_done() && !self.faulted {
            source.release(&self.destination, self.transport).await
        } else {
            source.abort(&self.destination, self.transport);
            Ok(())
        }
    }
}

impl<T> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("destination", &self.destination)
            .field("operation", &self.operation)
            .field("entries", &self.entries.len())
            .field("next_encode", &self.next_encode)
            .field("next_response", &self.next_response)
            .field("write_state", &self.write_state)
            .field("faulted", &self.faulted)
            .finish()
    }
}

//! Scripted cache nodes for integration tests.
//!
//! Each node is a task speaking the wire protocol over an in-memory duplex
//! pipe (or a TCP stream). What it answers is decided by a [`NodeScript`].

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use shardcache_client::protocol::{encode_response, opcode, Operation, RequestFrame, Response};
use shardcache_client::{ConnectionSource, Destination, NodeDirectory, ReasonCode};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};

/// A request as seen by a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub opcode: u8,
    pub flags: u8,
    pub cache_id: u64,
    pub group_id: u32,
    pub key: String,
    pub value: Option<Bytes>,
}

impl From<&RequestFrame<'_>> for Request {
    fn from(frame: &RequestFrame<'_>) -> Self {
        Self {
            opcode: frame.opcode,
            flags: frame.flags,
            cache_id: frame.cache_id,
            group_id: frame.group_id,
            key: String::from_utf8_lossy(frame.key).into_owned(),
            value: frame.value.map(Bytes::copy_from_slice),
        }
    }
}

/// Answer for one request; `None` keeps the node silent.
pub type Responder = Arc<dyn Fn(&Request) -> Option<Response> + Send + Sync>;

/// Behavior of one fake node.
#[derive(Clone)]
pub struct NodeScript {
    responder: Responder,
    chunk_size: Option<usize>,
    close_after: Option<usize>,
}

impl NodeScript {
    /// Answer every request with `f`.
    pub fn reply<F>(f: F) -> Self
    where
        F: Fn(&Request) -> Option<Response> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(f),
            chunk_size: None,
            close_after: None,
        }
    }

    /// Read requests but never answer.
    pub fn silent() -> Self {
        Self::reply(|_| None)
    }

    /// Serve from a key/value store.
    pub fn store(store: Arc<MemoryStore>) -> Self {
        Self::reply(move |request| Some(store.handle(request)))
    }

    /// Write responses in pieces of `size` bytes.
    pub fn chunked(mut self, size: usize) -> Self {
        self.chunk_size = Some(size);
        self
    }

    /// Close the connection after answering `count` requests.
    pub fn close_after(mut self, count: usize) -> Self {
        self.close_after = Some(count);
        self
    }
}

pub fn operation_of(request_opcode: u8) -> Operation {
    match request_opcode {
        opcode::GET_REQ => Operation::Get,
        opcode::SET_REQ => Operation::Set,
        _ => Operation::Delete,
    }
}

/// Serve one connection until the client goes away.
pub async fn serve<T>(mut stream: T, script: NodeScript, log: Arc<Mutex<Vec<Request>>>)
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let mut pending = Vec::new();
    let mut chunk = vec![0u8; 4096];
    let mut answered = 0usize;

    loop {
        let n = match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        pending.extend_from_slice(&chunk[..n]);

        let mut out = Vec::new();
        let mut consumed = 0;
        let mut closing = false;
        while let Some((frame, used)) = RequestFrame::decode(&pending[consumed..]) {
            let request = Request::from(&frame);
            consumed += used;
            log.lock().push(request.clone());

            if script.close_after.map_or(false, |limit| answered >= limit) {
                closing = true;
                break;
            }
            if let Some(response) = (script.responder)(&request) {
                out.extend(encode_response(operation_of(request.opcode), &response));
                answered += 1;
            }
        }
        pending.drain(..consumed);

        let written = match script.chunk_size {
            Some(size) => write_chunked(&mut stream, &out, size).await,
            None => stream.write_all(&out).await,
        };
        if written.is_err() || closing {
            return;
        }
    }
}

async fn write_chunked<T>(stream: &mut T, data: &[u8], size: usize) -> io::Result<()>
where
    T: AsyncWrite + Unpin,
{
    for part in data.chunks(size) {
        stream.write_all(part).await?;
        stream.flush().await?;
        tokio::task::yield_now().await;
    }
    Ok(())
}

/// Key/value store with version tokens, answering like a real node.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (u64, Bytes)>>,
    last_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, key: &str, value: &'static [u8]) -> u64 {
        let id = self.next_id();
        self.entries
            .lock()
            .insert(key.to_string(), (id, Bytes::from_static(value)));
        id
    }

    pub fn get(&self, key: &str) -> Option<(u64, Bytes)> {
        self.entries.lock().get(key).cloned()
    }

    fn next_id(&self) -> u64 {
        self.last_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn handle(&self, request: &Request) -> Response {
        let mut entries = self.entries.lock();
        let current = entries.get(&request.key).map(|(id, _)| *id);
        let version_ok = request.cache_id == 0 || current == Some(request.cache_id);

        match request.opcode {
            opcode::GET_REQ => match entries.get(&request.key) {
                Some((cache_id, value)) => Response::Value {
                    cache_id: *cache_id,
                    value: value.clone(),
                },
                None => Response::Error(ReasonCode::NOT_FOUND),
            },
            opcode::SET_REQ => {
                if !version_ok {
                    return Response::Error(ReasonCode::MISMATCH);
                }
                let cache_id = self.next_id();
                let value = request.value.clone().unwrap_or_default();
                entries.insert(request.key.clone(), (cache_id, value));
                Response::Stored { cache_id }
            }
            opcode::DELETE_REQ => {
                if current.is_none() {
                    Response::Error(ReasonCode::NOT_FOUND)
                } else if !version_ok {
                    Response::Error(ReasonCode::MISMATCH)
                } else {
                    entries.remove(&request.key);
                    Response::Deleted
                }
            }
            _ => Response::Error(ReasonCode::UNKNOWN_COMMAND),
        }
    }
}

/// Routes `node/rest` keys to the destination registered for `node`.
#[derive(Debug, Default)]
pub struct PrefixDirectory {
    routes: HashMap<String, Destination>,
}

impl PrefixDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, prefix: &str, addr: &str) -> Self {
        self.routes.insert(prefix.to_string(), Destination::from(addr));
        self
    }
}

impl NodeDirectory for PrefixDirectory {
    fn resolve(&self, key: &str) -> Option<Destination> {
        let (prefix, _) = key.split_once('/')?;
        self.routes.get(prefix).cloned()
    }
}

/// Connection source handing out duplex pipes to scripted nodes.
pub struct DuplexSource {
    scripts: HashMap<Destination, NodeScript>,
    stalled: HashSet<Destination>,
    pipe_capacity: usize,
    logs: Mutex<HashMap<Destination, Arc<Mutex<Vec<Request>>>>>,
    released: AtomicUsize,
    aborted: AtomicUsize,
}

impl DuplexSource {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            stalled: HashSet::new(),
            pipe_capacity: 64 * 1024,
            logs: Mutex::new(HashMap::new()),
            released: AtomicUsize::new(0),
            aborted: AtomicUsize::new(0),
        }
    }

    pub fn node(mut self, addr: &str, script: NodeScript) -> Self {
        self.scripts.insert(Destination::from(addr), script);
        self
    }

    /// Never finish acquiring a connection to `addr`.
    pub fn stalled(mut self, addr: &str) -> Self {
        self.stalled.insert(Destination::from(addr));
        self
    }

    pub fn pipe_capacity(mut self, capacity: usize) -> Self {
        self.pipe_capacity = capacity;
        self
    }

    /// Requests received by `addr`, in arrival order.
    pub fn requests(&self, addr: &str) -> Vec<Request> {
        self.logs
            .lock()
            .get(&Destination::from(addr))
            .map(|log| log.lock().clone())
            .unwrap_or_default()
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn aborted(&self) -> usize {
        self.aborted.load(Ordering::SeqCst)
    }
}

impl ConnectionSource for DuplexSource {
    type Transport = DuplexStream;

    fn acquire(
        &self,
        destination: &Destination,
    ) -> impl Future<Output = Option<DuplexStream>> + Send {
        let transport = self.scripts.get(destination).cloned().map(|script| {
            let (client, server) = tokio::io::duplex(self.pipe_capacity);
            let log = self
                .logs
                .lock()
                .entry(destination.clone())
                .or_default()
                .clone();
            tokio::spawn(serve(server, script, log));
            client
        });
        let stalled = self.stalled.contains(destination);
        async move {
            if stalled {
                std::future::pending::<()>().await;
            }
            transport
        }
    }

    fn release(
        &self,
        _destination: &Destination,
        mut transport: DuplexStream,
    ) -> impl Future<Output = io::Result<()>> + Send {
        self.released.fetch_add(1, Ordering::SeqCst);
        async move { transport.shutdown().await }
    }

    fn abort(&self, _destination: &Destination, transport: DuplexStream) {
        self.aborted.fetch_add(1, Ordering::SeqCst);
        drop(transport);
    }
}

//! TCP transport with one dedicated worker thread per connection.
//!
//! The worker owns the socket and a current-thread tokio runtime that serves
//! as its readiness multiplexer. Everything the application learns about the
//! socket arrives as [`ConnectionEvent`]s on an [`EventLoop`]; [`Connection`]
//! itself only queues writes and raises flags.
//!
//! [`ConnectionEvent`]: struct.ConnectionEvent.html
//! [`EventLoop`]: ../eventloop/struct.EventLoop.html
//! [`Connection`]: struct.Connection.html

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use tokio::net::TcpStream;
use tokio::sync::Notify;
use tracing::{debug, trace, warn};

use crate::address::HostAddressPort;
use crate::config::ConnectionConfig;
use crate::error::*;
use crate::eventloop::EventSender;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies a [`Connection`] in the events it emits.
///
/// [`Connection`]: struct.Connection.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Disconnecting,
    Disconnected,
}

/// Why a connection ended, if it did not end on request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectError {
    ReadError,
    WriteError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEventKind {
    /// Outcome of a connect attempt. After `error: true` nothing else follows.
    Connected { error: bool },
    /// Everything read from the socket in one drain, never empty.
    DataRead(Vec<u8>),
    /// Terminal event; `None` for a requested disconnect.
    Disconnected(Option<DisconnectError>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEvent {
    pub connection: ConnectionId,
    pub kind: ConnectionEventKind,
}

type Poster = Box<dyn Fn(ConnectionEvent) -> bool + Send + Sync>;

/// Ordered queue of outbound byte chunks shared by callers and the worker.
#[derive(Debug, Default)]
pub(crate) struct WriteQueue {
    chunks: Mutex<VecDeque<Vec<u8>>>,
}

impl WriteQueue {
    fn lock(&self) -> MutexGuard<'_, VecDeque<Vec<u8>>> {
        self.chunks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn push(&self, chunk: Vec<u8>) {
        if !chunk.is_empty() {
            self.lock().push_back(chunk);
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub(crate) fn clear(&self) {
        self.lock().clear();
    }

    /// Hands queued chunks to `sink` front first until the queue is empty or
    /// the sink stops taking data. A partially accepted chunk is replaced by
    /// its unsent suffix. Returns the number of bytes written.
    pub(crate) fn flush<F>(&self, mut sink: F) -> io::Result<usize>
    where
        F: FnMut(&[u8]) -> io::Result<usize>,
    {
        let mut chunks = self.lock();
        let mut written = 0;
        while let Some(front) = chunks.front_mut() {
            match sink(front) {
                Ok(0) => break,
                Ok(n) if n < front.len() => {
                    trace!(bytes = n, remaining = front.len() - n, "partial write");
                    *front = front[n..].to_vec();
                    written += n;
                    break;
                }
                Ok(n) => {
                    chunks.pop_front();
                    written += n;
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(written)
    }
}

/// How a read drain ended.
#[derive(Debug)]
pub(crate) enum ReadOutcome {
    /// The socket has no more data for now.
    Open,
    /// The peer closed its end.
    Closed,
    Failed(io::Error),
}

/// Reads from `source` in `chunk_size` pieces until it reports no more data,
/// returning everything read together with the reason the drain stopped.
pub(crate) fn drain_reads<F>(chunk_size: usize, mut source: F) -> (Vec<u8>, ReadOutcome)
where
    F: FnMut(&mut [u8]) -> io::Result<usize>,
{
    let mut data = Vec::new();
    let mut buf = vec![0u8; chunk_size.max(1)];
    loop {
        match source(&mut buf) {
            Ok(0) => return (data, ReadOutcome::Closed),
            Ok(n) => data.extend_from_slice(&buf[..n]),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                return (data, ReadOutcome::Open)
            }
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return (data, ReadOutcome::Failed(e)),
        }
    }
}

struct Shared {
    id: ConnectionId,
    poster: Poster,
    queue: WriteQueue,
    wake: Notify,
    disconnect_requested: AtomicBool,
    established: AtomicBool,
    terminated: AtomicBool,
    state: Mutex<ConnectionState>,
    peer: Mutex<Option<HostAddressPort>>,
    local: Mutex<Option<HostAddressPort>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn post(&self, kind: ConnectionEventKind) {
        let event = ConnectionEvent {
            connection: self.id,
            kind,
        };
        if !(self.poster)(event) {
            trace!(connection = %self.id, "event loop gone, event dropped");
        }
    }

    fn state(&self) -> ConnectionState {
        *lock(&self.state)
    }

    fn set_state(&self, state: ConnectionState) {
        *lock(&self.state) = state;
    }

    /// Emits the terminal event, once.
    fn finish(&self, error: Option<DisconnectError>) {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        self.queue.clear();
        self.set_state(ConnectionState::Disconnected);
        debug!(connection = %self.id, ?error, "disconnected");
        self.post(ConnectionEventKind::Disconnected(error));
    }

    /// Reports a failed connect attempt. Nothing follows it.
    fn fail_connect(&self) {
        self.terminated.store(true, Ordering::Release);
        self.queue.clear();
        self.set_state(ConnectionState::Disconnected);
        self.post(ConnectionEventKind::Connected { error: true });
    }
}

/// Marks the connection disconnected however the worker exits.
struct WorkerGuard(Arc<Shared>);

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        if thread::panicking() && self.0.established.load(Ordering::Acquire) {
            self.0.finish(Some(DisconnectError::ReadError));
        }
        self.0.set_state(ConnectionState::Disconnected);
    }
}

/// A TCP connection served by its own worker thread.
///
/// `Connection` is a handle: clones refer to the same socket and may be used
/// from any thread. `write` and `disconnect` never block.
///
/// ```no_run
/// use xmppstream::{Connection, ConnectionConfig, ConnectionEvent, ConnectionEventKind, EventLoop};
///
/// # fn main() -> xmppstream::Result<()> {
/// let mut event_loop = EventLoop::<ConnectionEvent>::new();
/// let connection = Connection::new(event_loop.sender(), ConnectionConfig::default());
/// connection.connect("127.0.0.1:5222".parse()?)?;
/// connection.write(b"<?xml version=\"1.0\"?>".to_vec());
///
/// while let Some(event) = event_loop.next_event(std::time::Duration::from_secs(5)) {
///     match event.kind {
///         ConnectionEventKind::DataRead(data) => println!("{}", String::from_utf8_lossy(&data)),
///         ConnectionEventKind::Disconnected(_) => break,
///         _ => {}
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
    config: ConnectionConfig,
}

impl Connection {
    pub fn new<E>(events: EventSender<E>, config: ConnectionConfig) -> Self
    where
        E: From<ConnectionEvent> + Send + 'static,
    {
        let poster: Poster = Box::new(move |event| events.post(E::from(event)));
        Connection {
            shared: Arc::new(Shared {
                id: ConnectionId::next(),
                poster,
                queue: WriteQueue::default(),
                wake: Notify::new(),
                disconnect_requested: AtomicBool::new(false),
                established: AtomicBool::new(false),
                terminated: AtomicBool::new(false),
                state: Mutex::new(ConnectionState::Idle),
                peer: Mutex::new(None),
                local: Mutex::new(None),
            }),
            config,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.shared.id
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Local end of the socket, once connected.
    pub fn local_address(&self) -> Option<HostAddressPort> {
        *lock(&self.shared.local)
    }

    pub fn peer_address(&self) -> Option<HostAddressPort> {
        *lock(&self.shared.peer)
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Starts connecting to `address` on a new worker thread.
    ///
    /// The outcome is reported as a `Connected` event. Fails if this
    /// connection was already started.
    pub fn connect(&self, address: HostAddressPort) -> Result<()> {
        {
            let mut state = lock(&self.shared.state);
            if *state != ConnectionState::Idle {
                return Err(ErrorKind::InvalidState("connect on a connection that is not idle").into());
            }
            *state = ConnectionState::Connecting;
        }
        *lock(&self.shared.peer) = Some(address);

        let shared = self.shared.clone();
        let config = self.config.clone();
        let spawned = thread::Builder::new()
            .name(format!("xmppstream {}", address))
            .spawn(move || run_worker(shared, address, config));

        if let Err(e) = spawned {
            self.shared.set_state(ConnectionState::Disconnected);
            return Err(e.into());
        }
        Ok(())
    }

    /// Queues `data` for sending. Empty chunks are ignored.
    pub fn write(&self, data: Vec<u8>) {
        if data.is_empty() {
            return;
        }
        if self.shared.terminated.load(Ordering::Acquire) {
            trace!(connection = %self.shared.id, bytes = data.len(), "write after disconnect dropped");
            return;
        }
        self.shared.queue.push(data);
        self.shared.wake.notify_one();
    }

    /// Asks the worker to close the socket. The terminal `Disconnected(None)`
    /// event follows asynchronously.
    pub fn disconnect(&self) {
        self.shared.disconnect_requested.store(true, Ordering::Release);
        {
            let mut state = lock(&self.shared.state);
            match *state {
                ConnectionState::Idle => *state = ConnectionState::Disconnected,
                ConnectionState::Connecting | ConnectionState::Connected => {
                    *state = ConnectionState::Disconnecting
                }
                ConnectionState::Disconnecting | ConnectionState::Disconnected => {}
            }
        }
        self.shared.wake.notify_one();
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .field("peer", &self.peer_address())
            .field("local", &self.local_address())
            .finish()
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Connection {} [{:?}]", self.shared.id, self.state())?;
        if let Some(peer) = self.peer_address() {
            write!(f, " to {}", peer)?;
        }
        if let Some(local) = self.local_address() {
            write!(f, " from {}", local)?;
        }
        Ok(())
    }
}

fn run_worker(shared: Arc<Shared>, address: HostAddressPort, config: ConnectionConfig) {
    let _guard = WorkerGuard(shared.clone());

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            warn!(connection = %shared.id, error = %e, "cannot start worker runtime");
            shared.fail_connect();
            return;
        }
    };

    runtime.block_on(async {
        if let Some(stream) = open(&shared, address, &config).await {
            serve(&shared, stream, &config).await;
        }
    });
}

async fn open(
    shared: &Shared,
    address: HostAddressPort,
    config: &ConnectionConfig,
) -> Option<TcpStream> {
    debug!(connection = %shared.id, %address, "connecting");

    let connect = TcpStream::connect(address.to_socket_addr());
    let result = match config.connect_timeout() {
        Some(timeout) => match tokio::time::timeout(timeout, connect).await {
            Ok(result) => result,
            Err(_) => Err(io::ErrorKind::TimedOut.into()),
        },
        None => connect.await,
    };

    let stream = match result {
        Ok(stream) => stream,
        Err(e) => {
            debug!(connection = %shared.id, %address, error = %e, "connect failed");
            shared.fail_connect();
            return None;
        }
    };

    if config.nodelay {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(connection = %shared.id, error = %e, "cannot set TCP_NODELAY");
        }
    }
    *lock(&shared.local) = stream.local_addr().ok().map(HostAddressPort::from);

    {
        let mut state = lock(&shared.state);
        if *state == ConnectionState::Connecting {
            *state = ConnectionState::Connected;
        }
    }
    shared.established.store(true, Ordering::Release);
    debug!(connection = %shared.id, %address, "connected");
    shared.post(ConnectionEventKind::Connected { error: false });
    Some(stream)
}

async fn serve(shared: &Shared, stream: TcpStream, config: &ConnectionConfig) {
    loop {
        let readiness = tokio::select! {
            r = stream.readable() => r,
            _ = shared.wake.notified() => Ok(()),
        };

        if shared.disconnect_requested.load(Ordering::Acquire) {
            shared.finish(None);
            return;
        }

        if let Err(e) = shared.queue.flush(|buf| stream.try_write(buf)) {
            debug!(connection = %shared.id, error = %e, "write failed");
            shared.finish(Some(DisconnectError::WriteError));
            return;
        }

        let (data, outcome) = match readiness {
            Ok(()) => drain_reads(config.read_chunk_size(), |buf| stream.try_read(buf)),
            Err(e) => (Vec::new(), ReadOutcome::Failed(e)),
        };
        if !data.is_empty() {
            trace!(connection = %shared.id, bytes = data.len(), "read");
            shared.post(ConnectionEventKind::DataRead(data));
        }
        match outcome {
            ReadOutcome::Open => {}
            ReadOutcome::Closed => {
                debug!(connection = %shared.id, "peer closed the connection");
                shared.finish(Some(DisconnectError::ReadError));
                return;
            }
            ReadOutcome::Failed(e) => {
                debug!(connection = %shared.id, error = %e, "read failed");
                shared.finish(Some(DisconnectError::ReadError));
                return;
            }
        }

        if !shared.queue.is_empty() {
            tokio::time::sleep(config.write_retry_interval()).await;
            shared.wake.notify_one();
        }
    }
}

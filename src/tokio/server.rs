use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Notify, oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::buffer::{ChunkedReadBuffer, ChunkedWriteBuffer};
use crate::constant::DEFAULT_MAX_CHUNK_SIZE;
use crate::error::{Error, Result};
use crate::parser::BoltParser;
use crate::protocol::handshake::{self, HANDSHAKE_REQUEST_LEN, HandshakeRequest};
use crate::protocol::message::{Message, deserialize_message, serialize_message};
use crate::protocol::session::{Session, SessionAction, SessionState, StreamMode};
use crate::tokio::stream::Stream;
use crate::value::{Map, Value};

/// Records produced by one run task.
pub enum RunOutput {
    /// A single record.
    Row(Vec<Value>),
    /// Zero or more records.
    Rows(Vec<Vec<Value>>),
    /// Lazily produced records.
    Iter(Box<dyn Iterator<Item = Vec<Value>> + Send>),
}

impl RunOutput {
    fn into_records(self) -> Box<dyn Iterator<Item = Vec<Value>> + Send> {
        match self {
            Self::Row(row) => Box::new(core::iter::once(row)),
            Self::Rows(rows) => Box::new(rows.into_iter()),
            Self::Iter(iter) => iter,
        }
    }
}

impl From<Vec<Value>> for RunOutput {
    fn from(row: Vec<Value>) -> Self {
        Self::Row(row)
    }
}

impl From<Vec<Vec<Value>>> for RunOutput {
    fn from(rows: Vec<Vec<Value>>) -> Self {
        Self::Rows(rows)
    }
}

/// Embedder hooks composed into the built-in server session.
///
/// One hook object is created per connection by the session factory passed
/// to [`create_server`]; only [`on_run`](Self::on_run) is required.
#[async_trait]
pub trait SessionHooks: Send + 'static {
    /// Metadata reported in the SUCCESS answering INIT.
    fn server_metadata(&self) -> Map {
        vec![(
            "server".to_string(),
            Value::String(concat!("ZeroBolt/", env!("CARGO_PKG_VERSION")).to_string()),
        )]
    }

    /// Called with the INIT credentials; rejecting fails the session.
    async fn on_init(&mut self, _client_name: &str, _auth_token: &[(String, Value)]) -> Result<()> {
        Ok(())
    }

    /// Execute one statement, producing the records to stream.
    async fn on_run(&mut self, statement: String, parameters: Map) -> Result<RunOutput>;

    /// Called when the client acknowledges a failure.
    fn on_ack_failure(&mut self) {}

    /// Called when the client discards the pending record stream.
    fn on_discard_all(&mut self) {}

    /// Called when the client resets the session.
    fn on_reset(&mut self) {}
}

/// Work items drained in FIFO order by the connection worker.
///
/// Every response leaves through this queue, so responses preserve the
/// arrival order of the requests that caused them.
enum Job {
    Init {
        client_name: String,
        auth_token: Map,
    },
    Run {
        statement: String,
        parameters: Map,
        ready: oneshot::Receiver<StreamMode>,
    },
    AckFailure,
    ResetDone,
    Reply(Message),
    Shutdown,
}

/// State shared between a connection's reader and worker tasks.
struct Shared {
    session: Mutex<Session>,
    jobs: Mutex<VecDeque<Job>>,
    jobs_notify: Notify,
    /// Wakes the worker out of an in-flight run task on RESET.
    cancel: Notify,
    /// Bumped by every RESET; the worker suppresses output of stale runs.
    reset_epoch: AtomicU64,
}

impl Shared {
    fn new() -> Self {
        Self {
            session: Mutex::new(Session::new()),
            jobs: Mutex::new(VecDeque::new()),
            jobs_notify: Notify::new(),
            cancel: Notify::new(),
            reset_epoch: AtomicU64::new(0),
        }
    }

    fn session_lock(&self) -> MutexGuard<'_, Session> {
        match self.session.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn jobs_lock(&self) -> MutexGuard<'_, VecDeque<Job>> {
        match self.jobs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn epoch(&self) -> u64 {
        self.reset_epoch.load(Ordering::Acquire)
    }

    fn bump_epoch(&self) {
        self.reset_epoch.fetch_add(1, Ordering::AcqRel);
    }
}

fn failure_metadata(err: &Error) -> Map {
    vec![
        ("code".to_string(), Value::String("ServerError".to_string())),
        ("message".to_string(), Value::String(err.to_string())),
    ]
}

/// The network reader half of one connection.
///
/// Drives the parser from raw byte arrivals, applies the session state
/// machine, and coordinates with the worker through the job queue and the
/// per-run readiness signals.
struct Reader {
    shared: Arc<Shared>,
    read_half: ReadHalf<Stream>,
    parser: BoltParser,
    read_buffer: ChunkedReadBuffer,
    /// Readiness signals of queued runs, oldest first.
    pending: VecDeque<oneshot::Sender<StreamMode>>,
    shutdown: watch::Receiver<bool>,
}

impl Reader {
    async fn run(mut self) {
        let mut chunk = [0u8; 4096];
        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    self.shared.session_lock().set_closing();
                    break;
                }
                read = self.read_half.read(&mut chunk) => match read {
                    Ok(0) => {
                        debug!("connection closed by peer");
                        break;
                    }
                    Ok(n) => {
                        self.parser.feed_data(&chunk[..n], &mut self.read_buffer);
                        if let Err(err) = self.process_messages() {
                            debug!(%err, "closing connection");
                            break;
                        }
                    }
                    Err(err) => {
                        debug!(%err, "read failed");
                        break;
                    }
                }
            }
        }
        // Dropping the pending signals releases a worker awaiting one; the
        // shutdown job stops it once the queue has drained.
        self.pending.clear();
        self.enqueue(Job::Shutdown);
    }

    fn process_messages(&mut self) -> Result<()> {
        while self.read_buffer.ready() {
            let message = deserialize_message(&mut self.read_buffer)?;
            let action = self.shared.session_lock().on_message(message);
            self.apply(action);
        }
        Ok(())
    }

    fn apply(&mut self, action: SessionAction) {
        match action {
            SessionAction::Init {
                client_name,
                auth_token,
            } => self.enqueue(Job::Init {
                client_name,
                auth_token,
            }),
            SessionAction::EnqueueRun {
                statement,
                parameters,
            } => {
                let (ready_tx, ready_rx) = oneshot::channel();
                self.pending.push_back(ready_tx);
                self.enqueue(Job::Run {
                    statement,
                    parameters,
                    ready: ready_rx,
                });
            }
            SessionAction::ReleaseStream(mode) => {
                if let Some(signal) = self.pending.pop_front() {
                    let _ = signal.send(mode);
                } else {
                    debug!("stream request without a queued run");
                }
            }
            SessionAction::AckFailure => self.enqueue(Job::AckFailure),
            SessionAction::IgnoreStream => {
                self.pending.pop_front();
                self.enqueue(Job::Reply(Message::Ignored {
                    metadata: Vec::new(),
                }));
            }
            SessionAction::Reset => self.reset_pipeline(),
            SessionAction::Reply(message) => self.enqueue(Job::Reply(message)),
        }
    }

    /// RESET: cancel the in-flight run, replace every queued run with an
    /// IGNORED, drop the pending signals, clear the inbound queue, and
    /// acknowledge with SUCCESS once the drained replies have gone out.
    fn reset_pipeline(&mut self) {
        self.shared.bump_epoch();
        self.shared.cancel.notify_waiters();
        self.pending.clear();
        self.read_buffer.discard_queued();
        {
            let mut jobs = self.shared.jobs_lock();
            for job in jobs.iter_mut() {
                if matches!(job, Job::Run { .. }) {
                    *job = Job::Reply(Message::Ignored {
                        metadata: Vec::new(),
                    });
                }
            }
            jobs.push_back(Job::ResetDone);
        }
        self.shared.jobs_notify.notify_one();
    }

    fn enqueue(&self, job: Job) {
        self.shared.jobs_lock().push_back(job);
        self.shared.jobs_notify.notify_one();
    }
}

/// The worker half of one connection: drains the job queue and owns the
/// write side of the transport.
struct Worker<H: SessionHooks> {
    shared: Arc<Shared>,
    write_half: WriteHalf<Stream>,
    write_buffer: ChunkedWriteBuffer,
    hooks: H,
}

impl<H: SessionHooks> Worker<H> {
    async fn run(mut self) {
        loop {
            let job = self.next_job().await;
            if matches!(job, Job::Shutdown) {
                let _ = self.flush().await;
                break;
            }
            if let Err(err) = self.handle_job(job).await {
                debug!(%err, "worker stopping");
                break;
            }
        }
        self.shared.session_lock().set_closed();
    }

    async fn next_job(&mut self) -> Job {
        loop {
            if let Some(job) = self.shared.jobs_lock().pop_front() {
                return job;
            }
            self.shared.jobs_notify.notified().await;
        }
    }

    async fn handle_job(&mut self, job: Job) -> Result<()> {
        match job {
            Job::Init {
                client_name,
                auth_token,
            } => {
                match self.hooks.on_init(&client_name, &auth_token).await {
                    Ok(()) => {
                        debug!(%client_name, "session initialized");
                        let metadata = self.hooks.server_metadata();
                        self.emit(&Message::Success { metadata })?;
                    }
                    Err(err) => {
                        self.shared.session_lock().fail();
                        self.emit(&Message::Failure {
                            metadata: failure_metadata(&err),
                        })?;
                    }
                }
                self.flush().await
            }
            Job::Run {
                statement,
                parameters,
                ready,
            } => self.handle_run(statement, parameters, ready).await,
            Job::AckFailure => {
                self.hooks.on_ack_failure();
                self.emit(&Message::Success {
                    metadata: Vec::new(),
                })?;
                self.flush().await
            }
            Job::ResetDone => {
                self.hooks.on_reset();
                self.emit(&Message::Success {
                    metadata: Vec::new(),
                })?;
                self.flush().await
            }
            Job::Reply(message) => {
                self.emit(&message)?;
                self.flush().await
            }
            Job::Shutdown => Ok(()),
        }
    }

    #[instrument(skip_all)]
    async fn handle_run(
        &mut self,
        statement: String,
        parameters: Map,
        ready: oneshot::Receiver<StreamMode>,
    ) -> Result<()> {
        // A run queued behind a failure answers IGNORED instead of running.
        if self.shared.session_lock().state() == SessionState::Failed {
            self.emit(&Message::Ignored {
                metadata: Vec::new(),
            })?;
            self.flush().await?;
            // Cover the paired stream request too if it already arrived;
            // otherwise the reader answers it from the FAILED state.
            if ready.await.is_ok() {
                self.emit(&Message::Ignored {
                    metadata: Vec::new(),
                })?;
                self.flush().await?;
            }
            return Ok(());
        }

        let epoch = self.shared.epoch();
        let started = Instant::now();
        let outcome = {
            let shared = Arc::clone(&self.shared);
            let cancelled = shared.cancel.notified();
            tokio::pin!(cancelled);
            cancelled.as_mut().enable();
            if shared.epoch() != epoch {
                // A reset landed between dequeue and execution.
                return Ok(());
            }
            tokio::select! {
                _ = &mut cancelled => None,
                result = self.hooks.on_run(statement, parameters) => Some(result),
            }
        };
        let Some(result) = outcome else {
            debug!("run task cancelled by reset");
            return Ok(());
        };
        if self.shared.epoch() != epoch {
            return Ok(());
        }

        match result {
            Err(err) => {
                debug!(%err, "run task failed");
                self.shared.session_lock().fail();
                self.emit(&Message::Failure {
                    metadata: failure_metadata(&err),
                })?;
                self.flush().await?;
                // The queued response of the paired stream request is
                // replaced with IGNORED when its signal was already released.
                if ready.await.is_ok() && self.shared.epoch() == epoch {
                    self.emit(&Message::Ignored {
                        metadata: Vec::new(),
                    })?;
                    self.flush().await?;
                }
                Ok(())
            }
            Ok(output) => {
                let available_after = started.elapsed().as_millis() as i64;
                match ready.await {
                    // The signal was dropped by a reset or connection loss.
                    Err(_) => Ok(()),
                    Ok(mode) => {
                        if self.shared.epoch() != epoch {
                            return Ok(());
                        }
                        self.emit(&Message::Success {
                            metadata: vec![(
                                "result_available_after".to_string(),
                                Value::Integer(available_after),
                            )],
                        })?;
                        let consume_started = Instant::now();
                        match mode {
                            StreamMode::Pull => {
                                for fields in output.into_records() {
                                    self.emit(&Message::Record { fields })?;
                                }
                            }
                            StreamMode::Discard => self.hooks.on_discard_all(),
                        }
                        self.emit(&Message::Success {
                            metadata: vec![(
                                "result_consumed_after".to_string(),
                                Value::Integer(consume_started.elapsed().as_millis() as i64),
                            )],
                        })?;
                        self.flush().await
                    }
                }
            }
        }
    }

    fn emit(&mut self, message: &Message) -> Result<()> {
        serialize_message(message, &mut self.write_buffer)
    }

    async fn flush(&mut self) -> Result<()> {
        for blob in self.write_buffer.flush() {
            self.write_half.write_all(&blob).await?;
        }
        self.write_half.flush().await?;
        Ok(())
    }
}

/// Serve one connection: handshake, then reader and worker until close.
async fn handle_connection<H: SessionHooks>(
    mut stream: Stream,
    hooks: H,
    shutdown: watch::Receiver<bool>,
) {
    let mut hello = [0u8; HANDSHAKE_REQUEST_LEN];
    if stream.read_exact(&mut hello).await.is_err() {
        return;
    }
    let version = match HandshakeRequest::from_bytes(&hello).and_then(HandshakeRequest::negotiate) {
        Ok(version) => version,
        Err(err) => {
            // No reply on a failed handshake; just drop the connection.
            debug!(%err, "handshake rejected");
            return;
        }
    };
    debug!(version, "handshake complete");
    if stream
        .write_all(&handshake::encode_reply(version))
        .await
        .is_err()
    {
        return;
    }

    let (read_half, write_half) = tokio::io::split(stream);
    let shared = Arc::new(Shared::new());
    let worker = tokio::spawn(
        Worker {
            shared: Arc::clone(&shared),
            write_half,
            write_buffer: ChunkedWriteBuffer::new(DEFAULT_MAX_CHUNK_SIZE),
            hooks,
        }
        .run(),
    );
    Reader {
        shared,
        read_half,
        parser: BoltParser::new(),
        read_buffer: ChunkedReadBuffer::new(),
        pending: VecDeque::new(),
        shutdown,
    }
    .run()
    .await;
    let _ = worker.await;
}

/// How accepted sockets become session transports.
#[derive(Clone)]
enum Acceptor {
    Plain,
    #[cfg(feature = "tls")]
    Tls(tokio_native_tls::TlsAcceptor),
}

impl Acceptor {
    async fn accept(&self, socket: TcpStream) -> Result<Stream> {
        match self {
            Self::Plain => Ok(Stream::tcp(socket)),
            #[cfg(feature = "tls")]
            Self::Tls(acceptor) => {
                let tls = acceptor
                    .accept(socket)
                    .await
                    .map_err(|e| Error::Io(std::io::Error::other(e)))?;
                Ok(Stream::Tls(tls))
            }
        }
    }
}

/// Handle to a listening Bolt server.
pub struct BoltServer {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    accept_task: tokio::task::JoinHandle<()>,
}

impl BoltServer {
    /// The bound listen address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting and begin orderly shutdown of every live session.
    pub fn close(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Wait until the listener and every live session have shut down.
    pub async fn wait_closed(self) -> Result<()> {
        self.accept_task.await.map_err(Error::from_debug)
    }
}

/// Bind a listener and serve Bolt sessions, one hook object per connection.
pub async fn create_server<H, F>(session_factory: F, host: &str, port: u16) -> Result<BoltServer>
where
    H: SessionHooks,
    F: Fn() -> H + Send + Sync + 'static,
{
    serve(session_factory, host, port, Acceptor::Plain).await
}

/// [`create_server`] with every session transport wrapped in server-side TLS.
#[cfg(feature = "tls")]
pub async fn create_server_tls<H, F>(
    session_factory: F,
    host: &str,
    port: u16,
    acceptor: tokio_native_tls::TlsAcceptor,
) -> Result<BoltServer>
where
    H: SessionHooks,
    F: Fn() -> H + Send + Sync + 'static,
{
    serve(session_factory, host, port, Acceptor::Tls(acceptor)).await
}

async fn serve<H, F>(
    session_factory: F,
    host: &str,
    port: u16,
    acceptor: Acceptor,
) -> Result<BoltServer>
where
    H: SessionHooks,
    F: Fn() -> H + Send + Sync + 'static,
{
    let listener = TcpListener::bind((host, port)).await?;
    let local_addr = listener.local_addr()?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let accept_task = tokio::spawn(accept_loop(listener, session_factory, acceptor, shutdown_rx));
    info!(%local_addr, "server listening");
    Ok(BoltServer {
        local_addr,
        shutdown: shutdown_tx,
        accept_task,
    })
}

async fn accept_loop<H, F>(
    listener: TcpListener,
    session_factory: F,
    acceptor: Acceptor,
    shutdown: watch::Receiver<bool>,
) where
    H: SessionHooks,
    F: Fn() -> H + Send + Sync + 'static,
{
    let mut sessions = JoinSet::new();
    let mut shutdown_accept = shutdown.clone();
    loop {
        tokio::select! {
            _ = shutdown_accept.changed() => break,
            Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
            accepted = listener.accept() => match accepted {
                Ok((socket, peer)) => {
                    debug!(%peer, "connection made");
                    let _ = socket.set_nodelay(true);
                    let hooks = session_factory();
                    let acceptor = acceptor.clone();
                    let shutdown = shutdown.clone();
                    sessions.spawn(async move {
                        match acceptor.accept(socket).await {
                            Ok(stream) => handle_connection(stream, hooks, shutdown).await,
                            Err(err) => debug!(%err, "transport setup failed"),
                        }
                    });
                }
                Err(err) => warn!(%err, "accept failed"),
            }
        }
    }
    drop(listener);
    // Orderly shutdown: every live session observes the watch and drains.
    while sessions.join_next().await.is_some() {}
}

//! Connection builder and runtime loop.
//!
//! The [`AmpBuilder`] provides a fluent API for registering responders and
//! configuring the connection. [`AmpBuilder::start`] spawns one task that
//! owns the stream for the connection's whole life:
//! 1. Read bytes and parse boxes
//! 2. Resolve answers and errors against the outstanding table
//! 3. Hand asks to responder tasks, bounded by a semaphore
//! 4. Write everything queued on the outbound channel
//! 5. Upgrade to TLS or hand the stream to another protocol when asked
//!
//! The returned [`Amp`] handle is cheap to clone and issues remote calls.
//!
//! # Example
//!
//! ```ignore
//! use ampwire::codec::{Argument, Values};
//! use ampwire::{Amp, Command};
//!
//! let add = Command::builder("add")
//!     .argument("a", Argument::Integer)
//!     .argument("b", Argument::Integer)
//!     .response("total", Argument::Integer)
//!     .build();
//!
//! let server = Amp::builder()
//!     .responder(add.clone(), |args: Values| async move {
//!         let total = args.get_int("a").unwrap_or(0) + args.get_int("b").unwrap_or(0);
//!         Ok(Values::new().with("total", total))
//!     })
//!     .start(server_stream);
//!
//! let client = Amp::builder().start(client_stream);
//! let answer = client
//!     .call_remote(&add, &Values::new().with("a", 3).with("b", 4))?
//!     .await?;
//! assert_eq!(answer.get_int("total"), Some(7));
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, watch, Semaphore};
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

use crate::codec::Values;
use crate::command::{start_tls_command, translate_remote_error, Command};
use crate::config::ConnectionConfig;
use crate::dispatch::{AskKind, Dispatcher, PendingBox, PendingCall};
use crate::error::{AmpError, Result};
use crate::handler::{
    translate, Answer, BoxFuture, Located, ResponderError, ResponderRegistry, WireError,
};
use crate::protocol::{AmpBox, BoxBuffer, Message, UNHANDLED_ERROR_CODE, UNKNOWN_ERROR_CODE};
use crate::transport::{BoxedStream, RawTransport, Rewind, SwitchedProtocol, TlsProvider, TlsRole};
use crate::writer::{write_batch, Outbound, OutboundQueue};

/// Builder for configuring and starting an AMP connection.
pub struct AmpBuilder {
    registry: ResponderRegistry,
    tls: Option<Arc<dyn TlsProvider>>,
    config: ConnectionConfig,
}

impl AmpBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            registry: ResponderRegistry::new(),
            tls: None,
            config: ConnectionConfig::default(),
        }
    }

    /// Register a responder for a command.
    pub fn responder<F, Fut>(mut self, command: Command, handler: F) -> Self
    where
        F: Fn(Values) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Values, ResponderError>> + Send + 'static,
    {
        self.registry.register(command, handler);
        self
    }

    /// Register a responder whose answer starts TLS on this connection.
    pub fn start_tls_responder<F, Fut>(mut self, command: Command, handler: F) -> Self
    where
        F: Fn(Values) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Values, ResponderError>> + Send + 'static,
    {
        self.registry.register_start_tls(command, handler);
        self
    }

    /// Register a responder whose answer switches this connection to the
    /// protocol it returns.
    pub fn switch_responder<F, Fut>(mut self, command: Command, handler: F) -> Self
    where
        F: Fn(Values) -> Fut + Send + Sync + 'static,
        Fut: Future<
                Output = std::result::Result<(Values, Box<dyn SwitchedProtocol>), ResponderError>,
            > + Send
            + 'static,
    {
        self.registry.register_switch(command, handler);
        self
    }

    /// Register a raw-box responder for a command with no schema.
    pub fn fallback<F, Fut>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(AmpBox) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<AmpBox, ResponderError>> + Send + 'static,
    {
        self.registry.register_fallback(name, handler);
        self
    }

    /// Use `provider` for TLS negotiation.
    pub fn tls_provider(mut self, provider: impl TlsProvider) -> Self {
        self.tls = Some(Arc::new(provider));
        self
    }

    /// Answer the built-in `StartTLS` command by starting TLS.
    pub fn accept_start_tls(self) -> Self {
        self.start_tls_responder(start_tls_command(), |_| async { Ok(Values::new()) })
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the bytes requested per transport read.
    ///
    /// Default: 64 KiB
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    /// Set the maximum number of concurrently running responders.
    ///
    /// Asks beyond this limit wait for a slot.
    /// Default: 256
    pub fn max_concurrent_responders(mut self, limit: usize) -> Self {
        self.config.max_concurrent_responders = limit;
        self
    }

    /// Set the TLS handshake timeout.
    ///
    /// Default: 10 seconds
    pub fn tls_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.tls_handshake_timeout =
            u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Start the connection over `stream`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start<S>(self, stream: S) -> Amp
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = watch::channel(None);

        let shared = Arc::new(Shared {
            dispatcher: Dispatcher::new(tx),
            registry: self.registry,
            tls: self.tls,
            responders: Arc::new(Semaphore::new(self.config.max_concurrent_responders.max(1))),
            config: self.config,
        });

        let connection = Connection {
            boxes: BoxBuffer::with_capacity(shared.config.read_buffer_size),
            shared: shared.clone(),
            queue: OutboundQueue::new(rx),
            switched: None,
            closed: closed_tx,
        };

        info!("AMP connection established");
        tokio::spawn(connection.run(Box::new(stream)));

        Amp {
            shared,
            closed: closed_rx,
        }
    }
}

impl Default for AmpBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running AMP connection.
///
/// Use [`call_remote`](Self::call_remote) to issue calls and
/// [`wait_closed`](Self::wait_closed) to wait for the connection to end.
#[derive(Clone)]
pub struct Amp {
    shared: Arc<Shared>,
    closed: watch::Receiver<Option<String>>,
}

impl Amp {
    /// Create a new connection builder.
    pub fn builder() -> AmpBuilder {
        AmpBuilder::new()
    }

    /// Call `command` on the peer.
    ///
    /// Fails immediately on local misuse (missing argument, oversize value,
    /// switched or closed connection). Otherwise the returned handle
    /// resolves with the decoded answer or the remote error.
    pub fn call_remote(&self, command: &Command, values: &Values) -> Result<PendingCall> {
        let requires_answer = command.requires_answer();
        self.send_command(command, values, requires_answer, AskKind::Plain)
    }

    /// Send a raw box under `name`, bypassing command schemas.
    ///
    /// Returns `None` when no answer is requested.
    pub fn call_remote_string(
        &self,
        name: &str,
        fields: AmpBox,
        requires_answer: bool,
    ) -> Result<Option<PendingBox>> {
        let rx = self
            .shared
            .dispatcher
            .ask(name, None, fields, requires_answer, AskKind::Plain)?;
        Ok(rx.map(PendingBox::new))
    }

    /// Negotiate TLS using the built-in `StartTLS` command.
    ///
    /// Boxes sent before the handshake finishes are held and go out
    /// encrypted afterwards.
    pub fn start_tls(&self) -> Result<PendingCall> {
        self.start_tls_with(&start_tls_command(), &Values::new())
    }

    /// Negotiate TLS using a custom command.
    pub fn start_tls_with(&self, command: &Command, values: &Values) -> Result<PendingCall> {
        if self.shared.tls.is_none() {
            return Err(AmpError::Tls("no TLS provider configured".into()));
        }
        self.send_command(command, values, true, AskKind::StartTls)
    }

    /// Ask the peer to switch this connection to another protocol.
    ///
    /// The connection locks immediately; ordinary calls fail with
    /// `ProtocolSwitched` from here on. If the peer answers, `protocol` takes
    /// over the transport. If it refuses, the lock is released.
    pub fn switch_protocol(
        &self,
        command: &Command,
        values: &Values,
        protocol: impl SwitchedProtocol,
    ) -> Result<PendingCall> {
        self.send_command(command, values, true, AskKind::Switch(Box::new(protocol)))
    }

    fn send_command(
        &self,
        command: &Command,
        values: &Values,
        requires_answer: bool,
        kind: AskKind,
    ) -> Result<PendingCall> {
        let fields = command.build_request(values)?;
        let rx = self.shared.dispatcher.ask(
            command.name(),
            Some(command.clone()),
            fields,
            requires_answer,
            kind,
        )?;
        Ok(match rx {
            Some(rx) => PendingCall::waiting(rx, command.clone()),
            None => PendingCall::ready(),
        })
    }

    /// Close the connection. Outstanding calls fail with `ConnectionLost`.
    pub fn close(&self) {
        self.shared.dispatcher.close();
    }

    /// Number of calls awaiting an answer.
    pub fn outstanding(&self) -> usize {
        self.shared.dispatcher.outstanding_len()
    }

    /// Whether ordinary traffic is locked out by a protocol switch.
    pub fn is_locked(&self) -> bool {
        self.shared.dispatcher.is_locked()
    }

    /// Whether the connection has closed.
    pub fn is_closed(&self) -> bool {
        self.closed.borrow().is_some()
    }

    /// Wait for the connection to close and return the reason.
    pub async fn wait_closed(&self) -> String {
        let mut closed = self.closed.clone();
        let reason = match closed.wait_for(Option::is_some).await {
            Ok(reason) => (*reason).clone(),
            Err(_) => None,
        };
        reason
            .or_else(|| self.shared.dispatcher.failure())
            .unwrap_or_else(|| "connection task stopped".into())
    }
}

/// State shared by the handle, the connection task, and responder tasks.
struct Shared {
    dispatcher: Dispatcher,
    registry: ResponderRegistry,
    tls: Option<Arc<dyn TlsProvider>>,
    config: ConnectionConfig,
    responders: Arc<Semaphore>,
}

/// An ask being answered.
struct Job {
    name: String,
    tag: Option<String>,
    command: Option<Command>,
}

/// What a responder task produced.
enum Outcome {
    Answer(Answer),
    Raw(AmpBox),
}

type Reply = (oneshot::Sender<Result<AmpBox>>, AmpBox);

type ResponderFuture = BoxFuture<'static, std::result::Result<Outcome, ResponderError>>;

impl Shared {
    /// Send a responder's result back to the peer.
    fn deliver(
        &self,
        job: Job,
        result: std::result::Result<std::result::Result<Outcome, ResponderError>, JoinError>,
    ) {
        let outcome = match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                let wire = translate(&err, job.command.as_ref());
                return self.reply_error(&job, wire);
            }
            Err(e) => return self.unhandled_failure(&job, e.to_string()),
        };

        let (fields, answer) = match outcome {
            Outcome::Raw(fields) => (fields, None),
            Outcome::Answer(answer) => {
                let Some(command) = job.command.as_ref() else {
                    return self.unhandled_failure(&job, "answer without a schema".into());
                };
                match command.build_response(answer.values()) {
                    Ok(fields) => (fields, Some(answer)),
                    Err(e) => return self.unhandled_failure(&job, e.to_string()),
                }
            }
        };

        let Some(tag) = job.tag.clone() else {
            debug!("Discarding result of {}: no answer requested", job.name);
            return;
        };
        let bytes = match (Message::Answer { tag, fields }).into_box().serialize() {
            Ok(bytes) => bytes,
            Err(e) => return self.unhandled_failure(&job, e.to_string()),
        };

        let sent = match answer {
            Some(Answer::StartTls(_)) if self.tls.is_none() => {
                error!("{} answered with TLS but no TLS provider is configured", job.name);
                return self.reply_error(&job, unknown_error("TLS is not available"));
            }
            Some(Answer::StartTls(_)) => self.dispatcher.send_start_tls_answer(bytes),
            Some(Answer::Switch(_, protocol)) => self.dispatcher.send_switch_answer(bytes, protocol),
            Some(Answer::Plain(_)) | None => self.dispatcher.send_box(bytes),
        };
        match sent {
            Ok(()) => debug!("Answered {} for {}", job.tag.as_deref().unwrap_or("-"), job.name),
            Err(AmpError::OnlyOneTls) => {
                self.reply_error(&job, unknown_error("TLS has already been started"))
            }
            Err(e) => warn!("Dropped answer for {}: {}", job.name, e),
        }
    }

    /// Send an error box, closing afterwards if the error is fatal.
    fn reply_error(&self, job: &Job, wire: WireError) {
        let reason = format!("fatal error {} answering {}", wire.code, job.name);
        let fatal = wire.fatal;

        let bytes = match &job.tag {
            Some(tag) => {
                let b = Message::Error {
                    tag: tag.clone(),
                    code: wire.code,
                    description: wire.description,
                }
                .into_box();
                match b.serialize() {
                    Ok(bytes) => Some(bytes),
                    Err(e) => return self.unhandled_failure(job, e.to_string()),
                }
            }
            None => {
                debug!("{} failed with {}; no answer requested", job.name, wire.code);
                None
            }
        };

        let sent = match (bytes, fatal) {
            (bytes, true) => self.dispatcher.send_quit(bytes, reason),
            (Some(bytes), false) => self.dispatcher.send_box(bytes),
            (None, false) => Ok(()),
        };
        if let Err(e) = sent {
            warn!("Dropped error answer for {}: {}", job.name, e);
        }
    }

    /// A failure nothing handled: answer `UNKNOWN`, then drop the connection.
    fn unhandled_failure(&self, job: &Job, reason: String) {
        error!("Unhandled failure answering {}: {}", job.name, reason);
        let bytes = job.tag.as_ref().and_then(|tag| {
            Message::Error {
                tag: tag.clone(),
                code: UNKNOWN_ERROR_CODE.into(),
                description: "Unknown Error".into(),
            }
            .into_box()
            .serialize()
            .ok()
        });
        let reason = format!("unhandled failure answering {}: {}", job.name, reason);
        if let Err(e) = self.dispatcher.send_quit(bytes, reason) {
            warn!("Dropped error answer for {}: {}", job.name, e);
        }
    }
}

fn unknown_error(description: &str) -> WireError {
    WireError {
        code: UNKNOWN_ERROR_CODE.into(),
        description: description.into(),
        fatal: false,
    }
}

/// What the connection task does next.
enum Flow {
    Continue,
    /// Run the TLS handshake, then resolve the caller if this side asked.
    Upgrade {
        role: TlsRole,
        reply: Option<Reply>,
    },
    /// Hand the transport to another protocol.
    Switch {
        protocol: Box<dyn SwitchedProtocol>,
        reply: Option<Reply>,
    },
    Close(String),
}

/// The connection task.
struct Connection {
    shared: Arc<Shared>,
    boxes: BoxBuffer,
    queue: OutboundQueue,
    switched: Option<Box<dyn SwitchedProtocol>>,
    closed: watch::Sender<Option<String>>,
}

impl Connection {
    async fn run(mut self, stream: BoxedStream) {
        let (reason, stream) = self.drive(stream).await;
        if let Some(mut stream) = stream {
            let _ = stream.shutdown().await;
        }
        self.finish(reason);
    }

    /// Main loop. Returns the close reason and the stream, unless the stream
    /// was lost during a TLS handshake.
    async fn drive(&mut self, mut stream: BoxedStream) -> (String, Option<BoxedStream>) {
        let mut buf = vec![0u8; self.shared.config.read_buffer_size.max(1)];

        loop {
            let flow = match self.step(&mut stream, &mut buf).await {
                Ok(flow) => flow,
                Err(e) => return (failure_reason(e), Some(stream)),
            };

            match flow {
                Flow::Continue => {}
                Flow::Close(reason) => return (reason, Some(stream)),
                Flow::Upgrade { role, reply } => match self.upgrade(stream, role).await {
                    Ok(upgraded) => {
                        stream = upgraded;
                        self.shared.dispatcher.finish_tls();
                        if let Some((tx, fields)) = reply {
                            let _ = tx.send(Ok(fields));
                        }
                    }
                    Err(e) => {
                        let reason = failure_reason_ref(&e);
                        if let Some((tx, _)) = reply {
                            let _ = tx.send(Err(e));
                        }
                        return (reason, None);
                    }
                },
                Flow::Switch { protocol, reply } => {
                    if let Err(e) = self.switch(protocol) {
                        return (failure_reason(e), Some(stream));
                    }
                    if let Some((tx, fields)) = reply {
                        let _ = tx.send(Ok(fields));
                    }
                }
            }
        }
    }

    /// Wait for one read or one outbound item and handle it.
    async fn step(&mut self, stream: &mut BoxedStream, buf: &mut [u8]) -> Result<Flow> {
        tokio::select! {
            read = stream.read(buf) => {
                let n = read?;
                if n == 0 {
                    return Ok(Flow::Close("connection closed by peer".into()));
                }
                if let Some(protocol) = self.switched.as_mut() {
                    protocol.data_received(Bytes::copy_from_slice(&buf[..n]));
                    return Ok(Flow::Continue);
                }
                self.boxes.extend(&buf[..n]);
                self.process_boxes()
            }
            // The dispatcher in `shared` keeps a sender alive, so the queue never ends here.
            Some(item) = self.queue.recv() => self.write(stream, item).await,
        }
    }

    /// Dispatch buffered boxes until one needs the stream.
    fn process_boxes(&mut self) -> Result<Flow> {
        while let Some(b) = self.boxes.next_box()? {
            let flow = self.dispatch_box(b)?;
            if !matches!(flow, Flow::Continue) {
                return Ok(flow);
            }
        }
        Ok(Flow::Continue)
    }

    async fn write(&mut self, stream: &mut BoxedStream, item: Outbound) -> Result<Flow> {
        match item {
            Outbound::Boxes(first) => {
                let batch = self.queue.collect_batch(first);
                write_batch(stream, &batch).await?;
                Ok(Flow::Continue)
            }
            Outbound::Raw(data) => {
                write_batch(stream, &[data]).await?;
                Ok(Flow::Continue)
            }
            Outbound::StartTls(answer) => {
                write_batch(stream, &[answer]).await?;
                Ok(Flow::Upgrade {
                    role: TlsRole::Server,
                    reply: None,
                })
            }
            Outbound::Switch(answer, protocol) => {
                write_batch(stream, &[answer]).await?;
                Ok(Flow::Switch {
                    protocol,
                    reply: None,
                })
            }
            Outbound::Quit(data, reason) => {
                if let Some(data) = data {
                    write_batch(stream, &[data]).await?;
                }
                Ok(Flow::Close(reason))
            }
            Outbound::Close => Ok(Flow::Close("connection closed locally".into())),
        }
    }

    fn dispatch_box(&mut self, b: AmpBox) -> Result<Flow> {
        match Message::classify(b)? {
            Message::Ask {
                command,
                tag,
                fields,
            } => {
                self.dispatch_ask(command, tag, fields);
                Ok(Flow::Continue)
            }
            Message::Answer { tag, fields } => Ok(self.answer_received(tag, fields)),
            Message::Error {
                tag,
                code,
                description,
            } => Ok(self.error_received(tag, code, description)),
        }
    }

    fn dispatch_ask(&self, name: String, tag: Option<String>, fields: AmpBox) {
        debug!("Received ask {} for {}", tag.as_deref().unwrap_or("-"), name);

        let (command, future) = match self.shared.registry.locate(&name) {
            None => {
                let job = Job::new(name, tag, None);
                let description = format!("Unhandled Command: {:?}", job.name);
                return self.shared.reply_error(
                    &job,
                    WireError {
                        code: UNHANDLED_ERROR_CODE.into(),
                        description,
                        fatal: false,
                    },
                );
            }
            Some(Located::Command(command, responder)) => match command.parse_request(&fields) {
                Ok(args) => {
                    let fut = responder.call(args);
                    let future: ResponderFuture = Box::pin(async move { fut.await.map(Outcome::Answer) });
                    (Some(command.clone()), future)
                }
                Err(e) => {
                    error!("Bad arguments for {}: {}", name, e);
                    let job = Job::new(name, tag, Some(command.clone()));
                    return self.shared.reply_error(&job, unknown_error(&e.to_string()));
                }
            },
            Some(Located::Fallback(responder)) => {
                let fut = responder.call(fields);
                let future: ResponderFuture = Box::pin(async move { fut.await.map(Outcome::Raw) });
                (None, future)
            }
        };

        let job = Job::new(name, tag, command);
        let shared = self.shared.clone();
        tokio::spawn(async move {
            let Ok(_permit) = shared.responders.clone().acquire_owned().await else {
                return;
            };
            let result = tokio::spawn(future).await;
            shared.deliver(job, result);
        });
    }

    fn answer_received(&self, tag: String, fields: AmpBox) -> Flow {
        let Some(pending) = self.shared.dispatcher.take_outstanding(&tag) else {
            warn!("Answer for unknown tag {}", tag);
            return Flow::Continue;
        };
        debug!("Received answer {}", tag);

        match pending.kind {
            AskKind::Plain => {
                let _ = pending.tx.send(Ok(fields));
                Flow::Continue
            }
            AskKind::StartTls => Flow::Upgrade {
                role: TlsRole::Client,
                reply: Some((pending.tx, fields)),
            },
            AskKind::Switch(protocol) => Flow::Switch {
                protocol,
                reply: Some((pending.tx, fields)),
            },
        }
    }

    fn error_received(&self, tag: String, code: String, description: String) -> Flow {
        let Some(pending) = self.shared.dispatcher.take_outstanding(&tag) else {
            warn!("Error {} for unknown tag {}", code, tag);
            return Flow::Continue;
        };
        debug!("Received error {} for {}", code, tag);

        match pending.kind {
            AskKind::Plain => {}
            AskKind::StartTls => self.shared.dispatcher.abort_tls(),
            AskKind::Switch(_) => self.shared.dispatcher.unlock(),
        }

        let fatal = pending
            .command
            .as_ref()
            .is_some_and(|c| c.is_fatal_code(&code));
        let reason = format!("fatal remote error {}", code);
        let err = translate_remote_error(pending.command.as_ref(), code, description);
        let _ = pending.tx.send(Err(err));

        if fatal {
            Flow::Close(reason)
        } else {
            Flow::Continue
        }
    }

    async fn upgrade(&mut self, stream: BoxedStream, role: TlsRole) -> Result<BoxedStream> {
        let provider = self
            .shared
            .tls
            .clone()
            .ok_or_else(|| AmpError::Tls("no TLS provider configured".into()))?;

        let capacity = self.shared.config.read_buffer_size;
        let leftover =
            std::mem::replace(&mut self.boxes, BoxBuffer::with_capacity(capacity)).into_remaining()?;
        let stream: BoxedStream = if leftover.is_empty() {
            stream
        } else {
            Box::new(Rewind::new(leftover, stream))
        };

        info!("Starting TLS as {:?}", role);
        let stream = tokio::time::timeout(
            self.shared.config.tls_handshake_timeout(),
            provider.wrap(stream, role),
        )
        .await
        .map_err(|_| AmpError::Tls("TLS handshake timed out".into()))??;
        info!("TLS started");
        Ok(stream)
    }

    fn switch(&mut self, mut protocol: Box<dyn SwitchedProtocol>) -> Result<()> {
        let leftover =
            std::mem::replace(&mut self.boxes, BoxBuffer::with_capacity(0)).into_remaining()?;
        info!("Switching protocols, {} buffered bytes handed over", leftover.len());

        protocol.connection_made(RawTransport::new(self.shared.dispatcher.outbound()));
        if !leftover.is_empty() {
            protocol.data_received(leftover);
        }
        self.switched = Some(protocol);
        Ok(())
    }

    fn finish(&mut self, reason: String) {
        info!("AMP connection lost: {}", reason);

        for pending in self.shared.dispatcher.fail_all(&reason) {
            let _ = pending.tx.send(Err(AmpError::ConnectionLost(reason.clone())));
        }
        if let Some(protocol) = self.switched.as_mut() {
            protocol.connection_lost(&AmpError::ConnectionLost(reason.clone()));
        }
        let _ = self.closed.send(Some(reason));
    }
}

impl Job {
    fn new(name: String, tag: Option<String>, command: Option<Command>) -> Self {
        Self { name, tag, command }
    }
}

fn failure_reason(e: AmpError) -> String {
    failure_reason_ref(&e)
}

fn failure_reason_ref(e: &AmpError) -> String {
    match e {
        AmpError::Io(_) => debug!("Transport failed: {}", e),
        e if e.is_fatal() => error!("Dropping connection: {}", e),
        e => warn!("Closing connection: {}", e),
    }
    e.to_string()
}

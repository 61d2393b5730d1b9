//! Box dispatcher state.
//!
//! The [`Dispatcher`] owns everything about a connection that callers and
//! responder tasks share with the connection task: the tag counter, the
//! outstanding-request table, the switch lock, and the TLS state. All of it
//! sits behind one mutex, and every enqueue onto the outbound channel
//! happens while that mutex is held, so state transitions and write order
//! always agree.
//!
//! Locally detectable misuse fails here, synchronously, before anything is
//! queued.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::codec::Values;
use crate::command::Command;
use crate::error::{AmpError, Result};
use crate::protocol::{AmpBox, Message};
use crate::transport::SwitchedProtocol;
use crate::writer::Outbound;

/// What happens when an ask is answered.
pub(crate) enum AskKind {
    /// Resolve the caller.
    Plain,
    /// Start TLS as the client, then resolve.
    StartTls,
    /// Switch to this protocol, then resolve.
    Switch(Box<dyn SwitchedProtocol>),
}

/// An entry in the outstanding-request table.
pub(crate) struct Pending {
    /// Schema used to translate error codes, if known.
    pub command: Option<Command>,
    /// Resolves the caller's handle.
    pub tx: oneshot::Sender<Result<AmpBox>>,
    pub kind: AskKind,
}

/// TLS negotiation state.
enum TlsState {
    Idle,
    /// Negotiation requested; boxes are held until the handshake ends.
    Preparing(Vec<Bytes>),
    Started,
}

struct DispatchState {
    last_tag: u64,
    outstanding: HashMap<String, Pending>,
    locked: bool,
    tls: TlsState,
    /// Set once the connection is gone.
    failure: Option<String>,
}

/// Per-connection dispatch state.
pub(crate) struct Dispatcher {
    state: Mutex<DispatchState>,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl Dispatcher {
    pub fn new(outbound: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            state: Mutex::new(DispatchState {
                last_tag: 0,
                outstanding: HashMap::new(),
                locked: false,
                tls: TlsState::Idle,
                failure: None,
            }),
            outbound,
        }
    }

    /// Sender for raw transport writes after a switch.
    pub fn outbound(&self) -> mpsc::UnboundedSender<Outbound> {
        self.outbound.clone()
    }

    /// Send an ask.
    ///
    /// Returns the receiver for the answer when one is required.
    pub fn ask(
        &self,
        name: &str,
        command: Option<Command>,
        fields: AmpBox,
        requires_answer: bool,
        kind: AskKind,
    ) -> Result<Option<oneshot::Receiver<Result<AmpBox>>>> {
        let mut state = self.state.lock();
        state.check_open()?;
        if matches!(kind, AskKind::StartTls) && !matches!(state.tls, TlsState::Idle) {
            return Err(AmpError::OnlyOneTls);
        }

        let starts_tls = matches!(kind, AskKind::StartTls);
        let switches = matches!(kind, AskKind::Switch(_));

        let tag = requires_answer.then(|| format!("{:x}", state.last_tag + 1));
        let bytes = Message::Ask {
            command: name.to_owned(),
            tag: tag.clone(),
            fields,
        }
        .into_box()
        .serialize()?;
        self.enqueue_box(&mut state, bytes)?;

        let Some(tag) = tag else {
            debug!("Sent {} without requesting an answer", name);
            return Ok(None);
        };
        debug!("Sent ask {} for {}", tag, name);

        state.last_tag += 1;
        if starts_tls {
            state.tls = TlsState::Preparing(Vec::new());
        }
        if switches {
            state.locked = true;
        }

        let (tx, rx) = oneshot::channel();
        state.outstanding.insert(
            tag,
            Pending {
                command,
                tx,
                kind,
            },
        );
        Ok(Some(rx))
    }

    /// Queue a serialized box, holding it back while TLS is being negotiated.
    pub fn send_box(&self, bytes: Bytes) -> Result<()> {
        let mut state = self.state.lock();
        state.check_open()?;
        self.enqueue_box(&mut state, bytes)
    }

    /// Queue an answer after which this side starts TLS as the server.
    pub fn send_start_tls_answer(&self, bytes: Bytes) -> Result<()> {
        let mut state = self.state.lock();
        state.check_open()?;
        if !matches!(state.tls, TlsState::Idle) {
            return Err(AmpError::OnlyOneTls);
        }
        self.push(Outbound::StartTls(bytes))?;
        state.tls = TlsState::Preparing(Vec::new());
        Ok(())
    }

    /// Queue an answer after which the connection switches protocols.
    pub fn send_switch_answer(&self, bytes: Bytes, protocol: Box<dyn SwitchedProtocol>) -> Result<()> {
        let mut state = self.state.lock();
        state.check_open()?;
        state.locked = true;
        self.push(Outbound::Switch(bytes, protocol))
    }

    /// Queue final bytes and close.
    pub fn send_quit(&self, bytes: Option<Bytes>, reason: String) -> Result<()> {
        let state = self.state.lock();
        if let Some(failure) = &state.failure {
            return Err(AmpError::ConnectionLost(failure.clone()));
        }
        self.push(Outbound::Quit(bytes, reason))
    }

    /// Ask the connection task to close.
    pub fn close(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }

    /// Remove and return the entry for `tag`.
    pub fn take_outstanding(&self, tag: &str) -> Option<Pending> {
        self.state.lock().outstanding.remove(tag)
    }

    /// TLS is up: release held boxes in order.
    pub fn finish_tls(&self) {
        let mut state = self.state.lock();
        let held = match std::mem::replace(&mut state.tls, TlsState::Started) {
            TlsState::Preparing(held) => held,
            _ => Vec::new(),
        };
        self.release(held);
    }

    /// TLS was refused: release held boxes in plaintext and allow another try.
    pub fn abort_tls(&self) {
        let mut state = self.state.lock();
        let held = match std::mem::replace(&mut state.tls, TlsState::Idle) {
            TlsState::Preparing(held) => held,
            other => {
                state.tls = other;
                Vec::new()
            }
        };
        self.release(held);
    }

    /// A requested switch was refused.
    pub fn unlock(&self) {
        self.state.lock().locked = false;
    }

    /// Mark the connection failed and drain the outstanding table.
    ///
    /// Later sends fail with `ConnectionLost(reason)`.
    pub fn fail_all(&self, reason: &str) -> Vec<Pending> {
        let mut state = self.state.lock();
        if state.failure.is_none() {
            state.failure = Some(reason.to_owned());
        }
        state.outstanding.drain().map(|(_, p)| p).collect()
    }

    /// Number of asks awaiting an answer.
    pub fn outstanding_len(&self) -> usize {
        self.state.lock().outstanding.len()
    }

    /// Whether ordinary traffic is locked out by a switch.
    pub fn is_locked(&self) -> bool {
        self.state.lock().locked
    }

    /// Why the connection closed, once it has.
    pub fn failure(&self) -> Option<String> {
        self.state.lock().failure.clone()
    }

    fn enqueue_box(&self, state: &mut DispatchState, bytes: Bytes) -> Result<()> {
        if let TlsState::Preparing(held) = &mut state.tls {
            held.push(bytes);
            return Ok(());
        }
        self.push(Outbound::Boxes(bytes))
    }

    fn release(&self, held: Vec<Bytes>) {
        for bytes in held {
            if self.push(Outbound::Boxes(bytes)).is_err() {
                break;
            }
        }
    }

    fn push(&self, item: Outbound) -> Result<()> {
        self.outbound
            .send(item)
            .map_err(|_| AmpError::ConnectionLost("connection task stopped".into()))
    }
}

impl DispatchState {
    fn check_open(&self) -> Result<()> {
        if let Some(reason) = &self.failure {
            return Err(AmpError::ConnectionLost(reason.clone()));
        }
        if self.locked {
            return Err(AmpError::ProtocolSwitched);
        }
        Ok(())
    }
}

/// The result of [`Amp::call_remote`](crate::Amp::call_remote).
///
/// Resolves with the decoded response, or with the remote or connection
/// error.
#[derive(Debug)]
#[must_use = "a PendingCall does nothing unless awaited"]
pub struct PendingCall {
    inner: CallState,
}

#[derive(Debug)]
enum CallState {
    /// No answer was requested.
    Ready,
    Waiting {
        rx: oneshot::Receiver<Result<AmpBox>>,
        command: Command,
    },
    Done,
}

impl PendingCall {
    pub(crate) fn ready() -> Self {
        Self {
            inner: CallState::Ready,
        }
    }

    pub(crate) fn waiting(rx: oneshot::Receiver<Result<AmpBox>>, command: Command) -> Self {
        Self {
            inner: CallState::Waiting { rx, command },
        }
    }

    /// Wait at most `duration` for the answer.
    ///
    /// On expiry the caller gets `Timeout`. The ask stays in the
    /// outstanding table until its answer arrives or the connection closes.
    pub async fn with_timeout(self, duration: Duration) -> Result<Values> {
        tokio::time::timeout(duration, self)
            .await
            .map_err(|_| AmpError::Timeout)?
    }
}

impl Future for PendingCall {
    type Output = Result<Values>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let result = match &mut self.inner {
            CallState::Ready => Ok(Values::new()),
            CallState::Waiting { rx, command } => match Pin::new(rx).poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Ok(Ok(fields))) => command.parse_response(&fields),
                Poll::Ready(Ok(Err(e))) => Err(e),
                Poll::Ready(Err(_)) => Err(AmpError::ConnectionLost("connection dropped".into())),
            },
            CallState::Done => panic!("PendingCall polled after completion"),
        };
        self.inner = CallState::Done;
        Poll::Ready(result)
    }
}

/// The result of [`Amp::call_remote_string`](crate::Amp::call_remote_string).
///
/// Resolves with the raw answer box, reserved keys removed.
#[derive(Debug)]
#[must_use = "a PendingBox does nothing unless awaited"]
pub struct PendingBox {
    rx: oneshot::Receiver<Result<AmpBox>>,
}

impl PendingBox {
    pub(crate) fn new(rx: oneshot::Receiver<Result<AmpBox>>) -> Self {
        Self { rx }
    }

    /// Wait at most `duration` for the answer.
    pub async fn with_timeout(self, duration: Duration) -> Result<AmpBox> {
        tokio::time::timeout(duration, self)
            .await
            .map_err(|_| AmpError::Timeout)?
    }
}

impl Future for PendingBox {
    type Output = Result<AmpBox>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|r| {
            r.unwrap_or_else(|_| Err(AmpError::ConnectionLost("connection dropped".into())))
        })
    }
}

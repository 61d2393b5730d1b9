//! Protocol switching.
//!
//! After a switch the connection stops parsing boxes. Every later read goes
//! to the [`SwitchedProtocol`], which writes through a [`RawTransport`].

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{AmpError, Result};
use crate::writer::Outbound;

/// A protocol that takes over a connection after a switch.
///
/// Callbacks run on the connection task; they must not block.
pub trait SwitchedProtocol: Send + 'static {
    /// The connection is now yours. Called exactly once, before any data.
    fn connection_made(&mut self, transport: RawTransport);

    /// Bytes arrived. The first call carries any bytes the peer sent after
    /// the switch that were already buffered.
    fn data_received(&mut self, data: Bytes);

    /// The transport closed.
    fn connection_lost(&mut self, reason: &AmpError);
}

/// Write access to a switched connection.
#[derive(Debug, Clone)]
pub struct RawTransport {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl RawTransport {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self { tx }
    }

    /// Queue bytes for writing.
    ///
    /// # Errors
    ///
    /// `ConnectionLost` if the connection has already closed.
    pub fn write(&self, data: impl Into<Bytes>) -> Result<()> {
        self.tx
            .send(Outbound::Raw(data.into()))
            .map_err(|_| AmpError::ConnectionLost("transport closed".into()))
    }

    /// Close the connection after queued writes.
    pub fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }
}

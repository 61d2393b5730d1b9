//! Outbound queue for a connection.
//!
//! Everything a connection writes goes through one unbounded mpsc channel
//! owned by the connection task. Callers never touch the stream, so a send
//! is a synchronous enqueue and ordering is the channel's FIFO order.
//!
//! # Architecture
//!
//! ```text
//! call_remote ─┐
//! Responder 1 ─┼─► mpsc::UnboundedSender<Outbound> ─► Connection task ─► Stream
//! Responder N ─┤
//! RawTransport ┘
//! ```
//!
//! Consecutive serialized boxes are batched into a single vectored write.

use std::io::IoSlice;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::error::{AmpError, Result};
use crate::transport::SwitchedProtocol;

/// Maximum boxes to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 64;

/// A unit of work for the connection task.
pub enum Outbound {
    /// One or more serialized boxes.
    Boxes(Bytes),
    /// Bytes from a switched protocol.
    Raw(Bytes),
    /// A serialized answer after which this side starts TLS as the server.
    StartTls(Bytes),
    /// A serialized answer after which the connection switches protocols.
    Switch(Bytes, Box<dyn SwitchedProtocol>),
    /// Optional final bytes, then close with the given reason.
    Quit(Option<Bytes>, String),
    /// Close the connection.
    Close,
}

impl std::fmt::Debug for Outbound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outbound::Boxes(b) => write!(f, "Boxes({} bytes)", b.len()),
            Outbound::Raw(b) => write!(f, "Raw({} bytes)", b.len()),
            Outbound::StartTls(b) => write!(f, "StartTls({} bytes)", b.len()),
            Outbound::Switch(b, _) => write!(f, "Switch({} bytes)", b.len()),
            Outbound::Quit(b, reason) => {
                write!(f, "Quit({:?} bytes, {reason})", b.as_ref().map(Bytes::len))
            }
            Outbound::Close => f.write_str("Close"),
        }
    }
}

/// Receiving end of the outbound channel, with batching.
pub struct OutboundQueue {
    rx: mpsc::UnboundedReceiver<Outbound>,
    /// An item pulled while batching that was not a box.
    deferred: Option<Outbound>,
}

impl OutboundQueue {
    /// Wrap a channel receiver.
    pub fn new(rx: mpsc::UnboundedReceiver<Outbound>) -> Self {
        Self { rx, deferred: None }
    }

    /// Receive the next item. Cancel safe.
    pub async fn recv(&mut self) -> Option<Outbound> {
        if let Some(item) = self.deferred.take() {
            return Some(item);
        }
        self.rx.recv().await
    }

    /// Collect `first` plus any boxes already queued behind it.
    ///
    /// Stops at the first item that is not a box; that item is returned by
    /// the next [`recv`](Self::recv).
    pub fn collect_batch(&mut self, first: Bytes) -> Vec<Bytes> {
        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        batch.push(first);

        while batch.len() < MAX_BATCH_SIZE && self.deferred.is_none() {
            match self.rx.try_recv() {
                Ok(Outbound::Boxes(b)) => batch.push(b),
                Ok(other) => self.deferred = Some(other),
                Err(_) => break,
            }
        }
        batch
    }
}

/// Write a batch of buffers using scatter/gather I/O (write_vectored).
///
/// Handles partial writes by rebuilding the slice list past what was
/// written.
pub async fn write_batch<W>(writer: &mut W, batch: &[Bytes]) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let total_size: usize = batch.iter().map(Bytes::len).sum();
    if total_size == 0 {
        return Ok(());
    }

    let mut total_written = 0;
    while total_written < total_size {
        let slices = build_remaining_slices(batch, total_written);
        let written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(AmpError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }
        total_written += written;
    }

    writer.flush().await?;
    Ok(())
}

/// Build IoSlice array for remaining data after a partial write.
fn build_remaining_slices(batch: &[Bytes], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len());
    let mut offset = 0;

    for buf in batch {
        let end = offset + buf.len();
        if skip_bytes < end && !buf.is_empty() {
            let start = skip_bytes.saturating_sub(offset);
            slices.push(IoSlice::new(&buf[start..]));
        }
        offset = end;
    }

    slices
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Accepts at most `limit` bytes per write call.
    struct Trickle {
        out: Vec<u8>,
        limit: usize,
    }

    impl AsyncWrite for Trickle {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            let n = buf.len().min(self.limit);
            self.out.extend_from_slice(&buf[..n]);
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[test]
    fn test_build_remaining_slices_no_skip() {
        let batch = vec![Bytes::from_static(b"abc"), Bytes::from_static(b"de")];
        let slices = build_remaining_slices(&batch, 0);
        assert_eq!(slices.len(), 2);
    }

    #[test]
    fn test_build_remaining_slices_partial() {
        let batch = vec![Bytes::from_static(b"abc"), Bytes::from_static(b"de")];

        let slices = build_remaining_slices(&batch, 2);
        assert_eq!(slices.len(), 2);
        assert_eq!(&*slices[0], b"c");
        assert_eq!(&*slices[1], b"de");

        let slices = build_remaining_slices(&batch, 3);
        assert_eq!(slices.len(), 1);
        assert_eq!(&*slices[0], b"de");
    }

    #[tokio::test]
    async fn test_write_batch_multiple() {
        let mut buf = Cursor::new(Vec::new());
        let batch: Vec<_> = (0..5).map(|_| Bytes::from_static(b"abc")).collect();

        write_batch(&mut buf, &batch).await.unwrap();

        assert_eq!(buf.into_inner(), b"abcabcabcabcabc");
    }

    #[tokio::test]
    async fn test_write_batch_partial_writes() {
        let mut out = Trickle {
            out: Vec::new(),
            limit: 2,
        };
        let batch = vec![
            Bytes::from_static(b"hello"),
            Bytes::new(),
            Bytes::from_static(b" world"),
        ];

        write_batch(&mut out, &batch).await.unwrap();

        assert_eq!(out.out, b"hello world");
    }

    #[tokio::test]
    async fn test_collect_batch_defers_control() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut queue = OutboundQueue::new(rx);

        tx.send(Outbound::Boxes(Bytes::from_static(b"1"))).unwrap();
        tx.send(Outbound::Boxes(Bytes::from_static(b"2"))).unwrap();
        tx.send(Outbound::Close).unwrap();
        tx.send(Outbound::Boxes(Bytes::from_static(b"3"))).unwrap();

        let Some(Outbound::Boxes(first)) = queue.recv().await else {
            panic!("expected boxes");
        };
        let batch = queue.collect_batch(first);
        assert_eq!(batch.len(), 2);

        assert!(matches!(queue.recv().await, Some(Outbound::Close)));
        assert!(matches!(queue.recv().await, Some(Outbound::Boxes(_))));
    }

    #[tokio::test]
    async fn test_queue_closed() {
        let (tx, rx) = mpsc::unbounded_channel::<Outbound>();
        let mut queue = OutboundQueue::new(rx);
        drop(tx);
        assert!(queue.recv().await.is_none());
    }
}

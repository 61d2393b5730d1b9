//! Transport module - the byte streams a connection runs over.
//!
//! Provides:
//! - [`BoxedStream`] / [`Rewind`] - owned duplex streams, with replay of
//!   already-read bytes
//! - [`TlsProvider`] / [`RustlsProvider`] - in-band TLS upgrade
//! - [`SwitchedProtocol`] / [`RawTransport`] - handing a connection to
//!   another protocol

mod stream;
mod switch;
mod tls;

pub use stream::{AsyncStream, BoxedStream, Rewind};
pub use switch::{RawTransport, SwitchedProtocol};
pub use tls::{RustlsProvider, TlsProvider, TlsRole};

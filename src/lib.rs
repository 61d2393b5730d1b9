//! # ampwire
//!
//! Asynchronous Messaging Protocol (AMP) for Tokio.
//!
//! AMP is a symmetric, bidirectional request/response protocol over any
//! reliable byte stream. Either side may call commands on the other; each
//! message is a "box" of length-prefixed key/value pairs.
//!
//! ## Architecture
//!
//! - **Boxes** ([`protocol`]): wire encoding, incremental parsing, message
//!   classification
//! - **Schemas** ([`Command`], [`codec`]): typed arguments, responses, and
//!   error codes
//! - **Connection** ([`Amp`]): one task per connection that dispatches boxes,
//!   runs responders, and owns the stream
//! - **Transport** ([`transport`]): in-band TLS and protocol switching
//!
//! ## Example
//!
//! ```ignore
//! use ampwire::codec::{Argument, Values};
//! use ampwire::{Amp, Command};
//!
//! #[tokio::main]
//! async fn main() -> ampwire::Result<()> {
//!     let add = Command::builder("add")
//!         .argument("a", Argument::Integer)
//!         .argument("b", Argument::Integer)
//!         .response("total", Argument::Integer)
//!         .build();
//!
//!     let stream = tokio::net::TcpStream::connect("127.0.0.1:7777").await?;
//!     let amp = Amp::builder().start(stream);
//!
//!     let answer = amp
//!         .call_remote(&add, &Values::new().with("a", 3).with("b", 4))?
//!         .await?;
//!     println!("total = {:?}", answer.get_int("total"));
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod transport;

mod command;
mod connection;
mod dispatch;
mod writer;

pub use command::{start_tls_command, Command, CommandBuilder, START_TLS};
pub use connection::{Amp, AmpBuilder};
pub use dispatch::{PendingBox, PendingCall};
pub use error::{AmpError, RemoteError, Result};

//! Codec module - typed argument serialization.
//!
//! This module converts between application values and box contents:
//!
//! - [`Argument`] - per-argument codecs (integer, float, boolean, text, bytes, path, list)
//! - [`ArgumentSpec`] - an argument's wire name, codec, and optional flag
//! - [`Values`] - decoded values keyed by local name
//!
//! # Design
//!
//! Codecs are a closed enum rather than trait objects. A command schema is
//! plain data, so it can be built once and shared across connections.
//!
//! # Example
//!
//! ```
//! use ampwire::codec::{encode_values, decode_values, Argument, ArgumentSpec, Values};
//!
//! let specs = vec![
//!     ArgumentSpec::new("a", Argument::Integer),
//!     ArgumentSpec::new("b", Argument::Integer),
//! ];
//! let b = encode_values(&specs, &Values::new().with("a", 3).with("b", 4), "add").unwrap();
//! assert_eq!(b.get_str("a"), Some("3"));
//!
//! let values = decode_values(&specs, &b).unwrap();
//! assert_eq!(values.get_int("b"), Some(4));
//! ```

mod argument;
mod names;
mod value;

pub use argument::{decode_values, encode_values, Argument, ArgumentSpec};
pub use names::local_name;
pub use value::{Value, Values};

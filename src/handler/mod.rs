//! Handler module - responders for inbound asks.
//!
//! Provides:
//! - [`ResponderRegistry`] - maps command names to responders
//! - [`Answer`] / [`ResponderError`] - what a responder produces
//!
//! # Example
//!
//! ```
//! use ampwire::codec::{Argument, Values};
//! use ampwire::handler::{ResponderError, ResponderRegistry};
//! use ampwire::Command;
//!
//! let divide = Command::builder("divide")
//!     .argument("numerator", Argument::Integer)
//!     .argument("denominator", Argument::Integer)
//!     .response("result", Argument::Float)
//!     .error("ZeroDivision", "ZERO_DIVISION")
//!     .build();
//!
//! let mut registry = ResponderRegistry::new();
//! registry.register(divide, |args: Values| async move {
//!     let n = args.get_int("numerator").unwrap_or(0);
//!     let d = args.get_int("denominator").unwrap_or(0);
//!     if d == 0 {
//!         return Err(ResponderError::new("ZeroDivision", "divide by zero"));
//!     }
//!     Ok(Values::new().with("result", n as f64 / d as f64))
//! });
//! ```

mod answer;
mod registry;

pub use answer::{translate, Answer, ResponderError, WireError};
pub use registry::{
    BoxFuture, BoxResponder, FnBoxResponder, Located, Responder, ResponderRegistry,
    ResponderResult, TypedResponder,
};

//! Responder outcomes.
//!
//! A responder either produces an [`Answer`] or fails with a
//! [`ResponderError`]. The connection turns the former into an answer box and
//! the latter into an error box via [`translate`].

use thiserror::Error;
use tracing::error;

use crate::codec::Values;
use crate::command::Command;
use crate::protocol::UNKNOWN_ERROR_CODE;
use crate::transport::SwitchedProtocol;

/// What a responder answers with.
pub enum Answer {
    /// An ordinary answer box.
    Plain(Values),
    /// An answer box after which the connection negotiates TLS as the server.
    StartTls(Values),
    /// An answer box after which the connection hands its transport to
    /// another protocol.
    Switch(Values, Box<dyn SwitchedProtocol>),
}

impl Answer {
    /// The answer values.
    pub fn values(&self) -> &Values {
        match self {
            Answer::Plain(v) | Answer::StartTls(v) | Answer::Switch(v, _) => v,
        }
    }
}

impl std::fmt::Debug for Answer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Answer::Plain(v) => f.debug_tuple("Plain").field(v).finish(),
            Answer::StartTls(v) => f.debug_tuple("StartTls").field(v).finish(),
            Answer::Switch(v, _) => f.debug_tuple("Switch").field(v).field(&"..").finish(),
        }
    }
}

/// A failure raised by a responder.
///
/// Use [`ResponderError::new`] with an error kind the command declares, or
/// [`ResponderError::wire`] to send a specific wire code directly.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {description}")]
pub struct ResponderError {
    kind: String,
    description: String,
    code: Option<String>,
    fatal: bool,
}

impl ResponderError {
    /// An error of the given kind, translated through the command's table.
    pub fn new(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            description: description.into(),
            code: None,
            fatal: false,
        }
    }

    /// An error carrying an explicit wire code.
    pub fn wire(code: impl Into<String>, description: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            kind: code.clone(),
            description: description.into(),
            code: Some(code),
            fatal: false,
        }
    }

    /// Close the connection after sending this error.
    pub fn fatal(mut self) -> Self {
        self.fatal = true;
        self
    }

    /// Error kind.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// A responder error resolved to its wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireError {
    /// Wire error code.
    pub code: String,
    /// Description sent to the peer.
    pub description: String,
    /// Whether the connection closes after the error is sent.
    pub fatal: bool,
}

/// Resolve a responder error to its wire code.
///
/// An explicit code wins, then the command's error table. Anything else is
/// logged and sent as `UNKNOWN`, which never closes the connection.
pub fn translate(err: &ResponderError, command: Option<&Command>) -> WireError {
    if let Some(code) = &err.code {
        return WireError {
            code: code.clone(),
            description: err.description.clone(),
            fatal: err.fatal,
        };
    }
    if let Some((code, fatal)) = command.and_then(|c| c.error_code(&err.kind)) {
        return WireError {
            code: code.to_owned(),
            description: err.description.clone(),
            fatal,
        };
    }

    error!(
        "Unhandled error in responder for {}: {}",
        command.map_or("<fallback>", Command::name),
        err
    );
    WireError {
        code: UNKNOWN_ERROR_CODE.to_owned(),
        description: "Unknown Error".to_owned(),
        fatal: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn divide() -> Command {
        Command::builder("divide")
            .error("ZeroDivision", "ZERO_DIVISION")
            .fatal_error("Corrupt", "CORRUPT")
            .build()
    }

    #[test]
    fn test_declared_error() {
        let wire = translate(
            &ResponderError::new("ZeroDivision", "divide by zero"),
            Some(&divide()),
        );
        assert_eq!(
            wire,
            WireError {
                code: "ZERO_DIVISION".into(),
                description: "divide by zero".into(),
                fatal: false,
            }
        );
    }

    #[test]
    fn test_declared_fatal_error() {
        let wire = translate(&ResponderError::new("Corrupt", "bad"), Some(&divide()));
        assert_eq!(wire.code, "CORRUPT");
        assert!(wire.fatal);
    }

    #[test]
    fn test_undeclared_error_is_unknown() {
        let wire = translate(&ResponderError::new("Overflow", "too big"), Some(&divide()));
        assert_eq!(wire.code, "UNKNOWN");
        assert!(!wire.fatal);
    }

    #[test]
    fn test_explicit_wire_code() {
        let wire = translate(&ResponderError::wire("NOPE", "refused").fatal(), None);
        assert_eq!(wire.code, "NOPE");
        assert_eq!(wire.description, "refused");
        assert!(wire.fatal);
    }

    #[test]
    fn test_display() {
        let err = ResponderError::new("ZeroDivision", "divide by zero");
        assert_eq!(err.to_string(), "ZeroDivision: divide by zero");
    }
}

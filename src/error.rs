//! Error types for ampwire.

use thiserror::Error;

/// Main error type for all AMP operations.
#[derive(Debug, Error)]
pub enum AmpError {
    /// I/O error on the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A key or value exceeded the wire length limits.
    #[error("{}", too_long_message(.is_key, .is_local, .length, .key))]
    TooLong {
        /// True if the offending string was in key position.
        is_key: bool,
        /// True if detected while encoding locally, false if received.
        is_local: bool,
        /// Length of the offending string.
        length: usize,
        /// For values, the key the value was encoded for.
        key: Option<String>,
    },

    /// A box with no keys, or with none of `_ask`, `_answer`, `_error`.
    #[error("empty or unclassifiable box")]
    NoEmptyBoxes,

    /// The wire bytes do not form a valid box stream.
    #[error("malformed box: {0}")]
    MalformedBox(String),

    /// Required arguments were not supplied when building a request.
    #[error("forgot {} for {command}", .missing.join(", "))]
    InvalidSignature {
        /// Command name.
        command: String,
        /// Local names of the missing arguments.
        missing: Vec<String>,
    },

    /// An argument could not be encoded or decoded.
    #[error("bad value for argument {argument:?}: {reason}")]
    ValueFormat {
        /// Wire name of the argument.
        argument: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A responder returned values its command could not serialize.
    #[error("bad local return: {0}")]
    BadLocalReturn(String),

    /// The connection has been switched (or is switching) to another protocol.
    #[error("this connection has switched: no AMP traffic allowed")]
    ProtocolSwitched,

    /// TLS may only be started once per connection.
    #[error("TLS has already been started on this connection")]
    OnlyOneTls,

    /// TLS configuration or handshake failure.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The peer answered with an error declared by the command.
    #[error("{0}")]
    Remote(RemoteError),

    /// The peer answered with an error code the command does not declare.
    #[error("unknown remote error Code<{code}>: {description}")]
    UnknownRemote {
        /// Wire error code.
        code: String,
        /// Human-readable description from the peer.
        description: String,
    },

    /// The peer has no responder for the command.
    #[error("unhandled command: {description}")]
    UnhandledCommand {
        /// Description from the peer.
        description: String,
    },

    /// The connection was lost before an answer arrived.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// A caller-supplied deadline expired.
    #[error("timed out waiting for an answer")]
    Timeout,
}

fn too_long_message(is_key: &bool, is_local: &bool, length: &usize, key: &Option<String>) -> String {
    let origin = if *is_local { "local" } else { "remote" };
    let what = match (is_key, key) {
        (true, _) => "key".to_string(),
        (false, Some(k)) => format!("value {:?}", k),
        (false, None) => "value".to_string(),
    };
    format!("{} {} too long: {} bytes", origin, what, length)
}

impl AmpError {
    /// Whether this error, detected on inbound bytes, must terminate the connection.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AmpError::Io(_)
                | AmpError::TooLong {
                    is_local: false,
                    ..
                }
                | AmpError::NoEmptyBoxes
                | AmpError::MalformedBox(_)
                | AmpError::Tls(_)
        )
    }
}

/// A declared error raised by the peer's responder, translated through the
/// command's error table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    /// Local error kind the code maps to.
    pub kind: String,
    /// Wire error code.
    pub code: String,
    /// Description sent by the peer.
    pub description: String,
    /// Whether the command declares this error fatal.
    pub fatal: bool,
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} Code<{}>: {}", self.kind, self.code, self.description)
    }
}

/// Result type alias using AmpError.
pub type Result<T> = std::result::Result<T, AmpError>;

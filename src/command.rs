//! Command schemas.
//!
//! A [`Command`] is the immutable description of one remote call: its name,
//! request arguments, response values, and declared errors. Build it once at
//! startup and share it; cloning is a reference-count bump.
//!
//! # Example
//!
//! ```
//! use ampwire::codec::{Argument, Values};
//! use ampwire::Command;
//!
//! let divide = Command::builder("divide")
//!     .argument("numerator", Argument::Integer)
//!     .argument("denominator", Argument::Integer)
//!     .response("result", Argument::Float)
//!     .error("ZeroDivision", "ZERO_DIVISION")
//!     .build();
//!
//! let request = divide
//!     .build_request(&Values::new().with("numerator", 1).with("denominator", 0))
//!     .unwrap();
//! assert_eq!(request.get_str("denominator"), Some("0"));
//! assert_eq!(divide.error_code("ZeroDivision"), Some(("ZERO_DIVISION", false)));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::codec::{decode_values, encode_values, Argument, ArgumentSpec, Values};
use crate::error::{AmpError, RemoteError, Result};
use crate::protocol::{AmpBox, UNHANDLED_ERROR_CODE};

/// Name of the built-in TLS negotiation command.
pub const START_TLS: &str = "StartTLS";

#[derive(Debug, Clone)]
struct ErrorSpec {
    code: String,
    fatal: bool,
}

#[derive(Debug)]
struct CommandDef {
    name: String,
    arguments: Vec<ArgumentSpec>,
    response: Vec<ArgumentSpec>,
    /// Error kind -> wire code.
    errors: HashMap<String, ErrorSpec>,
    /// Wire code -> error kind.
    reverse_errors: HashMap<String, String>,
    requires_answer: bool,
}

/// An immutable command schema.
#[derive(Debug, Clone)]
pub struct Command {
    def: Arc<CommandDef>,
}

impl Command {
    /// Start building a command with the given wire name.
    pub fn builder(name: impl Into<String>) -> CommandBuilder {
        CommandBuilder::new(name)
    }

    /// Wire name.
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Request argument specs.
    pub fn arguments(&self) -> &[ArgumentSpec] {
        &self.def.arguments
    }

    /// Response value specs.
    pub fn response(&self) -> &[ArgumentSpec] {
        &self.def.response
    }

    /// Whether callers wait for an answer.
    pub fn requires_answer(&self) -> bool {
        self.def.requires_answer
    }

    /// Encode request arguments. Reserved keys are added by the connection.
    ///
    /// # Errors
    ///
    /// `InvalidSignature` if a required argument is missing, `ValueFormat` on
    /// a bad value.
    pub fn build_request(&self, values: &Values) -> Result<AmpBox> {
        encode_values(&self.def.arguments, values, &self.def.name)
    }

    /// Decode request arguments on the responder side.
    pub fn parse_request(&self, b: &AmpBox) -> Result<Values> {
        decode_values(&self.def.arguments, b)
    }

    /// Encode a responder's return values.
    ///
    /// # Errors
    ///
    /// `BadLocalReturn` if the values do not fit the response schema.
    pub fn build_response(&self, values: &Values) -> Result<AmpBox> {
        encode_values(&self.def.response, values, &self.def.name)
            .map_err(|e| AmpError::BadLocalReturn(format!("{}: {}", self.def.name, e)))
    }

    /// Decode an answer on the caller side.
    pub fn parse_response(&self, b: &AmpBox) -> Result<Values> {
        decode_values(&self.def.response, b)
    }

    /// Wire code and fatal flag declared for an error kind.
    pub fn error_code(&self, kind: &str) -> Option<(&str, bool)> {
        self.def
            .errors
            .get(kind)
            .map(|e| (e.code.as_str(), e.fatal))
    }

    /// Error kind declared for a wire code.
    pub fn error_kind(&self, code: &str) -> Option<&str> {
        self.def.reverse_errors.get(code).map(String::as_str)
    }

    /// Whether receiving `code` must terminate the connection.
    pub fn is_fatal_code(&self, code: &str) -> bool {
        self.error_kind(code)
            .and_then(|kind| self.def.errors.get(kind))
            .is_some_and(|e| e.fatal)
    }

    /// Translate a received error box into the caller's error.
    pub fn remote_error(&self, code: String, description: String) -> AmpError {
        translate_remote_error(Some(self), code, description)
    }
}

/// Translate a received error code, with or without a known command.
pub(crate) fn translate_remote_error(
    command: Option<&Command>,
    code: String,
    description: String,
) -> AmpError {
    if let Some(kind) = command.and_then(|c| c.error_kind(&code)) {
        let fatal = command.is_some_and(|c| c.is_fatal_code(&code));
        return AmpError::Remote(RemoteError {
            kind: kind.to_owned(),
            code,
            description,
            fatal,
        });
    }
    if code == UNHANDLED_ERROR_CODE {
        return AmpError::UnhandledCommand { description };
    }
    AmpError::UnknownRemote { code, description }
}

/// Builder for [`Command`].
#[derive(Debug)]
pub struct CommandBuilder {
    name: String,
    arguments: Vec<ArgumentSpec>,
    response: Vec<ArgumentSpec>,
    errors: HashMap<String, ErrorSpec>,
    requires_answer: bool,
}

impl CommandBuilder {
    /// Create a new builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Vec::new(),
            response: Vec::new(),
            errors: HashMap::new(),
            requires_answer: true,
        }
    }

    /// Add a required request argument.
    pub fn argument(self, wire_name: impl Into<String>, argument: Argument) -> Self {
        self.argument_spec(ArgumentSpec::new(wire_name, argument))
    }

    /// Add an optional request argument.
    pub fn optional_argument(self, wire_name: impl Into<String>, argument: Argument) -> Self {
        self.argument_spec(ArgumentSpec::new(wire_name, argument).optional())
    }

    /// Add a request argument from a prepared spec.
    pub fn argument_spec(mut self, spec: ArgumentSpec) -> Self {
        self.arguments.push(spec);
        self
    }

    /// Add a required response value.
    pub fn response(self, wire_name: impl Into<String>, argument: Argument) -> Self {
        self.response_spec(ArgumentSpec::new(wire_name, argument))
    }

    /// Add an optional response value.
    pub fn optional_response(self, wire_name: impl Into<String>, argument: Argument) -> Self {
        self.response_spec(ArgumentSpec::new(wire_name, argument).optional())
    }

    /// Add a response value from a prepared spec.
    pub fn response_spec(mut self, spec: ArgumentSpec) -> Self {
        self.response.push(spec);
        self
    }

    /// Declare an error kind and its wire code.
    pub fn error(self, kind: impl Into<String>, code: impl Into<String>) -> Self {
        self.declare_error(kind.into(), code.into(), false)
    }

    /// Declare an error kind whose receipt terminates the connection.
    pub fn fatal_error(self, kind: impl Into<String>, code: impl Into<String>) -> Self {
        self.declare_error(kind.into(), code.into(), true)
    }

    fn declare_error(mut self, kind: String, code: String, fatal: bool) -> Self {
        self.errors.insert(kind, ErrorSpec { code, fatal });
        self
    }

    /// Set whether callers wait for an answer (default `true`).
    pub fn requires_answer(mut self, requires_answer: bool) -> Self {
        self.requires_answer = requires_answer;
        self
    }

    /// Finish the schema.
    pub fn build(self) -> Command {
        let reverse_errors = self
            .errors
            .iter()
            .map(|(kind, e)| (e.code.clone(), kind.clone()))
            .collect();
        Command {
            def: Arc::new(CommandDef {
                name: self.name,
                arguments: self.arguments,
                response: self.response,
                errors: self.errors,
                reverse_errors,
                requires_answer: self.requires_answer,
            }),
        }
    }
}

/// The built-in TLS negotiation command. It carries no wire arguments; the
/// certificate material lives in the connection's TLS provider.
pub fn start_tls_command() -> Command {
    Command::builder(START_TLS).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add() -> Command {
        Command::builder("add")
            .argument("a", Argument::Integer)
            .argument("b", Argument::Integer)
            .response("total", Argument::Integer)
            .build()
    }

    #[test]
    fn test_build_request() {
        let b = add()
            .build_request(&Values::new().with("a", 3).with("b", 4))
            .unwrap();
        assert_eq!(b.get_str("a"), Some("3"));
        assert_eq!(b.get_str("b"), Some("4"));
        assert_eq!(b.len(), 2);
    }

    #[test]
    fn test_build_request_missing_argument() {
        let err = add()
            .build_request(&Values::new().with("a", 3))
            .unwrap_err();
        assert_eq!(err.to_string(), "forgot b for add");
    }

    #[test]
    fn test_parse_response() {
        let b: AmpBox = [("total", "7")].into_iter().collect();
        let values = add().parse_response(&b).unwrap();
        assert_eq!(values.get_int("total"), Some(7));
    }

    #[test]
    fn test_build_response_bad_local_return() {
        let err = add()
            .build_response(&Values::new().with("total", "seven"))
            .unwrap_err();
        assert!(matches!(err, AmpError::BadLocalReturn(_)));
    }

    #[test]
    fn test_error_tables() {
        let cmd = Command::builder("divide")
            .error("ZeroDivision", "ZERO_DIVISION")
            .fatal_error("Corrupt", "CORRUPT")
            .build();

        assert_eq!(cmd.error_code("ZeroDivision"), Some(("ZERO_DIVISION", false)));
        assert_eq!(cmd.error_code("Corrupt"), Some(("CORRUPT", true)));
        assert_eq!(cmd.error_kind("CORRUPT"), Some("Corrupt"));
        assert!(cmd.is_fatal_code("CORRUPT"));
        assert!(!cmd.is_fatal_code("ZERO_DIVISION"));
        assert!(!cmd.is_fatal_code("OTHER"));
    }

    #[test]
    fn test_remote_error_translation() {
        let cmd = Command::builder("divide")
            .error("ZeroDivision", "ZERO_DIVISION")
            .build();

        match cmd.remote_error("ZERO_DIVISION".into(), "oops".into()) {
            AmpError::Remote(e) => {
                assert_eq!(e.kind, "ZeroDivision");
                assert_eq!(e.code, "ZERO_DIVISION");
                assert!(!e.fatal);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            cmd.remote_error("UNHANDLED".into(), "no".into()),
            AmpError::UnhandledCommand { .. }
        ));
        assert!(matches!(
            cmd.remote_error("WHAT".into(), "?".into()),
            AmpError::UnknownRemote { .. }
        ));
        assert!(matches!(
            translate_remote_error(None, "ZERO_DIVISION".into(), "x".into()),
            AmpError::UnknownRemote { .. }
        ));
    }

    #[test]
    fn test_start_tls_command() {
        let cmd = start_tls_command();
        assert_eq!(cmd.name(), "StartTLS");
        assert!(cmd.arguments().is_empty());
        assert!(cmd.build_request(&Values::new()).unwrap().is_empty());
    }

    #[test]
    fn test_clone_shares_definition() {
        let a = add();
        let b = a.clone();
        assert!(Arc::ptr_eq(&a.def, &b.def));
    }
}

//! Responder registry for dispatching asks by command name.
//!
//! The registry maps command names to responders. Exact names resolve with
//! one hash lookup; a miss falls through to the fallback table, which holds raw-box
//! responders keyed by uppercased command name.
//!
//! # Example
//!
//! ```
//! use ampwire::codec::{Argument, Values};
//! use ampwire::handler::ResponderRegistry;
//! use ampwire::Command;
//!
//! let add = Command::builder("add")
//!     .argument("a", Argument::Integer)
//!     .argument("b", Argument::Integer)
//!     .response("total", Argument::Integer)
//!     .build();
//!
//! let mut registry = ResponderRegistry::new();
//! registry.register(add, |args: Values| async move {
//!     let total = args.get_int("a").unwrap_or(0) + args.get_int("b").unwrap_or(0);
//!     Ok(Values::new().with("total", total))
//! });
//!
//! assert!(registry.locate("add").is_some());
//! assert!(registry.locate("subtract").is_none());
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

use super::{Answer, ResponderError};
use crate::codec::Values;
use crate::command::Command;
use crate::protocol::AmpBox;
use crate::transport::SwitchedProtocol;

/// Result type for responder functions.
pub type ResponderResult = std::result::Result<Answer, ResponderError>;

/// Boxed future for responder results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for schema-aware responders.
pub trait Responder: Send + Sync + 'static {
    /// Handle an ask with decoded arguments.
    fn call(&self, args: Values) -> BoxFuture<'static, ResponderResult>;
}

/// Trait for fallback responders that see the raw box.
pub trait BoxResponder: Send + Sync + 'static {
    /// Handle an ask with its non-reserved fields.
    fn call(&self, fields: AmpBox) -> BoxFuture<'static, Result<AmpBox, ResponderError>>;
}

/// Wrapper that adapts an async function into a [`Responder`].
pub struct TypedResponder<F, T, Fut>
where
    F: Fn(Values) -> Fut + Send + Sync + 'static,
    T: Send + 'static,
    Fut: Future<Output = Result<T, ResponderError>> + Send + 'static,
{
    handler: F,
    wrap: fn(T) -> Answer,
    _phantom: PhantomData<fn() -> Fut>,
}

impl<F, T, Fut> TypedResponder<F, T, Fut>
where
    F: Fn(Values) -> Fut + Send + Sync + 'static,
    T: Send + 'static,
    Fut: Future<Output = Result<T, ResponderError>> + Send + 'static,
{
    /// Create a new typed responder; `wrap` picks the answer kind.
    pub fn new(handler: F, wrap: fn(T) -> Answer) -> Self {
        Self {
            handler,
            wrap,
            _phantom: PhantomData,
        }
    }
}

impl<F, T, Fut> Responder for TypedResponder<F, T, Fut>
where
    F: Fn(Values) -> Fut + Send + Sync + 'static,
    T: Send + 'static,
    Fut: Future<Output = Result<T, ResponderError>> + Send + 'static,
{
    fn call(&self, args: Values) -> BoxFuture<'static, ResponderResult> {
        let fut = (self.handler)(args);
        let wrap = self.wrap;
        Box::pin(async move { fut.await.map(wrap) })
    }
}

/// Wrapper that adapts an async function into a [`BoxResponder`].
pub struct FnBoxResponder<F, Fut>
where
    F: Fn(AmpBox) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<AmpBox, ResponderError>> + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnBoxResponder<F, Fut>
where
    F: Fn(AmpBox) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<AmpBox, ResponderError>> + Send + 'static,
{
    /// Create a new fallback responder.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, Fut> BoxResponder for FnBoxResponder<F, Fut>
where
    F: Fn(AmpBox) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<AmpBox, ResponderError>> + Send + 'static,
{
    fn call(&self, fields: AmpBox) -> BoxFuture<'static, Result<AmpBox, ResponderError>> {
        Box::pin((self.handler)(fields))
    }
}

/// Entry for a registered command.
struct CommandEntry {
    /// The command schema.
    command: Command,
    /// The responder.
    responder: Box<dyn Responder>,
}

/// Result of a registry lookup.
pub enum Located<'a> {
    /// A schema-aware responder.
    Command(&'a Command, &'a dyn Responder),
    /// A fallback responder.
    Fallback(&'a dyn BoxResponder),
}

/// Registry mapping command names to responders.
pub struct ResponderRegistry {
    /// Responders by command name.
    commands: HashMap<String, CommandEntry>,
    /// Fallback responders by uppercased command name.
    fallbacks: HashMap<String, Box<dyn BoxResponder>>,
}

impl ResponderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
            fallbacks: HashMap::new(),
        }
    }

    /// Register a responder that answers with plain values.
    pub fn register<F, Fut>(&mut self, command: Command, handler: F)
    where
        F: Fn(Values) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Values, ResponderError>> + Send + 'static,
    {
        self.insert(command, TypedResponder::new(handler, Answer::Plain));
    }

    /// Register a responder whose answer starts TLS.
    pub fn register_start_tls<F, Fut>(&mut self, command: Command, handler: F)
    where
        F: Fn(Values) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Values, ResponderError>> + Send + 'static,
    {
        self.insert(command, TypedResponder::new(handler, Answer::StartTls));
    }

    /// Register a responder whose answer switches the connection to the
    /// returned protocol.
    pub fn register_switch<F, Fut>(&mut self, command: Command, handler: F)
    where
        F: Fn(Values) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(Values, Box<dyn SwitchedProtocol>), ResponderError>>
            + Send
            + 'static,
    {
        self.insert(
            command,
            TypedResponder::new(handler, |(values, protocol)| {
                Answer::Switch(values, protocol)
            }),
        );
    }

    /// Register a fallback responder for a command with no schema.
    ///
    /// Names are matched case-insensitively.
    pub fn register_fallback<F, Fut>(&mut self, name: &str, handler: F)
    where
        F: Fn(AmpBox) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<AmpBox, ResponderError>> + Send + 'static,
    {
        self.fallbacks
            .insert(name.to_uppercase(), Box::new(FnBoxResponder::new(handler)));
    }

    fn insert(&mut self, command: Command, responder: impl Responder) {
        self.commands.insert(
            command.name().to_string(),
            CommandEntry {
                command,
                responder: Box::new(responder),
            },
        );
    }

    /// Find the responder for a command name.
    pub fn locate(&self, name: &str) -> Option<Located<'_>> {
        if let Some(entry) = self.commands.get(name) {
            return Some(Located::Command(&entry.command, entry.responder.as_ref()));
        }
        self.fallbacks
            .get(&name.to_uppercase())
            .map(|r| Located::Fallback(r.as_ref()))
    }

    /// Get the schema registered for a command name.
    pub fn command(&self, name: &str) -> Option<&Command> {
        self.commands.get(name).map(|e| &e.command)
    }

    /// Number of registered responders, fallbacks included.
    pub fn len(&self) -> usize {
        self.commands.len() + self.fallbacks.len()
    }

    /// Check if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResponderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Argument;

    fn echo() -> Command {
        Command::builder("echo")
            .argument("text", Argument::Unicode)
            .response("text", Argument::Unicode)
            .build()
    }

    #[test]
    fn test_register_and_locate() {
        let mut registry = ResponderRegistry::new();
        registry.register(echo(), |args: Values| async move { Ok(args) });

        match registry.locate("echo") {
            Some(Located::Command(command, _)) => assert_eq!(command.name(), "echo"),
            _ => panic!("expected a command responder"),
        }
        assert!(registry.command("echo").is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_locate_missing() {
        let registry = ResponderRegistry::new();
        assert!(registry.locate("nonexistent").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_fallback_case_insensitive() {
        let mut registry = ResponderRegistry::new();
        registry.register_fallback("ping", |fields: AmpBox| async move { Ok(fields) });

        assert!(matches!(registry.locate("ping"), Some(Located::Fallback(_))));
        assert!(matches!(registry.locate("PING"), Some(Located::Fallback(_))));
    }

    #[test]
    fn test_command_shadows_fallback() {
        let mut registry = ResponderRegistry::new();
        registry.register_fallback("echo", |fields: AmpBox| async move { Ok(fields) });
        registry.register(echo(), |args: Values| async move { Ok(args) });

        assert!(matches!(registry.locate("echo"), Some(Located::Command(..))));
    }

    #[tokio::test]
    async fn test_responder_call() {
        let mut registry = ResponderRegistry::new();
        registry.register(echo(), |args: Values| async move { Ok(args) });

        let Some(Located::Command(_, responder)) = registry.locate("echo") else {
            panic!("expected a command responder");
        };
        let answer = responder
            .call(Values::new().with("text", "hi"))
            .await
            .unwrap();
        assert!(matches!(answer, Answer::Plain(_)));
        assert_eq!(answer.values().get_str("text"), Some("hi"));
    }

    #[tokio::test]
    async fn test_start_tls_responder_answer_kind() {
        let mut registry = ResponderRegistry::new();
        registry.register_start_tls(crate::command::start_tls_command(), |_| async {
            Ok(Values::new())
        });

        let Some(Located::Command(_, responder)) = registry.locate("StartTLS") else {
            panic!("expected a command responder");
        };
        let answer = responder.call(Values::new()).await.unwrap();
        assert!(matches!(answer, Answer::StartTls(_)));
    }
}

//! The `Action` trait — the contract every mailer step must fulfil.

use serde_json::{Map, Value};

use crate::ActionError;

/// The object threaded through a mailer pipeline.
pub type Message = Value;

/// Options visible to an action: a flat JSON object.
pub type OptionSet = Map<String, Value>;

/// What an action hands back to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Keep going with this message.
    Sent(Message),
    /// Stop the pipeline. Not an error.
    Cancelled,
}

impl Outcome {
    /// `true` when the pipeline was stopped.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    /// The message, if one was produced.
    pub fn message(&self) -> Option<&Message> {
        match self {
            Outcome::Sent(message) => Some(message),
            Outcome::Cancelled => None,
        }
    }

    /// Consume the outcome and return the message, if any.
    pub fn into_message(self) -> Option<Message> {
        match self {
            Outcome::Sent(message) => Some(message),
            Outcome::Cancelled => None,
        }
    }
}

impl From<Option<Message>> for Outcome {
    fn from(value: Option<Message>) -> Self {
        value.map_or(Outcome::Cancelled, Outcome::Sent)
    }
}

/// Context passed to every action call.
#[derive(Debug, Clone, Default)]
pub struct ActionContext {
    /// Options merged for this particular invocation.
    pub options: OptionSet,
    /// Name of the unit running the action, when it has one.
    pub name: Option<String>,
}

impl ActionContext {
    pub fn new(options: OptionSet, name: Option<String>) -> Self {
        Self { options, name }
    }

    /// Shorthand for `ctx.options.get(key)`.
    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }
}

/// The core action trait.
///
/// Actions receive the message by value and return it (usually modified)
/// wrapped in [`Outcome::Sent`], or [`Outcome::Cancelled`] to stop sending.
/// Any closure with the matching signature is an action.
pub trait Action: Send + Sync {
    fn call(&self, message: Message, ctx: &ActionContext) -> Result<Outcome, ActionError>;
}

impl<F> Action for F
where
    F: Fn(Message, &ActionContext) -> Result<Outcome, ActionError> + Send + Sync,
{
    fn call(&self, message: Message, ctx: &ActionContext) -> Result<Outcome, ActionError> {
        self(message, ctx)
    }
}

/// Overlay `fields` onto an object message.
///
/// Shared helper for actions that stamp fields onto the message.
pub fn overlay<'a, I>(message: &mut Message, fields: I) -> Result<(), ActionError>
where
    I: IntoIterator<Item = (&'a String, &'a Value)>,
{
    let found = kind(message);
    let target = message.as_object_mut().ok_or_else(|| {
        ActionError::InvalidMessage(format!("expected a JSON object, got {found}"))
    })?;
    for (key, value) in fields {
        target.insert(key.clone(), value.clone());
    }
    Ok(())
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Pin a closure to the action signature so argument types are inferred.
///
/// ```
/// use actions::{from_fn, Outcome};
///
/// let stamp = from_fn(|mut message, ctx| {
///     message["domain"] = ctx.option("domain").cloned().unwrap_or_default();
///     Ok(Outcome::Sent(message))
/// });
/// # let _ = stamp;
/// ```
pub fn from_fn<F>(f: F) -> F
where
    F: Fn(Message, &ActionContext) -> Result<Outcome, ActionError> + Send + Sync,
{
    f
}

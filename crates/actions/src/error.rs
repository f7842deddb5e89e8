//! Action-level error type.

use thiserror::Error;

/// Errors returned by an action's `call` method.
///
/// The engine never interprets these: whatever an action returns is handed
/// back to the caller of `send` untouched.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The action decided the message cannot be processed.
    #[error("action failed: {0}")]
    Failed(String),

    /// The message does not have the shape the action needs
    /// (for example, a field overlay on a non-object message).
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Anything else, typically bubbled up from a collaborator such as a
    /// transport or template engine.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

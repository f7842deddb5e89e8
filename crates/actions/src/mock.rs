//! `MockAction` — a test double for `Action`.
//!
//! Useful in unit and integration tests where a real action is either
//! unavailable or irrelevant.

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

use crate::{overlay, Action, ActionContext, ActionError, Message, OptionSet, Outcome};

/// Behaviour injected into `MockAction` at construction time.
pub enum MockBehaviour {
    /// Overlay these fields onto the message and pass it on.
    Assign(Value),
    /// Cancel the pipeline.
    Cancel,
    /// Fail with `ActionError::Failed`.
    Fail(String),
}

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub message: Message,
    pub options: OptionSet,
}

/// A mock action that records every call it receives and returns a
/// programmer-specified result.
///
/// Every successful call also appends the mock's name to the message's
/// `trace` array so tests can assert the order steps ran in.
#[derive(Clone)]
pub struct MockAction {
    /// Label used in test assertions and in the `trace` array.
    pub name: String,
    behaviour: Arc<MockBehaviour>,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

impl MockAction {
    /// Create a mock that overlays `fields` onto the message.
    pub fn assigning(name: impl Into<String>, fields: Value) -> Self {
        Self::with_behaviour(name, MockBehaviour::Assign(fields))
    }

    /// Create a mock that only records its name in the trace.
    pub fn passing(name: impl Into<String>) -> Self {
        Self::with_behaviour(name, MockBehaviour::Assign(Value::Object(OptionSet::new())))
    }

    /// Create a mock that always cancels.
    pub fn cancelling(name: impl Into<String>) -> Self {
        Self::with_behaviour(name, MockBehaviour::Cancel)
    }

    /// Create a mock that always fails.
    pub fn failing(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::with_behaviour(name, MockBehaviour::Fail(msg.into()))
    }

    fn with_behaviour(name: impl Into<String>, behaviour: MockBehaviour) -> Self {
        Self {
            name: name.into(),
            behaviour: Arc::new(behaviour),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of times this action has been called.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Options seen by the most recent call.
    pub fn last_options(&self) -> Option<OptionSet> {
        self.calls().last().map(|call| call.options.clone())
    }

    /// All calls in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Action for MockAction {
    fn call(&self, mut message: Message, ctx: &ActionContext) -> Result<Outcome, ActionError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(MockCall {
                message: message.clone(),
                options: ctx.options.clone(),
            });

        match self.behaviour.as_ref() {
            MockBehaviour::Assign(fields) => {
                if let Some(fields) = fields.as_object() {
                    overlay(&mut message, fields)?;
                }
                if let Some(obj) = message.as_object_mut() {
                    let trace = obj
                        .entry("trace")
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if let Some(trace) = trace.as_array_mut() {
                        trace.push(Value::String(self.name.clone()));
                    }
                }
                Ok(Outcome::Sent(message))
            }
            MockBehaviour::Cancel => Ok(Outcome::Cancelled),
            MockBehaviour::Fail(msg) => Err(ActionError::Failed(msg.clone())),
        }
    }
}

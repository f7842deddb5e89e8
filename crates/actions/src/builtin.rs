//! Built-in actions usable from declarative route files.
//!
//! Each is a small configurable struct; none of them perform I/O.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{overlay, Action, ActionContext, ActionError, Message, OptionSet, Outcome};

/// Copies the invocation options onto the message.
///
/// With `keys` set, only those options are copied (missing ones are skipped).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApplyOptions {
    #[serde(default)]
    pub keys: Option<Vec<String>>,
}

impl Action for ApplyOptions {
    fn call(&self, mut message: Message, ctx: &ActionContext) -> Result<Outcome, ActionError> {
        match &self.keys {
            None => overlay(&mut message, &ctx.options)?,
            Some(keys) => {
                let picked = keys
                    .iter()
                    .filter_map(|key| ctx.options.get(key).map(|value| (key, value)));
                overlay(&mut message, picked)?;
            }
        }
        Ok(Outcome::Sent(message))
    }
}

/// Sets a fixed group of fields on the message.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SetFields {
    pub fields: OptionSet,
}

impl Action for SetFields {
    fn call(&self, mut message: Message, _ctx: &ActionContext) -> Result<Outcome, ActionError> {
        overlay(&mut message, &self.fields)?;
        Ok(Outcome::Sent(message))
    }
}

/// Cancels sending when `message[field] == equals`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CancelWhen {
    pub field: String,
    pub equals: Value,
}

impl Action for CancelWhen {
    fn call(&self, message: Message, ctx: &ActionContext) -> Result<Outcome, ActionError> {
        if message.get(&self.field) == Some(&self.equals) {
            debug!(
                unit = ctx.name.as_deref().unwrap_or("<anonymous>"),
                field = %self.field,
                "cancelling message"
            );
            return Ok(Outcome::Cancelled);
        }
        Ok(Outcome::Sent(message))
    }
}

/// Fails when any of `fields` is missing or null on the message.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RequireFields {
    pub fields: Vec<String>,
}

impl Action for RequireFields {
    fn call(&self, message: Message, _ctx: &ActionContext) -> Result<Outcome, ActionError> {
        let missing: Vec<&str> = self
            .fields
            .iter()
            .filter(|field| message.get(field.as_str()).map_or(true, Value::is_null))
            .map(String::as_str)
            .collect();

        if !missing.is_empty() {
            return Err(ActionError::Failed(format!(
                "missing required field(s): {}",
                missing.join(", ")
            )));
        }
        Ok(Outcome::Sent(message))
    }
}

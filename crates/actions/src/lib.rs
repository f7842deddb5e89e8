//! `actions` crate — the `Action` trait and built-in action implementations.
//!
//! Every mailer step, built-in or caller-supplied, implements [`Action`].
//! The `mailer` crate dispatches execution through this trait object.

pub mod builtin;
pub mod error;
pub mod mock;
pub mod traits;

pub use error::ActionError;
pub use traits::{from_fn, overlay, Action, ActionContext, Message, OptionSet, Outcome};

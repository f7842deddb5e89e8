//! The process-wide router.
//!
//! Created lazily on first use and replaced wholesale by [`reset`].
//! Handles returned by [`router`] before a reset keep pointing at the old
//! table.

use std::sync::{Mutex, OnceLock, PoisonError};

use actions::{Message, Outcome};
use tracing::info;

use crate::{Definition, MailerError, OptionSource, Router, Unit};

static GLOBAL: OnceLock<Mutex<Router>> = OnceLock::new();

fn slot() -> &'static Mutex<Router> {
    GLOBAL.get_or_init(|| Mutex::new(Router::new()))
}

/// A handle to the current process-wide router.
pub fn router() -> Router {
    slot().lock().unwrap_or_else(PoisonError::into_inner).clone()
}

/// Replace the process-wide router with an empty one and return it.
pub fn reset() -> Router {
    let fresh = Router::new();
    let previous = std::mem::replace(
        &mut *slot().lock().unwrap_or_else(PoisonError::into_inner),
        fresh.clone(),
    );
    info!(dropped_routes = previous.len(), "process-wide router reset");
    fresh
}

/// [`Router::route`] on the process-wide router.
pub fn route<I>(name: impl Into<String>, definitions: I) -> Result<Unit, MailerError>
where
    I: IntoIterator<Item = Definition>,
{
    router().route(name, definitions)
}

/// [`Router::send`] on the process-wide router.
pub fn send(name: &str, message: Message, extra: &[OptionSource]) -> Result<Outcome, MailerError> {
    router().send(name, message, extra)
}

/// [`Router::compose`] on the process-wide router.
pub fn compose<I>(definitions: I) -> Result<Unit, MailerError>
where
    I: IntoIterator<Item = Definition>,
{
    router().compose(definitions)
}

//! Composing definitions into a single chained unit.

use std::sync::Weak;

use tracing::debug;

use crate::definition::{normalize, Definition, Normalized};
use crate::router::RouteTable;
use crate::{MailerError, Unit};

/// Compose `definitions` into one unit that runs them in order.
///
/// Members only see their own options (or, for derived options, what
/// their function computes from the invocation options). The result is
/// always a chain, even for a single member. Route references need a
/// router; see [`Router::compose`](crate::Router::compose).
///
/// # Errors
/// [`MailerError::InvalidDefinition`] for stray options entries or route
/// references.
pub fn compose<I>(definitions: I) -> Result<Unit, MailerError>
where
    I: IntoIterator<Item = Definition>,
{
    compose_with(definitions, None)
}

pub(crate) fn compose_with<I>(
    definitions: I,
    table: Option<Weak<RouteTable>>,
) -> Result<Unit, MailerError>
where
    I: IntoIterator<Item = Definition>,
{
    let Normalized { members, .. } = normalize(definitions, table)?;
    debug!(members = members.len(), "composed unit");
    Ok(Unit::chain(members, None))
}

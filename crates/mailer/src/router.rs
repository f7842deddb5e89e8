//! Named routes.
//!
//! `Router` is a cheap handle around a shared route table:
//! 1. `route` normalizes definitions into a unit and stores it by name,
//!    overwriting any previous entry.
//! 2. `send` looks the name up and runs the stored unit.
//! 3. Route references inside definitions become delegating units that look
//!    their target up when they run, so a route may name another route
//!    that is registered later.
//!
//! The table lock is only held for lookups and inserts, never while a unit
//! runs, so actions may freely call back into the router.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use actions::{Message, Outcome};
use tracing::{debug, instrument};

use crate::compose::compose_with;
use crate::definition::{normalize, Definition, Normalized};
use crate::options::OptionSource;
use crate::{MailerError, Unit};

// ---------------------------------------------------------------------------
// Route table
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct RouteTable {
    routes: RwLock<HashMap<String, Unit>>,
}

impl RouteTable {
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Unit>> {
        self.routes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Unit>> {
        self.routes.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clone the unit registered under `name` out of the table.
    pub(crate) fn lookup(&self, name: &str) -> Result<Unit, MailerError> {
        self.read()
            .get(name)
            .cloned()
            .ok_or_else(|| MailerError::RouteNotFound(name.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// RouteRef
// ---------------------------------------------------------------------------

/// A by-name reference into a route table, resolved on every send.
///
/// Holds the table weakly: routes that reference each other must not keep
/// their own router alive.
#[derive(Clone)]
pub(crate) struct RouteRef {
    name: String,
    table: Weak<RouteTable>,
}

impl RouteRef {
    pub(crate) fn new(name: impl Into<String>, table: Weak<RouteTable>) -> Self {
        Self {
            name: name.into(),
            table,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn send(
        &self,
        message: Message,
        options: crate::OptionSet,
    ) -> Result<Outcome, MailerError> {
        let table = self
            .table
            .upgrade()
            .ok_or_else(|| MailerError::RouterDropped(self.name.clone()))?;
        let unit = table.lookup(&self.name)?;
        drop(table);

        unit.send(message, &[OptionSource::Static(options)])
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// A registry of named units.
///
/// Clones share one table.
#[derive(Clone, Default)]
pub struct Router {
    table: Arc<RouteTable>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `definitions` under `name` and return the registered unit.
    ///
    /// An options entry (`Definition::Object` or `Definition::Options`)
    /// directly after an action becomes that action's options. The first
    /// bare action of a route also receives the options the route is sent
    /// with. A route made of that one action is registered as-is; every
    /// other route is wrapped in a chain, so units and route references see
    /// only their own options whether or not they stand alone.
    ///
    /// # Errors
    /// [`MailerError::InvalidDefinition`] when the definitions are empty or
    /// malformed.
    pub fn route<I>(&self, name: impl Into<String>, definitions: I) -> Result<Unit, MailerError>
    where
        I: IntoIterator<Item = Definition>,
    {
        let name = name.into();
        let Normalized {
            mut members,
            first_action,
        } = normalize(definitions, Some(self.downgrade()))?;

        let unit = match members.len() {
            0 => {
                return Err(MailerError::InvalidDefinition(format!(
                    "route '{name}' has no definitions"
                )))
            }
            1 if first_action == Some(0) && !members[0].options().is_derived() => {
                members.remove(0)
            }
            _ => Unit::chain(members, first_action),
        }
        .named(name.clone());

        let previous = self.table.write().insert(name.clone(), unit.clone());
        debug!(
            route = %name,
            members = unit.members().len(),
            overwritten = previous.is_some(),
            "route registered"
        );

        Ok(unit)
    }

    /// Compose `definitions` into an anonymous unit whose route references
    /// resolve through this router.
    pub fn compose<I>(&self, definitions: I) -> Result<Unit, MailerError>
    where
        I: IntoIterator<Item = Definition>,
    {
        compose_with(definitions, Some(self.downgrade()))
    }

    /// A unit that forwards to `name`, resolved whenever it is sent.
    pub fn delegate(&self, name: impl Into<String>) -> Unit {
        Unit::delegate(RouteRef::new(name, self.downgrade()), OptionSource::empty())
    }

    /// Send `message` through the route registered as `name`.
    ///
    /// # Errors
    /// [`MailerError::RouteNotFound`] if nothing is registered under `name`,
    /// plus whatever the route's units return.
    #[instrument(skip_all, fields(route = %name))]
    pub fn send(
        &self,
        name: &str,
        message: Message,
        extra: &[OptionSource],
    ) -> Result<Outcome, MailerError> {
        let unit = self.table.lookup(name)?;
        let outcome = unit.send(message, extra)?;
        debug!(cancelled = outcome.is_cancelled(), "route finished");
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn get(&self, name: &str) -> Option<Unit> {
        self.table.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.read().contains_key(name)
    }

    /// Registered route names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.table.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }

    /// Drop the route registered as `name`, returning it.
    pub fn remove(&self, name: &str) -> Option<Unit> {
        self.table.write().remove(name)
    }

    fn downgrade(&self) -> Weak<RouteTable> {
        Arc::downgrade(&self.table)
    }
}

//! Definitions accepted by `compose` and `Router::route`, and the single
//! normalization pass that turns them into units.

use std::fmt;
use std::sync::{Arc, Weak};

use actions::Action;
use serde_json::Value;

use crate::options::{OptionSet, OptionSource};
use crate::router::{RouteRef, RouteTable};
use crate::{MailerError, Unit};

/// One argument to `compose` or `route`.
#[derive(Clone)]
pub enum Definition {
    /// A bare action. An options entry right after it becomes its options.
    Action(Arc<dyn Action>),
    /// An existing unit, used as-is.
    Unit(Unit),
    /// Another route, looked up by name each time it runs.
    Route(String),
    /// A JSON object: options for a preceding action, otherwise a
    /// `{route name: options}` mapping.
    Object(OptionSet),
    /// Options for the preceding action.
    Options(OptionSource),
    /// One delegating member per entry, in order.
    Routes(Vec<(String, OptionSource)>),
    /// Nested definitions, flattened in place.
    Sequence(Vec<Definition>),
}

impl Definition {
    pub fn action<A: Action + 'static>(action: A) -> Self {
        Definition::Action(Arc::new(action))
    }

    pub fn route(name: impl Into<String>) -> Self {
        Definition::Route(name.into())
    }

    pub fn options(source: OptionSource) -> Self {
        Definition::Options(source)
    }

    pub fn routes<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, OptionSource)>,
        S: Into<String>,
    {
        Definition::Routes(
            entries
                .into_iter()
                .map(|(name, options)| (name.into(), options))
                .collect(),
        )
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Definition::Action(_) => f.write_str("Action(..)"),
            Definition::Unit(unit) => f.debug_tuple("Unit").field(unit).finish(),
            Definition::Route(name) => f.debug_tuple("Route").field(name).finish(),
            Definition::Object(options) => f.debug_tuple("Object").field(options).finish(),
            Definition::Options(source) => f.debug_tuple("Options").field(source).finish(),
            Definition::Routes(entries) => f.debug_tuple("Routes").field(entries).finish(),
            Definition::Sequence(items) => f.debug_tuple("Sequence").field(items).finish(),
        }
    }
}

impl From<Unit> for Definition {
    fn from(unit: Unit) -> Self {
        Definition::Unit(unit)
    }
}

impl From<&str> for Definition {
    fn from(name: &str) -> Self {
        Definition::Route(name.to_owned())
    }
}

impl From<String> for Definition {
    fn from(name: String) -> Self {
        Definition::Route(name)
    }
}

impl From<OptionSource> for Definition {
    fn from(source: OptionSource) -> Self {
        Definition::Options(source)
    }
}

impl From<Vec<Definition>> for Definition {
    fn from(items: Vec<Definition>) -> Self {
        Definition::Sequence(items)
    }
}

impl TryFrom<Value> for Definition {
    type Error = MailerError;

    /// Strings name routes, objects are options or route mappings, arrays
    /// nest. Other JSON values cannot describe a step.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(name) => Ok(Definition::Route(name)),
            Value::Object(options) => Ok(Definition::Object(options)),
            Value::Array(items) => items
                .into_iter()
                .map(Definition::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(Definition::Sequence),
            other => Err(MailerError::InvalidDefinition(format!(
                "{other} is not a route, unit, action or options object"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

pub(crate) struct Normalized {
    pub members: Vec<Unit>,
    /// Position of the first bare action among `members`.
    pub first_action: Option<usize>,
}

/// A definition with sequences flattened away.
enum Flat {
    Action(Arc<dyn Action>),
    Unit(Unit),
    Route(String),
    Object(OptionSet),
    Options(OptionSource),
    Routes(Vec<(String, OptionSource)>),
}

/// Flatten `definitions` and map each entry onto a unit.
///
/// Route references need a route table; without one they are rejected.
pub(crate) fn normalize<I>(
    definitions: I,
    table: Option<Weak<RouteTable>>,
) -> Result<Normalized, MailerError>
where
    I: IntoIterator<Item = Definition>,
{
    let mut flat = Vec::new();
    flatten(definitions, &mut flat);

    let mut members = Vec::with_capacity(flat.len());
    let mut first_action = None;
    let mut queue = flat.into_iter().peekable();

    while let Some(entry) = queue.next() {
        match entry {
            Flat::Action(action) => {
                let options =
                    match queue.next_if(|next| matches!(next, Flat::Object(_) | Flat::Options(_))) {
                        Some(Flat::Object(options)) => OptionSource::Static(options),
                        Some(Flat::Options(source)) => source,
                        _ => OptionSource::empty(),
                    };
                first_action.get_or_insert(members.len());
                members.push(Unit::from_action(action, [options]));
            }
            Flat::Unit(unit) => members.push(unit),
            Flat::Route(name) => {
                let route = route_ref(&name, table.as_ref())?;
                members.push(Unit::delegate(route, OptionSource::empty()));
            }
            Flat::Object(mapping) => {
                for (name, options) in mapping {
                    let options = OptionSource::try_from(options).map_err(|_| {
                        MailerError::InvalidDefinition(format!(
                            "options for route '{name}' must be a JSON object"
                        ))
                    })?;
                    let route = route_ref(&name, table.as_ref())?;
                    members.push(Unit::delegate(route, options));
                }
            }
            Flat::Routes(entries) => {
                for (name, options) in entries {
                    let route = route_ref(&name, table.as_ref())?;
                    members.push(Unit::delegate(route, options));
                }
            }
            Flat::Options(_) => {
                return Err(MailerError::InvalidDefinition(
                    "an options entry must directly follow an action".into(),
                ))
            }
        }
    }

    Ok(Normalized {
        members,
        first_action,
    })
}

fn flatten<I>(definitions: I, out: &mut Vec<Flat>)
where
    I: IntoIterator<Item = Definition>,
{
    for definition in definitions {
        let entry = match definition {
            Definition::Sequence(items) => {
                flatten(items, out);
                continue;
            }
            Definition::Action(action) => Flat::Action(action),
            Definition::Unit(unit) => Flat::Unit(unit),
            Definition::Route(name) => Flat::Route(name),
            Definition::Object(options) => Flat::Object(options),
            Definition::Options(source) => Flat::Options(source),
            Definition::Routes(entries) => Flat::Routes(entries),
        };
        out.push(entry);
    }
}

fn route_ref(name: &str, table: Option<&Weak<RouteTable>>) -> Result<RouteRef, MailerError> {
    table
        .map(|table| RouteRef::new(name, Weak::clone(table)))
        .ok_or_else(|| {
            MailerError::InvalidDefinition(format!(
                "route reference '{name}' needs a router; use Router::compose"
            ))
        })
}

//! Option sets, the ways a unit can hold them, and how they merge.
//!
//! Options are flat JSON objects. Merging is a right-biased overlay: later
//! sources win on key collision. By default only top-level keys are
//! considered; [`MergeStrategy::Deep`] opts into recursive merging of
//! nested objects.

use std::fmt;
use std::sync::{Arc, RwLock, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::MailerError;

pub use actions::OptionSet;

/// Options held by reference. Every unit built from the same handle sees
/// writes made through it.
pub type SharedOptions = Arc<RwLock<OptionSet>>;

/// Options computed from the options of the current invocation.
pub type DeriveFn = dyn Fn(&OptionSet) -> OptionSet + Send + Sync;

// ---------------------------------------------------------------------------
// OptionSource
// ---------------------------------------------------------------------------

/// Where a unit's (or an invocation's) options come from.
#[derive(Clone)]
pub enum OptionSource {
    /// A plain mapping, owned by value.
    Static(OptionSet),
    /// A mapping owned by reference; see [`SharedOptions`].
    Shared(SharedOptions),
    /// A function of the invocation options. Never merged as a mapping.
    Derived(Arc<DeriveFn>),
}

impl OptionSource {
    pub fn empty() -> Self {
        OptionSource::Static(OptionSet::new())
    }

    pub fn derived<F>(f: F) -> Self
    where
        F: Fn(&OptionSet) -> OptionSet + Send + Sync + 'static,
    {
        OptionSource::Derived(Arc::new(f))
    }

    /// Wrap an existing shared handle.
    pub fn shared(handle: &SharedOptions) -> Self {
        OptionSource::Shared(Arc::clone(handle))
    }

    /// Create a new shared handle holding `options`.
    pub fn new_shared(options: OptionSet) -> SharedOptions {
        Arc::new(RwLock::new(options))
    }

    pub fn is_derived(&self) -> bool {
        matches!(self, OptionSource::Derived(_))
    }

    /// Current mapping for `Static`/`Shared` sources, `None` for `Derived`.
    pub fn snapshot(&self) -> Option<OptionSet> {
        match self {
            OptionSource::Static(options) => Some(options.clone()),
            OptionSource::Shared(handle) => Some(
                handle
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone(),
            ),
            OptionSource::Derived(_) => None,
        }
    }

    /// Mapping for this source in the context of an invocation: derived
    /// sources are evaluated against `invocation`.
    pub fn resolve(&self, invocation: &OptionSet) -> OptionSet {
        match self {
            OptionSource::Derived(derive) => derive(invocation),
            other => other.snapshot().unwrap_or_default(),
        }
    }
}

impl Default for OptionSource {
    fn default() -> Self {
        OptionSource::empty()
    }
}

impl fmt::Debug for OptionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionSource::Static(options) => f.debug_tuple("Static").field(options).finish(),
            OptionSource::Shared(handle) => f.debug_tuple("Shared").field(handle).finish(),
            OptionSource::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

impl From<OptionSet> for OptionSource {
    fn from(options: OptionSet) -> Self {
        OptionSource::Static(options)
    }
}

impl TryFrom<Value> for OptionSource {
    type Error = MailerError;

    /// Objects become static options, `null` becomes empty options.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(options) => Ok(OptionSource::Static(options)),
            Value::Null => Ok(OptionSource::empty()),
            other => Err(MailerError::InvalidDefinition(format!(
                "options must be a JSON object, got {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// How two option sets combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Top-level keys of later sources overwrite earlier ones.
    #[default]
    Shallow,
    /// Nested objects are merged key by key; anything else overwrites.
    Deep,
}

/// Overlay `source` onto `target`.
pub fn merge_into(target: &mut OptionSet, source: &OptionSet, strategy: MergeStrategy) {
    for (key, value) in source {
        if strategy == MergeStrategy::Deep {
            if let (Some(Value::Object(existing)), Value::Object(incoming)) =
                (target.get_mut(key), value)
            {
                merge_into(existing, incoming, strategy);
                continue;
            }
        }
        target.insert(key.clone(), value.clone());
    }
}

/// Merge sources left to right onto an empty set, skipping derived ones.
pub fn merge_sources<'a, I>(sources: I, strategy: MergeStrategy) -> OptionSet
where
    I: IntoIterator<Item = &'a OptionSource>,
{
    let mut merged = OptionSet::new();
    for source in sources {
        if let Some(options) = source.snapshot() {
            merge_into(&mut merged, &options, strategy);
        }
    }
    merged
}

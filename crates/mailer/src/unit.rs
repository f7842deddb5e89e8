//! `Unit` — the atomic executable step, and the chain that composes units.
//!
//! A unit pairs a body with its own options:
//! 1. `Action` bodies call a caller-supplied [`Action`].
//! 2. `Delegate` bodies forward to a named route, looked up at send time.
//! 3. `Chain` bodies run member units in order, stopping on cancellation.
//!
//! Units are immutable: `extend`, `named` and `with_merge` return copies.
//! Cloning is cheap because bodies are reference counted.

use std::fmt;
use std::sync::Arc;

use actions::{Action, ActionContext, Message, Outcome};
use tracing::{debug, trace};

use crate::options::{merge_into, merge_sources, MergeStrategy, OptionSet, OptionSource};
use crate::router::RouteRef;
use crate::MailerError;

// ---------------------------------------------------------------------------
// Body
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub(crate) enum Body {
    Action(Arc<dyn Action>),
    Delegate(RouteRef),
    Chain(Arc<Chain>),
}

pub(crate) struct Chain {
    members: Vec<Unit>,
    /// Index of the member that also receives the caller's options.
    /// Only router-built chains set this.
    first_action: Option<usize>,
}

// ---------------------------------------------------------------------------
// Unit
// ---------------------------------------------------------------------------

/// A named action plus its option set.
#[derive(Clone)]
pub struct Unit {
    body: Body,
    options: OptionSource,
    name: Option<String>,
    merge: MergeStrategy,
}

impl Unit {
    /// Build a unit around `action`.
    ///
    /// `sources` are merged left to right. A single source is stored as-is,
    /// which keeps `Shared` options shared and `Derived` options lazy.
    pub fn new<A, I>(action: A, sources: I) -> Self
    where
        A: Action + 'static,
        I: IntoIterator<Item = OptionSource>,
    {
        Self::from_action(Arc::new(action), sources)
    }

    /// Same as [`Unit::new`] for an action that is already shared.
    pub fn from_action<I>(action: Arc<dyn Action>, sources: I) -> Self
    where
        I: IntoIterator<Item = OptionSource>,
    {
        Self::with_body(Body::Action(action), store(sources, MergeStrategy::Shallow))
    }

    pub(crate) fn delegate(route: RouteRef, options: OptionSource) -> Self {
        Self::with_body(Body::Delegate(route), options)
    }

    pub(crate) fn chain(members: Vec<Unit>, first_action: Option<usize>) -> Self {
        Self::with_body(
            Body::Chain(Arc::new(Chain { members, first_action })),
            OptionSource::empty(),
        )
    }

    fn with_body(body: Body, options: OptionSource) -> Self {
        Self {
            body,
            options,
            name: None,
            merge: MergeStrategy::Shallow,
        }
    }

    // -----------------------------------------------------------------------
    // Builders
    // -----------------------------------------------------------------------

    /// A copy of this unit with its options extended by `sources`.
    ///
    /// The new options are a static snapshot: the current options (unless
    /// they are derived) overlaid with each non-derived source in turn.
    pub fn extend<I>(&self, sources: I) -> Unit
    where
        I: IntoIterator<Item = OptionSource>,
    {
        let mut options = self.options.snapshot().unwrap_or_default();
        for source in sources {
            if let Some(extra) = source.snapshot() {
                merge_into(&mut options, &extra, self.merge);
            }
        }

        Unit {
            body: self.body.clone(),
            options: OptionSource::Static(options),
            name: self.name.clone(),
            merge: self.merge,
        }
    }

    /// A copy of this unit carrying `name`.
    pub fn named(mut self, name: impl Into<String>) -> Unit {
        self.name = Some(name.into());
        self
    }

    /// A copy of this unit that merges options with `strategy`.
    pub fn with_merge(mut self, strategy: MergeStrategy) -> Unit {
        self.merge = strategy;
        self
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn options(&self) -> &OptionSource {
        &self.options
    }

    /// Current static view of the stored options (empty when derived).
    pub fn resolved_options(&self) -> OptionSet {
        self.options.snapshot().unwrap_or_default()
    }

    pub fn merge_strategy(&self) -> MergeStrategy {
        self.merge
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.body, Body::Chain(_))
    }

    /// Members of a composite, in execution order. Empty for other units.
    pub fn members(&self) -> &[Unit] {
        match &self.body {
            Body::Chain(chain) => &chain.members,
            _ => &[],
        }
    }

    /// The route a delegating unit forwards to.
    pub fn route_target(&self) -> Option<&str> {
        match &self.body {
            Body::Delegate(route) => Some(route.name()),
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // Sending
    // -----------------------------------------------------------------------

    /// Options an invocation with `extra` would see: `{}`, then the stored
    /// options, then each extra source. Derived sources are skipped.
    pub fn invocation_options(&self, extra: &[OptionSource]) -> OptionSet {
        merge_sources(std::iter::once(&self.options).chain(extra), self.merge)
    }

    /// Run this unit over `message`.
    ///
    /// The outcome is returned exactly as produced: a cancellation is never
    /// turned into a message, and action errors come back untouched.
    pub fn send(&self, message: Message, extra: &[OptionSource]) -> Result<Outcome, MailerError> {
        let options = self.invocation_options(extra);

        match &self.body {
            Body::Action(action) => {
                trace!(unit = self.label(), "calling action");
                let ctx = ActionContext::new(options, self.name.clone());
                Ok(action.call(message, &ctx)?)
            }
            Body::Delegate(route) => route.send(message, options),
            Body::Chain(chain) => chain.run(message, &options, self.label()),
        }
    }

    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Unit");
        s.field("name", &self.name);
        match &self.body {
            Body::Action(_) => s.field("body", &"action"),
            Body::Delegate(route) => s.field("route", &route.name()),
            Body::Chain(chain) => s.field("members", &chain.members),
        };
        s.field("options", &self.options).finish()
    }
}

impl Chain {
    fn run(&self, message: Message, options: &OptionSet, label: &str) -> Result<Outcome, MailerError> {
        let mut message = message;

        for (index, member) in self.members.iter().enumerate() {
            let outcome = if let OptionSource::Derived(derive) = member.options() {
                member.send(message, &[OptionSource::Static(derive(options))])?
            } else if self.first_action == Some(index) {
                member.send(message, &[OptionSource::Static(options.clone())])?
            } else {
                member.send(message, &[])?
            };

            match outcome {
                Outcome::Sent(next) => message = next,
                Outcome::Cancelled => {
                    debug!(unit = label, member = index, "chain cancelled");
                    return Ok(Outcome::Cancelled);
                }
            }
        }

        Ok(Outcome::Sent(message))
    }
}

/// Normalize constructor sources into the single stored source.
fn store<I>(sources: I, strategy: MergeStrategy) -> OptionSource
where
    I: IntoIterator<Item = OptionSource>,
{
    let mut sources: Vec<OptionSource> = sources.into_iter().collect();
    match sources.len() {
        0 => OptionSource::empty(),
        1 => sources.remove(0),
        _ => OptionSource::Static(merge_sources(&sources, strategy)),
    }
}

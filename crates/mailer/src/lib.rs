//! `mailer` crate — units, composition and named routing for mailer pipelines.
//!
//! A [`Unit`] pairs an [`actions::Action`] with options. Units combine into
//! chains with [`compose`], and a [`Router`] registers them under names that
//! other routes can reference before they exist.

pub mod compose;
pub mod config;
pub mod definition;
pub mod error;
pub mod global;
pub mod options;
pub mod router;
pub mod unit;

pub use compose::compose;
pub use config::RoutesFile;
pub use definition::Definition;
pub use error::{ConfigError, MailerError};
pub use options::{MergeStrategy, OptionSet, OptionSource, SharedOptions};
pub use router::Router;
pub use unit::Unit;

pub use actions::{Message, Outcome};

#[cfg(test)]
mod unit_tests;

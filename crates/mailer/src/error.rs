//! Mailer-level error types.

use std::path::PathBuf;

use actions::ActionError;
use thiserror::Error;

/// Errors produced while building or sending through units and routers.
#[derive(Debug, Error)]
pub enum MailerError {
    // ------ Construction errors ------

    /// A `route`/`compose` argument has a shape the engine cannot use.
    #[error("invalid definition: {0}")]
    InvalidDefinition(String),

    // ------ Dispatch errors ------

    /// No route with this name was registered at lookup time.
    #[error("route '{0}' is not registered")]
    RouteNotFound(String),

    /// A delegating unit outlived the router it points into.
    #[error("route '{0}' belongs to a router that has been dropped")]
    RouterDropped(String),

    /// The action itself failed. The inner error is exactly what the
    /// action returned.
    #[error(transparent)]
    Action(#[from] ActionError),
}

/// Errors produced while loading a declarative routes file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read routes file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid routes JSON.
    #[error("invalid routes file: {0}")]
    Parse(#[from] serde_json::Error),

    /// Two routes in one file share a name.
    #[error("duplicate route name: '{0}'")]
    DuplicateRoute(String),

    /// A route lists no steps.
    #[error("route '{0}' has no steps")]
    EmptyRoute(String),

    /// A step references a route that the file never defines.
    #[error("route '{route}' references unknown route '{target}'")]
    DanglingReference { route: String, target: String },

    /// Routes reference each other in a loop; sending would never end.
    #[error("routes reference each other in a cycle: {0:?}")]
    CycleDetected(Vec<String>),

    /// Registering a route with the router failed.
    #[error(transparent)]
    Definition(#[from] MailerError),
}

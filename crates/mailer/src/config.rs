//! Declarative routes files.
//!
//! A routes file is JSON describing named routes as lists of built-in
//! steps. It can be validated statically and turned into a [`Router`].
//!
//! Rules enforced by [`RoutesFile::validate`]:
//! 1. Route names must be unique within the file.
//! 2. Every route must have at least one step.
//! 3. Every `route` step must name a route defined in the file.
//! 4. Routes must not reference each other in a cycle.
//!
//! [`RoutesFile::into_router`] does not require validation: references are
//! resolved when a message is sent, as with any router.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::path::Path;
use std::str::FromStr;

use actions::builtin::{ApplyOptions, CancelWhen, RequireFields, SetFields};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::{ConfigError, Definition, OptionSet, OptionSource, Router};

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Top-level document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutesFile {
    pub routes: Vec<RouteSpec>,
}

/// One named route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSpec {
    pub name: String,
    pub steps: Vec<StepSpec>,
}

/// One step of a route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepSpec {
    /// Copy options onto the message.
    ApplyOptions {
        #[serde(default)]
        keys: Option<Vec<String>>,
        #[serde(default)]
        options: OptionSet,
    },
    /// Set fixed fields on the message.
    SetFields {
        fields: OptionSet,
        #[serde(default)]
        options: OptionSet,
    },
    /// Cancel when a field has a given value.
    CancelWhen {
        field: String,
        equals: Value,
        #[serde(default)]
        options: OptionSet,
    },
    /// Fail when fields are missing.
    RequireFields {
        fields: Vec<String>,
        #[serde(default)]
        options: OptionSet,
    },
    /// Delegate to another route.
    Route {
        name: String,
        #[serde(default)]
        options: OptionSet,
    },
}

impl StepSpec {
    fn definitions(&self) -> Vec<Definition> {
        let (action, options) = match self {
            StepSpec::ApplyOptions { keys, options } => (
                Definition::action(ApplyOptions { keys: keys.clone() }),
                options,
            ),
            StepSpec::SetFields { fields, options } => (
                Definition::action(SetFields {
                    fields: fields.clone(),
                }),
                options,
            ),
            StepSpec::CancelWhen {
                field,
                equals,
                options,
            } => (
                Definition::action(CancelWhen {
                    field: field.clone(),
                    equals: equals.clone(),
                }),
                options,
            ),
            StepSpec::RequireFields { fields, options } => (
                Definition::action(RequireFields {
                    fields: fields.clone(),
                }),
                options,
            ),
            StepSpec::Route { name, options } => {
                let definition = if options.is_empty() {
                    Definition::route(name.clone())
                } else {
                    Definition::routes([(name.clone(), OptionSource::Static(options.clone()))])
                };
                return vec![definition];
            }
        };

        if options.is_empty() {
            vec![action]
        } else {
            vec![action, Definition::Object(options.clone())]
        }
    }

    /// The route this step delegates to, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            StepSpec::Route { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl FromStr for RoutesFile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(serde_json::from_str(s)?)
    }
}

impl RoutesFile {
    /// Read and parse a routes file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        content.parse()
    }

    /// `(route, target)` pairs for every `route` step naming a route that
    /// the file does not define.
    pub fn dangling_references(&self) -> Vec<(String, String)> {
        let defined: HashSet<&str> = self.routes.iter().map(|r| r.name.as_str()).collect();
        let defined = &defined;
        self.routes
            .iter()
            .flat_map(move |route| {
                route
                    .steps
                    .iter()
                    .filter_map(StepSpec::target)
                    .filter(move |target| !defined.contains(target))
                    .map(move |target| (route.name.clone(), target.to_owned()))
            })
            .collect()
    }

    /// Validate the file and return route names in dependency order:
    /// every route comes after the routes it references.
    ///
    /// # Errors
    /// - [`ConfigError::DuplicateRoute`] if two routes share a name.
    /// - [`ConfigError::EmptyRoute`] if a route has no steps.
    /// - [`ConfigError::DanglingReference`] if a step names an unknown route.
    /// - [`ConfigError::CycleDetected`] if routes reference each other in a loop.
    pub fn validate(&self) -> Result<Vec<String>, ConfigError> {
        // -------------------------------------------------------------------
        // 1. Ensure route names are unique
        // -------------------------------------------------------------------
        let mut seen: HashSet<&str> = HashSet::new();
        for route in &self.routes {
            if !seen.insert(route.name.as_str()) {
                return Err(ConfigError::DuplicateRoute(route.name.clone()));
            }
        }

        // -------------------------------------------------------------------
        // 2. Reject routes with nothing to run
        // -------------------------------------------------------------------
        if let Some(route) = self.routes.iter().find(|r| r.steps.is_empty()) {
            return Err(ConfigError::EmptyRoute(route.name.clone()));
        }

        // -------------------------------------------------------------------
        // 3. Validate references
        // -------------------------------------------------------------------
        if let Some((route, target)) = self.dangling_references().into_iter().next() {
            return Err(ConfigError::DanglingReference { route, target });
        }

        // -------------------------------------------------------------------
        // 4. Topological sort (Kahn's algorithm), targets before referrers
        // -------------------------------------------------------------------
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();

        for route in &self.routes {
            dependents.entry(route.name.as_str()).or_default();
            let targets: BTreeSet<&str> = route.steps.iter().filter_map(StepSpec::target).collect();
            in_degree.insert(route.name.as_str(), targets.len());
            for target in targets {
                dependents.entry(target).or_default().push(route.name.as_str());
            }
        }

        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&name, _)| name)
            .collect();

        let mut order: Vec<String> = Vec::with_capacity(self.routes.len());

        while let Some(name) = queue.pop_front() {
            order.push(name.to_owned());
            if let Some(referrers) = dependents.get(name) {
                for &dependent in referrers {
                    if let Some(deg) = in_degree.get_mut(dependent) {
                        *deg -= 1;
                        if *deg == 0 {
                            queue.push_back(dependent);
                        }
                    }
                }
            }
        }

        if order.len() != self.routes.len() {
            let stuck = in_degree
                .into_iter()
                .filter(|(_, deg)| *deg > 0)
                .map(|(name, _)| name.to_owned())
                .collect();
            return Err(ConfigError::CycleDetected(stuck));
        }

        Ok(order)
    }

    /// Register every route on a fresh router.
    pub fn into_router(&self) -> Result<Router, ConfigError> {
        let router = Router::new();
        self.register(&router)?;
        Ok(router)
    }

    /// Register every route on `router`, in file order. Later routes with
    /// the same name overwrite earlier ones.
    pub fn register(&self, router: &Router) -> Result<(), ConfigError> {
        for route in &self.routes {
            let definitions = route.steps.iter().flat_map(StepSpec::definitions);
            router.route(route.name.clone(), definitions)?;
        }
        info!(routes = self.routes.len(), "routes file registered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Outcome;
    use serde_json::json;
    use std::io::Write;

    const WELCOME: &str = r#"{
        "routes": [
            { "name": "welcome", "steps": [
                { "type": "apply_options", "keys": ["subject"], "options": { "subject": "Welcome", "unused": 1 } },
                { "type": "route", "name": "stamp" },
                { "type": "cancel_when", "field": "unsubscribed", "equals": true }
            ] },
            { "name": "stamp", "steps": [
                { "type": "set_fields", "fields": { "from": "noreply@example.com" } }
            ] }
        ]
    }"#;

    #[test]
    fn welcome_file_validates_in_dependency_order() {
        let file: RoutesFile = WELCOME.parse().expect("valid routes file");
        assert_eq!(file.validate().unwrap(), vec!["stamp", "welcome"]);
    }

    #[test]
    fn loaded_router_sends_through_forward_reference() {
        let router = WELCOME.parse::<RoutesFile>().unwrap().into_router().unwrap();

        let out = router.send("welcome", json!({ "to": "a@example.com" }), &[]).unwrap();
        assert_eq!(
            out,
            Outcome::Sent(json!({
                "to": "a@example.com",
                "subject": "Welcome",
                "from": "noreply@example.com"
            }))
        );

        let out = router
            .send("welcome", json!({ "unsubscribed": true }), &[])
            .unwrap();
        assert!(out.is_cancelled());
    }

    #[test]
    fn dangling_reference_is_reported() {
        let file: RoutesFile = r#"{ "routes": [
            { "name": "a", "steps": [ { "type": "route", "name": "missing" } ] }
        ] }"#
            .parse()
            .unwrap();

        assert_eq!(
            file.dangling_references(),
            vec![("a".to_owned(), "missing".to_owned())]
        );
        assert!(matches!(
            file.validate(),
            Err(ConfigError::DanglingReference { .. })
        ));
    }

    #[test]
    fn duplicate_route_is_rejected() {
        let file: RoutesFile = r#"{ "routes": [
            { "name": "a", "steps": [ { "type": "apply_options" } ] },
            { "name": "a", "steps": [ { "type": "set_fields", "fields": { "x": 1 } } ] }
        ] }"#
            .parse()
            .unwrap();
        assert!(matches!(file.validate(), Err(ConfigError::DuplicateRoute(name)) if name == "a"));
    }

    #[test]
    fn reference_cycle_is_detected() {
        let file: RoutesFile = r#"{ "routes": [
            { "name": "a", "steps": [ { "type": "route", "name": "b" } ] },
            { "name": "b", "steps": [ { "type": "route", "name": "a" } ] }
        ] }"#
            .parse()
            .unwrap();
        match file.validate() {
            Err(ConfigError::CycleDetected(names)) => assert_eq!(names, vec!["a", "b"]),
            other => panic!("expected a cycle, got {other:?}"),
        }
    }

    #[test]
    fn empty_route_fails_validation() {
        let file: RoutesFile = r#"{ "routes": [
            { "name": "a", "steps": [ { "type": "route", "name": "b" } ] },
            { "name": "b", "steps": [] }
        ] }"#
            .parse()
            .unwrap();
        assert!(matches!(file.validate(), Err(ConfigError::EmptyRoute(name)) if name == "b"));
    }

    #[test]
    fn empty_route_fails_to_register() {
        let file: RoutesFile = r#"{ "routes": [ { "name": "a", "steps": [] } ] }"#.parse().unwrap();
        assert!(file.validate().is_err());
        assert!(matches!(file.into_router(), Err(ConfigError::Definition(_))));
    }

    #[test]
    fn route_step_options_reach_target() {
        let file: RoutesFile = r#"{ "routes": [
            { "name": "outer", "steps": [
                { "type": "route", "name": "inner", "options": { "domain": "example.com" } }
            ] },
            { "name": "inner", "steps": [ { "type": "apply_options" } ] }
        ] }"#
            .parse()
            .unwrap();
        let router = file.into_router().unwrap();
        let out = router.send("outer", json!({}), &[]).unwrap();
        assert_eq!(out, Outcome::Sent(json!({ "domain": "example.com" })));
    }

    #[test]
    fn loads_from_disk() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(WELCOME.as_bytes()).unwrap();

        let file = RoutesFile::from_path(tmp.path()).unwrap();
        assert_eq!(file.routes.len(), 2);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = RoutesFile::from_path("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = "{ not json".parse::<RoutesFile>().unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}

//! Unit construction, option merging and sending.

use std::sync::{Arc, Mutex};

use actions::mock::MockAction;
use actions::{from_fn, overlay, ActionError, Outcome};
use serde_json::{json, Value};

use crate::{MailerError, MergeStrategy, OptionSet, OptionSource, Unit};

fn set(value: Value) -> OptionSet {
    value.as_object().cloned().expect("fixture must be an object")
}

fn opts(value: Value) -> OptionSource {
    OptionSource::Static(set(value))
}

/// An action that overlays its options onto the message.
fn apply_options() -> impl actions::Action {
    from_fn(|mut message, ctx| {
        overlay(&mut message, &ctx.options)?;
        Ok(Outcome::Sent(message))
    })
}

// ============================================================
// Construction
// ============================================================

#[test]
fn accepts_an_action_and_options() {
    let unit = Unit::new(apply_options(), [opts(json!({ "option": "one" }))]);
    assert_eq!(unit.resolved_options(), set(json!({ "option": "one" })));
    assert!(!unit.is_composite());
    assert!(unit.name().is_none());
}

#[test]
fn later_constructor_sources_win() {
    let unit = Unit::new(
        apply_options(),
        [
            opts(json!({ "option": "one" })),
            opts(json!({ "option": "two", "other": "three" })),
        ],
    );
    assert_eq!(
        unit.resolved_options(),
        set(json!({ "option": "two", "other": "three" }))
    );
}

#[test]
fn shared_options_are_observed_live() {
    let handle = OptionSource::new_shared(set(json!({ "domain": "a.example" })));
    let unit = Unit::new(apply_options(), [OptionSource::shared(&handle)]);

    handle
        .write()
        .unwrap()
        .insert("domain".into(), json!("b.example"));

    let out = unit.send(json!({}), &[]).unwrap();
    assert_eq!(out, Outcome::Sent(json!({ "domain": "b.example" })));
}

// ============================================================
// Sending
// ============================================================

#[test]
fn calls_action_with_own_options() {
    let unit = Unit::new(apply_options(), [opts(json!({ "option": "one" }))]);
    let out = unit.send(json!({ "from": "one" }), &[]).unwrap();
    assert_eq!(out, Outcome::Sent(json!({ "from": "one", "option": "one" })));
}

#[test]
fn passes_additional_options_when_sending() {
    let unit = Unit::new(apply_options(), [opts(json!({ "option": "one" }))]);
    let out = unit
        .send(
            json!({ "from": "one" }),
            &[opts(json!({ "other": "two" })), opts(json!({ "last": "three" }))],
        )
        .unwrap();
    assert_eq!(
        out,
        Outcome::Sent(json!({
            "from": "one",
            "option": "one",
            "other": "two",
            "last": "three"
        }))
    );
}

#[test]
fn send_options_override_stored_options() {
    let mock = MockAction::passing("observer");
    let unit = Unit::new(mock.clone(), [opts(json!({ "a": 1 }))]);

    unit.send(json!({}), &[opts(json!({ "a": 2, "b": 3 }))]).unwrap();

    assert_eq!(mock.last_options().unwrap(), set(json!({ "a": 2, "b": 3 })));
}

#[test]
fn derived_send_sources_are_skipped() {
    let mock = MockAction::passing("observer");
    let unit = Unit::new(mock.clone(), [opts(json!({ "a": 1 }))]);

    unit.send(
        json!({}),
        &[
            OptionSource::derived(|_| set(json!({ "a": "derived" }))),
            opts(json!({ "b": 2 })),
        ],
    )
    .unwrap();

    assert_eq!(mock.last_options().unwrap(), set(json!({ "a": 1, "b": 2 })));
}

#[test]
fn derived_stored_options_are_not_merged_on_direct_send() {
    let mock = MockAction::passing("observer");
    let unit = Unit::new(
        mock.clone(),
        [OptionSource::derived(|_| set(json!({ "a": "derived" })))],
    );
    assert!(unit.options().is_derived());

    unit.send(json!({}), &[opts(json!({ "b": 2 }))]).unwrap();

    assert_eq!(mock.last_options().unwrap(), set(json!({ "b": 2 })));
}

#[test]
fn cancellation_is_returned_unchanged() {
    let cancel = MockAction::cancelling("cancel");
    let unit = Unit::new(cancel.clone(), []);

    let out = unit.send(json!({ "to": "a@example.com" }), &[]).unwrap();

    assert_eq!(out, Outcome::Cancelled);
    assert!(out.message().is_none());
    assert_eq!(cancel.call_count(), 1);
}

#[test]
fn empty_object_is_a_message_not_a_cancellation() {
    let unit = Unit::new(from_fn(|_, _| Ok(Outcome::Sent(json!({})))), []);
    assert_eq!(unit.send(json!({ "x": 1 }), &[]).unwrap(), Outcome::Sent(json!({})));
}

#[test]
fn action_errors_propagate_unmodified() {
    let unit = Unit::new(MockAction::failing("boom", "smtp refused"), []);

    match unit.send(json!({}), &[]) {
        Err(MailerError::Action(ActionError::Failed(msg))) => assert_eq!(msg, "smtp refused"),
        other => panic!("expected action failure, got {other:?}"),
    }
}

#[test]
fn action_sees_unit_name() {
    let seen = Arc::new(Mutex::new(None));
    let recorder = Arc::clone(&seen);
    let unit = Unit::new(
        from_fn(move |message, ctx| {
            *recorder.lock().unwrap() = ctx.name.clone();
            Ok(Outcome::Sent(message))
        }),
        [],
    )
    .named("welcome");

    unit.send(json!({}), &[]).unwrap();

    assert_eq!(seen.lock().unwrap().as_deref(), Some("welcome"));
    assert_eq!(unit.name(), Some("welcome"));
}

// ============================================================
// Extending
// ============================================================

#[test]
fn extend_returns_a_new_unit() {
    let mock = MockAction::passing("observer");
    let unit = Unit::new(mock.clone(), [opts(json!({ "option": "one" }))]);

    let extended = unit.extend([opts(json!({ "name": "x" }))]);

    assert_eq!(unit.resolved_options(), set(json!({ "option": "one" })));
    assert_eq!(
        extended.resolved_options(),
        set(json!({ "option": "one", "name": "x" }))
    );

    extended.send(json!({}), &[]).unwrap();
    assert_eq!(mock.call_count(), 1, "extended unit shares the action");
}

#[test]
fn extend_overrides_existing_keys() {
    let unit = Unit::new(apply_options(), [opts(json!({ "a": 1, "b": 1 }))]);
    let extended = unit.extend([opts(json!({ "b": 2 })), opts(json!({ "c": 3 }))]);
    assert_eq!(
        extended.resolved_options(),
        set(json!({ "a": 1, "b": 2, "c": 3 }))
    );
}

// ============================================================
// Merge strategy
// ============================================================

#[test]
fn nested_options_are_replaced_by_default() {
    let mock = MockAction::passing("observer");
    let unit = Unit::new(mock.clone(), [opts(json!({ "smtp": { "host": "a", "port": 25 } }))]);

    unit.send(json!({}), &[opts(json!({ "smtp": { "host": "b" } }))])
        .unwrap();

    assert_eq!(mock.last_options().unwrap(), set(json!({ "smtp": { "host": "b" } })));
}

#[test]
fn deep_merge_is_opt_in() {
    let mock = MockAction::passing("observer");
    let unit = Unit::new(mock.clone(), [opts(json!({ "smtp": { "host": "a", "port": 25 } }))])
        .with_merge(MergeStrategy::Deep);

    unit.send(json!({}), &[opts(json!({ "smtp": { "host": "b" } }))])
        .unwrap();

    assert_eq!(
        mock.last_options().unwrap(),
        set(json!({ "smtp": { "host": "b", "port": 25 } }))
    );
    assert_eq!(unit.merge_strategy(), MergeStrategy::Deep);
}

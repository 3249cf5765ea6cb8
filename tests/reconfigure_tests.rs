/// End-to-end reconfiguration scenarios
///
/// Documents go through the real build path (JSON -> problem model) and the
/// optimizing engine; assertions target the stability semantics of the
/// default preferences and the shape of the reply line.
use fmrec::engines::{EngineOptions, reconfigure};
use fmrec::output::{IdValue, Reply};
use fmrec::translate::ExprTranslator;
use fmrec::{FeatureEncoding, InputDocument, Problem, build_problem};

fn problem(text: &str, encoding: FeatureEncoding) -> Problem {
    let doc = InputDocument::from_json(text).unwrap();
    build_problem(&doc, encoding, &ExprTranslator, 1).unwrap()
}

fn run(text: &str) -> Reply {
    run_with(text, FeatureEncoding::Integer, &EngineOptions::default())
}

fn run_with(text: &str, encoding: FeatureEncoding, opts: &EngineOptions) -> Reply {
    reconfigure::run(&problem(text, encoding), opts).unwrap()
}

#[test]
fn test_stability_keeps_initial_features_only() {
    // either feature satisfies the model; stability keeps the initial one
    // and avoids adding the other
    let reply = run(r#"{
        "attributes": [],
        "contexts": [],
        "configuration": {"selectedFeatures": ["feature[A]"]},
        "constraints": ["feature[A] or feature[B]"],
        "preferences": []
    }"#);
    assert_eq!(reply, Reply::sat(vec!["A".to_string()], vec![]));
}

#[test]
fn test_caller_preference_outranks_default_objectives() {
    let reply = run(r#"{
        "attributes": [],
        "contexts": [],
        "configuration": {"selectedFeatures": ["feature[A]"]},
        "constraints": ["feature[A] or feature[B]"],
        "preferences": ["feature[B]"]
    }"#);
    assert_eq!(
        reply,
        Reply::sat(vec!["A".to_string(), "B".to_string()], vec![])
    );
}

#[test]
fn test_injected_preferences_outrank_parsed_ones() {
    // the parsed preference favors A, the injected one favors B; at most
    // one can be selected and the injected preference wins
    let reply = run(r#"{
        "attributes": [],
        "contexts": [],
        "configuration": {},
        "constraints": ["feature[A] + feature[B] <= 1"],
        "preferences": ["feature[A]"],
        "smt_preferences": ["feature[B]"]
    }"#);
    assert_eq!(reply, Reply::sat(vec!["B".to_string()], vec![]));
}

#[test]
fn test_attribute_values_follow_initials_and_parent_selection() {
    let reply = run(r#"{
        "attributes": [
            {"id": "attribute[cost]", "min": 0, "max": 10, "featureId": "feature[A]"},
            {"id": "attribute[load]", "min": 0, "max": 5, "featureId": "feature[B]"}
        ],
        "contexts": [],
        "configuration": {
            "selectedFeatures": ["feature[A]"],
            "attribute_values": [{"id": "attribute[cost]", "value": 3}]
        },
        "constraints": ["feature[A] = 1 and attribute[cost] >= 2"],
        "preferences": []
    }"#);
    // cost stays at its initial value, load is filtered out because its
    // parent is not selected
    assert_eq!(
        reply,
        Reply::sat(vec!["A".to_string()], vec![IdValue::new("cost", 3)])
    );
}

#[test]
fn test_attribute_magnitudes_are_minimized_without_initials() {
    let reply = run(r#"{
        "attributes": [
            {"id": "attribute[cost]", "min": 0, "max": 10, "featureId": "feature[A]"}
        ],
        "contexts": [],
        "configuration": {},
        "constraints": ["feature[A] = 1 and attribute[cost] >= 4"],
        "preferences": []
    }"#);
    assert_eq!(
        reply,
        Reply::sat(vec!["A".to_string()], vec![IdValue::new("cost", 4)])
    );
}

#[test]
fn test_context_pinning_makes_model_unsat() {
    // the context is pinned to 2 but features only range over 0..=1
    let reply = run(r#"{
        "attributes": [],
        "contexts": [{"id": "context[c]", "min": 0, "max": 5}],
        "configuration": {"context_values": [{"id": "context[c]", "value": 2}]},
        "constraints": ["feature[A] = context[c]"],
        "preferences": []
    }"#);
    assert_eq!(reply, Reply::unsat());
}

#[test]
fn test_boolean_encoding_selects_features() {
    let reply = run_with(
        r#"{
            "attributes": [],
            "contexts": [],
            "configuration": {},
            "constraints": ["feature[A] and feature[B]"],
            "preferences": []
        }"#,
        FeatureEncoding::Boolean,
        &EngineOptions::default(),
    );
    assert_eq!(
        reply,
        Reply::sat(vec!["A".to_string(), "B".to_string()], vec![])
    );
}

#[test]
fn test_suppressed_defaults_still_satisfy_constraints() {
    let opts = EngineOptions {
        no_default_preferences: true,
        ..EngineOptions::default()
    };
    let reply = run_with(
        r#"{
            "attributes": [],
            "contexts": [],
            "configuration": {"selectedFeatures": ["feature[A]"]},
            "constraints": ["feature[B] = 1"],
            "preferences": []
        }"#,
        FeatureEncoding::Integer,
        &opts,
    );
    match reply {
        Reply::Configuration {
            result, features, ..
        } => {
            assert_eq!(result, "sat");
            assert!(features.contains(&"B".to_string()));
        }
        other => panic!("expected a configuration, got {other:?}"),
    }
}

#[test]
fn test_timeout_option_still_produces_a_verdict() {
    // a generous timeout must not disturb a trivially solvable model
    let opts = EngineOptions {
        timeout_ms: 60_000,
        ..EngineOptions::default()
    };
    let reply = run_with(
        r#"{
            "attributes": [],
            "contexts": [],
            "configuration": {},
            "constraints": ["feature[A] = 1"],
            "preferences": []
        }"#,
        FeatureEncoding::Integer,
        &opts,
    );
    assert_eq!(reply, Reply::sat(vec!["A".to_string()], vec![]));
}

#[test]
fn test_contradiction_reports_unsat() {
    let reply = run(r#"{
        "attributes": [],
        "contexts": [],
        "configuration": {},
        "constraints": ["feature[A] = 0", "feature[A] = 1"],
        "preferences": []
    }"#);
    assert_eq!(reply, Reply::unsat());
}

/// End-to-end feature-analysis scenarios
///
/// Covers the schedule-free single instant, a real time context with
/// per-instant verdicts, the soundness of the sweep results against direct
/// checks, and idempotence across runs.
use std::collections::BTreeMap;

use fmrec::engines::{EngineOptions, analysis};
use fmrec::output::Reply;
use fmrec::translate::ExprTranslator;
use fmrec::{FeatureEncoding, InputDocument, Problem, build_problem};

fn problem(text: &str) -> Problem {
    problem_with(text, FeatureEncoding::Integer)
}

fn problem_with(text: &str, encoding: FeatureEncoding) -> Problem {
    let doc = InputDocument::from_json(text).unwrap();
    build_problem(&doc, encoding, &ExprTranslator, 1).unwrap()
}

fn run(p: &Problem) -> (BTreeMap<String, Vec<i64>>, BTreeMap<String, Vec<i64>>) {
    match analysis::run(p, &EngineOptions::default()).unwrap() {
        Reply::Analysis {
            dead_features,
            false_optionals,
        } => (dead_features, false_optionals),
        other => panic!("expected an analysis reply, got {other:?}"),
    }
}

const EXCLUSIVE_PAIR: &str = r#"{
    "attributes": [],
    "contexts": [],
    "configuration": {},
    "constraints": ["feature[A] + feature[B] <= 1 and feature[A] = 1"],
    "preferences": [],
    "optional_features": {"feature[A]": [], "feature[B]": []}
}"#;

#[test]
fn test_dead_and_forced_features_without_time_context() {
    // A is forced selected, which kills B through the exclusion
    let (dead, forced) = run(&problem(EXCLUSIVE_PAIR));
    assert_eq!(dead.len(), 1);
    assert_eq!(dead["B"], vec![0]);
    assert_eq!(forced.len(), 1);
    assert_eq!(forced["A"], vec![0]);
}

#[test]
fn test_analysis_is_idempotent() {
    let p = problem(EXCLUSIVE_PAIR);
    assert_eq!(run(&p), run(&p));
}

#[test]
fn test_time_indexed_verdicts() {
    // at instant 1 the model forbids A, forcing B through the disjunction;
    // at the other instants both stay optional
    let text = r#"{
        "attributes": [],
        "contexts": [{"id": "context[time]", "min": 0, "max": 2}],
        "configuration": {},
        "constraints": [
            "feature[A] or feature[B]",
            "context[time] = 1 impl feature[A] = 0"
        ],
        "preferences": [],
        "optional_features": {"feature[A]": [[0, 2]], "feature[B]": [[0, 2]]},
        "time_context": "context[time]"
    }"#;
    let (dead, forced) = run(&problem(text));
    assert_eq!(dead.len(), 1);
    assert_eq!(dead["A"], vec![1]);
    assert_eq!(forced.len(), 1);
    assert_eq!(forced["B"], vec![1]);
}

#[test]
fn test_schedule_restricts_the_checked_instants() {
    // A is dead everywhere but only scheduled at instants 0 and 2
    let text = r#"{
        "attributes": [],
        "contexts": [{"id": "context[time]", "min": 0, "max": 2}],
        "configuration": {},
        "constraints": ["feature[A] = 0", "feature[B] = 1"],
        "preferences": [],
        "optional_features": {"feature[A]": [[0, 0], [2, 2]]},
        "time_context": "context[time]"
    }"#;
    let (dead, forced) = run(&problem(text));
    assert_eq!(dead["A"], vec![0, 2]);
    // B is forced but never scheduled, so it is not reported
    assert!(forced.is_empty());
}

#[test]
fn test_unconstrained_optionals_are_neither_dead_nor_forced() {
    let text = r#"{
        "attributes": [],
        "contexts": [],
        "configuration": {},
        "constraints": ["feature[A] or feature[B]"],
        "preferences": [],
        "optional_features": {"feature[A]": [], "feature[B]": []}
    }"#;
    let (dead, forced) = run(&problem(text));
    assert!(dead.is_empty());
    assert!(forced.is_empty());
}

#[test]
fn test_boolean_encoding_analysis() {
    let text = r#"{
        "attributes": [],
        "contexts": [],
        "configuration": {},
        "constraints": ["feature[A] and not feature[B]"],
        "preferences": [],
        "optional_features": {"feature[A]": [], "feature[B]": []}
    }"#;
    let (dead, forced) = run(&problem_with(text, FeatureEncoding::Boolean));
    assert_eq!(dead["B"], vec![0]);
    assert_eq!(forced["A"], vec![0]);
}

#[test]
fn test_sweep_results_hold_under_direct_checks() {
    use z3::ast::{Ast, Int};
    use z3::{Config, Context, SatResult, Solver};

    let p = problem(EXCLUSIVE_PAIR);
    let (dead, forced) = run(&p);

    // rebuild the plain encoding and confirm each verdict by one direct
    // solver call
    let cfg = Config::new();
    let ctx = Context::new(&cfg);
    let check = |feature: &str, value: i64| {
        let solver = Solver::new(&ctx);
        for f in &p.features {
            let v = Int::new_const(&ctx, f.as_str());
            solver.assert(&Int::from_i64(&ctx, 0).le(&v));
            solver.assert(&v.le(&Int::from_i64(&ctx, 1)));
        }
        let a = Int::new_const(&ctx, "A");
        let b = Int::new_const(&ctx, "B");
        solver.assert(&(a.clone() + b.clone()).le(&Int::from_i64(&ctx, 1)));
        solver.assert(&a._eq(&Int::from_i64(&ctx, 1)));
        solver.assert(&Int::new_const(&ctx, feature)._eq(&Int::from_i64(&ctx, value)));
        solver.check()
    };

    for f in dead.keys() {
        assert_eq!(check(f, 1), SatResult::Unsat);
    }
    for f in forced.keys() {
        assert_eq!(check(f, 0), SatResult::Unsat);
    }
}

/// Reply schema and the single-line writer
///
/// Every run emits exactly one JSON line. The variants mirror the answer
/// shapes of the five modes; serialization is untagged, so each variant
/// carries its own `result` field where the schema requires one (the
/// feature-analysis reply is the one shape without it).
use std::collections::BTreeMap;
use std::io::Write;

use serde::Serialize;

use crate::error::Result;

/// An `{id, value}` pair of the output document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdValue {
    pub id: String,
    pub value: i64,
}

impl IdValue {
    pub fn new(id: impl Into<String>, value: i64) -> Self {
        Self {
            id: id.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    /// A satisfying configuration (reconfigure, explain-sat)
    Configuration {
        result: String,
        features: Vec<String>,
        attributes: Vec<IdValue>,
    },
    /// An unsat core mapped back to constraint source strings
    Core {
        result: String,
        constraints: Vec<String>,
    },
    /// A context tuple witnessing a defect (validate, interface C1)
    Witness {
        result: String,
        contexts: Vec<IdValue>,
    },
    /// An interface assignment with no extension into the full model
    Refutation {
        result: String,
        contexts: Vec<IdValue>,
        features: Vec<IdValue>,
        attributes: Vec<IdValue>,
    },
    /// Bare verdict: `unsat`, `valid`, or a `not_valid: <reason>` rejection
    Verdict { result: String },
    /// Dead / false-optional features per time instant
    Analysis {
        dead_features: BTreeMap<String, Vec<i64>>,
        false_optionals: BTreeMap<String, Vec<i64>>,
    },
}

impl Reply {
    pub fn sat(features: Vec<String>, attributes: Vec<IdValue>) -> Self {
        Reply::Configuration {
            result: "sat".to_string(),
            features,
            attributes,
        }
    }

    pub fn unsat() -> Self {
        Reply::Verdict {
            result: "unsat".to_string(),
        }
    }

    pub fn unsat_core(constraints: Vec<String>) -> Self {
        Reply::Core {
            result: "unsat".to_string(),
            constraints,
        }
    }

    pub fn valid() -> Self {
        Reply::Verdict {
            result: "valid".to_string(),
        }
    }

    pub fn not_valid(contexts: Vec<IdValue>) -> Self {
        Reply::Witness {
            result: "not_valid".to_string(),
            contexts,
        }
    }

    pub fn rejected(reason: impl std::fmt::Display) -> Self {
        Reply::Verdict {
            result: format!("not_valid: {reason}"),
        }
    }

    pub fn extensibility_problem(contexts: Vec<IdValue>) -> Self {
        Reply::Witness {
            result: "not_valid: context extensibility problem".to_string(),
            contexts,
        }
    }

    pub fn no_extension(
        contexts: Vec<IdValue>,
        features: Vec<IdValue>,
        attributes: Vec<IdValue>,
    ) -> Self {
        Reply::Refutation {
            result: "not_valid".to_string(),
            contexts,
            features,
            attributes,
        }
    }

    pub fn analysis(
        dead_features: BTreeMap<String, Vec<i64>>,
        false_optionals: BTreeMap<String, Vec<i64>>,
    ) -> Self {
        Reply::Analysis {
            dead_features,
            false_optionals,
        }
    }
}

/// Write the reply as one line; the run produces no other stdout output
pub fn write_reply(out: &mut dyn Write, reply: &Reply) -> Result<()> {
    serde_json::to_writer(&mut *out, reply)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_line(reply: &Reply) -> String {
        let mut buf = Vec::new();
        write_reply(&mut buf, reply).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_sat_reply_shape() {
        let line = to_line(&Reply::sat(
            vec!["a".to_string()],
            vec![IdValue::new("cost", 3)],
        ));
        assert_eq!(
            line,
            "{\"result\":\"sat\",\"features\":[\"a\"],\"attributes\":[{\"id\":\"cost\",\"value\":3}]}\n"
        );
    }

    #[test]
    fn test_verdict_replies() {
        assert_eq!(to_line(&Reply::unsat()), "{\"result\":\"unsat\"}\n");
        assert_eq!(to_line(&Reply::valid()), "{\"result\":\"valid\"}\n");
        assert_eq!(
            to_line(&Reply::rejected("context c does not match")),
            "{\"result\":\"not_valid: context c does not match\"}\n"
        );
    }

    #[test]
    fn test_analysis_reply_has_no_result_field() {
        let mut dead = BTreeMap::new();
        dead.insert("b".to_string(), vec![0]);
        let line = to_line(&Reply::analysis(dead, BTreeMap::new()));
        assert_eq!(
            line,
            "{\"dead_features\":{\"b\":[0]},\"false_optionals\":{}}\n"
        );
    }
}

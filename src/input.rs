/// Input and interface documents
///
/// Deserialization of the JSON documents and the build of the typed
/// [`Problem`] out of them. Identifiers arrive namespaced
/// (`feature[<name>]`, `attribute[<name>]`, `context[<name>]`); the build
/// strips the wrappers and enforces the model invariants: ranges are not
/// inverted, initial values lie inside their range, attribute parents are
/// features, and every identifier a constraint references is declared.
use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::model::{Attribute, Constraint, ContextVar, FeatureEncoding, Preference, Problem};
use crate::translate::{ConstraintTranslator, Scope, translate_all};

/// Attribute entry of the input document
#[derive(Debug, Clone, Deserialize)]
pub struct AttributeDoc {
    pub id: String,
    pub min: i64,
    pub max: i64,
    #[serde(rename = "featureId")]
    pub feature_id: String,
}

/// Context entry of the input document
#[derive(Debug, Clone, Deserialize)]
pub struct ContextDoc {
    pub id: String,
    pub min: i64,
    pub max: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdValueDoc {
    pub id: String,
    pub value: i64,
}

/// The initial configuration block
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigurationDoc {
    #[serde(default, rename = "selectedFeatures")]
    pub selected_features: Vec<String>,
    #[serde(default)]
    pub attribute_values: Vec<IdValueDoc>,
    #[serde(default)]
    pub context_values: Vec<IdValueDoc>,
}

/// Pre-encoded constraints injected next to the parsed ones
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SmtConstraintsDoc {
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub formulas: Vec<String>,
}

/// The main input document
#[derive(Debug, Clone, Deserialize)]
pub struct InputDocument {
    pub attributes: Vec<AttributeDoc>,
    pub contexts: Vec<ContextDoc>,
    pub configuration: ConfigurationDoc,
    pub constraints: Vec<String>,
    pub preferences: Vec<String>,
    #[serde(default)]
    pub context_constraints: Vec<String>,
    #[serde(default)]
    pub optional_features: BTreeMap<String, Vec<[i64; 2]>>,
    #[serde(default)]
    pub time_context: Option<String>,
    #[serde(default)]
    pub smt_constraints: Option<SmtConstraintsDoc>,
    #[serde(default)]
    pub smt_preferences: Vec<String>,
}

/// An abstract interface to check against the full model
#[derive(Debug, Clone, Deserialize)]
pub struct InterfaceDocument {
    pub attributes: Vec<AttributeDoc>,
    pub contexts: Vec<ContextDoc>,
    pub constraints: Vec<String>,
    #[serde(default)]
    pub context_constraints: Vec<String>,
}

impl InputDocument {
    /// Parse a document from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

impl InterfaceDocument {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Strip a `kind[name]` wrapper, rejecting anything else
pub fn strip_wrapper(kind: &str, raw: &str) -> Result<String> {
    let inner = raw
        .strip_prefix(kind)
        .and_then(|rest| rest.strip_prefix('['))
        .and_then(|rest| rest.strip_suffix(']'));
    match inner {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(Error::InputShape(format!(
            "malformed {kind} identifier `{raw}`"
        ))),
    }
}

/// Accept either a bare identifier or its `kind[name]` form
fn strip_wrapper_lenient(kind: &str, raw: &str) -> Result<String> {
    if raw.starts_with(kind) {
        strip_wrapper(kind, raw)
    } else if raw.is_empty() {
        Err(Error::InputShape(format!("empty {kind} identifier")))
    } else {
        Ok(raw.to_string())
    }
}

fn check_range(what: &str, id: &str, min: i64, max: i64) -> Result<()> {
    if min > max {
        return Err(Error::InputShape(format!(
            "{what} `{id}` has inverted range [{min},{max}]"
        )));
    }
    Ok(())
}

fn check_initial(what: &str, id: &str, min: i64, max: i64, initial: i64) -> Result<()> {
    if initial < min || initial > max {
        return Err(Error::InputShape(format!(
            "{what} `{id}` has initial value {initial} outside [{min},{max}]"
        )));
    }
    Ok(())
}

/// Build the typed problem out of the parsed document.
///
/// `workers` sizes the translation worker pool; the build itself is
/// sequential and the returned problem is immutable afterwards.
pub fn build_problem<T: ConstraintTranslator>(
    doc: &InputDocument,
    encoding: FeatureEncoding,
    translator: &T,
    workers: usize,
) -> Result<Problem> {
    let mut problem = Problem {
        encoding,
        ..Problem::default()
    };

    tracing::info!(
        attributes = doc.attributes.len(),
        contexts = doc.contexts.len(),
        constraints = doc.constraints.len(),
        "building problem model"
    );

    for a in &doc.attributes {
        let id = strip_wrapper("attribute", &a.id)?;
        let parent = strip_wrapper("feature", &a.feature_id)?;
        check_range("attribute", &id, a.min, a.max)?;
        let previous = problem.attributes.insert(
            id.clone(),
            Attribute {
                min: a.min,
                max: a.max,
                parent,
                initial: None,
            },
        );
        if previous.is_some() {
            return Err(Error::InputShape(format!("duplicate attribute `{id}`")));
        }
    }

    for c in &doc.contexts {
        let id = strip_wrapper("context", &c.id)?;
        check_range("context", &id, c.min, c.max)?;
        let previous = problem.contexts.insert(
            id.clone(),
            ContextVar {
                min: c.min,
                max: c.max,
                initial: None,
            },
        );
        if previous.is_some() {
            return Err(Error::InputShape(format!("duplicate context `{id}`")));
        }
    }

    // initial values only make sense against declared variables
    if !problem.attributes.is_empty() {
        for iv in &doc.configuration.attribute_values {
            let id = strip_wrapper("attribute", &iv.id)?;
            let attr = problem.attributes.get_mut(&id).ok_or_else(|| {
                Error::InputShape(format!("initial value for undeclared attribute `{id}`"))
            })?;
            check_initial("attribute", &id, attr.min, attr.max, iv.value)?;
            attr.initial = Some(iv.value);
        }
    }
    if !problem.contexts.is_empty() {
        for iv in &doc.configuration.context_values {
            let id = strip_wrapper("context", &iv.id)?;
            let ctx = problem.contexts.get_mut(&id).ok_or_else(|| {
                Error::InputShape(format!("initial value for undeclared context `{id}`"))
            })?;
            check_initial("context", &id, ctx.min, ctx.max, iv.value)?;
            ctx.initial = Some(iv.value);
        }
    }

    for f in &doc.configuration.selected_features {
        problem.initial_features.insert(strip_wrapper("feature", f)?);
    }

    let scope = Scope {
        attributes: problem.attributes.keys().cloned().collect(),
        contexts: problem.contexts.keys().cloned().collect(),
    };

    let translated = translate_all(translator, &doc.constraints, &scope, encoding, workers)?;
    for (t, source) in translated.into_iter().zip(doc.constraints.iter()) {
        problem.features.extend(t.features);
        problem.constraints.push(Constraint {
            formula: t.formula,
            source: source.clone(),
        });
    }

    // injected pre-encoded constraints join the list and the source map, so
    // explain cores can reference them by their own text
    if let Some(smt) = &doc.smt_constraints {
        for f in &smt.features {
            problem
                .features
                .insert(strip_wrapper_lenient("feature", f)?);
        }
        for formula in &smt.formulas {
            let t = translator.translate_constraint(formula, &scope, encoding)?;
            problem.features.extend(t.features);
            problem.constraints.push(Constraint {
                formula: t.formula,
                source: formula.clone(),
            });
        }
    }

    // injected preferences outrank the caller's list
    for p in &doc.smt_preferences {
        let formula = translator.translate_preference(p, &scope, encoding)?;
        problem.preferences.push(Preference {
            formula,
            source: p.clone(),
        });
    }
    for p in &doc.preferences {
        let formula = translator.translate_preference(p, &scope, encoding)?;
        problem.preferences.push(Preference {
            formula,
            source: p.clone(),
        });
    }

    for cc in &doc.context_constraints {
        let t = translator.translate_constraint(cc, &scope, encoding)?;
        if !t.features.is_empty() {
            return Err(Error::InputShape(format!(
                "context constraint `{cc}` references features"
            )));
        }
        problem.context_constraints.push(Constraint {
            formula: t.formula,
            source: cc.clone(),
        });
    }

    for (raw, intervals) in &doc.optional_features {
        let id = strip_wrapper_lenient("feature", raw)?;
        for [lo, hi] in intervals {
            if lo > hi {
                return Err(Error::InputShape(format!(
                    "optional feature `{id}` has inverted interval [{lo},{hi}]"
                )));
            }
        }
        problem.features.insert(id.clone());
        problem
            .optional_features
            .insert(id, intervals.iter().map(|[lo, hi]| (*lo, *hi)).collect());
    }

    if let Some(tc) = &doc.time_context {
        let id = strip_wrapper_lenient("context", tc)?;
        if !problem.contexts.contains_key(&id) {
            return Err(Error::InputShape(format!(
                "time context `{id}` is not a declared context"
            )));
        }
        problem.time_context = Some(id);
    }

    // attribute parents and initially selected features are part of the
    // feature universe even when no constraint mentions them; their
    // variables need domain bounds like any other
    let parents: Vec<String> = problem
        .attributes
        .values()
        .map(|a| a.parent.clone())
        .collect();
    problem.features.extend(parents);
    problem
        .features
        .extend(problem.initial_features.iter().cloned());

    Ok(problem)
}

/// Interface-check engine
///
/// Verifies that an abstract interface soundly refines the full model.
/// Cheap document-shape checks run first and fast-fail with a
/// `not_valid: <reason>` verdict. Then two solver stages: (C1) every
/// context tuple admitted by the interface must be admitted by the model,
/// and (C2) every interface assignment must extend to a full satisfying
/// assignment, encoded with a universal quantification over the
/// non-interface variables. The check requires the integer feature
/// encoding.
use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};
use z3::ast::{Ast, Bool, Int, forall_const};
use z3::{Config, Context, Solver};

use crate::encode::Encoder;
use crate::engines::{EngineOptions, decide};
use crate::error::{Error, Result};
use crate::input::{InterfaceDocument, strip_wrapper};
use crate::model::{Attribute, ContextVar, FeatureEncoding, Problem};
use crate::output::{IdValue, Reply};
use crate::translate::{ConstraintTranslator, Expr, Scope};

pub fn run<T: ConstraintTranslator>(
    problem: &Problem,
    doc: &InterfaceDocument,
    translator: &T,
    _opts: &EngineOptions,
) -> Result<Reply> {
    if problem.encoding == FeatureEncoding::Boolean {
        return Err(Error::ModeConflict(
            "the interface check requires integer-encoded features".to_string(),
        ));
    }

    info!("checking interface attributes against the model");
    let mut iface_attributes: BTreeMap<String, Attribute> = BTreeMap::new();
    for a in &doc.attributes {
        let id = strip_wrapper("attribute", &a.id)?;
        let parent = strip_wrapper("feature", &a.feature_id)?;
        let inside = problem
            .attributes
            .get(&id)
            .is_some_and(|m| a.min >= m.min && a.max <= m.max);
        if !inside {
            return Ok(Reply::rejected(format!("attribute {id} does not match")));
        }
        iface_attributes.insert(
            id,
            Attribute {
                min: a.min,
                max: a.max,
                parent,
                initial: None,
            },
        );
    }

    info!("checking interface contexts against the model");
    let mut iface_contexts: BTreeMap<String, ContextVar> = BTreeMap::new();
    for c in &doc.contexts {
        let id = strip_wrapper("context", &c.id)?;
        // an interface context must be a proper subrange: an endpoint equal
        // to the model's is rejected
        let narrows = problem
            .contexts
            .get(&id)
            .is_some_and(|m| m.min != c.min && m.max != c.max);
        if !narrows {
            return Ok(Reply::rejected(format!("context {id} does not match")));
        }
        iface_contexts.insert(
            id,
            ContextVar {
                min: c.min,
                max: c.max,
                initial: None,
            },
        );
    }

    let scope = Scope {
        attributes: iface_attributes.keys().cloned().collect(),
        contexts: iface_contexts.keys().cloned().collect(),
    };

    info!(count = doc.constraints.len(), "translating interface constraints");
    let mut iface_features: BTreeSet<String> = BTreeSet::new();
    let mut iface_constraints: Vec<Expr> = Vec::new();
    for source in &doc.constraints {
        let t = translator.translate_constraint(source, &scope, problem.encoding)?;
        iface_features.extend(t.features);
        iface_constraints.push(t.formula);
    }

    let mut iface_context_constraints: Vec<Expr> = Vec::new();
    for source in &doc.context_constraints {
        let t = translator.translate_constraint(source, &scope, problem.encoding)?;
        iface_context_constraints.push(t.formula);
    }

    let cfg = Config::new();
    let ctx = Context::new(&cfg);
    let enc = Encoder::new(&ctx, problem.encoding);

    info!("stage one: context extensibility");
    if let Some(witness) =
        context_extensibility_witness(problem, &enc, &iface_context_constraints)?
    {
        return Ok(Reply::extensibility_problem(witness));
    }

    info!("stage two: refinement of the full model");
    refinement_check(
        problem,
        &enc,
        &iface_features,
        &iface_attributes,
        &iface_contexts,
        &iface_constraints,
        &iface_context_constraints,
    )
}

/// C1: a context admitted by the interface constraints but rejected by the
/// model's is a witness against the interface
fn context_extensibility_witness<'ctx>(
    problem: &Problem,
    enc: &Encoder<'ctx>,
    iface_context_constraints: &[Expr],
) -> Result<Option<Vec<IdValue>>> {
    let ctx = enc.ctx();
    let solver = Solver::new(ctx);
    enc.assert_all(&solver, &enc.context_domain(problem.contexts.iter()));
    for formula in iface_context_constraints {
        let f = enc
            .lower_bool(formula)
            .map_err(|m| Error::Translate {
                constraint: "interface context constraint".to_string(),
                message: m,
            })?;
        solver.assert(&f);
    }
    let mut model_ccs = Bool::from_bool(ctx, true);
    for cc in &problem.context_constraints {
        model_ccs &= enc
            .lower_bool(&cc.formula)
            .map_err(|m| Error::translate(&cc.source, m))?;
    }
    solver.assert(&model_ccs.not());

    if decide(solver.check(), "checking context extensibility")? {
        let model = solver
            .get_model()
            .ok_or_else(|| Error::Solver("reading the extensibility witness".to_string()))?;
        let contexts = problem
            .contexts
            .keys()
            .filter_map(|id| enc.model_int(&model, id).map(|v| IdValue::new(id, v)))
            .collect();
        Ok(Some(contexts))
    } else {
        Ok(None)
    }
}

/// C2: every interface assignment must have an extension over the
/// non-interface features and attributes satisfying all model constraints
#[allow(clippy::too_many_arguments)]
fn refinement_check<'ctx>(
    problem: &Problem,
    enc: &Encoder<'ctx>,
    iface_features: &BTreeSet<String>,
    iface_attributes: &BTreeMap<String, Attribute>,
    iface_contexts: &BTreeMap<String, ContextVar>,
    iface_constraints: &[Expr],
    iface_context_constraints: &[Expr],
) -> Result<Reply> {
    let ctx = enc.ctx();
    let solver = Solver::new(ctx);

    debug!("asserting the interface side");
    enc.assert_all(&solver, &enc.feature_domain(iface_features.iter()));
    enc.assert_all(&solver, &enc.attribute_domain(iface_attributes.iter()));
    enc.assert_all(&solver, &enc.context_domain(iface_contexts.iter()));
    for formula in iface_context_constraints {
        let f = enc.lower_bool(formula).map_err(|m| Error::Translate {
            constraint: "interface context constraint".to_string(),
            message: m,
        })?;
        solver.assert(&f);
    }
    for cc in &problem.context_constraints {
        let f = enc
            .lower_bool(&cc.formula)
            .map_err(|m| Error::translate(&cc.source, m))?;
        solver.assert(&f);
    }
    for formula in iface_constraints {
        let f = enc.lower_bool(formula).map_err(|m| Error::Translate {
            constraint: "interface constraint".to_string(),
            message: m,
        })?;
        solver.assert(&f);
    }
    // model contexts the interface does not narrow keep their full range
    let outer_contexts: Vec<_> = problem
        .contexts
        .iter()
        .filter(|(id, _)| !iface_contexts.contains_key(*id))
        .collect();
    enc.assert_all(&solver, &enc.context_domain(outer_contexts));

    debug!("building the quantified model side");
    let outer_features: Vec<&String> = problem
        .features
        .iter()
        .filter(|f| !iface_features.contains(*f))
        .collect();
    let outer_attributes: Vec<(&String, &Attribute)> = problem
        .attributes
        .iter()
        .filter(|(id, _)| !iface_attributes.contains_key(*id))
        .collect();

    let mut psi = enc.feature_domain(outer_features.iter().copied());
    psi.extend(enc.attribute_domain(outer_attributes.iter().copied()));
    for c in &problem.constraints {
        psi.push(
            enc.lower_bool(&c.formula)
                .map_err(|m| Error::translate(&c.source, m))?,
        );
    }
    let mut body = Bool::from_bool(ctx, true);
    for f in psi {
        body &= f;
    }
    let body = body.not();

    let bound_vars: Vec<Int> = outer_features
        .iter()
        .map(|f| enc.int_var(f))
        .chain(outer_attributes.iter().map(|(id, _)| enc.int_var(id)))
        .collect();
    let bounds: Vec<&dyn Ast> = bound_vars.iter().map(|v| v as &dyn Ast).collect();
    if bounds.is_empty() {
        solver.assert(&body);
    } else {
        solver.assert(&forall_const(ctx, &bounds, &[], &body));
    }

    if decide(solver.check(), "checking the refinement")? {
        let model = solver
            .get_model()
            .ok_or_else(|| Error::Solver("reading the refinement witness".to_string()))?;
        let contexts = problem
            .contexts
            .keys()
            .filter_map(|id| enc.model_int(&model, id).map(|v| IdValue::new(id, v)))
            .collect();
        let features = iface_features
            .iter()
            .filter_map(|id| enc.model_feature_value(&model, id).map(|v| IdValue::new(id, v)))
            .collect();
        let attributes = iface_attributes
            .keys()
            .filter_map(|id| enc.model_int(&model, id).map(|v| IdValue::new(id, v)))
            .collect();
        Ok(Reply::no_extension(contexts, features, attributes))
    } else {
        Ok(Reply::valid())
    }
}

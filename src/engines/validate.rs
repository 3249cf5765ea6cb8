/// Validation engine
///
/// Decides whether some admissible context voids the model. Two
/// interchangeable algorithms: a universally quantified encoding that
/// leaves the work to the solver's quantifier machinery, and a grid search
/// that enumerates the cartesian product of the context ranges and checks
/// each tuple on an incremental solver. Both return the same verdict; the
/// witness tuples may differ.
use itertools::Itertools;
use tracing::{debug, info};
use z3::ast::{Ast, Bool, Int, forall_const};
use z3::{Config, Context, Params, Solver};

use crate::encode::Encoder;
use crate::engines::{EngineOptions, Frame, decide};
use crate::error::{Error, Result};
use crate::model::{FeatureEncoding, Problem};
use crate::output::{IdValue, Reply};

/// Quantified validation: assert the context space, then
/// `forall (features, attributes). not Phi`; a model is a void context
pub fn run(problem: &Problem, _opts: &EngineOptions) -> Result<Reply> {
    let cfg = Config::new();
    let ctx = Context::new(&cfg);
    let enc = Encoder::new(&ctx, problem.encoding);
    let solver = Solver::new(&ctx);

    info!("asserting context ranges and context constraints");
    enc.assert_all(&solver, &enc.context_domain(problem.contexts.iter()));
    for cc in &problem.context_constraints {
        let formula = enc
            .lower_bool(&cc.formula)
            .map_err(|m| Error::translate(&cc.source, m))?;
        solver.assert(&formula);
    }

    info!("building the negated model formula");
    let mut phi = enc.feature_domain(problem.features.iter());
    phi.extend(enc.attribute_domain(problem.attributes.iter()));
    for c in &problem.constraints {
        phi.push(
            enc.lower_bool(&c.formula)
                .map_err(|m| Error::translate(&c.source, m))?,
        );
    }
    let mut body = Bool::from_bool(&ctx, true);
    for f in phi {
        body &= f;
    }
    let body = body.not();

    let int_bounds: Vec<Int> = match problem.encoding {
        FeatureEncoding::Integer => problem
            .features
            .iter()
            .map(|f| enc.int_var(f))
            .chain(problem.attributes.keys().map(|a| enc.int_var(a)))
            .collect(),
        FeatureEncoding::Boolean => problem.attributes.keys().map(|a| enc.int_var(a)).collect(),
    };
    let bool_bounds: Vec<Bool> = match problem.encoding {
        FeatureEncoding::Boolean => problem.features.iter().map(|f| enc.bool_var(f)).collect(),
        FeatureEncoding::Integer => Vec::new(),
    };
    let bounds: Vec<&dyn Ast> = int_bounds
        .iter()
        .map(|v| v as &dyn Ast)
        .chain(bool_bounds.iter().map(|v| v as &dyn Ast))
        .collect();

    if bounds.is_empty() {
        // nothing to quantify over: the model formula is context-only
        solver.assert(&body);
    } else {
        solver.assert(&forall_const(&ctx, &bounds, &[], &body));
    }

    info!("checking for a void context");
    if decide(solver.check(), "validating the model")? {
        let model = solver
            .get_model()
            .ok_or_else(|| Error::Solver("reading the void-context witness".to_string()))?;
        let contexts = problem
            .contexts
            .keys()
            .filter_map(|id| enc.model_int(&model, id).map(|v| IdValue::new(id, v)))
            .collect();
        Ok(Reply::not_valid(contexts))
    } else {
        Ok(Reply::valid())
    }
}

/// Grid-search validation: try every context tuple on an incremental
/// solver; an unsat tuple that also satisfies the context constraints is a
/// void-context witness
pub fn run_grid(problem: &Problem, opts: &EngineOptions) -> Result<Reply> {
    let cfg = Config::new();
    let ctx = Context::new(&cfg);
    let enc = Encoder::new(&ctx, problem.encoding);
    let solver = Solver::new(&ctx);

    if opts.non_incremental_solver {
        info!("capping the incremental sub-solver");
        let mut params = Params::new(&ctx);
        params.set_u32("combined_solver.solver2_timeout", 1);
        solver.set_params(&params);
    }

    let names: Vec<&String> = problem.contexts.keys().collect();
    let combinations: i64 = names.iter().fold(1i64, |acc, id| {
        acc.saturating_mul(problem.contexts[*id].max - problem.contexts[*id].min + 1)
    });
    info!(combinations, "context tuples to try");

    info!("declaring variables and asserting constraints");
    enc.assert_all(&solver, &enc.feature_domain(problem.features.iter()));
    enc.assert_all(&solver, &enc.attribute_domain(problem.attributes.iter()));
    enc.assert_all(&solver, &enc.context_domain(problem.contexts.iter()));
    for c in &problem.constraints {
        let formula = enc
            .lower_bool(&c.formula)
            .map_err(|m| Error::translate(&c.source, m))?;
        solver.assert(&formula);
    }

    if !opts.non_incremental_solver {
        debug!("preliminary check");
        let _ = solver.check();
    }

    let tuples: Box<dyn Iterator<Item = Vec<i64>>> = if names.is_empty() {
        Box::new(std::iter::once(Vec::new()))
    } else {
        Box::new(
            names
                .iter()
                .map(|id| problem.contexts[*id].min..=problem.contexts[*id].max)
                .multi_cartesian_product(),
        )
    };

    for tuple in tuples {
        debug!(?tuple, "exploring context tuple");
        let _frame = Frame::push(&solver);
        for (id, value) in names.iter().zip(tuple.iter()) {
            solver.assert(&enc.int_var(id)._eq(&Int::from_i64(&ctx, *value)));
        }
        if !decide(solver.check(), "checking a context tuple")? {
            if !problem.context_constraints.is_empty()
                && !tuple_is_admissible(problem, &names, &tuple)?
            {
                debug!("tuple violates the context constraints, skipping");
                continue;
            }
            let contexts = names
                .iter()
                .zip(tuple.iter())
                .map(|(id, value)| IdValue::new(*id, *value))
                .collect();
            return Ok(Reply::not_valid(contexts));
        }
    }
    Ok(Reply::valid())
}

/// Cross-check an unsat tuple against the context constraints on an
/// independent solver
fn tuple_is_admissible(problem: &Problem, names: &[&String], tuple: &[i64]) -> Result<bool> {
    let cfg = Config::new();
    let ctx = Context::new(&cfg);
    let enc = Encoder::new(&ctx, problem.encoding);
    let solver = Solver::new(&ctx);
    for (id, value) in names.iter().zip(tuple.iter()) {
        solver.assert(&enc.int_var(id)._eq(&Int::from_i64(&ctx, *value)));
    }
    for cc in &problem.context_constraints {
        let formula = enc
            .lower_bool(&cc.formula)
            .map_err(|m| Error::translate(&cc.source, m))?;
        solver.assert(&formula);
    }
    decide(solver.check(), "cross-checking the context constraints")
}

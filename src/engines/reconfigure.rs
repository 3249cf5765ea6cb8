/// Reconfiguration engine
///
/// Builds one optimizing solver over the whole model, pins the contexts to
/// their initial values, installs the caller's preferences as lexicographic
/// objectives and, unless suppressed, the stability objectives that keep
/// the result close to the initial configuration. A timeout or resource
/// limit is reported as `unsat`: either way no configuration was produced.
use tracing::{debug, info};
use z3::ast::{Ast, Int};
use z3::{Config, Context, Model, Optimize, SatResult};

use crate::encode::Encoder;
use crate::engines::EngineOptions;
use crate::error::{Error, Result};
use crate::model::Problem;
use crate::output::{IdValue, Reply};

pub fn run(problem: &Problem, opts: &EngineOptions) -> Result<Reply> {
    let mut cfg = Config::new();
    if opts.timeout_ms > 0 {
        cfg.set_param_value("timeout", &opts.timeout_ms.to_string());
    }
    let ctx = Context::new(&cfg);
    let enc = Encoder::new(&ctx, problem.encoding);
    let solver = Optimize::new(&ctx);

    info!("declaring variables");
    enc.assert_all(&solver, &enc.feature_domain(problem.features.iter()));
    enc.assert_all(&solver, &enc.attribute_domain(problem.attributes.iter()));
    enc.assert_all(&solver, &enc.context_domain(problem.contexts.iter()));

    info!("pinning contexts to their initial values");
    let pins = enc
        .context_pins(&problem.contexts)
        .map_err(Error::InputShape)?;
    enc.assert_all(&solver, &pins);

    info!(count = problem.constraints.len(), "asserting constraints");
    for c in &problem.constraints {
        let formula = enc
            .lower_bool(&c.formula)
            .map_err(|m| Error::translate(&c.source, m))?;
        solver.assert(&formula);
    }

    info!(count = problem.preferences.len(), "installing preferences");
    for p in &problem.preferences {
        let objective = enc
            .lower_int(&p.formula)
            .map_err(|m| Error::translate(&p.source, m))?;
        solver.maximize(&objective);
    }

    if opts.no_default_preferences {
        info!("default preferences suppressed");
    } else {
        install_default_preferences(problem, &enc, &solver);
    }

    info!("computing reconfiguration");
    match solver.check(&[]) {
        SatResult::Sat => {
            let model = solver
                .get_model()
                .ok_or_else(|| Error::Solver("reading the reconfiguration model".to_string()))?;
            Ok(configuration_reply(problem, &enc, &model))
        }
        SatResult::Unsat => Ok(Reply::unsat()),
        SatResult::Unknown => {
            // no configuration was produced in time, which the caller
            // cannot distinguish from infeasibility
            debug!("solver gave no verdict, reporting unsat");
            Ok(Reply::unsat())
        }
    }
}

/// The four stability objectives, ranked below every caller preference:
/// keep initially selected features, keep attribute initials, avoid adding
/// features outside the initial set, and keep attribute magnitudes low
fn install_default_preferences<'ctx>(
    problem: &Problem,
    enc: &Encoder<'ctx>,
    solver: &Optimize<'ctx>,
) {
    let ctx = enc.ctx();

    if !problem.initial_features.is_empty() {
        debug!("objective: keep initial features selected");
        solver.maximize(&enc.feature_count(problem.initial_features.iter()));
    }

    let mut retained = Int::from_i64(ctx, 0);
    let mut any_initial_attribute = false;
    for (id, _, initial) in problem.attributes_with_initial() {
        any_initial_attribute = true;
        retained += enc
            .int_var(id)
            ._eq(&Int::from_i64(ctx, initial))
            .ite(&Int::from_i64(ctx, 1), &Int::from_i64(ctx, 0));
    }
    if any_initial_attribute {
        debug!("objective: keep attributes at their initial values");
        solver.maximize(&retained);
    }

    if problem.non_initial_features().next().is_some() {
        debug!("objective: avoid adding non-initial features");
        solver.minimize(&enc.feature_count(problem.non_initial_features()));
    }

    // lowest priority, one objective per attribute
    for id in problem.attributes.keys() {
        solver.minimize(&enc.int_var(id));
    }
}

/// Selected features plus the values of attributes whose parent made it
/// into the selection; shared with the explain engine's sat answer
pub(crate) fn configuration_reply<'ctx>(
    problem: &Problem,
    enc: &Encoder<'ctx>,
    model: &Model<'ctx>,
) -> Reply {
    let features: Vec<String> = problem
        .features
        .iter()
        .filter(|f| enc.model_selected(model, f) == Some(true))
        .cloned()
        .collect();
    let attributes: Vec<IdValue> = problem
        .attributes
        .iter()
        .filter(|(_, attr)| features.binary_search(&attr.parent).is_ok())
        .filter_map(|(id, _)| enc.model_int(model, id).map(|v| IdValue::new(id, v)))
        .collect();
    Reply::sat(features, attributes)
}

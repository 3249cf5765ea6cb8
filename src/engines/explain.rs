/// Explanation engine
///
/// Same encoding as the reconfiguration but on a plain solver with
/// unsat-core tracking: every constraint is asserted under a fresh tag
/// indexed by its position, so an unsat core maps straight back to the
/// original source strings. Core minimization is the solver's own option
/// and stays best-effort.
use std::collections::HashMap;

use tracing::{debug, info};
use z3::ast::Bool;
use z3::{Config, Context, Params, Solver};

use crate::encode::Encoder;
use crate::engines::{EngineOptions, decide};
use crate::engines::reconfigure::configuration_reply;
use crate::error::{Error, Result};
use crate::model::Problem;
use crate::output::Reply;

pub fn run(problem: &Problem, opts: &EngineOptions) -> Result<Reply> {
    let mut cfg = Config::new();
    cfg.set_bool_param_value("unsat_core", true);
    let ctx = Context::new(&cfg);
    let enc = Encoder::new(&ctx, problem.encoding);
    let solver = Solver::new(&ctx);

    if opts.minimize_core {
        info!("enabling core minimization");
        let mut params = Params::new(&ctx);
        params.set_bool("core.minimize", true);
        solver.set_params(&params);
    }

    info!("declaring variables");
    enc.assert_all(&solver, &enc.feature_domain(problem.features.iter()));
    enc.assert_all(&solver, &enc.attribute_domain(problem.attributes.iter()));
    enc.assert_all(&solver, &enc.context_domain(problem.contexts.iter()));

    info!("pinning contexts to their initial values");
    let pins = enc
        .context_pins(&problem.contexts)
        .map_err(Error::InputShape)?;
    enc.assert_all(&solver, &pins);

    info!(count = problem.constraints.len(), "tracking constraints");
    let mut tags: HashMap<String, usize> = HashMap::new();
    for (index, c) in problem.constraints.iter().enumerate() {
        let formula = enc
            .lower_bool(&c.formula)
            .map_err(|m| Error::translate(&c.source, m))?;
        let tag_name = format!("aux{index}");
        let tag = Bool::new_const(&ctx, tag_name.as_str());
        solver.assert_and_track(&formula, &tag);
        tags.insert(tag_name, index);
    }

    info!("checking the model under the initial contexts");
    if decide(solver.check(), "explaining the model")? {
        let model = solver
            .get_model()
            .ok_or_else(|| Error::Solver("reading the satisfying model".to_string()))?;
        Ok(configuration_reply(problem, &enc, &model))
    } else {
        let core = solver.get_unsat_core();
        debug!(size = core.len(), "unsat core extracted");
        let mut indices: Vec<usize> = core
            .iter()
            .filter_map(|tag| tags.get(&tag.to_string()).copied())
            .collect();
        indices.sort_unstable();
        let sources = indices
            .into_iter()
            .map(|i| problem.constraints[i].source.clone())
            .collect();
        Ok(Reply::unsat_core(sources))
    }
}

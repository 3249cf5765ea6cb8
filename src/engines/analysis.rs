/// Feature-analysis engine
///
/// Computes, per scheduled time instant, the features that can never be
/// selected (dead) and the optional features that are forced selected
/// (false optional). One incremental solver carries the model; each time
/// instant gets a frame pinning the time context, each candidate check a
/// nested frame. Every satisfying model prunes all candidates it decides,
/// which is what keeps the sweep near the size of the answer instead of
/// the size of the schedule.
use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};
use uuid::Uuid;
use z3::ast::{Ast, Int};
use z3::{Config, Context, Params, SatResult, Solver};

use crate::encode::Encoder;
use crate::engines::{EngineOptions, Frame};
use crate::error::{Error, Result};
use crate::model::{Interval, Problem};
use crate::output::Reply;

pub fn run(problem: &Problem, opts: &EngineOptions) -> Result<Reply> {
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

    // without a declared time context the analysis runs at a single
    // synthetic instant on a fresh variable no constraint mentions
    let mut schedule = problem.optional_features.clone();
    let time_context = match &problem.time_context {
        Some(id) => id.clone(),
        None => {
            for intervals in schedule.values_mut() {
                intervals.push((0, 0));
            }
            format!("_time_{}", Uuid::new_v4().simple())
        }
    };

    if !opts.non_incremental_solver {
        debug!("preliminary check");
        let _ = solver.check();
    }

    let mut work = work_maps(&schedule);
    info!(
        candidates = schedule.len(),
        instants = work.len(),
        "sweeping for dead and false-optional features"
    );

    let mut dead: BTreeMap<String, Vec<i64>> = BTreeMap::new();
    let mut false_optional: BTreeMap<String, Vec<i64>> = BTreeMap::new();

    while let Some((t, (mut dead_candidates, mut forced_candidates))) = work.pop_first() {
        debug!(
            instant = t,
            candidates = dead_candidates.len(),
            "processing time instant"
        );
        let _instant_frame = Frame::push(&solver);
        solver.assert(&enc.int_var(&time_context)._eq(&Int::from_i64(&ctx, t)));
        if !opts.non_incremental_solver {
            debug!("preliminary check");
            let _ = solver.check();
        }

        while let Some(g) = dead_candidates.pop_first() {
            let _frame = Frame::push(&solver);
            solver.assert(&enc.selected(&g));
            match solver.check() {
                SatResult::Unsat => {
                    debug!(feature = %g, instant = t, "dead feature");
                    dead.entry(g.clone()).or_default().push(t);
                    // a feature that cannot be selected is of no interest
                    // to the forced sweep
                    forced_candidates.remove(&g);
                }
                SatResult::Sat => {
                    let model = solver.get_model().ok_or_else(|| {
                        Error::Solver("reading a dead-sweep model".to_string())
                    })?;
                    for h in &problem.features {
                        match enc.model_selected(&model, h) {
                            Some(true) => {
                                dead_candidates.remove(h);
                            }
                            Some(false) => {
                                forced_candidates.remove(h);
                            }
                            None => {}
                        }
                    }
                }
                SatResult::Unknown => {
                    return Err(Error::Solver("sweeping for dead features".to_string()));
                }
            }
        }

        while let Some(g) = forced_candidates.pop_first() {
            let _frame = Frame::push(&solver);
            solver.assert(&enc.deselected(&g));
            match solver.check() {
                SatResult::Unsat => {
                    debug!(feature = %g, instant = t, "false-optional feature");
                    false_optional.entry(g.clone()).or_default().push(t);
                }
                SatResult::Sat => {
                    let model = solver.get_model().ok_or_else(|| {
                        Error::Solver("reading a false-optional-sweep model".to_string())
                    })?;
                    for h in &problem.features {
                        if enc.model_selected(&model, h) == Some(false) {
                            forced_candidates.remove(h);
                        }
                    }
                }
                SatResult::Unknown => {
                    return Err(Error::Solver(
                        "sweeping for false-optional features".to_string(),
                    ));
                }
            }
        }
    }

    Ok(Reply::analysis(dead, false_optional))
}

/// Expand the schedule into per-instant candidate sets; the dead and the
/// false-optional sweep start from the same candidates
fn work_maps(
    schedule: &BTreeMap<String, Vec<Interval>>,
) -> BTreeMap<i64, (BTreeSet<String>, BTreeSet<String>)> {
    let mut work: BTreeMap<i64, (BTreeSet<String>, BTreeSet<String>)> = BTreeMap::new();
    for (feature, intervals) in schedule {
        for (lo, hi) in intervals {
            for t in *lo..=*hi {
                let entry = work.entry(t).or_default();
                entry.0.insert(feature.clone());
                entry.1.insert(feature.clone());
            }
        }
    }
    work
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_maps_expand_intervals() {
        let mut schedule = BTreeMap::new();
        schedule.insert("a".to_string(), vec![(0, 2)]);
        schedule.insert("b".to_string(), vec![(1, 1), (4, 5)]);
        let work = work_maps(&schedule);
        assert_eq!(work.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2, 4, 5]);
        assert_eq!(work[&1].0.len(), 2);
        assert_eq!(work[&0].0.len(), 1);
        assert_eq!(work[&4].1.iter().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn test_decide_helper_rejects_unknown() {
        use crate::engines::decide;
        assert!(decide(SatResult::Unknown, "sweep").is_err());
    }
}

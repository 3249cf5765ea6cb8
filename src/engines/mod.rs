/// Solver-orchestration engines
///
/// One module per mode. Every engine allocates its own solver (two where
/// the mode needs an independent cross-check), runs sequentially, and
/// returns a [`Reply`]. Shared here: the scoped push/pop frame guard, the
/// sat/unsat discrimination that treats an unknown verdict as fatal, and
/// the run options record threaded through from the CLI.
pub mod analysis;
pub mod explain;
pub mod interface;
pub mod reconfigure;
pub mod validate;

use z3::{SatResult, Solver};

use crate::error::{Error, Result};

/// Immutable per-run options shared by the engines
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineOptions {
    /// Solver timeout in milliseconds; 0 means none. Only the
    /// reconfiguration objective search consumes it.
    pub timeout_ms: u64,
    /// Skip the stability objectives of the reconfiguration
    pub no_default_preferences: bool,
    /// Ask the solver for a minimal unsat core
    pub minimize_core: bool,
    /// Cap the incremental sub-solver so every check starts afresh
    pub non_incremental_solver: bool,
}

/// Scoped solver frame: the pop happens on drop, so every exit path out of
/// a sweep, including `?`, unwinds the frames in inverse push order
pub(crate) struct Frame<'a, 'ctx> {
    solver: &'a Solver<'ctx>,
}

impl<'a, 'ctx> Frame<'a, 'ctx> {
    pub(crate) fn push(solver: &'a Solver<'ctx>) -> Self {
        solver.push();
        Self { solver }
    }
}

impl Drop for Frame<'_, '_> {
    fn drop(&mut self) {
        self.solver.pop(1);
    }
}

/// Map a solver verdict onto sat/unsat, failing on `Unknown`; outside the
/// reconfiguration mode a timeout is not a usable answer
pub(crate) fn decide(result: SatResult, activity: &str) -> Result<bool> {
    match result {
        SatResult::Sat => Ok(true),
        SatResult::Unsat => Ok(false),
        SatResult::Unknown => Err(Error::Solver(activity.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use z3::ast::{Ast, Int};
    use z3::{Config, Context};

    #[test]
    fn test_frame_pops_on_drop() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let solver = Solver::new(&ctx);
        let v = Int::new_const(&ctx, "v");
        solver.assert(&v._eq(&Int::from_i64(&ctx, 1)));
        {
            let _frame = Frame::push(&solver);
            solver.assert(&v._eq(&Int::from_i64(&ctx, 2)));
            assert_eq!(solver.check(), SatResult::Unsat);
        }
        assert_eq!(solver.check(), SatResult::Sat);
    }

    #[test]
    fn test_nested_frames_unwind_in_inverse_order() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let solver = Solver::new(&ctx);
        let v = Int::new_const(&ctx, "v");
        {
            let _outer = Frame::push(&solver);
            solver.assert(&v.gt(&Int::from_i64(&ctx, 0)));
            {
                let _inner = Frame::push(&solver);
                solver.assert(&v.lt(&Int::from_i64(&ctx, 0)));
                assert_eq!(solver.check(), SatResult::Unsat);
            }
            assert_eq!(solver.check(), SatResult::Sat);
        }
        assert_eq!(solver.check(), SatResult::Sat);
    }

    #[test]
    fn test_decide() {
        assert!(decide(SatResult::Sat, "t").unwrap());
        assert!(!decide(SatResult::Unsat, "t").unwrap());
        assert!(matches!(
            decide(SatResult::Unknown, "t"),
            Err(Error::Solver(_))
        ));
    }
}

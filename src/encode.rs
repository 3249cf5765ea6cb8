/// Shared SMT encoding
///
/// One encoder instance per engine run. It owns the mapping from bare
/// identifiers to solver variables, the branch between the boolean and the
/// 0/1-integer feature sort, the domain-bound formulas, and the lowering of
/// formula IR into solver terms. Engines differ only in what they assert
/// and how they drive `check`; everything variable-shaped lives here.
///
/// Feature, attribute and context variables share one namespace, keyed by
/// the bare id.
use std::collections::BTreeMap;

use z3::ast::{Ast, Bool, Int};
use z3::{Context, Model, Optimize, Solver};

use crate::model::{Attribute, ContextVar, FeatureEncoding};
use crate::translate::Expr;
use crate::translate::expr::{ArithOp, CmpOp};

/// Anything formulas can be asserted into; lets one encoder feed both the
/// plain and the optimizing solver
pub trait AssertSink<'ctx> {
    fn assert_formula(&self, formula: &Bool<'ctx>);
}

impl<'ctx> AssertSink<'ctx> for Solver<'ctx> {
    fn assert_formula(&self, formula: &Bool<'ctx>) {
        self.assert(formula);
    }
}

impl<'ctx> AssertSink<'ctx> for Optimize<'ctx> {
    fn assert_formula(&self, formula: &Bool<'ctx>) {
        self.assert(formula);
    }
}

pub struct Encoder<'ctx> {
    ctx: &'ctx Context,
    encoding: FeatureEncoding,
}

impl<'ctx> Encoder<'ctx> {
    pub fn new(ctx: &'ctx Context, encoding: FeatureEncoding) -> Self {
        Self { ctx, encoding }
    }

    pub fn ctx(&self) -> &'ctx Context {
        self.ctx
    }

    pub fn encoding(&self) -> FeatureEncoding {
        self.encoding
    }

    fn zero(&self) -> Int<'ctx> {
        Int::from_i64(self.ctx, 0)
    }

    fn one(&self) -> Int<'ctx> {
        Int::from_i64(self.ctx, 1)
    }

    /// Integer variable for an attribute, a context, or an integer-encoded
    /// feature
    pub fn int_var(&self, id: &str) -> Int<'ctx> {
        Int::new_const(self.ctx, id)
    }

    /// Boolean variable for a boolean-encoded feature
    pub fn bool_var(&self, id: &str) -> Bool<'ctx> {
        Bool::new_const(self.ctx, id)
    }

    /// Formula holding iff the feature is selected
    pub fn selected(&self, id: &str) -> Bool<'ctx> {
        match self.encoding {
            FeatureEncoding::Boolean => self.bool_var(id),
            FeatureEncoding::Integer => self.int_var(id)._eq(&self.one()),
        }
    }

    /// Formula holding iff the feature is unselected
    pub fn deselected(&self, id: &str) -> Bool<'ctx> {
        match self.encoding {
            FeatureEncoding::Boolean => self.bool_var(id).not(),
            FeatureEncoding::Integer => self.int_var(id)._eq(&self.zero()),
        }
    }

    /// The feature as a 0/1 integer term, usable in objective sums
    pub fn feature_term(&self, id: &str) -> Int<'ctx> {
        match self.encoding {
            FeatureEncoding::Boolean => self.bool_var(id).ite(&self.one(), &self.zero()),
            FeatureEncoding::Integer => self.int_var(id),
        }
    }

    /// Domain bounds for features: `0 <= f <= 1` under the integer
    /// encoding, nothing under the boolean one
    pub fn feature_domain<I, S>(&self, features: I) -> Vec<Bool<'ctx>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut formulas = Vec::new();
        if self.encoding == FeatureEncoding::Boolean {
            return formulas;
        }
        for f in features {
            let v = self.int_var(f.as_ref());
            formulas.push(self.zero().le(&v));
            formulas.push(v.le(&self.one()));
        }
        formulas
    }

    /// Attribute bounds, asserted unconditionally of parent selection
    pub fn attribute_domain<'a, I>(&self, attributes: I) -> Vec<Bool<'ctx>>
    where
        I: IntoIterator<Item = (&'a String, &'a Attribute)>,
    {
        let mut formulas = Vec::new();
        for (id, attr) in attributes {
            let v = self.int_var(id);
            formulas.push(Int::from_i64(self.ctx, attr.min).le(&v));
            formulas.push(v.le(&Int::from_i64(self.ctx, attr.max)));
        }
        formulas
    }

    /// Context bounds
    pub fn context_domain<'a, I>(&self, contexts: I) -> Vec<Bool<'ctx>>
    where
        I: IntoIterator<Item = (&'a String, &'a ContextVar)>,
    {
        let mut formulas = Vec::new();
        for (id, ctx_var) in contexts {
            let v = self.int_var(id);
            formulas.push(Int::from_i64(self.ctx, ctx_var.min).le(&v));
            formulas.push(v.le(&Int::from_i64(self.ctx, ctx_var.max)));
        }
        formulas
    }

    /// Pin every context to its initial value; a context without one is an
    /// input-shape defect surfaced as a lowering error string
    pub fn context_pins(
        &self,
        contexts: &BTreeMap<String, ContextVar>,
    ) -> Result<Vec<Bool<'ctx>>, String> {
        let mut formulas = Vec::new();
        for (id, ctx_var) in contexts {
            let initial = ctx_var
                .initial
                .ok_or_else(|| format!("context `{id}` has no initial value to pin"))?;
            formulas.push(self.int_var(id)._eq(&Int::from_i64(self.ctx, initial)));
        }
        Ok(formulas)
    }

    pub fn assert_all(&self, sink: &dyn AssertSink<'ctx>, formulas: &[Bool<'ctx>]) {
        for f in formulas {
            sink.assert_formula(f);
        }
    }

    /// Lower a boolean-valued formula
    pub fn lower_bool(&self, expr: &Expr) -> Result<Bool<'ctx>, String> {
        match expr {
            Expr::Bool(b) => Ok(Bool::from_bool(self.ctx, *b)),
            Expr::Feature(id) => Ok(self.selected(id)),
            Expr::Not(e) => Ok(self.lower_bool(e)?.not()),
            Expr::And(es) => {
                let mut acc = Bool::from_bool(self.ctx, true);
                for e in es {
                    acc &= self.lower_bool(e)?;
                }
                Ok(acc)
            }
            Expr::Or(es) => {
                let mut acc = Bool::from_bool(self.ctx, false);
                for e in es {
                    acc |= self.lower_bool(e)?;
                }
                Ok(acc)
            }
            Expr::Implies(a, b) => Ok(self.lower_bool(a)?.implies(&self.lower_bool(b)?)),
            Expr::Iff(a, b) => Ok(self.lower_bool(a)?._eq(&self.lower_bool(b)?)),
            Expr::Cmp(op, a, b) => {
                let lhs = self.lower_int(a)?;
                let rhs = self.lower_int(b)?;
                Ok(match op {
                    CmpOp::Eq => lhs._eq(&rhs),
                    CmpOp::Ne => lhs._eq(&rhs).not(),
                    CmpOp::Lt => lhs.lt(&rhs),
                    CmpOp::Le => lhs.le(&rhs),
                    CmpOp::Gt => lhs.gt(&rhs),
                    CmpOp::Ge => lhs.ge(&rhs),
                })
            }
            Expr::Int(_) | Expr::Attribute(_) | Expr::Context(_) => {
                Err("integer expression in boolean position".to_string())
            }
        }
    }

    /// Lower an integer-valued formula; boolean subformulas coerce to 0/1,
    /// which is how boolean preferences become objectives
    pub fn lower_int(&self, expr: &Expr) -> Result<Int<'ctx>, String> {
        match expr {
            Expr::Int(v) => Ok(Int::from_i64(self.ctx, *v)),
            Expr::Feature(id) => Ok(self.feature_term(id)),
            Expr::Attribute(id) | Expr::Context(id) => Ok(self.int_var(id)),
            Expr::Arith(op, a, b) => {
                let lhs = self.lower_int(a)?;
                let rhs = self.lower_int(b)?;
                Ok(match op {
                    ArithOp::Add => lhs + rhs,
                    ArithOp::Sub => lhs - rhs,
                    ArithOp::Mul => lhs * rhs,
                })
            }
            Expr::Bool(_)
            | Expr::Not(_)
            | Expr::And(_)
            | Expr::Or(_)
            | Expr::Implies(_, _)
            | Expr::Iff(_, _)
            | Expr::Cmp(_, _, _) => Ok(self.lower_bool(expr)?.ite(&self.one(), &self.zero())),
        }
    }

    /// Sum of 0/1 feature terms, the shape of the stability objectives
    pub fn feature_count<I, S>(&self, features: I) -> Int<'ctx>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut acc = self.zero();
        for f in features {
            acc += self.feature_term(f.as_ref());
        }
        acc
    }

    /// Whether the model selects the feature; `None` when the model leaves
    /// the variable uninterpreted
    pub fn model_selected(&self, model: &Model<'ctx>, id: &str) -> Option<bool> {
        match self.encoding {
            FeatureEncoding::Boolean => model
                .get_const_interp(&self.bool_var(id))
                .and_then(|b| b.as_bool()),
            FeatureEncoding::Integer => model
                .get_const_interp(&self.int_var(id))
                .and_then(|v| v.as_i64())
                .map(|v| v == 1),
        }
    }

    /// Integer value of a variable under the model, completing
    /// don't-care variables
    pub fn model_int(&self, model: &Model<'ctx>, id: &str) -> Option<i64> {
        model
            .eval(&self.int_var(id), true)
            .and_then(|v| v.as_i64())
    }

    /// Feature value as an integer under either encoding
    pub fn model_feature_value(&self, model: &Model<'ctx>, id: &str) -> Option<i64> {
        match self.encoding {
            FeatureEncoding::Boolean => model
                .eval(&self.bool_var(id), true)
                .and_then(|b| b.as_bool())
                .map(i64::from),
            FeatureEncoding::Integer => self.model_int(model, id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::{ConstraintTranslator, ExprTranslator, Scope};
    use z3::{Config, SatResult};

    fn lower(source: &str, encoding: FeatureEncoding) -> SatResult {
        let scope = Scope {
            attributes: ["cost".to_string()].into_iter().collect(),
            contexts: ["env".to_string()].into_iter().collect(),
        };
        let translated = ExprTranslator
            .translate_constraint(source, &scope, encoding)
            .unwrap();
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let enc = Encoder::new(&ctx, encoding);
        let solver = Solver::new(&ctx);
        for f in enc.feature_domain(translated.features.iter()) {
            solver.assert(&f);
        }
        solver.assert(&enc.lower_bool(&translated.formula).unwrap());
        solver.check()
    }

    #[test]
    fn test_lower_satisfiable_formula() {
        assert_eq!(
            lower("feature[A] or feature[B]", FeatureEncoding::Integer),
            SatResult::Sat
        );
        assert_eq!(
            lower("feature[A] and not feature[B]", FeatureEncoding::Boolean),
            SatResult::Sat
        );
    }

    #[test]
    fn test_lower_contradiction() {
        assert_eq!(
            lower(
                "feature[A] = 0 and feature[A] = 1",
                FeatureEncoding::Integer
            ),
            SatResult::Unsat
        );
        assert_eq!(
            lower(
                "feature[A] and not feature[A]",
                FeatureEncoding::Boolean
            ),
            SatResult::Unsat
        );
    }

    #[test]
    fn test_feature_domain_bounds_integers() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let enc = Encoder::new(&ctx, FeatureEncoding::Integer);
        let solver = Solver::new(&ctx);
        for f in enc.feature_domain(["a"]) {
            solver.assert(&f);
        }
        solver.assert(&enc.int_var("a")._eq(&Int::from_i64(&ctx, 2)));
        assert_eq!(solver.check(), SatResult::Unsat);
    }

    #[test]
    fn test_feature_count_objective_shape() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let enc = Encoder::new(&ctx, FeatureEncoding::Integer);
        let solver = Solver::new(&ctx);
        for f in enc.feature_domain(["a", "b"]) {
            solver.assert(&f);
        }
        solver.assert(&enc.feature_count(["a", "b"])._eq(&Int::from_i64(&ctx, 2)));
        assert_eq!(solver.check(), SatResult::Sat);
        let model = solver.get_model().unwrap();
        assert_eq!(enc.model_selected(&model, "a"), Some(true));
        assert_eq!(enc.model_feature_value(&model, "b"), Some(1));
    }

    #[test]
    fn test_context_pins_require_initials() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let enc = Encoder::new(&ctx, FeatureEncoding::Integer);
        let mut contexts = BTreeMap::new();
        contexts.insert(
            "c".to_string(),
            ContextVar {
                min: 0,
                max: 5,
                initial: None,
            },
        );
        assert!(enc.context_pins(&contexts).is_err());
        contexts.get_mut("c").unwrap().initial = Some(3);
        assert_eq!(enc.context_pins(&contexts).unwrap().len(), 1);
    }
}

/// Formula intermediate representation
///
/// Constraints and preferences are parsed into this tree once, outside any
/// solver context, and lowered to solver terms by the encoder. Keeping the
/// IR free of solver handles is what lets the translation step run on a
/// worker pool before the sequential core starts.

/// Comparison operators of the relational layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Arithmetic operators of the additive / multiplicative layers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
}

/// A formula over feature, attribute and context variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Int(i64),
    Bool(bool),
    /// Reference to a feature variable (Bool or 0/1 Int per encoding)
    Feature(String),
    /// Reference to an attribute variable
    Attribute(String),
    /// Reference to a context variable
    Context(String),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Implies(Box<Expr>, Box<Expr>),
    Iff(Box<Expr>, Box<Expr>),
    Cmp(CmpOp, Box<Expr>, Box<Expr>),
    Arith(ArithOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Collect every feature id the formula mentions
    pub fn features_into(&self, out: &mut std::collections::BTreeSet<String>) {
        match self {
            Expr::Feature(id) => {
                out.insert(id.clone());
            }
            Expr::Int(_) | Expr::Bool(_) | Expr::Attribute(_) | Expr::Context(_) => {}
            Expr::Not(e) => e.features_into(out),
            Expr::And(es) | Expr::Or(es) => {
                for e in es {
                    e.features_into(out);
                }
            }
            Expr::Implies(a, b) | Expr::Iff(a, b) | Expr::Cmp(_, a, b) | Expr::Arith(_, a, b) => {
                a.features_into(out);
                b.features_into(out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_features_into_collects_nested_refs() {
        let e = Expr::Implies(
            Box::new(Expr::Feature("a".to_string())),
            Box::new(Expr::Cmp(
                CmpOp::Le,
                Box::new(Expr::Arith(
                    ArithOp::Add,
                    Box::new(Expr::Feature("b".to_string())),
                    Box::new(Expr::Attribute("cost".to_string())),
                )),
                Box::new(Expr::Int(3)),
            )),
        );
        let mut fs = BTreeSet::new();
        e.features_into(&mut fs);
        assert_eq!(fs.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}

/// Typed problem model
///
/// The model is built once from the input document, handed read-only to a
/// single engine and dropped afterwards. All identifiers are bare (the
/// `feature[..]` / `attribute[..]` / `context[..]` wrappers of the document
/// are stripped during the build).
use std::collections::{BTreeMap, BTreeSet};

use crate::translate::Expr;

/// Sort used for feature variables, fixed once per run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeatureEncoding {
    /// Features are integers constrained to 0..=1
    #[default]
    Integer,
    /// Features are plain booleans
    Boolean,
}

/// Numeric datum attached to a feature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub min: i64,
    pub max: i64,
    /// Feature this attribute belongs to; its value is only reported when
    /// the parent is selected
    pub parent: String,
    pub initial: Option<i64>,
}

/// Environment variable the model reasons about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextVar {
    pub min: i64,
    pub max: i64,
    pub initial: Option<i64>,
}

/// Translated constraint together with its original source string,
/// which the explain engine reports in unsat cores
#[derive(Debug, Clone)]
pub struct Constraint {
    pub formula: Expr,
    pub source: String,
}

/// Formula to maximize; list order is the lexicographic priority
#[derive(Debug, Clone)]
pub struct Preference {
    pub formula: Expr,
    pub source: String,
}

/// Closed time interval of an optional-feature schedule
pub type Interval = (i64, i64);

/// A complete reasoning problem
#[derive(Debug, Clone, Default)]
pub struct Problem {
    pub encoding: FeatureEncoding,
    /// Every feature the constraints, attributes or schedules mention
    pub features: BTreeSet<String>,
    /// Features selected in the initial configuration
    pub initial_features: BTreeSet<String>,
    pub attributes: BTreeMap<String, Attribute>,
    pub contexts: BTreeMap<String, ContextVar>,
    pub constraints: Vec<Constraint>,
    /// Ordered by priority: injected pre-encoded preferences first, then
    /// the caller's preference list
    pub preferences: Vec<Preference>,
    /// Formulas over context variables restricting the admissible contexts
    pub context_constraints: Vec<Constraint>,
    /// Feature id -> closed intervals of the time context in which the
    /// feature is a candidate for dead / false-optional analysis
    pub optional_features: BTreeMap<String, Vec<Interval>>,
    /// Distinguished time context for the feature analysis, if declared
    pub time_context: Option<String>,
}

impl Problem {
    /// Features outside the initial configuration
    pub fn non_initial_features(&self) -> impl Iterator<Item = &String> {
        self.features
            .iter()
            .filter(|f| !self.initial_features.contains(*f))
    }

    /// Attributes that carry an initial value, in id order
    pub fn attributes_with_initial(&self) -> impl Iterator<Item = (&String, &Attribute, i64)> {
        self.attributes
            .iter()
            .filter_map(|(id, a)| a.initial.map(|v| (id, a, v)))
    }
}

// fmrec - context-aware feature-model reasoner
//
// Five solver-orchestration modes over one problem model: reconfigure,
// validate, explain, check-interface and check-features.

pub mod cli;
pub mod encode;
pub mod engines;
pub mod error;
pub mod input;
pub mod model;
pub mod output;
pub mod translate;

// Re-exports for convenience
pub use cli::{Cli, Mode};
pub use error::{Error, Result};
pub use input::{InputDocument, InterfaceDocument, build_problem};
pub use model::{FeatureEncoding, Problem};
pub use output::{IdValue, Reply};
pub use translate::{ConstraintTranslator, ExprTranslator};

/// Current fmrec version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

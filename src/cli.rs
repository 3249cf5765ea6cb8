/// Command-line surface
///
/// One command, one principal mode per run. Reconfiguration is the default;
/// `--validate`, `--explain`, `--check-interface` and `--check-features`
/// select the other modes and exclude each other.
use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::engines::EngineOptions;
use crate::error::{Error, Result};
use crate::model::FeatureEncoding;

#[derive(Parser, Debug)]
#[command(version, about = "Context-aware feature-model reasoner")]
pub struct Cli {
    /// JSON input file describing the feature model
    #[arg(value_name = "INPUT_FILE")]
    pub input_file: PathBuf,

    /// Check whether some admissible context voids the feature model
    #[arg(long)]
    pub validate: bool,

    /// Enumerate the context grid instead of the quantified encoding
    #[arg(long = "validate-grid-search")]
    pub validate_grid_search: bool,

    /// Explain why the feature model is void under the initial contexts
    #[arg(long)]
    pub explain: bool,

    /// Check that the interface in the given file refines the model
    #[arg(long = "check-interface", value_name = "FILE")]
    pub check_interface: Option<PathBuf>,

    /// List the dead and false-optional features per time instant
    #[arg(long = "check-features")]
    pub check_features: bool,

    /// Encode features as booleans instead of 0/1 integers
    #[arg(long = "features-as-boolean")]
    pub features_as_boolean: bool,

    /// Solver timeout in milliseconds, 0 for none; only the
    /// reconfiguration mode consumes it
    #[arg(long, default_value_t = 0)]
    pub timeout: u64,

    /// Ask the solver for a minimal explanation; only meaningful with
    /// --explain
    #[arg(long = "constraints-minimization")]
    pub constraints_minimization: bool,

    /// Skip the stability objectives that keep the result close to the
    /// initial configuration
    #[arg(long = "no-default-preferences")]
    pub no_default_preferences: bool,

    /// Cap the incremental sub-solver so every check starts afresh
    #[arg(long = "non-incremental-solver")]
    pub non_incremental_solver: bool,

    /// Write the result line to a file instead of stdout
    #[arg(long = "output-file", short = 'o', value_name = "FILE")]
    pub output_file: Option<PathBuf>,

    /// Worker count for translating the constraint list
    #[arg(long = "num-of-process", short = 'p', default_value_t = 1)]
    pub num_of_process: usize,

    /// Increase log verbosity (-v warn, -vv info, -vvv debug)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

/// The principal mode of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Reconfigure,
    Validate { grid_search: bool },
    Explain,
    CheckInterface(PathBuf),
    CheckFeatures,
}

impl Cli {
    /// Resolve the principal mode, rejecting conflicting selections
    pub fn mode(&self) -> Result<Mode> {
        let selected = [
            self.validate,
            self.explain,
            self.check_interface.is_some(),
            self.check_features,
        ]
        .iter()
        .filter(|on| **on)
        .count();
        if selected > 1 {
            return Err(Error::ModeConflict(
                "only one of --validate, --explain, --check-interface and --check-features \
                 may be selected"
                    .to_string(),
            ));
        }
        if self.features_as_boolean && self.check_interface.is_some() {
            return Err(Error::ModeConflict(
                "--features-as-boolean is incompatible with --check-interface".to_string(),
            ));
        }
        if self.validate {
            Ok(Mode::Validate {
                grid_search: self.validate_grid_search,
            })
        } else if self.explain {
            Ok(Mode::Explain)
        } else if let Some(path) = &self.check_interface {
            Ok(Mode::CheckInterface(path.clone()))
        } else if self.check_features {
            Ok(Mode::CheckFeatures)
        } else {
            Ok(Mode::Reconfigure)
        }
    }

    pub fn encoding(&self) -> FeatureEncoding {
        if self.features_as_boolean {
            FeatureEncoding::Boolean
        } else {
            FeatureEncoding::Integer
        }
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            timeout_ms: self.timeout,
            no_default_preferences: self.no_default_preferences,
            minimize_core: self.constraints_minimization,
            non_incremental_solver: self.non_incremental_solver,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("fmrec").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_default_mode_is_reconfigure() {
        let cli = parse(&["input.json"]);
        assert_eq!(cli.mode().unwrap(), Mode::Reconfigure);
        assert_eq!(cli.encoding(), FeatureEncoding::Integer);
    }

    #[test]
    fn test_validate_with_grid_search() {
        let cli = parse(&["input.json", "--validate", "--validate-grid-search"]);
        assert_eq!(cli.mode().unwrap(), Mode::Validate { grid_search: true });
    }

    #[test]
    fn test_principal_modes_exclude_each_other() {
        let cli = parse(&["input.json", "--validate", "--explain"]);
        assert!(matches!(cli.mode(), Err(Error::ModeConflict(_))));

        let cli = parse(&["input.json", "--check-features", "--check-interface", "i.json"]);
        assert!(matches!(cli.mode(), Err(Error::ModeConflict(_))));
    }

    #[test]
    fn test_boolean_features_conflict_with_interface_check() {
        let cli = parse(&["input.json", "--features-as-boolean", "--check-interface", "i.json"]);
        assert!(matches!(cli.mode(), Err(Error::ModeConflict(_))));

        let cli = parse(&["input.json", "--features-as-boolean"]);
        assert_eq!(cli.encoding(), FeatureEncoding::Boolean);
        assert!(cli.mode().is_ok());
    }

    #[test]
    fn test_engine_options_carry_the_modifiers() {
        let cli = parse(&[
            "input.json",
            "--explain",
            "--constraints-minimization",
            "--timeout",
            "500",
            "--non-incremental-solver",
        ]);
        let opts = cli.engine_options();
        assert!(opts.minimize_core);
        assert!(opts.non_incremental_solver);
        assert_eq!(opts.timeout_ms, 500);
    }
}

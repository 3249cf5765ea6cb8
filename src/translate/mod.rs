/// Constraint translation
///
/// Source strings from the input document become formula IR here. The
/// translator is a trait so the parsing front end can be swapped without
/// touching the engines; the shipped implementation is the recursive-descent
/// parser of [`parser`]. Translation is pure and stateless, which is what
/// allows the worker-pool driver to fan the constraint list out across
/// threads and join the results into an ordered vector before the
/// sequential core starts.
pub mod expr;
mod parser;

pub use expr::Expr;

use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::model::FeatureEncoding;

/// Identifiers a formula may reference besides features
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub attributes: BTreeSet<String>,
    pub contexts: BTreeSet<String>,
}

/// Result of translating one constraint: the formula plus the feature ids
/// it mentions, so the encoder can declare them
#[derive(Debug, Clone)]
pub struct Translated {
    pub formula: Expr,
    pub features: BTreeSet<String>,
}

/// Front end turning source strings into formula IR
pub trait ConstraintTranslator: Sync {
    /// Translate a constraint; the result must be boolean-valued
    fn translate_constraint(
        &self,
        source: &str,
        scope: &Scope,
        encoding: FeatureEncoding,
    ) -> Result<Translated>;

    /// Translate a preference; integer-valued formulas are accepted too
    fn translate_preference(
        &self,
        source: &str,
        scope: &Scope,
        encoding: FeatureEncoding,
    ) -> Result<Expr>;
}

/// The built-in expression-language translator
#[derive(Debug, Clone, Copy, Default)]
pub struct ExprTranslator;

impl ConstraintTranslator for ExprTranslator {
    fn translate_constraint(
        &self,
        source: &str,
        scope: &Scope,
        encoding: FeatureEncoding,
    ) -> Result<Translated> {
        let formula = parser::parse(source, scope, encoding, true)
            .map_err(|message| Error::translate(source, message))?;
        let mut features = BTreeSet::new();
        formula.features_into(&mut features);
        Ok(Translated { formula, features })
    }

    fn translate_preference(
        &self,
        source: &str,
        scope: &Scope,
        encoding: FeatureEncoding,
    ) -> Result<Expr> {
        parser::parse(source, scope, encoding, false)
            .map_err(|message| Error::translate(source, message))
    }
}

/// Translate a list of constraints, optionally across a worker pool.
///
/// With `workers > 1` the list is split into contiguous chunks, one scoped
/// thread per chunk, and the per-chunk results are joined back in input
/// order. The first translation error wins; later ones are dropped with it.
pub fn translate_all<T: ConstraintTranslator>(
    translator: &T,
    sources: &[String],
    scope: &Scope,
    encoding: FeatureEncoding,
    workers: usize,
) -> Result<Vec<Translated>> {
    if workers <= 1 || sources.len() <= 1 {
        return sources
            .iter()
            .map(|s| translator.translate_constraint(s, scope, encoding))
            .collect();
    }

    let chunk_len = sources.len().div_ceil(workers);
    tracing::debug!(
        constraints = sources.len(),
        workers,
        chunk_len,
        "translating constraints on worker pool"
    );
    let chunks: Vec<&[String]> = sources.chunks(chunk_len).collect();
    let mut joined = Vec::with_capacity(sources.len());
    let results: Vec<Result<Vec<Translated>>> = std::thread::scope(|s| {
        let handles: Vec<_> = chunks
            .into_iter()
            .map(|chunk| {
                s.spawn(move || {
                    chunk
                        .iter()
                        .map(|src| translator.translate_constraint(src, scope, encoding))
                        .collect::<Result<Vec<Translated>>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("translator worker panicked"))
            .collect()
    });
    for chunk in results {
        joined.extend(chunk?);
    }
    Ok(joined)
}

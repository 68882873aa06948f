//! The interface shared by every comparator, and the score it produces.

use std::{
    fmt::Display,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex, PoisonError,
    },
    time::Duration,
};

use thiserror::Error;

use crate::{
    molecule::Molecule,
    sidechain::SideChainError,
    toolkit::{SetupError, Toolkit},
};

/// Result of comparing two molecules: a non-negative distance or similarity,
/// or the verdict that no structural match exists within the search limits.
/// `NoMatch` orders after every value.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd)]
pub enum Score {
    Value(f64),
    NoMatch,
}

impl Score {
    /// The numeric score, with `NoMatch` as positive infinity.
    pub fn value(self) -> f64 {
        match self {
            Score::Value(v) => v,
            Score::NoMatch => f64::INFINITY,
        }
    }

    /// `distance` if it is at most `threshold`, otherwise `NoMatch`.
    pub fn within(distance: f64, threshold: f64) -> Score {
        if distance <= threshold {
            Score::Value(distance)
        } else {
            Score::NoMatch
        }
    }
}

impl From<f64> for Score {
    fn from(value: f64) -> Self {
        if value.is_infinite() {
            Score::NoMatch
        } else {
            Score::Value(value)
        }
    }
}

impl Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Score::Value(v) => write!(f, "{v}"),
            Score::NoMatch => write!(f, "inf"),
        }
    }
}

/// Hard failures. Molecules that merely do not match are never errors.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("molecule setup failed")]
    Setup(#[from] SetupError),
    #[error("invalid side chain")]
    SideChain(#[from] SideChainError),
    #[error("{0} molecule has no atoms")]
    EmptyMolecule(&'static str),
    #[error("side chain catalog is empty")]
    EmptyCatalog,
    #[error("search exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),
}

/// A comparator for one fixed pair of molecules.
///
/// The score is computed by the first call to [`Matcher::compare`] and then
/// cached, so every later call (from any thread) returns the same value
/// without searching again.
pub trait Matcher: Send + Sync {
    fn compare(&self) -> Result<Score, MatchError>;

    /// Same as [`Matcher::compare`].
    fn score(&self) -> Result<Score, MatchError> {
        self.compare()
    }

    /// The cached score, if it has been computed.
    fn cached_score(&self) -> Option<Score>;

    /// The first input molecule as normalised for comparison.
    fn first_molecule(&self) -> &Molecule;

    /// The second input molecule as normalised for comparison.
    fn second_molecule(&self) -> &Molecule;

    fn stats(&self) -> &SearchStats;
}

/// Compute-once storage for a comparator's score.
///
/// The lock is held while the score is computed, so concurrent callers wait
/// for the first computation instead of repeating it. Failed computations
/// are not cached.
#[derive(Debug, Default)]
pub(crate) struct ScoreCell(Mutex<Option<Score>>);

impl ScoreCell {
    pub(crate) fn get(&self) -> Option<Score> {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn get_or_try_init<E>(
        &self,
        init: impl FnOnce() -> Result<Score, E>,
    ) -> Result<Score, E> {
        let mut slot = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(score) = *slot {
            return Ok(score);
        }
        let score = init()?;
        *slot = Some(score);
        Ok(score)
    }
}

/// Counters describing how much work a comparator has done.
#[derive(Debug, Default)]
pub struct SearchStats {
    isomorphism_searches: AtomicUsize,
    variant_pairs: AtomicUsize,
}

impl SearchStats {
    /// Number of isomorphism searches started.
    pub fn isomorphism_searches(&self) -> usize {
        self.isomorphism_searches.load(Ordering::Relaxed)
    }

    /// Number of edited-variant pairs whose components were compared.
    pub fn variant_pairs(&self) -> usize {
        self.variant_pairs.load(Ordering::Relaxed)
    }

    pub(crate) fn record_isomorphism_search(&self) {
        self.isomorphism_searches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_variant_pair(&self) {
        self.variant_pairs.fetch_add(1, Ordering::Relaxed);
    }
}

/// Normalise both input molecules with `toolkit`.
pub(crate) fn prepare_pair(
    toolkit: &dyn Toolkit,
    m1: &Molecule,
    m2: &Molecule,
) -> Result<(Molecule, Molecule), SetupError> {
    Ok((toolkit.prepare(m1)?, toolkit.prepare(m2)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_match_orders_last() {
        assert!(Score::Value(1e12) < Score::NoMatch);
        assert!(Score::Value(0.5) < Score::Value(1.0));
        assert_eq!(Score::NoMatch.value(), f64::INFINITY);
    }

    #[test]
    fn threshold_cutoff() {
        assert_eq!(Score::within(2.0, 2.0), Score::Value(2.0));
        assert_eq!(Score::within(2.5, 2.0), Score::NoMatch);
        assert_eq!(Score::within(f64::INFINITY, 2.0), Score::NoMatch);
        assert_eq!(Score::from(f64::INFINITY), Score::NoMatch);
        assert_eq!(Score::from(1.5), Score::Value(1.5));
    }

    #[test]
    fn display() {
        assert_eq!(Score::Value(0.5).to_string(), "0.5");
        assert_eq!(Score::NoMatch.to_string(), "inf");
    }

    #[test]
    fn score_cell_computes_once() {
        let cell = ScoreCell::default();
        assert_eq!(cell.get(), None);
        let mut calls = 0;
        for _ in 0..3 {
            let score = cell.get_or_try_init::<()>(|| {
                calls += 1;
                Ok(Score::Value(1.0))
            });
            assert_eq!(score, Ok(Score::Value(1.0)));
        }
        assert_eq!(calls, 1);
        assert_eq!(cell.get(), Some(Score::Value(1.0)));
    }

    #[test]
    fn failures_are_not_cached() {
        let cell = ScoreCell::default();
        assert_eq!(cell.get_or_try_init(|| Err("boom")), Err("boom"));
        assert_eq!(cell.get(), None);
        assert_eq!(cell.get_or_try_init::<&str>(|| Ok(Score::NoMatch)), Ok(Score::NoMatch));
    }
}

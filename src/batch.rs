//! Score many molecule pairs with one comparison method.

use clap::ValueEnum;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::{
    edic::Edic,
    matcher::{MatchError, Matcher, Score},
    mces::{MatchConfig, McesDistance},
    molecule::Molecule,
    placements::MinimalWeightedPlacements,
    sidechain::SideChain,
};

/// Comparison methods, as selected on the command line.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum Measure {
    /// Exact single-edit comparison (1 or 0).
    Edic,
    /// Bounded bond-edit distance.
    #[default]
    Mces,
    /// Side-chain placement distance.
    Placements,
}

/// Parallelism strategy for batch scoring.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum ParallelMode {
    /// Score pairs one after another.
    None,
    /// Score pairs on all available threads.
    #[default]
    Always,
}

/// A comparison method together with everything it needs besides the two
/// molecules.
#[derive(Debug, Clone)]
pub enum Comparison {
    Edic,
    Mces(MatchConfig),
    Placements(Vec<SideChain>),
}

impl Comparison {
    pub fn measure(&self) -> Measure {
        match self {
            Comparison::Edic => Measure::Edic,
            Comparison::Mces(_) => Measure::Mces,
            Comparison::Placements(_) => Measure::Placements,
        }
    }

    /// Build the comparator for one pair.
    pub fn matcher(&self, m1: &Molecule, m2: &Molecule) -> Result<Box<dyn Matcher>, MatchError> {
        Ok(match self {
            Comparison::Edic => Box::new(Edic::new(m1, m2)?),
            Comparison::Mces(config) => {
                Box::new(McesDistance::with_config(m1, m2, config.clone())?)
            }
            Comparison::Placements(catalog) => {
                Box::new(MinimalWeightedPlacements::new(m1, m2, catalog)?)
            }
        })
    }

    pub fn score(&self, m1: &Molecule, m2: &Molecule) -> Result<Score, MatchError> {
        self.matcher(m1, m2)?.compare()
    }
}

/// Score every pair, keeping the input order. Each pair gets its own
/// comparator, so pairs are independent of each other.
pub fn score_pairs(
    pairs: &[(Molecule, Molecule)],
    comparison: &Comparison,
    parallel_mode: ParallelMode,
) -> Vec<Result<Score, MatchError>> {
    match parallel_mode {
        ParallelMode::None => pairs
            .iter()
            .map(|(m1, m2)| comparison.score(m1, m2))
            .collect(),
        ParallelMode::Always => pairs
            .par_iter()
            .map(|(m1, m2)| comparison.score(m1, m2))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::molecule::{Atom, Bond, Element};

    fn c2(bond: Bond) -> Molecule {
        Molecule::from_parts(
            [Atom::new(Element::Carbon), Atom::new(Element::Carbon)],
            [(0, 1, bond)],
        )
    }

    #[test]
    fn parallel_and_serial_agree() {
        let pairs = vec![
            (c2(Bond::double()), c2(Bond::single())),
            (c2(Bond::triple()), c2(Bond::single())),
            (c2(Bond::single()), c2(Bond::single())),
        ];
        let comparison = Comparison::Mces(MatchConfig::default());
        let serial: Vec<_> = score_pairs(&pairs, &comparison, ParallelMode::None)
            .into_iter()
            .map(Result::unwrap)
            .collect();
        let parallel: Vec<_> = score_pairs(&pairs, &comparison, ParallelMode::Always)
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(serial, parallel);
        assert_eq!(
            serial,
            vec![Score::Value(1.0), Score::Value(2.0), Score::Value(0.0)]
        );
    }

    #[test]
    fn failures_stay_with_their_pair() {
        let aromatic_chain = c2(Bond::aromatic());
        let pairs = vec![
            (c2(Bond::single()), c2(Bond::single())),
            (aromatic_chain.clone(), aromatic_chain),
        ];
        let scores = score_pairs(&pairs, &Comparison::Edic, ParallelMode::Always);
        assert_eq!(scores[0].as_ref().unwrap(), &Score::Value(1.0));
        assert!(matches!(scores[1], Err(MatchError::Setup(_))));
    }

    #[test]
    fn placements_need_a_catalog() {
        let m = c2(Bond::single());
        assert!(matches!(
            Comparison::Placements(vec![]).score(&m, &m),
            Err(MatchError::EmptyCatalog)
        ));
        assert_eq!(Comparison::Placements(vec![]).measure(), Measure::Placements);
    }
}

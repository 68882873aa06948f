//! Exact single-edit comparison.
//!
//! Two molecules are similar if one bond edit on each side makes them
//! isomorphic. An edit lowers a bond's order by one, removing single bonds
//! altogether; aromatic bonds are never edited. Atoms must agree on their
//! element and bonds on their order. The unedited molecules are never
//! compared with each other, so two identical molecules only score 1 when
//! some pair of edits happens to keep them isomorphic.

use tracing::{debug, trace};

use crate::{
    edits::{Edit, EditedView},
    matcher::{prepare_pair, MatchError, Matcher, Score, ScoreCell, SearchStats},
    molecule::{Atom, Bond, Molecule},
    toolkit::{BasicToolkit, Toolkit},
    vf2::{is_isomorphic, LabeledGraph},
};

/// Exact single-edit comparator. Scores 1.0 for a match and 0.0 otherwise.
#[derive(Debug)]
pub struct Edic {
    first: Molecule,
    second: Molecule,
    score: ScoreCell,
    stats: SearchStats,
}

impl Edic {
    pub fn new(m1: &Molecule, m2: &Molecule) -> Result<Self, MatchError> {
        Self::with_toolkit(&BasicToolkit, m1, m2)
    }

    pub fn with_toolkit(
        toolkit: &dyn Toolkit,
        m1: &Molecule,
        m2: &Molecule,
    ) -> Result<Self, MatchError> {
        let (first, second) = prepare_pair(toolkit, m1, m2)?;
        Ok(Self {
            first,
            second,
            score: ScoreCell::default(),
            stats: SearchStats::default(),
        })
    }

    fn edited_graphs(molecule: &Molecule) -> Vec<(Edit, LabeledGraph<Atom, Bond>)> {
        molecule
            .graph()
            .edge_indices()
            .filter(|&e| !molecule.bond(e).is_aromatic())
            .map(|e| {
                let edit = Edit::decrement(e, molecule.bond(e));
                (edit, EditedView::new(molecule, Some(edit)).to_labeled_graph())
            })
            .collect()
    }

    fn compute(&self) -> Score {
        let (formula1, formula2) = (self.first.formula(), self.second.formula());
        if formula1 != formula2 {
            debug!(%formula1, %formula2, "formulas differ");
            return Score::Value(0.0);
        }

        let edited2 = Self::edited_graphs(&self.second);
        for (edit1, g1) in Self::edited_graphs(&self.first) {
            for (edit2, g2) in &edited2 {
                self.stats.record_isomorphism_search();
                if is_isomorphic(
                    &g1,
                    g2,
                    |a: &Atom, b: &Atom| a.element() == b.element(),
                    Bond::matches_strict,
                ) {
                    debug!(?edit1, ?edit2, "edited molecules are isomorphic");
                    return Score::Value(1.0);
                }
                trace!(?edit1, ?edit2, "no isomorphism");
            }
        }
        Score::Value(0.0)
    }
}

impl Matcher for Edic {
    fn compare(&self) -> Result<Score, MatchError> {
        self.score
            .get_or_try_init(|| Ok::<_, MatchError>(self.compute()))
    }

    fn cached_score(&self) -> Option<Score> {
        self.score.get()
    }

    fn first_molecule(&self) -> &Molecule {
        &self.first
    }

    fn second_molecule(&self) -> &Molecule {
        &self.second
    }

    fn stats(&self) -> &SearchStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::molecule::Element;

    fn c2(bond: Bond) -> Molecule {
        Molecule::from_parts(
            [Atom::new(Element::Carbon), Atom::new(Element::Carbon)],
            [(0, 1, bond)],
        )
    }

    #[test]
    fn radical_isomers_are_one_edit_apart() {
        // CH3-CH2-O. and CH3-CH.-OH
        let alkoxy = Molecule::from_parts(
            [
                Atom::new(Element::Carbon).with_hydrogens(3),
                Atom::new(Element::Carbon).with_hydrogens(2),
                Atom::new(Element::Oxygen).with_hydrogens(0),
            ],
            [(0, 1, Bond::single()), (1, 2, Bond::single())],
        );
        let hydroxyethyl = Molecule::from_parts(
            [
                Atom::new(Element::Carbon).with_hydrogens(3),
                Atom::new(Element::Carbon).with_hydrogens(1),
                Atom::new(Element::Oxygen).with_hydrogens(1),
            ],
            [(0, 1, Bond::single()), (1, 2, Bond::single())],
        );
        let edic = Edic::new(&alkoxy, &hydroxyethyl).unwrap();
        assert_eq!(edic.compare().unwrap(), Score::Value(1.0));
    }

    #[test]
    fn different_formulas_skip_the_search() {
        let edic = Edic::new(&c2(Bond::double()), &c2(Bond::single())).unwrap();
        assert_eq!(edic.compare().unwrap(), Score::Value(0.0));
        assert_eq!(edic.stats().isomorphism_searches(), 0);
    }

    #[test]
    fn unedited_molecules_are_not_compared() {
        let argon = Molecule::from_parts([Atom::new(Element::Argon)], []);
        let edic = Edic::new(&argon, &argon).unwrap();
        assert_eq!(edic.compare().unwrap(), Score::Value(0.0));
    }

    #[test]
    fn symmetric_molecules_match_themselves() {
        let ethane = c2(Bond::single());
        let edic = Edic::new(&ethane, &ethane).unwrap();
        assert_eq!(edic.compare().unwrap(), Score::Value(1.0));
        assert_eq!(edic.first_molecule().atom_count(), 8);
    }

    #[test]
    fn score_is_cached() {
        let ethane = c2(Bond::single());
        let edic = Edic::new(&ethane, &ethane).unwrap();
        assert_eq!(edic.cached_score(), None);
        let first = edic.compare().unwrap();
        let searches = edic.stats().isomorphism_searches();
        assert!(searches > 0);
        assert_eq!(edic.score().unwrap(), first);
        assert_eq!(edic.stats().isomorphism_searches(), searches);
        assert_eq!(edic.cached_score(), Some(first));
    }

    #[test]
    fn setup_failures_propagate() {
        let broken = c2(Bond::aromatic());
        assert!(matches!(
            Edic::new(&broken, &broken),
            Err(MatchError::Setup(_))
        ));
    }
}

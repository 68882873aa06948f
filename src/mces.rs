//! Bounded bond-edit distance between two molecules.
//!
//! Both molecules are reduced to their heavy-atom skeletons (hydrogens and
//! bondless atoms dropped, charges set to zero). Each skeleton then yields a
//! set of edited variants: itself at cost 0, plus every result of editing a
//! single bond, priced by the [`MatchingMode`]. The distance is the cheapest
//! pair of variants whose connected components can be mapped onto each
//! other, plus the cost of that mapping. Distances above the configured
//! threshold are reported as [`Score::NoMatch`]; lower bounds from
//! [`crate::bounds`] skip hopeless searches and end searches that cannot
//! improve any further.

use std::{
    ops::ControlFlow,
    time::{Duration, Instant},
};

use clap::ValueEnum;
use petgraph::graph::EdgeIndex;
use tracing::{debug, trace};

use crate::{
    assignment::{self, INFEASIBLE},
    bounds::{self, Bound, Pruning, DEFAULT_BOUNDS},
    edits::{variants, Component, Edit, Variant},
    matcher::{prepare_pair, MatchError, Matcher, Score, ScoreCell, SearchStats},
    molecule::{Atom, Bond, Index, Molecule},
    toolkit::{BasicToolkit, Toolkit},
    vf2::{for_each_isomorphism, is_isomorphic},
};

/// How bonds may be edited and how edited components are compared.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum MatchingMode {
    /// Remove one bond per molecule at the cost of its weight. Components
    /// must then be isomorphic with identical bond orders.
    BondDeletionStrict,
    /// Remove one bond per molecule at the cost of its weight. Components
    /// may differ in bond orders; each mapped bond costs the difference of
    /// the two weights.
    #[default]
    BondDeletionAnyOrder,
    /// Move one electron pair per molecule: aromatic bonds become single or
    /// double (0.5 each), other bonds lose one order or vanish (1 each).
    /// Components must be isomorphic with identical bond orders.
    ElectronPair,
}

/// Distances above this are reported as no match unless configured otherwise.
pub const DEFAULT_THRESHOLD: f64 = 2.0;

/// Options for [`McesDistance`].
#[derive(Debug, Clone, PartialEq)]
pub struct MatchConfig {
    pub mode: MatchingMode,
    /// Largest distance reported as a value.
    pub threshold: f64,
    /// Lower bounds to check, in order, before searching.
    pub bounds: Vec<Bound>,
    /// Abort the search with [`MatchError::DeadlineExceeded`] after this long.
    pub deadline: Option<Duration>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            mode: MatchingMode::default(),
            threshold: DEFAULT_THRESHOLD,
            bounds: DEFAULT_BOUNDS.to_vec(),
            deadline: None,
        }
    }
}

/// Bounded multi-edit distance comparator.
#[derive(Debug)]
pub struct McesDistance {
    first: Molecule,
    second: Molecule,
    first_reduced: Molecule,
    second_reduced: Molecule,
    config: MatchConfig,
    score: ScoreCell,
    stats: SearchStats,
}

impl McesDistance {
    pub fn new(m1: &Molecule, m2: &Molecule) -> Result<Self, MatchError> {
        Self::with_config(m1, m2, MatchConfig::default())
    }

    pub fn with_config(
        m1: &Molecule,
        m2: &Molecule,
        config: MatchConfig,
    ) -> Result<Self, MatchError> {
        Self::with_toolkit(&BasicToolkit, m1, m2, config)
    }

    pub fn with_toolkit(
        toolkit: &dyn Toolkit,
        m1: &Molecule,
        m2: &Molecule,
        config: MatchConfig,
    ) -> Result<Self, MatchError> {
        let (first, second) = prepare_pair(toolkit, m1, m2)?;
        Ok(Self {
            first_reduced: first.reduced(),
            second_reduced: second.reduced(),
            first,
            second,
            config,
            score: ScoreCell::default(),
            stats: SearchStats::default(),
        })
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// The larger of the weighted-degree and neighbourhood bounds on the
    /// reduced molecules.
    pub fn lower_bound(&self) -> f64 {
        bounds::lower_bound(&self.first_reduced, &self.second_reduced, &DEFAULT_BOUNDS)
    }

    fn candidates(&self, edge: EdgeIndex<Index>, bond: &Bond) -> Vec<(Edit, f64)> {
        match self.config.mode {
            MatchingMode::BondDeletionStrict | MatchingMode::BondDeletionAnyOrder => {
                vec![(Edit::Remove(edge), bond.weight())]
            }
            MatchingMode::ElectronPair if bond.is_aromatic() => vec![
                (Edit::Relabel(edge, Bond::single()), 0.5),
                (Edit::Relabel(edge, Bond::double()), 0.5),
            ],
            MatchingMode::ElectronPair => vec![(Edit::decrement(edge, bond), 1.0)],
        }
    }

    fn compute(&self) -> Result<Score, MatchError> {
        let (m1, m2) = (&self.first_reduced, &self.second_reduced);
        let threshold = self.config.threshold;

        let (formula1, formula2) = (m1.formula(), m2.formula());
        if formula1 != formula2 {
            debug!(%formula1, %formula2, "heavy-atom formulas differ");
            return Ok(Score::NoMatch);
        }

        let lower_bound = match bounds::check(m1, m2, &self.config.bounds, threshold) {
            Pruning::Exceeded { bound, value } => {
                debug!(?bound, value, threshold, "lower bound exceeds threshold");
                return Ok(Score::NoMatch);
            }
            Pruning::Within { lower_bound } => lower_bound,
        };

        let variants1 = variants(m1, |e, b| self.candidates(e, b));
        let variants2 = variants(m2, |e, b| self.candidates(e, b));
        debug!(
            first = variants1.len(),
            second = variants2.len(),
            lower_bound,
            "searching edited variants"
        );

        let start = Instant::now();
        let mut best = f64::INFINITY;
        'search: for v1 in &variants1 {
            for v2 in &variants2 {
                if let Some(deadline) = self.config.deadline {
                    if start.elapsed() >= deadline {
                        return Err(MatchError::DeadlineExceeded(deadline));
                    }
                }
                // Variants are sorted by cost, so no later v2 is cheaper.
                let edit_cost = v1.cost + v2.cost;
                if edit_cost >= best || edit_cost > threshold {
                    break;
                }
                if v1.components.len() != v2.components.len() {
                    continue;
                }

                self.stats.record_variant_pair();
                let total = edit_cost + self.mapping_cost(v1, v2);
                trace!(edit1 = ?v1.edit, edit2 = ?v2.edit, total, "compared variants");
                if total < best {
                    best = total;
                    if best <= lower_bound + 1e-9 {
                        break 'search;
                    }
                }
            }
        }

        let score = Score::within(best, threshold);
        debug!(%score, "distance computed");
        Ok(score)
    }

    fn mapping_cost(&self, v1: &Variant, v2: &Variant) -> f64 {
        match (v1.components.as_slice(), v2.components.as_slice()) {
            ([], []) => 0.0,
            ([c1], [c2]) => self.component_cost(c1, c2),
            (cs1, cs2) => {
                let costs: Vec<Vec<f64>> = cs1
                    .iter()
                    .map(|c1| {
                        cs2.iter()
                            .map(|c2| self.component_cost(c1, c2).min(INFEASIBLE))
                            .collect()
                    })
                    .collect();
                let assignment = assignment::solve(&costs);
                if assignment::uses_infeasible(&costs, &assignment) {
                    f64::INFINITY
                } else {
                    assignment::total_cost(&costs, &assignment)
                }
            }
        }
    }

    fn component_cost(&self, c1: &Component, c2: &Component) -> f64 {
        if c1.graph.node_count() != c2.graph.node_count() || c1.formula != c2.formula {
            return f64::INFINITY;
        }
        self.stats.record_isomorphism_search();
        let same_element = |a: &Atom, b: &Atom| a.element() == b.element();

        match self.config.mode {
            MatchingMode::BondDeletionAnyOrder => {
                let mut best = f64::INFINITY;
                let _ = for_each_isomorphism(
                    &c1.graph,
                    &c2.graph,
                    same_element,
                    |_: &Bond, _: &Bond| true,
                    |mapping| {
                        let cost: f64 = c1
                            .graph
                            .edges()
                            .map(|(a, b, bond)| match c2.graph.edge(mapping[a], mapping[b]) {
                                Some(other) => (bond.weight() - other.weight()).abs(),
                                None => bond.weight(),
                            })
                            .sum();
                        best = best.min(cost);
                        if best == 0.0 {
                            ControlFlow::Break(())
                        } else {
                            ControlFlow::Continue(())
                        }
                    },
                );
                best
            }
            MatchingMode::BondDeletionStrict | MatchingMode::ElectronPair => {
                if is_isomorphic(&c1.graph, &c2.graph, same_element, Bond::matches_strict) {
                    0.0
                } else {
                    f64::INFINITY
                }
            }
        }
    }
}

impl Matcher for McesDistance {
    fn compare(&self) -> Result<Score, MatchError> {
        self.score.get_or_try_init(|| self.compute())
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

    const MODES: [MatchingMode; 3] = [
        MatchingMode::BondDeletionStrict,
        MatchingMode::BondDeletionAnyOrder,
        MatchingMode::ElectronPair,
    ];

    fn carbons(n: usize, bonds: &[(usize, usize, Bond)]) -> Molecule {
        Molecule::from_parts(
            (0..n).map(|_| Atom::new(Element::Carbon)),
            bonds.iter().copied(),
        )
    }

    fn ethene() -> Molecule {
        carbons(2, &[(0, 1, Bond::double())])
    }

    fn ethane() -> Molecule {
        carbons(2, &[(0, 1, Bond::single())])
    }

    fn propyne() -> Molecule {
        carbons(3, &[(0, 1, Bond::triple()), (1, 2, Bond::single())])
    }

    fn cyclopropane() -> Molecule {
        carbons(
            3,
            &[
                (0, 1, Bond::single()),
                (1, 2, Bond::single()),
                (2, 0, Bond::single()),
            ],
        )
    }

    fn benzene(kekule_bond: Option<Bond>) -> Molecule {
        let mut bonds: Vec<_> = (0..6).map(|i| (i, (i + 1) % 6, Bond::aromatic())).collect();
        if let Some(bond) = kekule_bond {
            bonds[0].2 = bond;
        }
        Molecule::from_parts(
            (0..6).map(|_| Atom::new(Element::Carbon).with_hydrogens(1)),
            bonds,
        )
    }

    fn distance(m1: &Molecule, m2: &Molecule, mode: MatchingMode, threshold: f64) -> Score {
        let config = MatchConfig {
            mode,
            threshold,
            ..MatchConfig::default()
        };
        McesDistance::with_config(m1, m2, config)
            .unwrap()
            .compare()
            .unwrap()
    }

    #[test]
    fn distance_to_self_is_zero() {
        for mode in MODES {
            for m in [ethene(), propyne(), cyclopropane(), benzene(None)] {
                assert_eq!(distance(&m, &m, mode, DEFAULT_THRESHOLD), Score::Value(0.0));
            }
        }
    }

    #[test]
    fn ethene_and_ethane() {
        let (m1, m2) = (ethene(), ethane());
        assert_eq!(
            distance(&m1, &m2, MatchingMode::BondDeletionAnyOrder, 2.0),
            Score::Value(1.0)
        );
        assert_eq!(
            distance(&m1, &m2, MatchingMode::ElectronPair, 2.0),
            Score::Value(1.0)
        );
        // Strict matching has to delete the bond on both sides.
        assert_eq!(
            distance(&m1, &m2, MatchingMode::BondDeletionStrict, 2.0),
            Score::NoMatch
        );
        assert_eq!(
            distance(&m1, &m2, MatchingMode::BondDeletionStrict, 3.0),
            Score::Value(3.0)
        );
    }

    #[test]
    fn distance_three_is_cut_off_at_threshold_two() {
        let (m1, m2) = (propyne(), cyclopropane());
        let mces = McesDistance::new(&m1, &m2).unwrap();
        assert_eq!(mces.compare().unwrap(), Score::NoMatch);
        assert_eq!(mces.stats().variant_pairs(), 0);
        assert_eq!(mces.lower_bound(), 3.0);
        assert_eq!(
            distance(&m1, &m2, MatchingMode::BondDeletionAnyOrder, 3.0),
            Score::Value(3.0)
        );
    }

    #[test]
    fn kekulized_ring_bond_costs_half_an_electron_pair() {
        let aromatic = benzene(None);
        let kekule = benzene(Some(Bond::double()));
        assert_eq!(
            distance(&aromatic, &kekule, MatchingMode::ElectronPair, 2.0),
            Score::Value(0.5)
        );
    }

    fn butane() -> Molecule {
        carbons(
            4,
            &[
                (0, 1, Bond::single()),
                (1, 2, Bond::single()),
                (2, 3, Bond::single()),
            ],
        )
    }

    /// Two unconnected C2 fragments, the first one bonded by `bond`.
    fn two_fragments(bond: Bond) -> Molecule {
        carbons(4, &[(0, 1, bond), (2, 3, Bond::single())])
    }

    #[test]
    fn split_molecules_pair_components_by_assignment() {
        let (m1, m2) = (butane(), two_fragments(Bond::single()));
        for bounds in [DEFAULT_BOUNDS.to_vec(), vec![]] {
            let config = MatchConfig {
                bounds,
                ..MatchConfig::default()
            };
            let mces = McesDistance::with_config(&m1, &m2, config).unwrap();
            assert_eq!(mces.compare().unwrap(), Score::Value(1.0));
            assert!(mces.stats().variant_pairs() > 0);
        }

        // C-C + C-C against C=C + C-C: one ethane maps for free, the other
        // pays for the bond order.
        let m2 = two_fragments(Bond::double());
        assert_eq!(
            distance(&m1, &m2, MatchingMode::BondDeletionAnyOrder, 2.0),
            Score::Value(2.0)
        );
        assert_eq!(
            distance(&m2, &m1, MatchingMode::BondDeletionAnyOrder, 2.0),
            Score::Value(2.0)
        );
        assert_eq!(
            distance(&m1, &m2, MatchingMode::BondDeletionStrict, 2.0),
            Score::NoMatch
        );
    }

    #[test]
    fn symmetric() {
        for (m1, m2) in [(ethene(), ethane()), (propyne(), cyclopropane())] {
            for mode in MODES {
                assert_eq!(
                    distance(&m1, &m2, mode, 3.0),
                    distance(&m2, &m1, mode, 3.0),
                    "{mode:?}"
                );
            }
        }
    }

    #[test]
    fn bounds_only_affect_speed() {
        for (m1, m2) in [(ethene(), ethane()), (propyne(), cyclopropane())] {
            let config = MatchConfig {
                threshold: 3.0,
                bounds: vec![],
                ..MatchConfig::default()
            };
            let unbounded = McesDistance::with_config(&m1, &m2, config).unwrap();
            assert_eq!(
                unbounded.compare().unwrap(),
                distance(&m1, &m2, MatchingMode::BondDeletionAnyOrder, 3.0)
            );
        }
    }

    #[test]
    fn differing_heavy_atoms_never_match() {
        let ethanol = Molecule::from_parts(
            [
                Atom::new(Element::Carbon),
                Atom::new(Element::Carbon),
                Atom::new(Element::Oxygen),
            ],
            [(0, 1, Bond::single()), (1, 2, Bond::single())],
        );
        let mces = McesDistance::new(&ethane(), &ethanol).unwrap();
        assert_eq!(mces.compare().unwrap(), Score::NoMatch);
        assert_eq!(mces.stats().isomorphism_searches(), 0);
    }

    #[test]
    fn score_is_computed_once() {
        let mces = McesDistance::new(&propyne(), &propyne()).unwrap();
        let score = mces.compare().unwrap();
        let searches = mces.stats().isomorphism_searches();
        assert!(searches > 0);
        assert_eq!(mces.compare().unwrap(), score);
        assert_eq!(mces.score().unwrap(), score);
        assert_eq!(mces.stats().isomorphism_searches(), searches);
    }

    #[test]
    fn deadline_is_a_hard_failure() {
        let config = MatchConfig {
            deadline: Some(Duration::ZERO),
            ..MatchConfig::default()
        };
        let mces = McesDistance::with_config(&ethene(), &ethane(), config).unwrap();
        assert!(matches!(
            mces.compare(),
            Err(MatchError::DeadlineExceeded(_))
        ));
        assert_eq!(mces.cached_score(), None);
    }

    #[test]
    fn inputs_are_normalised_not_reduced() {
        let mces = McesDistance::new(&ethene(), &ethane()).unwrap();
        assert_eq!(mces.first_molecule().formula().to_string(), "C2H4");
        assert_eq!(mces.second_molecule().formula().to_string(), "C2H6");
    }
}

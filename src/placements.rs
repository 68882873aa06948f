//! Side-chain placement distance.
//!
//! Two molecules are assumed to share a core decorated with the same side
//! chains in possibly different positions. Cutting the side chains off both
//! molecules leaves cores with wildcard atoms where the chains were. If the
//! cores are isomorphic, every isomorphism carries each wildcard of the
//! first core onto a wildcard of the second; relocating a side chain costs
//! the shortest-path distance, in the second core, between its position and
//! where it has to go. The score is the cheapest relocation over all
//! isomorphisms, with chains of each kind paired by minimum-cost assignment.

use std::{collections::BTreeSet, ops::ControlFlow};

use petgraph::graph::NodeIndex;
use tracing::{debug, trace};

use crate::{
    assignment::{self, INFEASIBLE},
    edits::EditedView,
    matcher::{prepare_pair, MatchError, Matcher, Score, ScoreCell, SearchStats},
    molecule::{Atom, Bond, Molecule},
    sidechain::{remove_side_chains, SideChain},
    toolkit::{BasicToolkit, Toolkit},
    vf2::for_each_isomorphism,
};

/// Minimum weighted placement comparator.
#[derive(Debug)]
pub struct MinimalWeightedPlacements {
    first: Molecule,
    second: Molecule,
    catalog: Vec<SideChain>,
    score: ScoreCell,
    stats: SearchStats,
}

impl MinimalWeightedPlacements {
    pub fn new(m1: &Molecule, m2: &Molecule, catalog: &[SideChain]) -> Result<Self, MatchError> {
        Self::with_toolkit(&BasicToolkit, m1, m2, catalog)
    }

    pub fn with_toolkit(
        toolkit: &dyn Toolkit,
        m1: &Molecule,
        m2: &Molecule,
        catalog: &[SideChain],
    ) -> Result<Self, MatchError> {
        if m1.is_empty() {
            return Err(MatchError::EmptyMolecule("first"));
        }
        if m2.is_empty() {
            return Err(MatchError::EmptyMolecule("second"));
        }
        if catalog.is_empty() {
            return Err(MatchError::EmptyCatalog);
        }
        let (first, second) = prepare_pair(toolkit, m1, m2)?;
        Ok(Self {
            first,
            second,
            catalog: catalog.to_vec(),
            score: ScoreCell::default(),
            stats: SearchStats::default(),
        })
    }

    pub fn catalog(&self) -> &[SideChain] {
        &self.catalog
    }

    fn compute(&self) -> Score {
        let (formula1, formula2) = (self.first.formula(), self.second.formula());
        if formula1 != formula2 {
            debug!(%formula1, %formula2, "formulas differ");
            return Score::NoMatch;
        }

        let core1 = remove_side_chains(&self.first, &self.catalog);
        let core2 = remove_side_chains(&self.second, &self.catalog);
        if let Some(chain) = (0..self.catalog.len()).find(|&i| core1.counts[i] != core2.counts[i]) {
            debug!(
                chain,
                first = core1.counts[chain],
                second = core2.counts[chain],
                "side chain occurs a different number of times"
            );
            return Score::NoMatch;
        }

        // Distinct images of the first core's wildcards.
        let g1 = EditedView::new(&core1.molecule, None).to_labeled_graph();
        let g2 = EditedView::new(&core2.molecule, None).to_labeled_graph();
        let mut images: BTreeSet<Vec<usize>> = BTreeSet::new();
        self.stats.record_isomorphism_search();
        let _ = for_each_isomorphism(
            &g1,
            &g2,
            |a: &Atom, b: &Atom| a.same_symbol_and_charge(b),
            Bond::matches_strict,
            |mapping| {
                images.insert(
                    core1
                        .placements
                        .iter()
                        .map(|(ix, _)| mapping[ix.index()])
                        .collect(),
                );
                ControlFlow::Continue(())
            },
        );
        if images.is_empty() {
            debug!("cores are not isomorphic");
            return Score::NoMatch;
        }
        if core1.placements.is_empty() {
            return Score::Value(0.0);
        }

        let distances: Vec<_> = core2
            .placements
            .iter()
            .map(|&(ix, _)| core2.molecule.distances_from(ix))
            .collect();

        let mut best = f64::INFINITY;
        for image in &images {
            let costs: Vec<Vec<f64>> = core1
                .placements
                .iter()
                .zip(image)
                .map(|(&(_, chain1), &target)| {
                    core2
                        .placements
                        .iter()
                        .zip(&distances)
                        .map(|(&(_, chain2), from)| {
                            if chain1 != chain2 {
                                return INFEASIBLE;
                            }
                            from.get(&NodeIndex::new(target))
                                .map_or(INFEASIBLE, |&d| d as f64)
                        })
                        .collect()
                })
                .collect();
            let assignment = assignment::solve(&costs);
            if assignment::uses_infeasible(&costs, &assignment) {
                continue;
            }
            let cost = assignment::total_cost(&costs, &assignment);
            trace!(?image, cost, "placement cost");
            best = best.min(cost);
        }

        let score = Score::from(best);
        debug!(%score, placements = core1.placements.len(), "placement distance");
        score
    }
}

impl Matcher for MinimalWeightedPlacements {
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

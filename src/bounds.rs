//! Lower bounds on the bond-edit distance between two molecules.
//!
//! Each bound compares the molecules atom type by atom type without any
//! isomorphism search, and never exceeds the true distance: every unit of
//! bond weight that differs around some atom must be paid by an edit, and
//! each edit touches two atoms (hence the halving). If a bound already
//! exceeds the distance threshold the search can be skipped, and once the
//! search has found a distance equal to the largest bound it can stop.

use std::{collections::BTreeMap, time::Instant};

use clap::ValueEnum;
use petgraph::{graph::NodeIndex, visit::EdgeRef};
use tracing::trace;

use crate::{
    assignment,
    molecule::{Element, Index, Molecule},
};

/// Type of lower bound on the distance between two molecules.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum Bound {
    /// Per element, pair atoms sorted by their number of bonds and sum the
    /// differences; atoms left over pay their full degree. Weaker than
    /// `WeightedDegree` and therefore off by default.
    Degree,
    /// Like `Degree`, but counts bond weights (single 1, double 2, aromatic
    /// 1.5, ...) instead of bonds.
    WeightedDegree,
    /// Per element, pair atoms by a minimum-cost assignment where the cost
    /// of pairing two atoms compares their incident bond weights grouped by
    /// the neighbouring element.
    Neighborhood,
}

/// The bounds applied unless configured otherwise, in evaluation order.
pub const DEFAULT_BOUNDS: [Bound; 2] = [Bound::WeightedDegree, Bound::Neighborhood];

impl Bound {
    pub fn evaluate(self, m1: &Molecule, m2: &Molecule) -> f64 {
        match self {
            Bound::Degree => degree_bound(m1, m2),
            Bound::WeightedDegree => weighted_degree_bound(m1, m2),
            Bound::Neighborhood => neighborhood_bound(m1, m2),
        }
    }
}

/// Outcome of running the configured bounds before a search.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Pruning {
    /// `bound` evaluated to `value`, which is above the threshold.
    Exceeded { bound: Bound, value: f64 },
    /// Every bound stayed within the threshold; `lower_bound` is the largest.
    Within { lower_bound: f64 },
}

/// Evaluate `bounds` in order, stopping at the first one above `threshold`.
pub fn check(m1: &Molecule, m2: &Molecule, bounds: &[Bound], threshold: f64) -> Pruning {
    let mut lower_bound = 0.0_f64;
    for &bound in bounds {
        let start = Instant::now();
        let value = bound.evaluate(m1, m2);
        trace!(?bound, value, elapsed = ?start.elapsed(), "evaluated bound");
        if value > threshold {
            return Pruning::Exceeded { bound, value };
        }
        lower_bound = lower_bound.max(value);
    }
    Pruning::Within { lower_bound }
}

/// The largest of `bounds`, or 0 if there are none.
pub fn lower_bound(m1: &Molecule, m2: &Molecule, bounds: &[Bound]) -> f64 {
    bounds
        .iter()
        .map(|bound| bound.evaluate(m1, m2))
        .fold(0.0, f64::max)
}

fn atoms_by_element(m: &Molecule) -> BTreeMap<Element, Vec<NodeIndex<Index>>> {
    let mut groups: BTreeMap<_, Vec<_>> = BTreeMap::new();
    for ix in m.graph().node_indices() {
        groups.entry(m.atom(ix).element()).or_default().push(ix);
    }
    groups
}

/// Pair the largest values of each side with each other and sum the
/// differences. Values without a partner count in full.
fn matched_difference(mut first: Vec<f64>, mut second: Vec<f64>) -> f64 {
    first.sort_by(|a, b| b.total_cmp(a));
    second.sort_by(|a, b| b.total_cmp(a));
    let paired: f64 = first.iter().zip(&second).map(|(a, b)| (a - b).abs()).sum();
    let common = first.len().min(second.len());
    let surplus: f64 = first[common..].iter().chain(&second[common..]).sum();
    paired + surplus
}

/// Sum over elements of [`matched_difference`] on a per-atom quantity.
fn per_element_difference<F>(m1: &Molecule, m2: &Molecule, measure: F) -> f64
where
    F: Fn(&Molecule, NodeIndex<Index>) -> f64,
{
    let groups1 = atoms_by_element(m1);
    let groups2 = atoms_by_element(m2);
    let mut elements: Vec<_> = groups1.keys().chain(groups2.keys()).copied().collect();
    elements.sort();
    elements.dedup();

    elements
        .into_iter()
        .map(|element| {
            let values = |m: &Molecule, groups: &BTreeMap<Element, Vec<NodeIndex<Index>>>| {
                groups
                    .get(&element)
                    .map(|atoms| atoms.iter().map(|&ix| measure(m, ix)).collect::<Vec<f64>>())
                    .unwrap_or_default()
            };
            matched_difference(values(m1, &groups1), values(m2, &groups2))
        })
        .sum()
}

pub fn degree_bound(m1: &Molecule, m2: &Molecule) -> f64 {
    per_element_difference(m1, m2, |m, ix| m.graph().edges(ix).count() as f64) / 2.0
}

pub fn weighted_degree_bound(m1: &Molecule, m2: &Molecule) -> f64 {
    per_element_difference(m1, m2, Molecule::weighted_degree) / 2.0
}

pub fn neighborhood_bound(m1: &Molecule, m2: &Molecule) -> f64 {
    let groups1 = atoms_by_element(m1);
    let groups2 = atoms_by_element(m2);

    let mut score = 0.0;
    for (element, atoms1) in &groups1 {
        let Some(atoms2) = groups2.get(element) else {
            score += atoms1.iter().map(|&a| m1.weighted_degree(a)).sum::<f64>();
            continue;
        };

        // Pad the smaller side with bondless pseudo-atoms.
        let n = atoms1.len().max(atoms2.len());
        let costs: Vec<Vec<f64>> = (0..n)
            .map(|i| {
                (0..n)
                    .map(|j| match (atoms1.get(i), atoms2.get(j)) {
                        (Some(&a), Some(&b)) => edge_mapping_cost(m1, a, m2, b),
                        (Some(&a), None) => m1.weighted_degree(a),
                        (None, Some(&b)) => m2.weighted_degree(b),
                        (None, None) => 0.0,
                    })
                    .collect()
            })
            .collect();
        let assignment = assignment::solve(&costs);
        score += assignment::total_cost(&costs, &assignment);
    }
    for (element, atoms2) in &groups2 {
        if !groups1.contains_key(element) {
            score += atoms2.iter().map(|&b| m2.weighted_degree(b)).sum::<f64>();
        }
    }

    score / 2.0
}

/// Cheapest way to map the bonds around `a` onto the bonds around `b` when
/// bonds may only map to bonds reaching the same element.
fn edge_mapping_cost(
    m1: &Molecule,
    a: NodeIndex<Index>,
    m2: &Molecule,
    b: NodeIndex<Index>,
) -> f64 {
    let incident = |m: &Molecule, ix: NodeIndex<Index>| {
        let mut groups: BTreeMap<Element, Vec<f64>> = BTreeMap::new();
        for edge in m.graph().edges(ix) {
            let other = if edge.source() == ix { edge.target() } else { edge.source() };
            groups
                .entry(m.atom(other).element())
                .or_default()
                .push(edge.weight().weight());
        }
        groups
    };
    let mut around2 = incident(m2, b);

    let mut cost = 0.0;
    for (element, weights1) in incident(m1, a) {
        let weights2 = around2.remove(&element).unwrap_or_default();
        cost += matched_difference(weights1, weights2);
    }
    cost + around2.values().flatten().sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::molecule::{Atom, Bond};

    fn carbons(bonds: &[(usize, usize, Bond)], n: usize) -> Molecule {
        Molecule::from_parts(
            (0..n).map(|_| Atom::new(Element::Carbon)),
            bonds.iter().copied(),
        )
    }

    fn ethene() -> Molecule {
        carbons(&[(0, 1, Bond::double())], 2)
    }

    fn ethane() -> Molecule {
        carbons(&[(0, 1, Bond::single())], 2)
    }

    fn propyne() -> Molecule {
        carbons(&[(0, 1, Bond::triple()), (1, 2, Bond::single())], 3)
    }

    fn cyclopropane() -> Molecule {
        carbons(
            &[
                (0, 1, Bond::single()),
                (1, 2, Bond::single()),
                (2, 0, Bond::single()),
            ],
            3,
        )
    }

    #[test]
    fn identical_molecules_have_zero_bounds() {
        for bound in [Bound::Degree, Bound::WeightedDegree, Bound::Neighborhood] {
            assert_eq!(bound.evaluate(&propyne(), &propyne()), 0.0);
        }
    }

    #[test]
    fn one_bond_order_apart() {
        assert_eq!(weighted_degree_bound(&ethene(), &ethane()), 1.0);
        assert_eq!(neighborhood_bound(&ethene(), &ethane()), 1.0);
        assert_eq!(degree_bound(&ethene(), &ethane()), 0.0);
    }

    #[test]
    fn neighborhood_is_tighter_than_weighted_degree() {
        assert_eq!(weighted_degree_bound(&propyne(), &cyclopropane()), 2.0);
        assert_eq!(neighborhood_bound(&propyne(), &cyclopropane()), 3.0);
        assert_eq!(neighborhood_bound(&cyclopropane(), &propyne()), 3.0);
    }

    #[test]
    fn elements_missing_on_one_side() {
        let co = Molecule::from_parts(
            [Atom::new(Element::Carbon), Atom::new(Element::Oxygen)],
            [(0, 1, Bond::single())],
        );
        let cn = Molecule::from_parts(
            [Atom::new(Element::Carbon), Atom::new(Element::Nitrogen)],
            [(0, 1, Bond::single())],
        );
        assert_eq!(weighted_degree_bound(&co, &cn), 1.0);
        assert_eq!(neighborhood_bound(&co, &cn), 2.0);
    }

    #[test]
    fn check_stops_at_first_exceeded_bound() {
        assert_eq!(
            check(&propyne(), &cyclopropane(), &DEFAULT_BOUNDS, 2.0),
            Pruning::Exceeded {
                bound: Bound::Neighborhood,
                value: 3.0
            }
        );
        assert_eq!(
            check(&ethene(), &ethane(), &DEFAULT_BOUNDS, 2.0),
            Pruning::Within { lower_bound: 1.0 }
        );
        assert_eq!(
            check(&propyne(), &cyclopropane(), &[], 2.0),
            Pruning::Within { lower_bound: 0.0 }
        );
    }

    #[test]
    fn lower_bound_is_the_largest() {
        assert_eq!(lower_bound(&propyne(), &cyclopropane(), &DEFAULT_BOUNDS), 3.0);
        assert_eq!(lower_bound(&propyne(), &cyclopropane(), &[]), 0.0);
    }
}

//! Minimum-cost perfect matching on square cost matrices.
//!
//! Every comparator that pairs things up (components, atoms of one element,
//! side-chain placements) goes through [`solve`], which hands the matrix to
//! the Hungarian method of the `munkres` crate. Pairs that must not be
//! matched are priced at [`INFEASIBLE`] rather than infinity, since the
//! solver only accepts finite weights; callers check the chosen entries
//! against the sentinel afterwards.

use munkres::{solve_assignment, WeightMatrix};

/// Finite stand-in for an impossible pairing.
pub const INFEASIBLE: f64 = 1.0e9;

/// Return `assignment` with `assignment[i] = j` minimising the summed
/// `costs[i][j]` over all rows.
///
/// # Panics
///
/// Panics if `costs` is not square or holds a negative or non-finite entry.
pub fn solve(costs: &[Vec<f64>]) -> Vec<usize> {
    let n = costs.len();
    assert!(
        costs.iter().all(|row| row.len() == n),
        "cost matrix must be square"
    );
    assert!(
        costs.iter().flatten().all(|c| c.is_finite() && *c >= 0.0),
        "costs must be finite and non-negative"
    );
    if n == 0 {
        return Vec::new();
    }

    let mut weights = WeightMatrix::from_fn(n, |(i, j)| costs[i][j]);
    // Only non-finite weights make a matrix unsolvable.
    let positions = match solve_assignment(&mut weights) {
        Ok(positions) => positions,
        Err(_) => unreachable!("finite cost matrix rejected"),
    };

    let mut assignment = vec![0; n];
    for position in positions {
        assignment[position.row] = position.column;
    }
    assignment
}

/// Sum of the entries an assignment selects.
pub fn total_cost(costs: &[Vec<f64>], assignment: &[usize]) -> f64 {
    assignment
        .iter()
        .enumerate()
        .map(|(i, &j)| costs[i][j])
        .sum()
}

/// Return `true` iff the assignment picks at least one [`INFEASIBLE`] pair.
pub fn uses_infeasible(costs: &[Vec<f64>], assignment: &[usize]) -> bool {
    assignment
        .iter()
        .enumerate()
        .any(|(i, &j)| costs[i][j] >= INFEASIBLE)
}

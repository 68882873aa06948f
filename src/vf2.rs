//! Graph isomorphism by VF2-style state-space search.
//!
//! Nodes of the first graph are mapped one at a time in a breadth-first
//! order, so every node except a component root already has a mapped
//! neighbour and its candidates are limited to the unmapped neighbours of
//! that neighbour's image. A candidate pair must pass the semantic rule
//! (node labels match), the degree rule, and the core rule (edges to mapped
//! nodes exist on both sides with matching labels, and there are no extra
//! ones). Disconnected graphs are searched by restarting the order at each
//! component root.

use std::{collections::VecDeque, ops::ControlFlow};

/// Adjacency-list graph with node and edge labels, indexed from zero.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledGraph<N, E> {
    labels: Vec<N>,
    adjacency: Vec<Vec<(usize, E)>>,
    edge_count: usize,
}

impl<N, E: Copy> LabeledGraph<N, E> {
    pub fn new(labels: Vec<N>) -> Self {
        let adjacency = labels.iter().map(|_| Vec::new()).collect();
        Self {
            labels,
            adjacency,
            edge_count: 0,
        }
    }

    pub fn add_edge(&mut self, a: usize, b: usize, label: E) {
        self.adjacency[a].push((b, label));
        self.adjacency[b].push((a, label));
        self.edge_count += 1;
    }

    pub fn node_count(&self) -> usize {
        self.labels.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn labels(&self) -> &[N] {
        &self.labels
    }

    pub fn label(&self, n: usize) -> &N {
        &self.labels[n]
    }

    pub fn degree(&self, n: usize) -> usize {
        self.adjacency[n].len()
    }

    pub fn neighbors(&self, n: usize) -> &[(usize, E)] {
        &self.adjacency[n]
    }

    pub fn edge(&self, a: usize, b: usize) -> Option<E> {
        self.adjacency[a]
            .iter()
            .find(|(m, _)| *m == b)
            .map(|(_, label)| *label)
    }

    /// Every edge once, as `(a, b, label)` with `a < b`.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, E)> + '_ {
        self.adjacency.iter().enumerate().flat_map(|(a, adjacent)| {
            adjacent
                .iter()
                .filter(move |(b, _)| a < *b)
                .map(move |&(b, label)| (a, b, label))
        })
    }

    fn sorted_degrees(&self) -> Vec<usize> {
        let mut degrees: Vec<_> = self.adjacency.iter().map(Vec::len).collect();
        degrees.sort_unstable();
        degrees
    }
}

/// Breadth-first order over every component, roots in index order.
fn search_order<N, E: Copy>(g: &LabeledGraph<N, E>) -> Vec<usize> {
    let mut order = Vec::with_capacity(g.node_count());
    let mut seen = vec![false; g.node_count()];
    for root in 0..g.node_count() {
        if seen[root] {
            continue;
        }
        seen[root] = true;
        let mut queue = VecDeque::from([root]);
        while let Some(n) = queue.pop_front() {
            order.push(n);
            for &(m, _) in g.neighbors(n) {
                if !seen[m] {
                    seen[m] = true;
                    queue.push_back(m);
                }
            }
        }
    }
    order
}

struct Vf2State<'a, N, E, NM, EM> {
    first: &'a LabeledGraph<N, E>,
    second: &'a LabeledGraph<N, E>,
    node_match: NM,
    edge_match: EM,
    order: Vec<usize>,
    first_map: Vec<Option<usize>>,
    second_map: Vec<Option<usize>>,
    depth: usize,
}

impl<'a, N, E, NM, EM> Vf2State<'a, N, E, NM, EM>
where
    E: Copy,
    NM: Fn(&N, &N) -> bool,
    EM: Fn(&E, &E) -> bool,
{
    fn new(
        first: &'a LabeledGraph<N, E>,
        second: &'a LabeledGraph<N, E>,
        node_match: NM,
        edge_match: EM,
    ) -> Self {
        Vf2State {
            order: search_order(first),
            first_map: vec![None; first.node_count()],
            second_map: vec![None; second.node_count()],
            depth: 0,
            first,
            second,
            node_match,
            edge_match,
        }
    }

    fn generate_pairs(&self) -> Vec<(usize, usize)> {
        let u = self.order[self.depth];
        let anchor = self
            .first
            .neighbors(u)
            .iter()
            .find_map(|&(w, _)| self.first_map[w]);
        match anchor {
            Some(image) => self
                .second
                .neighbors(image)
                .iter()
                .filter(|(v, _)| self.second_map[*v].is_none())
                .map(|&(v, _)| (u, v))
                .collect(),
            None => (0..self.second.node_count())
                .filter(|&v| self.second_map[v].is_none())
                .map(|v| (u, v))
                .collect(),
        }
    }

    fn is_consistent(&self, u: usize, v: usize) -> bool {
        self.semantic_rule(u, v) && self.degree_rule(u, v) && self.core_rule(u, v)
    }

    fn semantic_rule(&self, u: usize, v: usize) -> bool {
        (self.node_match)(self.first.label(u), self.second.label(v))
    }

    fn degree_rule(&self, u: usize, v: usize) -> bool {
        self.first.degree(u) == self.second.degree(v)
    }

    fn core_rule(&self, u: usize, v: usize) -> bool {
        let mut mapped = 0;
        for &(w, label) in self.first.neighbors(u) {
            let Some(image) = self.first_map[w] else {
                continue;
            };
            match self.second.edge(v, image) {
                Some(other) if (self.edge_match)(&label, &other) => mapped += 1,
                _ => return false,
            }
        }
        let mapped_in_second = self
            .second
            .neighbors(v)
            .iter()
            .filter(|(x, _)| self.second_map[*x].is_some())
            .count();
        mapped == mapped_in_second
    }

    fn push_mapping(&mut self, u: usize, v: usize) {
        self.first_map[u] = Some(v);
        self.second_map[v] = Some(u);
        self.depth += 1;
    }

    fn pop_mapping(&mut self, u: usize, v: usize) {
        self.first_map[u] = None;
        self.second_map[v] = None;
        self.depth -= 1;
    }

    fn visit<F>(&mut self, found: &mut F) -> ControlFlow<()>
    where
        F: FnMut(&[usize]) -> ControlFlow<()>,
    {
        if self.depth == self.order.len() {
            let mapping: Vec<usize> = self.first_map.iter().flatten().copied().collect();
            return found(&mapping);
        }
        for (u, v) in self.generate_pairs() {
            if self.is_consistent(u, v) {
                self.push_mapping(u, v);
                let flow = self.visit(found);
                self.pop_mapping(u, v);
                if flow.is_break() {
                    return flow;
                }
            }
        }
        ControlFlow::Continue(())
    }
}

/// Call `found` with every isomorphism from `first` onto `second`, given as
/// `mapping[node of first] = node of second`, until it returns `Break`.
pub fn for_each_isomorphism<N, E, NM, EM, F>(
    first: &LabeledGraph<N, E>,
    second: &LabeledGraph<N, E>,
    node_match: NM,
    edge_match: EM,
    mut found: F,
) -> ControlFlow<()>
where
    E: Copy,
    NM: Fn(&N, &N) -> bool,
    EM: Fn(&E, &E) -> bool,
    F: FnMut(&[usize]) -> ControlFlow<()>,
{
    if first.node_count() != second.node_count()
        || first.edge_count() != second.edge_count()
        || first.sorted_degrees() != second.sorted_degrees()
    {
        return ControlFlow::Continue(());
    }
    Vf2State::new(first, second, node_match, edge_match).visit(&mut found)
}

/// Return `true` iff at least one isomorphism exists.
pub fn is_isomorphic<N, E, NM, EM>(
    first: &LabeledGraph<N, E>,
    second: &LabeledGraph<N, E>,
    node_match: NM,
    edge_match: EM,
) -> bool
where
    E: Copy,
    NM: Fn(&N, &N) -> bool,
    EM: Fn(&E, &E) -> bool,
{
    for_each_isomorphism(first, second, node_match, edge_match, |_| ControlFlow::Break(()))
        .is_break()
}

/// Collect all isomorphisms.
pub fn isomorphisms<N, E, NM, EM>(
    first: &LabeledGraph<N, E>,
    second: &LabeledGraph<N, E>,
    node_match: NM,
    edge_match: EM,
) -> Vec<Vec<usize>>
where
    E: Copy,
    NM: Fn(&N, &N) -> bool,
    EM: Fn(&E, &E) -> bool,
{
    let mut all = Vec::new();
    let _ = for_each_isomorphism(first, second, node_match, edge_match, |mapping| {
        all.push(mapping.to_vec());
        ControlFlow::Continue(())
    });
    all
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unlabeled(n: usize, edges: &[(usize, usize)]) -> LabeledGraph<(), ()> {
        let mut g = LabeledGraph::new(vec![(); n]);
        for &(a, b) in edges {
            g.add_edge(a, b, ());
        }
        g
    }

    fn any<T>(_: &T, _: &T) -> bool {
        true
    }

    #[test]
    fn hexagon_has_twelve_automorphisms() {
        let ring: Vec<_> = (0..6).map(|i| (i, (i + 1) % 6)).collect();
        let g = unlabeled(6, &ring);
        let all = isomorphisms(&g, &g, any, any);
        assert_eq!(all.len(), 12);
        for mapping in &all {
            for (a, b, _) in g.edges() {
                assert!(g.edge(mapping[a], mapping[b]).is_some());
            }
        }
    }

    #[test]
    fn two_triangles_are_not_a_hexagon() {
        let ring: Vec<_> = (0..6).map(|i| (i, (i + 1) % 6)).collect();
        let hexagon = unlabeled(6, &ring);
        let triangles = unlabeled(6, &[(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3)]);
        assert!(!is_isomorphic(&hexagon, &triangles, any, any));
        assert!(!is_isomorphic(&triangles, &hexagon, any, any));
    }

    #[test]
    fn path_is_not_a_star() {
        let path = unlabeled(4, &[(0, 1), (1, 2), (2, 3)]);
        let star = unlabeled(4, &[(0, 1), (0, 2), (0, 3)]);
        assert!(!is_isomorphic(&path, &star, any, any));
    }

    #[test]
    fn disconnected_graphs() {
        let first = unlabeled(4, &[(0, 1), (2, 3)]);
        let second = unlabeled(4, &[(0, 3), (1, 2)]);
        assert_eq!(isomorphisms(&first, &second, any, any).len(), 8);
    }

    #[test]
    fn labels_constrain_mappings() {
        let mut first = LabeledGraph::new(vec!['C', 'C', 'O']);
        first.add_edge(0, 1, 1u8);
        first.add_edge(1, 2, 2u8);
        let mut second = LabeledGraph::new(vec!['O', 'C', 'C']);
        second.add_edge(0, 1, 2u8);
        second.add_edge(1, 2, 1u8);

        let eq = |a: &char, b: &char| a == b;
        let strict = |a: &u8, b: &u8| a == b;
        let all = isomorphisms(&first, &second, eq, strict);
        assert_eq!(all, vec![vec![2, 1, 0]]);

        let mut swapped = LabeledGraph::new(vec!['O', 'C', 'C']);
        swapped.add_edge(0, 1, 1u8);
        swapped.add_edge(1, 2, 2u8);
        assert!(!is_isomorphic(&first, &swapped, eq, strict));
        assert!(is_isomorphic(&first, &swapped, eq, |_: &u8, _: &u8| true));
    }

    #[test]
    fn empty_graphs_match_once() {
        let empty: LabeledGraph<(), ()> = LabeledGraph::new(vec![]);
        assert_eq!(isomorphisms(&empty, &empty, any, any), vec![Vec::<usize>::new()]);
    }
}

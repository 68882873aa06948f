use std::collections::VecDeque;

use bit_set::BitSet;
use petgraph::{
    graph::{EdgeIndex, Graph, IndexType, NodeIndex},
    visit::EdgeRef,
    EdgeType,
};

/// Partition `nodes` into connected components, walking only edges accepted
/// by `edge_alive` whose endpoints both lie in `nodes`. Components are
/// returned in order of their lowest node index.
pub fn components_under<N, E, Ty, Ix>(
    g: &Graph<N, E, Ty, Ix>,
    nodes: &BitSet,
    mut edge_alive: impl FnMut(EdgeIndex<Ix>) -> bool,
) -> Vec<BitSet>
where
    Ty: EdgeType,
    Ix: IndexType,
{
    let mut seen = BitSet::with_capacity(g.node_count());
    let mut components = Vec::new();
    for start in nodes.iter() {
        if !seen.insert(start) {
            continue;
        }
        let mut component = BitSet::with_capacity(g.node_count());
        component.insert(start);
        let mut queue = VecDeque::from([NodeIndex::<Ix>::new(start)]);
        while let Some(n) = queue.pop_front() {
            for edge in g.edges(n) {
                let other = if edge.source() == n {
                    edge.target()
                } else {
                    edge.source()
                };
                if nodes.contains(other.index())
                    && edge_alive(edge.id())
                    && seen.insert(other.index())
                {
                    component.insert(other.index());
                    queue.push_back(other);
                }
            }
        }
        components.push(component);
    }
    components
}

/// Visit every node breadth-first, starting a new search at the lowest
/// unvisited index whenever a component is exhausted.
pub fn breadth_first_order<N, E, Ty, Ix>(g: &Graph<N, E, Ty, Ix>) -> Vec<NodeIndex<Ix>>
where
    Ty: EdgeType,
    Ix: IndexType,
{
    let mut seen = BitSet::with_capacity(g.node_count());
    let mut order = Vec::with_capacity(g.node_count());
    for root in g.node_indices() {
        if !seen.insert(root.index()) {
            continue;
        }
        let mut queue = VecDeque::from([root]);
        while let Some(n) = queue.pop_front() {
            order.push(n);
            for other in g.neighbors(n) {
                if seen.insert(other.index()) {
                    queue.push_back(other);
                }
            }
        }
    }
    order
}

/// Return `true` iff `to` can be reached from `from` without crossing `skip`.
pub fn connected_without<N, E, Ty, Ix>(
    g: &Graph<N, E, Ty, Ix>,
    from: NodeIndex<Ix>,
    to: NodeIndex<Ix>,
    skip: EdgeIndex<Ix>,
) -> bool
where
    Ty: EdgeType,
    Ix: IndexType,
{
    let mut seen = BitSet::with_capacity(g.node_count());
    seen.insert(from.index());
    let mut queue = VecDeque::from([from]);
    while let Some(n) = queue.pop_front() {
        if n == to {
            return true;
        }
        for edge in g.edges(n) {
            if edge.id() == skip {
                continue;
            }
            let other = if edge.source() == n {
                edge.target()
            } else {
                edge.source()
            };
            if seen.insert(other.index()) {
                queue.push_back(other);
            }
        }
    }
    false
}

/// Return the subgraph induced by the nodes in `keep`. Kept nodes are
/// renumbered in their original order.
pub fn node_induced_subgraph<N, E, Ty, Ix>(
    g: &Graph<N, E, Ty, Ix>,
    keep: &BitSet,
) -> Graph<N, E, Ty, Ix>
where
    N: Clone,
    E: Clone,
    Ty: EdgeType,
    Ix: IndexType,
{
    g.filter_map(
        |ix, weight| keep.contains(ix.index()).then(|| weight.clone()),
        |_, weight| Some(weight.clone()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use petgraph::Undirected;

    fn path(n: usize) -> Graph<(), (), Undirected> {
        let mut g = Graph::new_undirected();
        let nodes: Vec<_> = (0..n).map(|_| g.add_node(())).collect();
        for pair in nodes.windows(2) {
            g.add_edge(pair[0], pair[1], ());
        }
        g
    }

    #[test]
    fn components_respect_dead_edges() {
        let g = path(4);
        let all: BitSet = (0..4).collect();
        assert_eq!(components_under(&g, &all, |_| true).len(), 1);
        let split = components_under(&g, &all, |e| e.index() != 1);
        assert_eq!(split.len(), 2);
        assert_eq!(split[0].iter().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(split[1].iter().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn components_respect_node_subset() {
        let g = path(5);
        let subset: BitSet = [0, 1, 3, 4].into_iter().collect();
        assert_eq!(components_under(&g, &subset, |_| true).len(), 2);
    }

    #[test]
    fn breadth_first_covers_every_component() {
        let mut g = path(3);
        let lone = g.add_node(());
        let order = breadth_first_order(&g);
        assert_eq!(order.len(), 4);
        assert_eq!(order[0], NodeIndex::new(0));
        assert_eq!(order[3], lone);
    }

    #[test]
    fn ring_bonds_are_not_bridges() {
        let mut g = path(3);
        let closing = g.add_edge(NodeIndex::new(2), NodeIndex::new(0), ());
        assert!(connected_without(&g, NodeIndex::new(2), NodeIndex::new(0), closing));
        let tail = g.add_node(());
        let bridge = g.add_edge(NodeIndex::new(0), tail, ());
        assert!(!connected_without(&g, NodeIndex::new(0), tail, bridge));
    }

    #[test]
    fn induced_subgraph_drops_dangling_edges() {
        let g = path(4);
        let keep: BitSet = [0, 1, 3].into_iter().collect();
        let h = node_induced_subgraph(&g, &keep);
        assert_eq!(h.node_count(), 3);
        assert_eq!(h.edge_count(), 1);
    }
}

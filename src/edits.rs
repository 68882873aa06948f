//! Bond edits as diffs over a shared base molecule.
//!
//! An edited variant never copies its molecule. It records the single bond
//! that changes (removed, or given a new label) and is read through an
//! [`EditedView`]. Variants are identified by the partition of the edited
//! molecule into connected components: two edits that produce the same
//! partition are one variant, priced at the cheaper of the two edits.

use std::collections::{btree_map::Entry, BTreeMap};

use bit_set::BitSet;
use petgraph::{
    graph::{EdgeIndex, NodeIndex},
    visit::EdgeRef,
};

use crate::{
    molecule::{Atom, Bond, Formula, Index, Molecule},
    utils::components_under,
    vf2::LabeledGraph,
};

/// A change to one bond of a base molecule.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Edit {
    Remove(EdgeIndex<Index>),
    Relabel(EdgeIndex<Index>, Bond),
}

impl Edit {
    /// The single-edit rule: bonds of order two or more lose one order,
    /// single and unset bonds are removed.
    pub fn decrement(edge: EdgeIndex<Index>, bond: &Bond) -> Edit {
        match bond.order().decremented() {
            Some(order) => Edit::Relabel(edge, Bond::new(order)),
            None => Edit::Remove(edge),
        }
    }

    pub fn edge(&self) -> EdgeIndex<Index> {
        match *self {
            Edit::Remove(edge) | Edit::Relabel(edge, _) => edge,
        }
    }
}

/// Per component: its atoms and its bonds as `(lower atom, higher atom, bond)`.
type PartitionKey = Vec<(Vec<usize>, Vec<(usize, usize, Bond)>)>;

/// A base molecule seen through at most one [`Edit`].
#[derive(Debug, Copy, Clone)]
pub struct EditedView<'a> {
    base: &'a Molecule,
    edit: Option<Edit>,
}

impl<'a> EditedView<'a> {
    pub fn new(base: &'a Molecule, edit: Option<Edit>) -> Self {
        Self { base, edit }
    }

    /// The bond on `edge` after the edit, or `None` if it was removed.
    pub fn bond(&self, edge: EdgeIndex<Index>) -> Option<Bond> {
        match self.edit {
            Some(Edit::Remove(removed)) if removed == edge => None,
            Some(Edit::Relabel(changed, bond)) if changed == edge => Some(bond),
            _ => Some(*self.base.bond(edge)),
        }
    }

    fn degree(&self, ix: NodeIndex<Index>) -> usize {
        self.base
            .graph()
            .edges(ix)
            .filter(|e| self.bond(e.id()).is_some())
            .count()
    }

    /// Atoms present after the edit. With `drop_isolated`, atoms whose last
    /// bond was removed disappear.
    pub fn atoms(&self, drop_isolated: bool) -> BitSet {
        let mut atoms: BitSet = self.base.graph().node_indices().map(|n| n.index()).collect();
        if let (true, Some(Edit::Remove(edge))) = (drop_isolated, self.edit) {
            if let Some((a, b)) = self.base.graph().edge_endpoints(edge) {
                for ix in [a, b] {
                    if self.degree(ix) == 0 {
                        atoms.remove(ix.index());
                    }
                }
            }
        }
        atoms
    }

    pub fn components(&self, drop_isolated: bool) -> Vec<BitSet> {
        components_under(self.base.graph(), &self.atoms(drop_isolated), |e| {
            self.bond(e).is_some()
        })
    }

    /// Materialise the atoms in `atoms` and the surviving bonds between them
    /// as a compact graph, numbered in atom order.
    pub fn labeled(&self, atoms: &BitSet) -> LabeledGraph<Atom, Bond> {
        let mut local = vec![None; self.base.atom_count()];
        let mut labels = Vec::with_capacity(atoms.len());
        for (i, ix) in atoms.iter().enumerate() {
            local[ix] = Some(i);
            labels.push(*self.base.atom(NodeIndex::new(ix)));
        }
        let mut graph = LabeledGraph::new(labels);
        for edge in self.base.graph().edge_references() {
            let ends = (local[edge.source().index()], local[edge.target().index()]);
            if let ((Some(a), Some(b)), Some(bond)) = (ends, self.bond(edge.id())) {
                graph.add_edge(a, b, bond);
            }
        }
        graph
    }

    /// The whole edited molecule, isolated atoms included.
    pub fn to_labeled_graph(&self) -> LabeledGraph<Atom, Bond> {
        self.labeled(&self.atoms(false))
    }

    fn partition_key(&self, components: &[BitSet]) -> PartitionKey {
        components
            .iter()
            .map(|component| {
                let bonds = self
                    .base
                    .graph()
                    .edge_references()
                    .filter(|e| {
                        component.contains(e.source().index())
                            && component.contains(e.target().index())
                    })
                    .filter_map(|e| {
                        let (a, b) = (e.source().index(), e.target().index());
                        self.bond(e.id()).map(|bond| (a.min(b), a.max(b), bond))
                    })
                    .collect();
                (component.iter().collect(), bonds)
            })
            .collect()
    }
}

/// A connected component of an edited variant, ready for isomorphism tests.
#[derive(Debug, Clone)]
pub struct Component {
    pub graph: LabeledGraph<Atom, Bond>,
    pub formula: Formula,
}

impl Component {
    fn new(graph: LabeledGraph<Atom, Bond>) -> Self {
        let formula = Formula::from_atoms(graph.labels());
        Self { graph, formula }
    }
}

/// One distinct edited form of a molecule with its cheapest edit cost.
#[derive(Debug, Clone)]
pub struct Variant {
    pub edit: Option<Edit>,
    pub cost: f64,
    pub components: Vec<Component>,
}

/// Enumerate the unedited molecule plus every edit `candidates` proposes for
/// each bond, deduplicated by resulting partition. Atoms left without bonds
/// are dropped. Variants are returned cheapest first.
pub fn variants<F>(base: &Molecule, candidates: F) -> Vec<Variant>
where
    F: Fn(EdgeIndex<Index>, &Bond) -> Vec<(Edit, f64)>,
{
    let mut unique: BTreeMap<PartitionKey, (Option<Edit>, f64, Vec<BitSet>)> = BTreeMap::new();
    let mut consider = |edit: Option<Edit>, cost: f64| {
        let view = EditedView::new(base, edit);
        let components = view.components(true);
        match unique.entry(view.partition_key(&components)) {
            Entry::Vacant(slot) => {
                slot.insert((edit, cost, components));
            }
            Entry::Occupied(mut slot) => {
                if cost < slot.get().1 {
                    slot.insert((edit, cost, components));
                }
            }
        }
    };

    consider(None, 0.0);
    for edge in base.graph().edge_indices() {
        for (edit, cost) in candidates(edge, base.bond(edge)) {
            consider(Some(edit), cost);
        }
    }

    let mut variants: Vec<Variant> = unique
        .into_values()
        .map(|(edit, cost, components)| {
            let view = EditedView::new(base, edit);
            Variant {
                edit,
                cost,
                components: components
                    .iter()
                    .map(|atoms| Component::new(view.labeled(atoms)))
                    .collect(),
            }
        })
        .collect();
    variants.sort_by(|a, b| a.cost.total_cmp(&b.cost));
    variants
}

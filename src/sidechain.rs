//! Side chains and their removal from a molecule.
//!
//! A side chain is a small connected pattern with one designated bridgehead
//! atom. An occurrence in a molecule is a set of atoms matching the pattern
//! (element and charge per atom, bond order or aromaticity per bond) where
//! the bridgehead has exactly one further bond, to the core of the molecule,
//! and every other atom has none. Removing an occurrence deletes its atoms
//! except the bridgehead, which becomes a `*` wildcard marking where the
//! side chain was attached.

use bit_set::BitSet;
use petgraph::{graph::NodeIndex, visit::EdgeRef};
use thiserror::Error;

use crate::{
    molecule::{Atom, Index, Molecule},
    utils::breadth_first_order,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SideChainError {
    #[error("side chain pattern has no atoms")]
    Empty,
    #[error("bridgehead {0} is not an atom of the pattern")]
    BridgeheadOutOfRange(usize),
    #[error("side chain pattern is not connected")]
    Disconnected,
}

/// A side-chain pattern with its bridgehead atom.
#[derive(Debug, Clone)]
pub struct SideChain {
    pattern: Molecule,
    bridgehead: NodeIndex<Index>,
    // Pattern atoms breadth-first from the bridgehead, each with the atom it
    // was reached from.
    order: Vec<(NodeIndex<Index>, Option<NodeIndex<Index>>)>,
}

impl SideChain {
    /// Build a side chain from `pattern`, whose implicit hydrogen counts are
    /// turned into explicit hydrogen atoms.
    pub fn new(pattern: &Molecule, bridgehead: NodeIndex<Index>) -> Result<Self, SideChainError> {
        if pattern.is_empty() {
            return Err(SideChainError::Empty);
        }
        if bridgehead.index() >= pattern.atom_count() {
            return Err(SideChainError::BridgeheadOutOfRange(bridgehead.index()));
        }
        let mut pattern = pattern.clone();
        pattern.make_hydrogens_explicit();
        if pattern.components().len() != 1 {
            return Err(SideChainError::Disconnected);
        }

        let mut order = vec![(bridgehead, None)];
        let mut seen = BitSet::with_capacity(pattern.atom_count());
        seen.insert(bridgehead.index());
        let mut next = 0;
        while let Some(&(n, _)) = order.get(next) {
            next += 1;
            for m in pattern.graph().neighbors(n) {
                if seen.insert(m.index()) {
                    order.push((m, Some(n)));
                }
            }
        }

        Ok(Self {
            pattern,
            bridgehead,
            order,
        })
    }

    pub fn pattern(&self) -> &Molecule {
        &self.pattern
    }

    pub fn bridgehead(&self) -> NodeIndex<Index> {
        self.bridgehead
    }

    /// Find an occurrence bridged at `root` among the atoms not in
    /// `removed`, as the image of every pattern atom.
    fn occurrence_at(
        &self,
        molecule: &Molecule,
        removed: &BitSet,
        root: NodeIndex<Index>,
    ) -> Option<Vec<NodeIndex<Index>>> {
        let mut search = OccurrenceSearch {
            chain: self,
            molecule,
            removed,
            root,
            image: vec![None; self.pattern.atom_count()],
            taken: BitSet::with_capacity(molecule.atom_count()),
        };
        if search.extend(0) {
            search.image.into_iter().collect()
        } else {
            None
        }
    }
}

struct OccurrenceSearch<'a> {
    chain: &'a SideChain,
    molecule: &'a Molecule,
    removed: &'a BitSet,
    root: NodeIndex<Index>,
    image: Vec<Option<NodeIndex<Index>>>,
    taken: BitSet,
}

impl OccurrenceSearch<'_> {
    fn live_neighbors(&self, ix: NodeIndex<Index>) -> impl Iterator<Item = NodeIndex<Index>> + '_ {
        self.molecule
            .graph()
            .neighbors(ix)
            .filter(move |n| !self.removed.contains(n.index()))
    }

    fn fits(&self, p: NodeIndex<Index>, c: NodeIndex<Index>) -> bool {
        if self.taken.contains(c.index()) || self.removed.contains(c.index()) {
            return false;
        }
        let pattern = &self.chain.pattern;
        if !pattern.atom(p).same_symbol_and_charge(self.molecule.atom(c)) {
            return false;
        }
        let attachment = usize::from(p == self.chain.bridgehead);
        if self.live_neighbors(c).count() != pattern.graph().neighbors(p).count() + attachment {
            return false;
        }
        pattern.graph().edges(p).all(|e| {
            let q = if e.source() == p { e.target() } else { e.source() };
            match self.image[q.index()] {
                None => true,
                Some(iq) => self
                    .molecule
                    .bond_between(c, iq)
                    .is_some_and(|bond| bond.same_type(e.weight())),
            }
        })
    }

    fn extend(&mut self, depth: usize) -> bool {
        let Some(&(p, parent)) = self.chain.order.get(depth) else {
            return self.attached_once();
        };
        let candidates: Vec<_> = match parent {
            None => vec![self.root],
            Some(parent) => self.image[parent.index()]
                .map(|anchor| self.live_neighbors(anchor).collect())
                .unwrap_or_default(),
        };
        for c in candidates {
            if self.fits(p, c) {
                self.image[p.index()] = Some(c);
                self.taken.insert(c.index());
                if self.extend(depth + 1) {
                    return true;
                }
                self.image[p.index()] = None;
                self.taken.remove(c.index());
            }
        }
        false
    }

    fn attached_once(&self) -> bool {
        self.image[self.chain.bridgehead.index()].is_some_and(|bridge| {
            self.live_neighbors(bridge)
                .filter(|n| !self.taken.contains(n.index()))
                .count()
                == 1
        })
    }
}

/// A molecule with its side chains cut off.
#[derive(Debug, Clone)]
pub struct Core {
    pub molecule: Molecule,
    /// `(wildcard atom, catalog index)` for every removed occurrence.
    pub placements: Vec<(NodeIndex<Index>, usize)>,
    /// Number of occurrences removed per catalog entry.
    pub counts: Vec<usize>,
}

/// Remove every occurrence of each side chain in `catalog`, one catalog
/// entry after the other. Occurrences are looked for breadth-first from the
/// lowest atom index.
pub fn remove_side_chains(molecule: &Molecule, catalog: &[SideChain]) -> Core {
    let order = breadth_first_order(molecule.graph());
    let mut working = molecule.clone();
    let mut removed = BitSet::with_capacity(molecule.atom_count());
    let mut wildcards = Vec::new();
    let mut counts = vec![0; catalog.len()];

    for (i, chain) in catalog.iter().enumerate() {
        for &root in &order {
            if removed.contains(root.index()) {
                continue;
            }
            let Some(image) = chain.occurrence_at(&working, &removed, root) else {
                continue;
            };
            for (p, ix) in image.into_iter().enumerate() {
                if p != chain.bridgehead.index() {
                    removed.insert(ix.index());
                }
            }
            *working.atom_mut(root) = Atom::wildcard();
            wildcards.push((root, i));
            counts[i] += 1;
        }
    }

    let keep: BitSet = (0..molecule.atom_count())
        .filter(|i| !removed.contains(*i))
        .collect();
    // Kept atoms are renumbered in order.
    let placements = wildcards
        .into_iter()
        .map(|(ix, i)| {
            let rank = keep.iter().take_while(|&k| k < ix.index()).count();
            (NodeIndex::new(rank), i)
        })
        .collect();

    Core {
        molecule: working.induced(&keep),
        placements,
        counts,
    }
}

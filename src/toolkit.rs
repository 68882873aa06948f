//! Chemistry-toolkit services the comparators depend on.
//!
//! Every comparator normalises its input molecules once, when it is built:
//! aromatic bonds are checked against ring membership and their atoms are
//! flagged aromatic, every atom gets an implicit hydrogen count, and the
//! implicit hydrogens are then turned into explicit hydrogen atoms. A
//! [`Toolkit`] supplies the perception steps; [`BasicToolkit`] does so from a
//! table of default valences, which is enough for organic molecules read
//! from `.mol` files.

use petgraph::visit::EdgeRef;
use thiserror::Error;

use crate::{
    molecule::{Element, Molecule},
    utils::connected_without,
};

/// Failures while preparing a molecule for comparison.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error("aromatic bond between atoms {0} and {1} is not part of a ring")]
    AromaticBondOutsideRing(usize, usize),
    #[error("atom {index} ({element}, charge {charge}) exceeds its valence with {valence}")]
    ValenceExceeded {
        index: usize,
        element: Element,
        charge: i8,
        valence: u16,
    },
}

pub trait Toolkit: Sync {
    /// Make bond orders and aromaticity flags consistent.
    fn perceive_aromaticity(&self, molecule: &mut Molecule) -> Result<(), SetupError>;

    /// Assign an implicit hydrogen count to every atom that has none.
    fn perceive_hydrogens(&self, molecule: &mut Molecule) -> Result<(), SetupError>;

    /// Return a normalised copy of `molecule` with all hydrogens explicit.
    fn prepare(&self, molecule: &Molecule) -> Result<Molecule, SetupError> {
        let mut prepared = molecule.clone();
        self.perceive_aromaticity(&mut prepared)?;
        self.perceive_hydrogens(&mut prepared)?;
        prepared.make_hydrogens_explicit();
        Ok(prepared)
    }
}

/// Valence-table toolkit.
///
/// Aromaticity is taken as drawn: bonds already marked aromatic must lie in
/// a ring and flag their atoms aromatic, but rings drawn in Kekulé form are
/// not detected and keep their single and double bonds.
///
/// An atom with aromatic bonds contributes one extra electron pair to its
/// ring, so benzene carbons get one hydrogen and pyridine nitrogen none.
/// Atoms whose hydrogen count is already set are left untouched.
#[derive(Debug, Default, Copy, Clone)]
pub struct BasicToolkit;

impl Toolkit for BasicToolkit {
    fn perceive_aromaticity(&self, molecule: &mut Molecule) -> Result<(), SetupError> {
        let aromatic: Vec<_> = molecule
            .graph()
            .edge_references()
            .filter(|e| e.weight().is_aromatic())
            .map(|e| (e.id(), e.source(), e.target()))
            .collect();
        for (edge, a, b) in aromatic {
            if !connected_without(molecule.graph(), a, b, edge) {
                return Err(SetupError::AromaticBondOutsideRing(a.index(), b.index()));
            }
            molecule.atom_mut(a).set_aromatic(true);
            molecule.atom_mut(b).set_aromatic(true);
        }
        Ok(())
    }

    fn perceive_hydrogens(&self, molecule: &mut Molecule) -> Result<(), SetupError> {
        let unset: Vec<_> = molecule
            .graph()
            .node_indices()
            .filter(|&n| molecule.atom(n).implicit_hydrogens().is_none())
            .collect();
        for ix in unset {
            let atom = *molecule.atom(ix);
            let mut used: u16 = 0;
            let mut in_aromatic_ring = false;
            for edge in molecule.graph().edges(ix) {
                let bond = edge.weight();
                if bond.is_aromatic() {
                    in_aromatic_ring = true;
                    used += 1;
                } else {
                    used += u16::from(bond.order().valence());
                }
            }
            if in_aromatic_ring {
                used += 1;
            }

            let allowed = allowed_valences(atom.element(), atom.charge());
            let hydrogens = if allowed.is_empty() {
                0
            } else {
                let valence = allowed.into_iter().find(|&v| u16::from(v) >= used).ok_or(
                    SetupError::ValenceExceeded {
                        index: ix.index(),
                        element: atom.element(),
                        charge: atom.charge(),
                        valence: used,
                    },
                )?;
                (u16::from(valence) - used) as u8
            };
            molecule.atom_mut(ix).set_hydrogens(hydrogens);
        }
        Ok(())
    }
}

/// Default valences of the organic subset, shifted by formal charge.
/// Elements outside the subset get no implicit hydrogens.
fn allowed_valences(element: Element, charge: i8) -> Vec<u8> {
    let charge = charge as i16;
    let (base, shift) = match element {
        Element::Hydrogen => (&[1][..], -charge.abs()),
        Element::Boron => (&[3][..], -charge),
        Element::Carbon => (&[4][..], -charge.abs()),
        Element::Nitrogen | Element::Phosphorus => (&[3, 5][..], charge),
        Element::Oxygen => (&[2][..], charge),
        Element::Sulfur => (&[2, 4, 6][..], charge),
        Element::Fluorine => (&[1][..], charge),
        Element::Chlorine | Element::Bromine | Element::Iodine => (&[1, 3, 5, 7][..], charge),
        _ => (&[][..], 0),
    };
    base.iter()
        .map(|v: &i16| v + shift)
        .filter(|v| *v >= 0)
        .map(|v| v as u8)
        .collect()
}

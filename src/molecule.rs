//! Graph-theoretic representation of a molecule.
//!
//! A [`Molecule`] is an undirected `petgraph` graph whose nodes are [`Atom`]s
//! (element, formal charge, aromaticity flag, implicit hydrogen count) and
//! whose edges are [`Bond`]s (order plus aromaticity flag). Besides building
//! molecules, this module provides the graph services the comparators share:
//! molecular formulas, connected components, shortest-path distances, and the
//! hydrogen/charge normalisation applied before bond-edit searches.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fmt::Display,
    str::FromStr,
};

use bit_set::BitSet;
use petgraph::{
    algo::dijkstra,
    graph::{EdgeIndex, Graph, NodeIndex},
    Undirected,
};
use thiserror::Error;

use crate::utils::{components_under, node_induced_subgraph};

pub(crate) type Index = u32;
pub type MGraph = Graph<Atom, Bond, Undirected, Index>;

/// Thrown by [`Element::from_str`] if the string does not represent a valid
/// chemical element.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
#[error("not a chemical element symbol")]
pub struct ParseElementError;

macro_rules! periodic_table {
    ( $(($element:ident, $name:literal)),* $(,)? ) => {
        /// Represents a chemical element, or the `*` dummy atom that marks
        /// where a side chain was cut off. Discriminants are atomic numbers.
        #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(u8)]
        pub enum Element {
            $( $element, )*
        }

        impl Display for Element {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match &self {
                    $( Element::$element => write!(f, "{}", $name), )*
                }
            }
        }

        impl FromStr for Element {
            type Err = ParseElementError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $name => Ok(Element::$element), )*
                    _ => Err(ParseElementError),
                }
            }
        }
    };
}

periodic_table!(
    (Dummy, "*"),
    (Hydrogen, "H"), (Helium, "He"),
    (Lithium, "Li"), (Beryllium, "Be"), (Boron, "B"), (Carbon, "C"),
    (Nitrogen, "N"), (Oxygen, "O"), (Fluorine, "F"), (Neon, "Ne"),
    (Sodium, "Na"), (Magnesium, "Mg"), (Aluminum, "Al"), (Silicon, "Si"),
    (Phosphorus, "P"), (Sulfur, "S"), (Chlorine, "Cl"), (Argon, "Ar"),
    (Potassium, "K"), (Calcium, "Ca"), (Scandium, "Sc"), (Titanium, "Ti"),
    (Vanadium, "V"), (Chromium, "Cr"), (Manganese, "Mn"), (Iron, "Fe"),
    (Cobalt, "Co"), (Nickel, "Ni"), (Copper, "Cu"), (Zinc, "Zn"),
    (Gallium, "Ga"), (Germanium, "Ge"), (Arsenic, "As"), (Selenium, "Se"),
    (Bromine, "Br"), (Krypton, "Kr"), (Rubidium, "Rb"), (Strontium, "Sr"),
    (Yttrium, "Y"), (Zirconium, "Zr"), (Niobium, "Nb"), (Molybdenum, "Mo"),
    (Technetium, "Tc"), (Ruthenium, "Ru"), (Rhodium, "Rh"), (Palladium, "Pd"),
    (Silver, "Ag"), (Cadmium, "Cd"), (Indium, "In"), (Tin, "Sn"),
    (Antimony, "Sb"), (Tellurium, "Te"), (Iodine, "I"), (Xenon, "Xe"),
    (Cesium, "Cs"), (Barium, "Ba"), (Lanthanum, "La"), (Cerium, "Ce"),
    (Praseodymium, "Pr"), (Neodymium, "Nd"), (Promethium, "Pm"),
    (Samarium, "Sm"), (Europium, "Eu"), (Gadolinium, "Gd"), (Terbium, "Tb"),
    (Dysprosium, "Dy"), (Holmium, "Ho"), (Erbium, "Er"), (Thulium, "Tm"),
    (Ytterbium, "Yb"), (Lutetium, "Lu"), (Hafnium, "Hf"), (Tantalum, "Ta"),
    (Wolfram, "W"), (Rhenium, "Re"), (Osmium, "Os"), (Iridium, "Ir"),
    (Platinum, "Pt"), (Gold, "Au"), (Mercury, "Hg"), (Thallium, "Tl"),
    (Lead, "Pb"), (Bismuth, "Bi"), (Polonium, "Po"), (Astatine, "At"),
    (Radon, "Rn"), (Francium, "Fr"), (Radium, "Ra"), (Actinium, "Ac"),
    (Thorium, "Th"), (Protactinium, "Pa"), (Uranium, "U"), (Neptunium, "Np"),
    (Plutonium, "Pu"), (Americium, "Am"), (Curium, "Cm"), (Berkelium, "Bk"),
    (Californium, "Cf"), (Einsteinium, "Es"), (Fermium, "Fm"),
    (Mendelevium, "Md"), (Nobelium, "No"), (Lawrencium, "Lr"),
    (Rutherfordium, "Rf"), (Dubnium, "Db"), (Seaborgium, "Sg"),
    (Bohrium, "Bh"), (Hassium, "Hs"), (Meitnerium, "Mt"),
    (Darmstadtium, "Ds"), (Roentgenium, "Rg"), (Copernicium, "Cn"),
    (Nihonium, "Nh"), (Flerovium, "Fl"), (Moscovium, "Mc"),
    (Livermorium, "Lv"), (Tennessine, "Ts"), (Oganesson, "Og"),
);

impl Element {
    /// Return this element's atomic number (0 for the dummy atom).
    pub fn atomic_number(self) -> u8 {
        self as u8
    }
}

/// The nodes of a [`Molecule`] graph.
///
/// `hydrogens` is the number of implicit hydrogens attached to the atom, or
/// `None` while it has not been perceived yet (see
/// [`Toolkit`](crate::toolkit::Toolkit)).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Atom {
    element: Element,
    charge: i8,
    aromatic: bool,
    hydrogens: Option<u8>,
}

impl Atom {
    /// Construct a neutral, non-aromatic [`Atom`] of type `element` whose
    /// implicit hydrogens are left for perception.
    pub fn new(element: Element) -> Self {
        Self {
            element,
            charge: 0,
            aromatic: false,
            hydrogens: None,
        }
    }

    /// Construct the `*` wildcard atom left behind by side-chain removal.
    pub fn wildcard() -> Self {
        Self::new(Element::Dummy).with_hydrogens(0)
    }

    pub fn with_charge(mut self, charge: i8) -> Self {
        self.charge = charge;
        self
    }

    pub fn with_hydrogens(mut self, count: u8) -> Self {
        self.hydrogens = Some(count);
        self
    }

    /// Return this [`Atom`]'s element.
    pub fn element(&self) -> Element {
        self.element
    }

    pub fn charge(&self) -> i8 {
        self.charge
    }

    pub fn is_aromatic(&self) -> bool {
        self.aromatic
    }

    /// Return the implicit hydrogen count, if it is known.
    pub fn implicit_hydrogens(&self) -> Option<u8> {
        self.hydrogens
    }

    pub fn is_wildcard(&self) -> bool {
        self.element == Element::Dummy
    }

    /// Return `true` iff both atoms have the same element and formal charge.
    pub fn same_symbol_and_charge(&self, other: &Atom) -> bool {
        self.element == other.element && self.charge == other.charge
    }

    pub(crate) fn set_aromatic(&mut self, aromatic: bool) {
        self.aromatic = aromatic;
    }

    pub(crate) fn set_hydrogens(&mut self, count: u8) {
        self.hydrogens = Some(count);
    }
}

/// Bond orders as distinguished by `.mol` files and chemistry toolkits.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BondOrder {
    Unset,
    Single,
    Double,
    Triple,
    Quadruple,
    Quintuple,
    Sextuple,
}

impl BondOrder {
    /// Number of electron pairs shared; unset bonds count as single.
    pub fn valence(self) -> u8 {
        match self {
            BondOrder::Unset | BondOrder::Single => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
            BondOrder::Quadruple => 4,
            BondOrder::Quintuple => 5,
            BondOrder::Sextuple => 6,
        }
    }

    /// Return the order one electron pair lower, or `None` for single and
    /// unset bonds (which can only be removed).
    pub fn decremented(self) -> Option<BondOrder> {
        match self {
            BondOrder::Unset | BondOrder::Single => None,
            BondOrder::Double => Some(BondOrder::Single),
            BondOrder::Triple => Some(BondOrder::Double),
            BondOrder::Quadruple => Some(BondOrder::Triple),
            BondOrder::Quintuple => Some(BondOrder::Quadruple),
            BondOrder::Sextuple => Some(BondOrder::Quintuple),
        }
    }
}

/// Thrown by [`BondOrder::try_from`] when given anything outside 1..=6.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
#[error("{0} is not a bond order")]
pub struct ParseBondError(pub usize);

impl TryFrom<usize> for BondOrder {
    type Error = ParseBondError;
    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(BondOrder::Single),
            2 => Ok(BondOrder::Double),
            3 => Ok(BondOrder::Triple),
            4 => Ok(BondOrder::Quadruple),
            5 => Ok(BondOrder::Quintuple),
            6 => Ok(BondOrder::Sextuple),
            _ => Err(ParseBondError(value)),
        }
    }
}

/// The edges of a [`Molecule`] graph.
///
/// Aromatic bonds read from `.mol` files carry [`BondOrder::Unset`]; their
/// aromaticity flag is what the comparators look at.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bond {
    order: BondOrder,
    aromatic: bool,
}

impl Bond {
    pub fn new(order: BondOrder) -> Self {
        Self {
            order,
            aromatic: false,
        }
    }

    pub fn single() -> Self {
        Self::new(BondOrder::Single)
    }

    pub fn double() -> Self {
        Self::new(BondOrder::Double)
    }

    pub fn triple() -> Self {
        Self::new(BondOrder::Triple)
    }

    pub fn aromatic() -> Self {
        Self {
            order: BondOrder::Unset,
            aromatic: true,
        }
    }

    pub fn order(&self) -> BondOrder {
        self.order
    }

    pub fn is_aromatic(&self) -> bool {
        self.aromatic
    }

    /// The cost of removing this bond: 1.5 for aromatic bonds, otherwise
    /// the number of shared electron pairs.
    pub fn weight(&self) -> f64 {
        if self.aromatic {
            1.5
        } else {
            self.order.valence() as f64
        }
    }

    /// Return `true` iff the bonds have the same order or are both aromatic.
    pub fn same_type(&self, other: &Bond) -> bool {
        self.order == other.order || (self.aromatic && other.aromatic)
    }

    /// Order-respecting comparison: aromatic bonds only match aromatic bonds,
    /// all others must agree on their order.
    pub fn matches_strict(&self, other: &Bond) -> bool {
        if self.aromatic || other.aromatic {
            self.aromatic && other.aromatic
        } else {
            self.order == other.order
        }
    }
}

/// Element counts of a molecule, implicit hydrogens included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Formula(BTreeMap<Element, usize>);

impl Formula {
    pub fn from_atoms<'a>(atoms: impl IntoIterator<Item = &'a Atom>) -> Self {
        let mut counts = BTreeMap::new();
        for atom in atoms {
            *counts.entry(atom.element).or_default() += 1;
            if let Some(h) = atom.hydrogens.filter(|&h| h > 0) {
                *counts.entry(Element::Hydrogen).or_default() += h as usize;
            }
        }
        Self(counts)
    }

    pub fn count(&self, element: Element) -> usize {
        self.0.get(&element).copied().unwrap_or(0)
    }

    pub fn atom_count(&self) -> usize {
        self.0.values().sum()
    }
}

impl Display for Formula {
    /// Hill notation: carbon, then hydrogen, then the rest alphabetically.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut symbols: Vec<(String, usize)> = self
            .0
            .iter()
            .map(|(element, &count)| (element.to_string(), count))
            .collect();
        let has_carbon = self.0.contains_key(&Element::Carbon);
        symbols.sort_by_key(|(symbol, _)| match (has_carbon, symbol.as_str()) {
            (true, "C") => (0, String::new()),
            (true, "H") => (1, String::new()),
            _ => (2, symbol.clone()),
        });
        for (symbol, count) in symbols {
            if count == 1 {
                write!(f, "{symbol}")?;
            } else {
                write!(f, "{symbol}{count}")?;
            }
        }
        Ok(())
    }
}

/// A simple, loopless graph with [`Atom`]s as nodes and [`Bond`]s as edges.
///
/// Hydrogens may be present as explicit atoms, as implicit counts on their
/// heavy atom, or both.
#[derive(Debug, Clone, Default)]
pub struct Molecule {
    graph: MGraph,
}

impl Molecule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a [`Molecule`] from an existing `MGraph`.
    pub fn from_graph(g: MGraph) -> Self {
        Self { graph: g }
    }

    /// Build a molecule from atoms and `(atom, atom, bond)` triples indexing
    /// into them.
    pub fn from_parts(
        atoms: impl IntoIterator<Item = Atom>,
        bonds: impl IntoIterator<Item = (usize, usize, Bond)>,
    ) -> Self {
        let mut molecule = Self::new();
        for atom in atoms {
            molecule.add_atom(atom);
        }
        for (a, b, bond) in bonds {
            molecule.add_bond(NodeIndex::new(a), NodeIndex::new(b), bond);
        }
        molecule
    }

    /// Return a representation of this molecule as an `MGraph`.
    pub fn graph(&self) -> &MGraph {
        &self.graph
    }

    pub fn add_atom(&mut self, atom: Atom) -> NodeIndex<Index> {
        self.graph.add_node(atom)
    }

    pub fn add_bond(
        &mut self,
        a: NodeIndex<Index>,
        b: NodeIndex<Index>,
        bond: Bond,
    ) -> EdgeIndex<Index> {
        self.graph.add_edge(a, b, bond)
    }

    pub fn atom(&self, ix: NodeIndex<Index>) -> &Atom {
        &self.graph[ix]
    }

    pub(crate) fn atom_mut(&mut self, ix: NodeIndex<Index>) -> &mut Atom {
        &mut self.graph[ix]
    }

    pub fn bond(&self, ix: EdgeIndex<Index>) -> &Bond {
        &self.graph[ix]
    }

    /// Return the bond between `a` and `b`, if there is one.
    pub fn bond_between(&self, a: NodeIndex<Index>, b: NodeIndex<Index>) -> Option<&Bond> {
        self.graph.find_edge(a, b).map(|e| &self.graph[e])
    }

    pub fn atom_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn bond_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Return `true` iff this molecule contains self-loops or multiple edges
    /// between any pair of nodes.
    pub fn is_malformed(&self) -> bool {
        let mut uniq = HashSet::new();
        !self.graph.edge_indices().all(|ix| {
            self.graph.edge_endpoints(ix).is_some_and(|(src, dst)| {
                src != dst && uniq.insert((src.min(dst), src.max(dst)))
            })
        })
    }

    /// Sum of the weights of all bonds incident to `ix`.
    pub fn weighted_degree(&self, ix: NodeIndex<Index>) -> f64 {
        self.graph.edges(ix).map(|e| e.weight().weight()).sum()
    }

    pub fn formula(&self) -> Formula {
        Formula::from_atoms(self.graph.node_weights())
    }

    /// Partition the atoms into connected components, ordered by their
    /// lowest atom index.
    pub fn components(&self) -> Vec<BitSet> {
        let all = self.graph.node_indices().map(|n| n.index()).collect();
        components_under(&self.graph, &all, |_| true)
    }

    /// Number of bonds on a shortest path from `from` to every atom reachable
    /// from it.
    pub fn distances_from(&self, from: NodeIndex<Index>) -> HashMap<NodeIndex<Index>, usize> {
        dijkstra(&self.graph, from, None, |_| 1)
    }

    /// Return the molecule induced by the atoms in `keep`. Atoms keep their
    /// relative order.
    pub fn induced(&self, keep: &BitSet) -> Molecule {
        Molecule::from_graph(node_induced_subgraph(&self.graph, keep))
    }

    /// Replace every implicit hydrogen count by that many hydrogen atoms
    /// single-bonded to their heavy atom.
    pub fn make_hydrogens_explicit(&mut self) {
        let heavy: Vec<_> = self.graph.node_indices().collect();
        for ix in heavy {
            let count = self.graph[ix].hydrogens.replace(0).unwrap_or(0);
            for _ in 0..count {
                let h = self.graph.add_node(Atom::new(Element::Hydrogen).with_hydrogens(0));
                self.graph.add_edge(ix, h, Bond::single());
            }
        }
    }

    /// Remove explicit hydrogen atoms and zero every implicit hydrogen count.
    pub fn without_hydrogens(&self) -> Molecule {
        let keep = self
            .graph
            .node_indices()
            .filter(|&n| self.graph[n].element != Element::Hydrogen)
            .map(|n| n.index())
            .collect();
        let mut stripped = self.induced(&keep);
        for atom in stripped.graph.node_weights_mut() {
            atom.hydrogens = Some(0);
        }
        stripped
    }

    /// The form in which molecules enter bond-edit searches: hydrogen-free,
    /// without atoms that have no bonds left, and with all formal charges
    /// set to zero.
    pub fn reduced(&self) -> Molecule {
        let stripped = self.without_hydrogens();
        let bonded = stripped
            .graph
            .node_indices()
            .filter(|&n| stripped.graph.neighbors(n).next().is_some())
            .map(|n| n.index())
            .collect();
        let mut reduced = stripped.induced(&bonded);
        for atom in reduced.graph.node_weights_mut() {
            atom.charge = 0;
        }
        reduced
    }
}

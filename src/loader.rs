//! Parse MDL `.mol` (V2000) files into [`Molecule`]s.
//!
//! Only the parts of the format the comparators need are read: atom symbols
//! and charge codes from the atom block, bond types from the bond block
//! (type 4 is aromatic), and `M  CHG` property lines. Coordinates, stereo
//! flags and every other property are ignored.

use std::{fs, num::ParseIntError, path::Path};

use petgraph::graph::NodeIndex;
use thiserror::Error;

use crate::molecule::{Atom, Bond, BondOrder, Element, Molecule};

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("cannot read molfile")]
    Io(#[from] std::io::Error),
    #[error("molfile ends inside its {0} block")]
    Truncated(&'static str),
    #[error("line {line}: expected an integer")]
    BadNumber {
        line: usize,
        #[source]
        source: ParseIntError,
    },
    #[error("line {line}: line is too short")]
    ShortLine { line: usize },
    #[error("line {line}: unknown element `{symbol}`")]
    UnknownElement { line: usize, symbol: String },
    #[error("line {line}: unsupported bond type {code}")]
    BadBondType { line: usize, code: usize },
    #[error("line {line}: no atom numbered {atom}")]
    BadAtomReference { line: usize, atom: usize },
    #[error("molecule contains self-loops or repeated bonds")]
    Malformed,
}

/// Read and parse the `.mol` file at `path`.
pub fn parse_molfile(path: &Path) -> Result<Molecule, ParserError> {
    parse_molfile_str(&fs::read_to_string(path)?)
}

/// Parse the first molecule of a `.mol` file's contents.
pub fn parse_molfile_str(input: &str) -> Result<Molecule, ParserError> {
    let lines: Vec<&str> = input.lines().collect();

    let counts_line = lines.get(3).ok_or(ParserError::Truncated("counts"))?;
    let (num_atoms, num_bonds) = parse_counts_line(counts_line, 4)?;

    let atom_start = 4;
    let bond_start = atom_start + num_atoms;
    let props_start = bond_start + num_bonds;
    if lines.len() < bond_start {
        return Err(ParserError::Truncated("atom"));
    }
    if lines.len() < props_start {
        return Err(ParserError::Truncated("bond"));
    }

    let mut molecule = Molecule::new();
    for (offset, atom_line) in lines[atom_start..bond_start].iter().enumerate() {
        molecule.add_atom(parse_atom_line(atom_line, atom_start + offset + 1)?);
    }

    for (offset, bond_line) in lines[bond_start..props_start].iter().enumerate() {
        let line = bond_start + offset + 1;
        let (a, b, bond) = parse_bond_line(bond_line, line)?;
        for atom in [a, b] {
            if atom == 0 || atom > num_atoms {
                return Err(ParserError::BadAtomReference { line, atom });
            }
        }
        molecule.add_bond(NodeIndex::new(a - 1), NodeIndex::new(b - 1), bond);
    }

    // Any M  CHG line supersedes every charge given in the atom block.
    let mut charges: Option<Vec<(usize, i8)>> = None;
    for (offset, prop_line) in lines[props_start..].iter().enumerate() {
        let line = props_start + offset + 1;
        if prop_line.starts_with("M  END") {
            break;
        }
        if prop_line.starts_with("M  CHG") {
            let entries = parse_charge_line(prop_line, line)?;
            for &(atom, _) in &entries {
                if atom == 0 || atom > num_atoms {
                    return Err(ParserError::BadAtomReference { line, atom });
                }
            }
            charges.get_or_insert_with(Vec::new).extend(entries);
        }
    }
    if let Some(charges) = charges {
        let mut values = vec![0; num_atoms];
        for (atom, charge) in charges {
            values[atom - 1] = charge;
        }
        for (i, charge) in values.into_iter().enumerate() {
            let ix = NodeIndex::new(i);
            let atom = *molecule.atom(ix);
            *molecule.atom_mut(ix) = atom.with_charge(charge);
        }
    }

    if molecule.is_malformed() {
        return Err(ParserError::Malformed);
    }
    Ok(molecule)
}

fn number(field: &str, line: usize) -> Result<usize, ParserError> {
    field
        .trim()
        .parse()
        .map_err(|source| ParserError::BadNumber { line, source })
}

fn parse_counts_line(counts_line: &str, line: usize) -> Result<(usize, usize), ParserError> {
    let atoms = counts_line.get(0..3).ok_or(ParserError::ShortLine { line })?;
    let bonds = counts_line.get(3..6).ok_or(ParserError::ShortLine { line })?;
    Ok((number(atoms, line)?, number(bonds, line)?))
}

fn parse_atom_line(atom_line: &str, line: usize) -> Result<Atom, ParserError> {
    let symbol = atom_line
        .get(31..)
        .map(|rest| rest.get(..3).unwrap_or(rest).trim())
        .filter(|symbol| !symbol.is_empty())
        .ok_or(ParserError::ShortLine { line })?;
    let element: Element = symbol.parse().map_err(|_| ParserError::UnknownElement {
        line,
        symbol: symbol.to_string(),
    })?;

    let charge = match atom_line.get(36..39).map(str::trim) {
        None | Some("") => 0,
        Some(code) => match number(code, line)? {
            1 => 3,
            2 => 2,
            3 => 1,
            5 => -1,
            6 => -2,
            7 => -3,
            // 0 is neutral, 4 marks a doublet radical
            _ => 0,
        },
    };
    Ok(Atom::new(element).with_charge(charge))
}

fn parse_bond_line(bond_line: &str, line: usize) -> Result<(usize, usize, Bond), ParserError> {
    let field = |range: std::ops::Range<usize>| {
        bond_line
            .get(range)
            .ok_or(ParserError::ShortLine { line })
            .and_then(|f| number(f, line))
    };
    let (a, b, code) = (field(0..3)?, field(3..6)?, field(6..9)?);
    let bond = match code {
        4 => Bond::aromatic(),
        1..=3 => Bond::new(
            BondOrder::try_from(code).map_err(|_| ParserError::BadBondType { line, code })?,
        ),
        _ => return Err(ParserError::BadBondType { line, code }),
    };
    Ok((a, b, bond))
}

fn parse_charge_line(prop_line: &str, line: usize) -> Result<Vec<(usize, i8)>, ParserError> {
    let fields: Vec<&str> = prop_line.split_whitespace().skip(2).collect();
    let count = number(fields.first().ok_or(ParserError::ShortLine { line })?, line)?;
    if fields.len() < 1 + 2 * count {
        return Err(ParserError::ShortLine { line });
    }
    (0..count)
        .map(|i| {
            let atom = number(fields[1 + 2 * i], line)?;
            let charge: i8 = fields[2 + 2 * i]
                .parse()
                .map_err(|source| ParserError::BadNumber { line, source })?;
            Ok((atom, charge))
        })
        .collect()
}

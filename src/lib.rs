//! Similarity and distance scores between molecular graphs under bounded
//! bond edits.
//!
//! Three comparators implement [`matcher::Matcher`]:
//! [`edic::Edic`] tests whether one bond edit per molecule makes two
//! molecules isomorphic, [`mces::McesDistance`] computes the cheapest such
//! edit up to a threshold, and [`placements::MinimalWeightedPlacements`]
//! measures how far side chains have to move to turn one molecule into the
//! other.

// Molecule definition, hydrogen and charge normalisation
pub mod molecule;

// Aromaticity and hydrogen perception
pub mod toolkit;

// Data IO
pub mod loader;

// Minimum-cost perfect matching
pub mod assignment;

// Isomorphism search
pub mod vf2;

// Bond edits over a shared base molecule
pub mod edits;

// Lower bounds used for pruning
pub mod bounds;

// The comparators
pub mod edic;
pub mod matcher;
pub mod mces;
pub mod placements;
pub mod sidechain;

// Many pairs at once
pub mod batch;

// Utility functions
mod utils;

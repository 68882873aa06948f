use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::ffi::OsStr;
use std::fs;
use std::iter::zip;
use std::path::Path;

use structure_matching::{
    bounds::Bound,
    edic::Edic,
    loader,
    matcher::Matcher,
    mces::{MatchConfig, MatchingMode, McesDistance},
    molecule::Molecule,
};

fn reference_molecules() -> Vec<Molecule> {
    let mut paths: Vec<_> = fs::read_dir(Path::new("data").join("reference"))
        .unwrap()
        .map(|p| p.unwrap().path())
        .filter(|p| p.extension().and_then(OsStr::to_str) == Some("mol"))
        .collect();
    paths.sort();
    paths
        .iter()
        .map(|name| loader::parse_molfile(name).expect(&format!("Failed to parse {name:?}")))
        .collect()
}

pub fn mces_modes(c: &mut Criterion) {
    let mut group = c.benchmark_group("mces_all_pairs");
    let mols = reference_molecules();

    let modes = [
        MatchingMode::BondDeletionStrict,
        MatchingMode::BondDeletionAnyOrder,
        MatchingMode::ElectronPair,
    ];
    let bounds = [
        vec![],
        vec![Bound::WeightedDegree],
        vec![Bound::WeightedDegree, Bound::Neighborhood],
    ];
    let bound_strs = ["nobounds", "weighted", "allbounds"];

    // Every ordered pair of reference molecules, with a fresh comparator per
    // pair so nothing is served from a cached score.
    for mode in modes {
        for (bound, bound_str) in zip(&bounds, &bound_strs) {
            let config = MatchConfig {
                mode,
                bounds: bound.clone(),
                ..MatchConfig::default()
            };
            group.bench_with_input(
                BenchmarkId::new(format!("{mode:?}"), bound_str),
                &config,
                |b, config| {
                    b.iter(|| {
                        for m1 in &mols {
                            for m2 in &mols {
                                McesDistance::with_config(m1, m2, config.clone())
                                    .and_then(|d| d.compare())
                                    .unwrap();
                            }
                        }
                    });
                },
            );
        }
    }

    group.finish();
}

pub fn edic_pairs(c: &mut Criterion) {
    let mols = reference_molecules();
    c.bench_function("edic_all_pairs", |b| {
        b.iter(|| {
            for m1 in &mols {
                for m2 in &mols {
                    Edic::new(m1, m2).and_then(|e| e.compare()).unwrap();
                }
            }
        });
    });
}

criterion_group! {
    name = benchmark;
    config = Criterion::default().sample_size(20);
    targets = mces_modes, edic_pairs
}
criterion_main!(benchmark);

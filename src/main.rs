use std::{
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context};
use clap::Parser;
use petgraph::graph::NodeIndex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use structure_matching::{
    batch::{score_pairs, Comparison, Measure, ParallelMode},
    bounds::{Bound, DEFAULT_BOUNDS},
    loader::parse_molfile,
    mces::{MatchConfig, MatchingMode, DEFAULT_THRESHOLD},
    molecule::Molecule,
    sidechain::SideChain,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// First molecule (.mol)
    #[arg(required_unless_present = "pairs")]
    mol1: Option<PathBuf>,

    /// Second molecule (.mol)
    #[arg(required_unless_present = "pairs")]
    mol2: Option<PathBuf>,

    /// CSV of `mol1,mol2` paths, relative to the CSV, to score instead
    #[arg(long, conflicts_with_all = ["mol1", "mol2"])]
    pairs: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = Measure::Mces)]
    measure: Measure,

    /// Edit and matching rules of the distance measure
    #[arg(long, value_enum, default_value_t = MatchingMode::BondDeletionAnyOrder)]
    mode: MatchingMode,

    /// Largest distance reported as a number rather than `inf`
    #[arg(short, long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: f64,

    /// Lower bounds to prune with; pass the flag without values to disable
    #[arg(
        long,
        value_enum,
        num_args = 0..,
        value_delimiter = ',',
        default_values_t = DEFAULT_BOUNDS
    )]
    bounds: Vec<Bound>,

    /// Give up on a distance search after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Side chain for the placements measure: a .mol file with explicit
    /// hydrogen atoms and the 1-based number of its bridgehead atom
    #[arg(long = "side-chain", value_name = "FILE:ATOM")]
    side_chains: Vec<String>,

    #[arg(long, value_enum, default_value_t = ParallelMode::Always)]
    parallel: ParallelMode,

    #[arg(short, long)]
    verbose: bool,
}

fn load(path: &Path) -> anyhow::Result<Molecule> {
    parse_molfile(path).with_context(|| format!("failed to load {}", path.display()))
}

fn parse_side_chain(arg: &str) -> anyhow::Result<SideChain> {
    let (path, atom) = arg
        .rsplit_once(':')
        .with_context(|| format!("side chain `{arg}` is not of the form FILE:ATOM"))?;
    let atom: usize = atom
        .parse()
        .with_context(|| format!("bridgehead `{atom}` is not an atom number"))?;
    if atom == 0 {
        bail!("bridgehead atoms are numbered from 1");
    }
    let pattern = load(Path::new(path))?;
    SideChain::new(&pattern, NodeIndex::new(atom - 1))
        .with_context(|| format!("invalid side chain {path}"))
}

fn comparison(cli: &Cli) -> anyhow::Result<Comparison> {
    Ok(match cli.measure {
        Measure::Edic => Comparison::Edic,
        Measure::Mces => Comparison::Mces(MatchConfig {
            mode: cli.mode,
            threshold: cli.threshold,
            bounds: cli.bounds.clone(),
            deadline: cli.timeout_ms.map(Duration::from_millis),
        }),
        Measure::Placements => Comparison::Placements(
            cli.side_chains
                .iter()
                .map(|arg| parse_side_chain(arg))
                .collect::<anyhow::Result<_>>()?,
        ),
    })
}

/// Score every row of a `mol1,mol2` CSV and write `mol1,mol2,score` to
/// stdout. Rows that fail are reported in the score column.
fn score_csv(path: &Path, comparison: &Comparison, parallel: ParallelMode) -> anyhow::Result<()> {
    let base = path.parent().unwrap_or(Path::new(""));
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.context("malformed pairs file")?;
        let (Some(a), Some(b)) = (record.get(0), record.get(1)) else {
            bail!("line {}: expected two columns", rows.len() + 1);
        };
        if rows.is_empty() && (a, b) == ("mol1", "mol2") {
            continue;
        }
        rows.push((a.to_string(), b.to_string()));
    }
    info!(pairs = rows.len(), measure = ?comparison.measure(), "scoring pairs");

    let loaded: Vec<anyhow::Result<(Molecule, Molecule)>> = rows
        .iter()
        .map(|(a, b)| Ok((load(&base.join(a))?, load(&base.join(b))?)))
        .collect();
    let molecules: Vec<(Molecule, Molecule)> = loaded
        .iter()
        .filter_map(|pair| pair.as_ref().ok().cloned())
        .collect();
    let mut scores = score_pairs(&molecules, comparison, parallel).into_iter();

    let mut writer = csv::Writer::from_writer(io::stdout().lock());
    writer.write_record(["mol1", "mol2", "score"])?;
    for ((a, b), pair) in rows.iter().zip(loaded) {
        let cell = match pair {
            Err(e) => format!("error: {e:#}"),
            Ok(_) => match scores.next().context("missing score")? {
                Ok(score) => score.to_string(),
                Err(e) => format!("error: {:#}", anyhow::Error::new(e)),
            },
        };
        writer.write_record([a.as_str(), b.as_str(), cell.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "structure_matching=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .without_time()
        .with_writer(io::stderr)
        .init();

    let comparison = comparison(&cli)?;
    if let Some(pairs) = &cli.pairs {
        return score_csv(pairs, &comparison, cli.parallel);
    }

    let (Some(path1), Some(path2)) = (&cli.mol1, &cli.mol2) else {
        bail!("two molecules or --pairs are required");
    };
    let (m1, m2) = (load(path1)?, load(path2)?);
    let score = comparison
        .score(&m1, &m2)
        .with_context(|| format!("failed to compare {} and {}", path1.display(), path2.display()))?;
    println!("{score}");
    Ok(())
}

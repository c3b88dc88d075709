use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use tagid::config::{
    DEFAULT_DAMPER, DEFAULT_DISTANCE, DEFAULT_MAX_FREQ, DEFAULT_MIN_FREQ, DEFAULT_POINTS_COUNT,
    DEFAULT_WEIGHT, DEFAULT_ZOOMER,
};
use tagid::matching::get_match_quality;
use tagid::{
    FingerprintIndex, FingerprintSettings, Library, MatchMode, MatchOutcome, Sample, SweepGrid,
    db, visualize,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    /// Match on the dominant frequency of each sub-band
    Freq,
    /// Match on the quantized dominant magnitude of each sub-band
    Mag,
}

impl From<ModeArg> for MatchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Freq => MatchMode::Frequency,
            ModeArg::Mag => MatchMode::Magnitude,
        }
    }
}

#[derive(Parser)]
#[command(name = "tagid")]
#[command(about = "Find which reference recording an audio sample was taken from")]
struct Args {
    /// Directory holding the reference WAV files
    library: PathBuf,

    /// WAV sample to identify
    sample: PathBuf,

    #[arg(long, value_enum, default_value_t = ModeArg::Freq)]
    mode: ModeArg,

    /// Maximum gap between consecutive accepted blocks of one reference
    #[arg(long, default_value_t = DEFAULT_DISTANCE)]
    distance: usize,

    /// Score numerator, divided by the gap of each accepted block
    #[arg(long, default_value_t = DEFAULT_WEIGHT)]
    weight: u64,

    /// Magnitude compression factor
    #[arg(long, default_value_t = DEFAULT_ZOOMER)]
    zoomer: f64,

    /// Magnitude quantization step
    #[arg(long, default_value_t = DEFAULT_DAMPER)]
    damper: f64,

    #[arg(long, default_value_t = DEFAULT_MIN_FREQ)]
    min_freq: usize,

    /// End of the analysed bin range (exclusive)
    #[arg(long, default_value_t = DEFAULT_MAX_FREQ)]
    max_freq: usize,

    /// Number of sub-bands
    #[arg(long, default_value_t = DEFAULT_POINTS_COUNT)]
    points: usize,

    /// Sub-bands left out of the key, comma separated
    #[arg(long, value_delimiter = ',', conflicts_with = "sweep")]
    ignore: Vec<usize>,

    /// Run the full parameter sweep instead of a single configuration
    #[arg(long)]
    sweep: bool,

    /// SQLite file caching the index for the chosen settings
    #[arg(long)]
    db: Option<PathBuf>,

    /// Write a PNG of the sample's spectral blocks and band peaks
    #[arg(long)]
    plot: Option<PathBuf>,

    /// Log debug output (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn settings(&self) -> Result<FingerprintSettings> {
        FingerprintSettings::builder()
            .frequency_range(self.min_freq, self.max_freq)
            .points_count(self.points)
            .points_ignore(self.ignore.clone())
            .zoomer(self.zoomer)
            .damper(self.damper)
            .distance(self.distance)
            .weight(self.weight)
            .mode(self.mode.into())
            .build()
            .context("invalid fingerprint settings")
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let settings = args.settings()?;

    let library = Library::load(&args.library)
        .with_context(|| format!("failed to load library {}", args.library.display()))?;
    if library.is_empty() {
        log::warn!("No .wav files found in {}", args.library.display());
    }
    let sample = Sample::load(&args.sample)
        .with_context(|| format!("failed to load sample {}", args.sample.display()))?;

    if let Some(plot) = &args.plot {
        visualize::render_spectrogram(sample.blocks(), &settings, plot)?;
    }

    if args.sweep {
        if args.db.is_some() {
            log::warn!("--db is ignored during a sweep");
        }
        run_sweep(&library, &sample, &args)
    } else {
        run_single(&library, &sample, &settings, args.db.as_ref())
    }
}

fn run_single(
    library: &Library,
    sample: &Sample,
    settings: &FingerprintSettings,
    db_path: Option<&PathBuf>,
) -> Result<()> {
    let index = match db_path {
        Some(path) => {
            let mut conn = db::setup_database(path)
                .with_context(|| format!("failed to open database {}", path.display()))?;
            match db::load_index(&conn, settings)? {
                Some(index) => index,
                None => {
                    let index = library.build_index(settings)?;
                    db::save_index(&mut conn, &index)?;
                    index
                }
            }
        }
        None => library.build_index(settings)?,
    };

    log::info!(
        "Index ready: {} references, {} distinct fingerprints",
        index.reference_count(),
        index.len()
    );

    let outcome = sample.match_against(&index);
    print_scores(&outcome, &index);
    print_outcome(&outcome, &index);
    Ok(())
}

/// The default sweep over the analysed range and band count given on the
/// command line.
fn sweep_grid(args: &Args) -> SweepGrid {
    SweepGrid {
        min_freq: args.min_freq,
        max_freq: args.max_freq,
        ..SweepGrid::default()
    }
    .with_points_count(args.points)
}

fn run_sweep(library: &Library, sample: &Sample, args: &Args) -> Result<()> {
    let grid = sweep_grid(args);
    let configurations = grid.expand().context("invalid sweep grid")?;
    log::info!("Sweeping {} configurations", configurations.len());

    let mut best: Option<(FingerprintSettings, MatchOutcome, Option<String>)> = None;

    for settings in configurations {
        let index = library.build_index(&settings)?;
        let outcome = sample.match_against(&index);
        let winner = outcome.winner_name(&index).map(str::to_string);

        println!(
            "{} -> Score: {} {} ({}%)",
            settings,
            outcome.score,
            winner.as_deref().unwrap_or("-"),
            outcome.confidence
        );

        let better = match &best {
            None => outcome.is_match(),
            Some((_, top, _)) => {
                (outcome.confidence, outcome.score) > (top.confidence, top.score)
            }
        };
        if better {
            best = Some((settings, outcome, winner));
        }
    }

    match best {
        Some((settings, outcome, winner)) => println!(
            "\nBest configuration: {}\n  ├ Match: {}\n  ├ Score: {}\n  └ Confidence: {}% ({})",
            settings,
            winner.as_deref().unwrap_or("-"),
            outcome.score,
            outcome.confidence,
            get_match_quality(outcome.confidence)
        ),
        None => println!("\nNo configuration produced a match."),
    }

    Ok(())
}

fn print_scores(outcome: &MatchOutcome, index: &FingerprintIndex) {
    if outcome.scores.is_empty() {
        return;
    }
    println!("Scores:");
    for &(id, score) in &outcome.scores {
        println!("  {:>8}  {}", score, index.reference_name(id).unwrap_or("?"));
    }
}

fn print_outcome(outcome: &MatchOutcome, index: &FingerprintIndex) {
    match outcome.winner_name(index) {
        Some(name) => println!(
            "Match: {}\n  ├ Score: {}\n  ├ Confidence: {}%\n  └ Quality: {}",
            name,
            outcome.score,
            outcome.confidence,
            get_match_quality(outcome.confidence)
        ),
        None => println!("No match found."),
    }
}

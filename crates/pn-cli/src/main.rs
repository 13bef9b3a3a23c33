//! PitchNet command line
//!
//! Usage:
//!   pitchnet voice.wav                      - writes voice-pitch/-periodicity.safetensors
//!   pitchnet takes/ --decoder viterbi       - every audio file under takes/
//!   pitchnet a.wav b.wav -o out/a out/b     - explicit output prefixes
//!   pitchnet a.wav --benchmark              - print stage timings as JSON

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use pn_audio::AudioDecoder;
use pn_core::{Decoder, PeriodicityMethod, PitchConfig};
use pn_pipeline::Estimator;
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(name = "pitchnet", about = "Neural pitch and periodicity estimation")]
struct Cli {
    /// Audio files or directories to process
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Output prefixes, one per input file (default: input path without extension)
    #[arg(short, long, num_args = 1..)]
    output: Option<Vec<PathBuf>>,

    /// JSON configuration; only the keys present override defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// ONNX model checkpoint
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Hop between frames in seconds
    #[arg(long)]
    hopsize: Option<f64>,

    /// Lowest allowed frequency (Hz)
    #[arg(long)]
    fmin: Option<f64>,

    /// Highest allowed frequency (Hz)
    #[arg(long)]
    fmax: Option<f64>,

    /// Frames per inference call (default: all frames at once)
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// GPU index (default: CPU)
    #[arg(short, long)]
    gpu: Option<usize>,

    /// Pitch decoder: argmax, average, weighted, viterbi or viterbi-<octaves/s>
    #[arg(long)]
    decoder: Option<Decoder>,

    /// Periodicity method: entropy, max or sum
    #[arg(long)]
    periodicity: Option<PeriodicityMethod>,

    /// Feed frames to the model without normalization
    #[arg(long)]
    no_normalize: bool,

    /// Report per-stage timings
    #[arg(long)]
    benchmark: bool,

    /// Write the timing report here instead of stdout
    #[arg(long, requires = "benchmark")]
    timing: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;
    let files = expand_inputs(&cli.files)?;
    if files.is_empty() {
        bail!("No supported audio files found");
    }

    let mut estimator = Estimator::new(config).context("Failed to create estimator")?;
    estimator.set_benchmark(cli.benchmark);

    let written = estimator
        .from_files_to_files(&files, cli.output.as_deref(), |progress| {
            log::info!(
                "{:>3.0}% {}",
                progress.fraction() * 100.0,
                progress.path.display()
            );
        })
        .context("Pitch estimation failed")?;

    log::info!("Wrote {} pitch tracks", written.len());

    if cli.benchmark {
        let json = estimator
            .timing_report()
            .to_json()
            .context("Failed to serialize timing report")?;
        match &cli.timing {
            Some(path) => std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?,
            None => println!("{}", json),
        }
    }

    Ok(())
}

/// Defaults, then the JSON file, then command-line flags
fn build_config(cli: &Cli) -> Result<PitchConfig> {
    let mut config = match &cli.config {
        Some(path) => PitchConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PitchConfig::default(),
    };

    if let Some(checkpoint) = &cli.checkpoint {
        config.checkpoint = checkpoint.clone();
    }
    if let Some(hopsize) = cli.hopsize {
        config.hopsize = hopsize;
    }
    if let Some(fmin) = cli.fmin {
        config.fmin = fmin;
    }
    if let Some(fmax) = cli.fmax {
        config.fmax = fmax;
    }
    if cli.batch_size.is_some() {
        config.batch_size = cli.batch_size;
    }
    if cli.gpu.is_some() {
        config.gpu = cli.gpu;
    }
    if let Some(decoder) = cli.decoder {
        config.decoder = decoder;
    }
    if let Some(periodicity) = cli.periodicity {
        config.periodicity = periodicity;
    }
    if cli.no_normalize {
        config.normalize_frames = false;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Files as given; directories replaced by the audio files inside, sorted
fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .into_iter()
                .filter_map(|e| e.ok())
                .map(|e| e.into_path())
                .filter(|path| path.is_file() && AudioDecoder::is_supported(path))
                .collect();
            found.sort();
            log::debug!("{}: {} audio files", input.display(), found.len());
            files.extend(found);
        } else {
            files.push(input.to_path_buf());
        }
    }

    Ok(files)
}

//! clipprep CLI - dataset discovery, feature extraction and splitting

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use clipprep::config::PipelineConfig;
use clipprep::feature::FeatureKind;
use clipprep::metadata::{DatasetSummary, list_audio_files, load_ground_truth, load_vocabulary};
use clipprep::paths::{DatasetLayout, DatasetRoot, PathResolver, Subset};
use clipprep::pipeline::{pending, run_batch};
use clipprep::split::{random_split, write_split_files};
use clipprep::store::FeatureStore;

/// Prepare audio clips, labels and splits for training
#[derive(Parser, Debug)]
#[command(name = "clipprep")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Dataset root; skips the default search (FSD50K_DIR, data/raw/FSD50K, ...)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Find the dataset and print file counts
    Locate,

    /// Extract features for every clip of a subset
    Extract {
        /// Output feature directory
        #[arg(short, long)]
        out: PathBuf,

        /// JSON pipeline config; defaults are used when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Dataset subset (dev or eval)
        #[arg(long, default_value = "dev")]
        subset: Subset,

        /// Feature kind, overriding the config file
        #[arg(long, value_parser = parse_kind)]
        kind: Option<FeatureKind>,

        /// Recompute clips that already have output
        #[arg(long)]
        overwrite: bool,

        /// Only process the first N clips
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Write a seeded train/validation split manifest
    Split {
        /// Output directory for train_files.json / val_files.json
        #[arg(short, long)]
        out: PathBuf,

        /// JSON pipeline config whose `split` section supplies the defaults
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Fraction of clips assigned to validation [default: 0.2]
        #[arg(long)]
        ratio: Option<f64>,

        /// Random seed [default: 42]
        #[arg(long)]
        seed: Option<u64>,

        /// Dataset subset (dev or eval)
        #[arg(long, default_value = "dev")]
        subset: Subset,

        /// Use the split column of the ground truth instead of a random split
        #[arg(long)]
        official: bool,
    },

    /// Write the label vocabulary as JSON
    Vocab {
        /// Output file
        #[arg(short, long, default_value = "vocabulary.json")]
        out: PathBuf,

        /// Also check that the dev ground truth only uses known labels
        #[arg(long)]
        check: bool,
    },
}

fn parse_kind(s: &str) -> std::result::Result<FeatureKind, String> {
    match s {
        "log_mel" | "logmel" => Ok(FeatureKind::LogMel),
        "mfcc" => Ok(FeatureKind::Mfcc),
        other => Err(format!("unknown feature kind `{other}` (log_mel or mfcc)")),
    }
}

fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn resolve_root(root: Option<PathBuf>) -> Result<DatasetRoot> {
    let resolver = match root {
        Some(path) => PathResolver::new([path], DatasetLayout::fsd50k()),
        None => PathResolver::fsd50k(),
    };
    Ok(resolver.resolve()?)
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Locate => {
            let root = resolve_root(cli.root)?;
            let summary = DatasetSummary::collect(&root).context("counting audio files")?;
            println!("{summary}");
        }

        Commands::Extract {
            out,
            config,
            subset,
            kind,
            overwrite,
            limit,
        } => {
            let mut pipeline = load_config(config.as_deref())?;
            if let Some(kind) = kind {
                pipeline.features.kind = kind;
            }
            if overwrite {
                pipeline.overwrite = true;
            }
            pipeline.validate().context("invalid configuration")?;
            pipeline.log_effective();

            let root = resolve_root(cli.root)?;
            let mut files: Vec<_> = list_audio_files(&root, subset)
                .iter()
                .with_context(|| format!("listing {subset} audio"))?
                .collect();
            if let Some(n) = limit {
                files.truncate(n);
            }
            if files.is_empty() {
                bail!("no audio files found for subset {subset}");
            }

            let store = FeatureStore::create(&out, pipeline.descriptor())
                .with_context(|| format!("opening feature store {}", out.display()))?;
            let todo = pending(&files, &store);
            log::info!(
                "{} of {} clips have no stored features yet",
                todo.len(),
                files.len()
            );
            let report = run_batch(&files, &pipeline, &store, None)?;
            println!(
                "{} written, {} reused, {} skipped -> {}",
                report.written,
                report.reused,
                report.skipped.len(),
                out.display()
            );
        }

        Commands::Split {
            out,
            config,
            ratio,
            seed,
            subset,
            official,
        } => {
            let root = resolve_root(cli.root)?;
            let assignment = if official {
                load_ground_truth(&root, subset)?.official_split()?
            } else {
                let ids = list_audio_files(&root, subset)
                    .ids()
                    .with_context(|| format!("listing {subset} audio"))?;
                let mut split = load_config(config.as_deref())?.split;
                split.ratio = ratio.unwrap_or(split.ratio);
                split.seed = seed.unwrap_or(split.seed);
                random_split(&ids, split.ratio, split.seed)?
            };
            write_split_files(&assignment, &out)
                .with_context(|| format!("writing split manifest to {}", out.display()))?;
            println!(
                "{} train / {} val -> {}",
                assignment.train().len(),
                assignment.val().len(),
                out.display()
            );
        }

        Commands::Vocab { out, check } => {
            let root = resolve_root(cli.root)?;
            let vocab = load_vocabulary(&root)?;
            if check {
                load_ground_truth(&root, Subset::Dev)?.check_vocabulary(&vocab)?;
            }
            vocab
                .write_json(&out)
                .with_context(|| format!("writing {}", out.display()))?;
            println!("{} labels -> {}", vocab.len(), out.display());
        }
    }

    Ok(())
}

//! spksim - batch speaker similarity scoring.

mod batch;
mod pairs;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use spksim_cli::{load_config, resolve_cache_dir, Paths};
use spksim_voiceprint::{
    builtin_models, check_selection, Family, HfHub, ModelSelection, Registry, SessionOptions,
    WeightsSource,
};
use tracing_subscriber::EnvFilter;

use pairs::PairMode;

/// Batch speaker similarity scoring.
///
/// Reads a pairs file with one `candidate|reference` pair per line, embeds
/// both recordings with a speaker embedding model and reports their cosine
/// similarity. With --synth-dir, lines are `utt_id|reference` and the
/// candidate is <synth-dir>/<utt_id>.wav.
///
/// Configuration is read from ~/.spksim/config.yaml; downloaded models are
/// cached in ~/.spksim/cache.
#[derive(Parser, Debug)]
#[command(name = "spksim")]
#[command(about = "Batch speaker similarity scoring")]
#[command(version)]
struct Args {
    /// Pairs file: `candidate|reference` (or `utt_id|reference`) per line
    #[arg(required_unless_present = "list_models")]
    pairs_file: Option<PathBuf>,

    /// Base directory for relative paths in the pairs file
    #[arg(conflicts_with = "synth_dir")]
    audio_dir: Option<PathBuf>,

    /// Registry model name (see --list-models)
    #[arg(
        short,
        long,
        conflicts_with = "model_path",
        required_unless_present_any = ["model_path", "list_models"]
    )]
    model: Option<String>,

    /// Local ONNX weights file
    #[arg(long, requires = "family")]
    model_path: Option<PathBuf>,

    /// Model family of --model-path
    #[arg(long, requires = "model_path", value_parser = parse_family)]
    family: Option<Family>,

    /// Feature extractor directory for a local wavlm model
    #[arg(long, requires = "model_path")]
    feature_extractor: Option<PathBuf>,

    /// Synthesized audio directory; switches to `utt_id|reference` lines
    #[arg(long)]
    synth_dir: Option<PathBuf>,

    /// Save results as CSV
    #[arg(short = 'o', long)]
    output_file: Option<PathBuf>,

    /// Model cache directory (default is ~/.spksim/cache)
    #[arg(long, env = "SPKSIM_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Config file (default is ~/.spksim/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// List available models and exit
    #[arg(long)]
    list_models: bool,

    /// Intra-op threads for inference
    #[arg(long)]
    threads: Option<usize>,

    /// Verbose output
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn parse_family(s: &str) -> Result<Family, String> {
    s.parse::<Family>().map_err(|e| e.to_string())
}

impl Args {
    fn selection(&self) -> Option<ModelSelection> {
        if let Some(weights) = &self.model_path {
            return Some(ModelSelection::Local {
                family: self.family?,
                weights: weights.clone(),
                feature_extractor: self.feature_extractor.clone(),
            });
        }
        self.model.clone().map(ModelSelection::Named)
    }

    fn pair_mode(&self) -> PairMode {
        match &self.synth_dir {
            Some(dir) => PairMode::Utterance {
                synth_dir: dir.clone(),
            },
            None => PairMode::Candidate {
                base_dir: self.audio_dir.clone(),
            },
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug,ort=info" } else { "info,ort=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    run(args, &Paths::new()?)
}

fn run(args: Args, paths: &Paths) -> Result<()> {
    let config = load_config(paths, args.config.as_deref())?;
    let config_models = config.model_descriptors(paths)?;

    // Reject a bad selection before the cache directory is created.
    let selection = if args.list_models {
        None
    } else {
        let selection = args
            .selection()
            .context("either --model or --model-path with --family is required")?;
        let known: Vec<_> = builtin_models().into_iter().chain(config_models.iter().cloned()).collect();
        check_selection(&selection, &known).context("Error loading model")?;
        Some(selection)
    };

    let cache_dir = resolve_cache_dir(args.cache_dir.as_deref(), &config, paths);
    let registry = Registry::new(&cache_dir)
        .with_context(|| format!("create model cache {}", cache_dir.display()))?
        .with_hub(HfHub::new(&cache_dir).with_progress(true))
        .with_models(config_models)
        .with_session_options(SessionOptions {
            intra_threads: args.threads,
        });

    let Some(selection) = selection else {
        println!("Available models:");
        for m in registry.models() {
            let source = match &m.weights {
                WeightsSource::Local(path) => path.display().to_string(),
                WeightsSource::Remote { repo_id, filename } => format!("{repo_id}/{filename}"),
            };
            println!("  {:<32} {:<12} {}", m.name, m.family, source);
        }
        return Ok(());
    };

    let model = registry.load(&selection).context("Error loading model")?;

    let pairs_file = args.pairs_file.as_deref().context("pairs file is required")?;
    let pairs = read_pairs(pairs_file)?;

    let mode = args.pair_mode();
    let report = batch::run(&model, &pairs, &mode);

    let mut stdout = std::io::stdout().lock();
    if !batch::finish(&report, mode.layout(), args.output_file.as_deref(), &mut stdout)? {
        eprintln!("No valid pairs processed.");
    }
    Ok(())
}

fn read_pairs(path: &Path) -> Result<String> {
    if !path.is_file() {
        bail!("Meta file not found at {}", path.display());
    }
    std::fs::read_to_string(path).with_context(|| format!("read pairs file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(argv: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("spksim").chain(argv.iter().copied()))
    }

    #[test]
    fn cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn named_model() {
        let args = parse(&["pairs.txt", "audio", "-m", "wespeaker-resnet34", "-o", "out.csv"]).unwrap();
        assert_eq!(args.pairs_file, Some(PathBuf::from("pairs.txt")));
        assert_eq!(
            args.selection(),
            Some(ModelSelection::Named("wespeaker-resnet34".into()))
        );
        assert_eq!(
            args.pair_mode(),
            PairMode::Candidate {
                base_dir: Some(PathBuf::from("audio"))
            }
        );
    }

    #[test]
    fn local_model_requires_family() {
        assert!(parse(&["pairs.txt", "--model-path", "m.onnx"]).is_err());

        let args = parse(&[
            "pairs.txt",
            "--model-path",
            "m.onnx",
            "--family",
            "wavlm",
            "--feature-extractor",
            "fe",
        ])
        .unwrap();
        assert_eq!(
            args.selection(),
            Some(ModelSelection::Local {
                family: Family::WavLm,
                weights: PathBuf::from("m.onnx"),
                feature_extractor: Some(PathBuf::from("fe")),
            })
        );
    }

    #[test]
    fn model_choice_is_exclusive_and_required() {
        assert!(parse(&["pairs.txt"]).is_err());
        assert!(parse(&[
            "pairs.txt",
            "-m",
            "resemblyzer",
            "--model-path",
            "m.onnx",
            "--family",
            "resemblyzer"
        ])
        .is_err());
        assert!(parse(&["pairs.txt", "-m", "x", "--family", "ecapa"]).is_err());
    }

    #[test]
    fn synth_dir_selects_utterance_mode() {
        let args = parse(&["pairs.txt", "-m", "resemblyzer", "--synth-dir", "synth"]).unwrap();
        assert_eq!(
            args.pair_mode(),
            PairMode::Utterance {
                synth_dir: PathBuf::from("synth")
            }
        );
        assert!(parse(&["pairs.txt", "audio", "-m", "resemblyzer", "--synth-dir", "synth"]).is_err());
    }

    #[test]
    fn list_models_needs_nothing_else() {
        let args = parse(&["--list-models"]).unwrap();
        assert!(args.list_models);
        assert!(args.selection().is_none());
    }

    #[test]
    fn unknown_model_fails_before_cache_is_created() {
        let home = tempfile::tempdir().unwrap();
        let cache = home.path().join("models");
        let args = parse(&[
            "missing-pairs.txt",
            "-m",
            "not-a-model",
            "--cache-dir",
            cache.to_str().unwrap(),
        ])
        .unwrap();

        let err = run(args, &Paths::with_home(home.path())).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("Error loading model"), "{msg}");
        assert!(msg.contains("not-a-model"), "{msg}");
        assert!(msg.contains("wespeaker-resnet34"), "{msg}");
        assert!(!cache.exists());
    }

    #[test]
    fn read_pairs_errors_name_the_cause() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.txt");
        let err = read_pairs(&missing).unwrap_err();
        assert!(err.to_string().starts_with("Meta file not found at"));

        let binary = dir.path().join("binary.txt");
        std::fs::write(&binary, [0xff, 0xfe, 0x00, b'|']).unwrap();
        let err = read_pairs(&binary).unwrap_err();
        assert!(err.to_string().starts_with("read pairs file"), "{err:#}");

        let ok = dir.path().join("pairs.txt");
        std::fs::write(&ok, "a.wav|b.wav\n").unwrap();
        assert_eq!(read_pairs(&ok).unwrap(), "a.wav|b.wav\n");
    }
}

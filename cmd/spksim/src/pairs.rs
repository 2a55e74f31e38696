//! Pairs file lines and path resolution.

use std::path::{Path, PathBuf};

use spksim_cli::ScoreLayout;

/// How the left-hand token of a pairs line is interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairMode {
    /// `candidate_path|reference_path`; relative paths are joined to
    /// `base_dir` when one is given.
    Candidate { base_dir: Option<PathBuf> },
    /// `utt_id|reference_path`; the candidate is `<synth_dir>/<utt_id>.wav`.
    Utterance { synth_dir: PathBuf },
}

/// A pairs line resolved to file paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    /// Candidate file name, or utterance id.
    pub id: String,
    /// Reference file name.
    pub reference_id: String,
    pub candidate: PathBuf,
    pub reference: PathBuf,
}

/// Splits a line on its first `|` and trims both sides.
///
/// Returns `None` for blank lines and lines without a separator.
pub fn split_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (left, right) = line.split_once('|')?;
    Some((left.trim(), right.trim()))
}

impl PairMode {
    /// Result table layout for this mode.
    pub fn layout(&self) -> ScoreLayout {
        match self {
            PairMode::Candidate { .. } => ScoreLayout::CandidateReference,
            PairMode::Utterance { .. } => ScoreLayout::UttId,
        }
    }

    /// Resolves the two tokens of a line to paths and identifiers.
    pub fn resolve(&self, left: &str, right: &str) -> Pair {
        match self {
            PairMode::Candidate { base_dir } => {
                let candidate = join_base(base_dir.as_deref(), left);
                let reference = join_base(base_dir.as_deref(), right);
                Pair {
                    id: file_name(&candidate),
                    reference_id: file_name(&reference),
                    candidate,
                    reference,
                }
            }
            PairMode::Utterance { synth_dir } => {
                let reference = PathBuf::from(right);
                Pair {
                    id: left.to_string(),
                    reference_id: file_name(&reference),
                    candidate: synth_dir.join(format!("{left}.wav")),
                    reference,
                }
            }
        }
    }
}

fn join_base(base: Option<&Path>, token: &str) -> PathBuf {
    let p = Path::new(token);
    match base {
        Some(dir) if p.is_relative() => dir.join(p),
        _ => p.to_path_buf(),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

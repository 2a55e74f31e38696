//! Batch scoring over a pairs file.

use std::io::Write;
use std::path::Path;

use spksim_cli::{mean_score, save_csv, ScoreLayout, ScoreRecord};
use spksim_voiceprint::{SpeakerModel, VoiceprintError};
use tracing::{debug, error, info, warn};

use crate::pairs::{split_line, Pair, PairMode};

/// Outcome of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Scored pairs, in file order.
    pub records: Vec<ScoreRecord>,
    /// Pairs skipped because a file was missing.
    pub skipped: usize,
    /// Pairs that failed to score.
    pub failed: usize,
    /// Pair lines in the file.
    pub total: usize,
}

impl BatchReport {
    /// Pairs handled so far, whatever their outcome.
    pub fn attempted(&self) -> usize {
        self.records.len() + self.skipped + self.failed
    }

    pub fn mean(&self) -> Option<f64> {
        mean_score(&self.records)
    }
}

/// Scores every pair in `pairs`, one line at a time.
///
/// Missing files are warned about and skipped; any other per-pair failure
/// is logged with its line and the batch continues.
pub fn run<M: SpeakerModel + ?Sized>(model: &M, pairs: &str, mode: &PairMode) -> BatchReport {
    let mut report = BatchReport {
        total: pairs.lines().filter(|l| split_line(l).is_some()).count(),
        ..BatchReport::default()
    };

    for (line_no, raw) in pairs.lines().enumerate() {
        let Some((left, right)) = split_line(raw) else {
            continue;
        };
        let pair = mode.resolve(left, right);
        info!("[{}/{}] {}", report.attempted() + 1, report.total, pair.id);

        if !pair.candidate.is_file() {
            warn!("Candidate file not found: {}", pair.candidate.display());
            report.skipped += 1;
            continue;
        }
        if !pair.reference.is_file() {
            warn!("Reference file not found: {}", pair.reference.display());
            report.skipped += 1;
            continue;
        }

        debug!(line = line_no + 1, id = %pair.id, "scoring pair");
        match score_pair(model, &pair) {
            Ok(score) => {
                debug!(id = %pair.id, score, "scored");
                report.records.push(ScoreRecord {
                    id: pair.id,
                    reference: Some(pair.reference_id),
                    score,
                });
            }
            Err(e) => {
                error!("Error processing line '{}': {e}", raw.trim());
                report.failed += 1;
            }
        }
    }

    info!(
        processed = report.records.len(),
        skipped = report.skipped,
        failed = report.failed,
        total = report.total,
        "batch finished"
    );
    report
}

fn score_pair<M: SpeakerModel + ?Sized>(model: &M, pair: &Pair) -> Result<f64, VoiceprintError> {
    let candidate = model.extract_features(&pair.candidate)?;
    let reference = model.extract_features(&pair.reference)?;
    let a = model.infer(&candidate)?;
    let b = model.infer(&reference)?;
    model.compute_similarity(&a, &b)
}

/// Prints the summary and writes the results file.
///
/// With no scored pairs nothing is written and `Ok(false)` is returned.
pub fn finish<W: Write>(
    report: &BatchReport,
    layout: ScoreLayout,
    output_file: Option<&Path>,
    out: &mut W,
) -> anyhow::Result<bool> {
    let Some(mean) = report.mean() else {
        return Ok(false);
    };

    writeln!(
        out,
        "Done! Processed {} pairs. Average Score: {mean:.4}",
        report.records.len()
    )?;

    if let Some(path) = output_file {
        save_csv(path, layout, &report.records)?;
        writeln!(out, "Results saved to {}", path.display())?;
    }
    Ok(true)
}

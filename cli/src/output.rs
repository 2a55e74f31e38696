//! Result output for batch scoring.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Context as _;

/// Shape of the results table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScoreLayout {
    /// `candidate,reference,score`
    #[default]
    CandidateReference,
    /// `utt_id,score`
    UttId,
}

impl ScoreLayout {
    pub fn header(&self) -> &'static str {
        match self {
            ScoreLayout::CandidateReference => "candidate,reference,score",
            ScoreLayout::UttId => "utt_id,score",
        }
    }
}

/// One scored pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    /// Candidate file name, or utterance id.
    pub id: String,
    /// Reference file name; unused in the `utt_id` layout.
    pub reference: Option<String>,
    pub score: f64,
}

/// Arithmetic mean of all scores, `None` when there are none.
pub fn mean_score(records: &[ScoreRecord]) -> Option<f64> {
    if records.is_empty() {
        return None;
    }
    Some(records.iter().map(|r| r.score).sum::<f64>() / records.len() as f64)
}

/// Writes records as CSV with a header row; scores have 6 decimals.
pub fn write_csv<W: Write>(mut w: W, layout: ScoreLayout, records: &[ScoreRecord]) -> std::io::Result<()> {
    writeln!(w, "{}", layout.header())?;
    for r in records {
        match layout {
            ScoreLayout::CandidateReference => writeln!(
                w,
                "{},{},{:.6}",
                csv_field(&r.id),
                csv_field(r.reference.as_deref().unwrap_or("")),
                r.score
            )?,
            ScoreLayout::UttId => writeln!(w, "{},{:.6}", csv_field(&r.id), r.score)?,
        }
    }
    w.flush()
}

/// Writes records to a CSV file, creating parent directories.
pub fn save_csv(path: &Path, layout: ScoreLayout, records: &[ScoreRecord]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    write_csv(BufWriter::new(file), layout, records)
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Quotes a field if it contains a delimiter, quote or line break.
fn csv_field(s: &str) -> std::borrow::Cow<'_, str> {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\"")).into()
    } else {
        s.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, reference: Option<&str>, score: f64) -> ScoreRecord {
        ScoreRecord {
            id: id.into(),
            reference: reference.map(Into::into),
            score,
        }
    }

    #[test]
    fn test_candidate_layout() {
        let mut buf = Vec::new();
        let records = [rec("a.wav", Some("ref.wav"), 0.8), rec("b.wav", Some("ref.wav"), -0.1234567)];
        write_csv(&mut buf, ScoreLayout::CandidateReference, &records).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "candidate,reference,score\na.wav,ref.wav,0.800000\nb.wav,ref.wav,-0.123457\n"
        );
    }

    #[test]
    fn test_utt_id_layout() {
        let mut buf = Vec::new();
        write_csv(&mut buf, ScoreLayout::UttId, &[rec("utt001", Some("r.wav"), 0.5)]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "utt_id,score\nutt001,0.500000\n");
    }

    #[test]
    fn test_header_only() {
        let mut buf = Vec::new();
        write_csv(&mut buf, ScoreLayout::UttId, &[]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "utt_id,score\n");
    }

    #[test]
    fn test_quoting() {
        assert_eq!(csv_field("plain.wav"), "plain.wav");
        assert_eq!(csv_field("a,b.wav"), "\"a,b.wav\"");
        assert_eq!(csv_field("say \"hi\".wav"), "\"say \"\"hi\"\".wav\"");
    }

    #[test]
    fn test_mean_score() {
        assert_eq!(mean_score(&[]), None);
        let m = mean_score(&[rec("a", None, 0.5), rec("b", None, 1.0)]).unwrap();
        assert!((m - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_save_csv_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("scores.csv");
        save_csv(&path, ScoreLayout::UttId, &[rec("u1", None, 0.25)]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "utt_id,score\nu1,0.250000\n");
    }
}

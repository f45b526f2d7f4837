use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::metrics::{
    aa_match_metrics, aa_precision_recall, split_aa_scores, MetricReport, PeptideMatcher,
    ThresholdMetrics,
};

/// One row of the de novo output table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsmRecord {
    pub spectrum_id: String,
    /// Ground-truth peptide; empty for unlabelled spectra.
    #[serde(default)]
    pub peptides_true: String,
    #[serde(default)]
    pub peptides_pred: String,
    #[serde(default)]
    pub peptides_score: f64,
    /// Per-residue scores of the prediction, comma-separated.
    #[serde(default)]
    pub aa_scores: String,
    #[serde(default)]
    pub precursor_mz: f64,
    #[serde(default)]
    pub precursor_charge: u32,
    /// Theoretical m/z of the predicted peptide at the precursor charge.
    #[serde(default)]
    pub calc_mz: f64,
}

impl PsmRecord {
    pub fn aa_score_values(&self) -> Vec<f64> {
        if self.aa_scores.trim().is_empty() {
            return Vec::new();
        }
        self.aa_scores
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect()
    }

    pub fn set_aa_scores(&mut self, scores: &[f64]) {
        self.aa_scores = format_aa_scores(scores);
    }

    pub fn is_labelled(&self) -> bool {
        !self.peptides_true.is_empty()
    }
}

pub fn format_aa_scores(scores: &[f64]) -> String {
    scores
        .iter()
        .map(|s| format!("{s:.5}"))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn write_psms(path: &Path, records: &[PsmRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for rec in records {
        writer.serialize(rec).context("writing PSM row")?;
    }
    writer.flush().context("flushing PSM table")?;
    Ok(())
}

pub fn read_psms(path: &Path) -> Result<Vec<PsmRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    reader
        .deserialize()
        .enumerate()
        .map(|(row, rec)| rec.with_context(|| format!("{} row {row}", path.display())))
        .collect()
}

/// Score the labelled rows of a de novo table. Peptides are tokenized with
/// the configured residue alphabet; unlabelled rows are ignored.
pub fn metrics_from_records(records: &[PsmRecord], config: &Config) -> Result<MetricReport> {
    let eval = &config.evaluation;
    let matcher = PeptideMatcher::new(&config.residues, &eval.ptm_list)?
        .with_thresholds(eval.cum_mass_threshold, eval.ind_mass_threshold)
        .with_mode(eval.mode);

    let labelled: Vec<&PsmRecord> = records.iter().filter(|r| r.is_labelled()).collect();
    if labelled.len() < records.len() {
        log::info!(
            "Ignoring {} unlabelled rows out of {}",
            records.len() - labelled.len(),
            records.len()
        );
    }
    let mut truth = Vec::with_capacity(labelled.len());
    let mut preds = Vec::with_capacity(labelled.len());
    for rec in &labelled {
        let t = config
            .residues
            .tokenize(&rec.peptides_true)
            .with_context(|| format!("ground truth of spectrum {}", rec.spectrum_id))?;
        let p = config
            .residues
            .tokenize(&rec.peptides_pred)
            .with_context(|| format!("prediction for spectrum {}", rec.spectrum_id))?;
        truth.push(t);
        preds.push(p);
    }

    let batch = matcher.match_batch(&truth, &preds);
    let scores: Vec<f64> = labelled.iter().map(|r| r.peptides_score).collect();
    let mut report = aa_match_metrics(&batch, &scores)?;

    if let Some(threshold) = eval.aa_score_threshold {
        let aa_scores: Vec<Vec<f64>> = labelled.iter().map(|r| r.aa_score_values()).collect();
        let (correct, all) = split_aa_scores(&batch, &aa_scores);
        let (aa_precision, aa_recall) =
            aa_precision_recall(&correct, &all, batch.n_aa_true, threshold);
        report.aa_threshold = Some(ThresholdMetrics {
            threshold,
            aa_precision,
            aa_recall,
        });
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, truth: &str, pred: &str, score: f64, aa: &[f64]) -> PsmRecord {
        let mut rec = PsmRecord {
            spectrum_id: id.into(),
            peptides_true: truth.into(),
            peptides_pred: pred.into(),
            peptides_score: score,
            aa_scores: String::new(),
            precursor_mz: 0.0,
            precursor_charge: 2,
            calc_mz: 0.0,
        };
        rec.set_aa_scores(aa);
        rec
    }

    #[test]
    fn aa_scores_round_trip_through_text() {
        let mut rec = PsmRecord {
            spectrum_id: "1".into(),
            peptides_true: String::new(),
            peptides_pred: "PEK".into(),
            peptides_score: 0.5,
            aa_scores: String::new(),
            precursor_mz: 0.0,
            precursor_charge: 2,
            calc_mz: 0.0,
        };
        assert!(rec.aa_score_values().is_empty());
        rec.set_aa_scores(&[1.0, 0.25, 0.0]);
        assert_eq!(rec.aa_scores, "1.00000,0.25000,0.00000");
        assert_eq!(rec.aa_score_values(), vec![1.0, 0.25, 0.0]);
        assert!(!rec.is_labelled());
    }

    #[test]
    fn minimal_table_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("denovo.csv");
        std::fs::write(
            &path,
            "spectrum_id,peptides_true,peptides_pred,peptides_score\nscan1,PEPTIDEK,PEPTIDEK,0.9\nscan2,LLLK,,0.0\n",
        )
        .unwrap();
        let records = read_psms(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].peptides_pred, "PEPTIDEK");
        assert_eq!(records[1].peptides_pred, "");
        assert_eq!(records[1].precursor_charge, 0);
    }

    #[test]
    fn written_table_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/denovo.csv");
        let mut rec = PsmRecord {
            spectrum_id: "run1.7".into(),
            peptides_true: "PEPTIDEK".into(),
            peptides_pred: "PEPTIDEK".into(),
            peptides_score: 0.75,
            aa_scores: String::new(),
            precursor_mz: 465.74,
            precursor_charge: 2,
            calc_mz: 465.7377,
        };
        rec.set_aa_scores(&[1.0, 0.5]);
        write_psms(&path, std::slice::from_ref(&rec)).unwrap();
        assert_eq!(read_psms(&path).unwrap(), vec![rec]);
    }

    #[test]
    fn metrics_over_labelled_rows() {
        let mut cfg = Config::default();
        cfg.evaluation.aa_score_threshold = Some(0.5);
        let records = vec![
            row("a", "PEPTIDEK", "PEPTIDEK", 0.9, &[1.0; 8]),
            row("b", "AMDEFGHK", "", 0.0, &[]),
            row("c", "", "LLLLLLK", 0.4, &[1.0; 7]),
        ];
        let report = metrics_from_records(&records, &cfg).unwrap();
        assert_eq!(report.n_spectra, 2);
        assert!((report.pep_precision - 0.5).abs() < 1e-6);
        assert!((report.aa_precision - 1.0).abs() < 1e-6);
        assert!((report.aa_recall - 0.5).abs() < 1e-6);
        let t = report.aa_threshold.unwrap();
        assert!((t.aa_precision - 1.0).abs() < 1e-9);
        assert!((t.aa_recall - 0.5).abs() < 1e-9);
    }

    #[test]
    fn unknown_residue_in_prediction_is_an_error() {
        let records = vec![row("a", "PEPTIDEK", "PEPTIDEX", 0.9, &[])];
        assert!(metrics_from_records(&records, &Config::default()).is_err());
    }
}

//! Peptide-spectrum prediction metrics.
//!
//! Residues are paired up by mass rather than by position: two residues match
//! when the cumulative masses of the peptides up to them agree within
//! `cum_mass_threshold` and their own masses agree within
//! `ind_mass_threshold`. This is the DeepNovo evaluation criterion, extended
//! with PTM bookkeeping.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{NovoError, Result};
use crate::residues::ResidueSet;

/// Direction in which residues are paired up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Longest matching prefix, then longest matching suffix.
    #[default]
    Best,
    Forward,
    Backward,
}

/// Result of pairing one ground-truth peptide with one prediction.
///
/// All vectors have length `max(len_true, len_pred)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PeptideMatch {
    pub aa_matches: Vec<bool>,
    pub pep_match: bool,
    /// Matched positions whose ground-truth residue is a PTM.
    pub ptm_matches_true: Vec<bool>,
    /// Matched positions whose predicted residue is a PTM.
    pub ptm_matches_pred: Vec<bool>,
}

impl PeptideMatch {
    fn unmatched(len: usize) -> Self {
        PeptideMatch {
            aa_matches: vec![false; len],
            pep_match: false,
            ptm_matches_true: vec![false; len],
            ptm_matches_pred: vec![false; len],
        }
    }

    pub fn n_aa_correct(&self) -> usize {
        self.aa_matches.iter().filter(|m| **m).count()
    }
}

/// Matches for a batch of peptide pairs plus residue totals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchBatch {
    pub matches: Vec<PeptideMatch>,
    pub n_aa_true: usize,
    pub n_aa_pred: usize,
    pub n_ptm_true: usize,
    pub n_ptm_pred: usize,
}

pub struct PeptideMatcher<'a> {
    residues: &'a ResidueSet,
    ptms: HashSet<String>,
    pub cum_mass_threshold: f64,
    pub ind_mass_threshold: f64,
    pub mode: MatchMode,
}

impl<'a> PeptideMatcher<'a> {
    /// Every PTM must be a token of the alphabet.
    pub fn new<S: AsRef<str>>(residues: &'a ResidueSet, ptms: &[S]) -> Result<Self> {
        let mut set = HashSet::with_capacity(ptms.len());
        for ptm in ptms {
            let ptm = ptm.as_ref();
            if !residues.contains(ptm) {
                return Err(NovoError::UnknownPtm(ptm.to_string()));
            }
            set.insert(ptm.to_string());
        }
        Ok(PeptideMatcher {
            residues,
            ptms: set,
            cum_mass_threshold: 0.5,
            ind_mass_threshold: 0.1,
            mode: MatchMode::Best,
        })
    }

    pub fn with_thresholds(mut self, cum_mass_threshold: f64, ind_mass_threshold: f64) -> Self {
        self.cum_mass_threshold = cum_mass_threshold;
        self.ind_mass_threshold = ind_mass_threshold;
        self
    }

    pub fn with_mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    fn is_ptm(&self, token: &str) -> bool {
        self.ptms.contains(token)
    }

    /// Longest mass-matching prefix.
    pub fn match_prefix<S: AsRef<str>>(&self, peptide1: &[S], peptide2: &[S]) -> PeptideMatch {
        let mut m = PeptideMatch::unmatched(peptide1.len().max(peptide2.len()));
        let (mut i1, mut i2) = (0usize, 0usize);
        let (mut cum1, mut cum2) = (0.0f64, 0.0f64);
        while i1 < peptide1.len() && i2 < peptide2.len() {
            let aa1 = peptide1[i1].as_ref();
            let aa2 = peptide2[i2].as_ref();
            let mass1 = self.residues.mass_or_zero(aa1);
            let mass2 = self.residues.mass_or_zero(aa2);
            if ((cum1 + mass1) - (cum2 + mass2)).abs() < self.cum_mass_threshold {
                let idx = i1.max(i2);
                self.record(&mut m, idx, aa1, aa2, mass1, mass2);
                i1 += 1;
                i2 += 1;
                cum1 += mass1;
                cum2 += mass2;
            } else if cum2 + mass2 > cum1 + mass1 {
                i1 += 1;
                cum1 += mass1;
            } else {
                i2 += 1;
                cum2 += mass2;
            }
        }
        m.pep_match = m.aa_matches.iter().all(|x| *x);
        m
    }

    /// Extend a prefix match with the longest mass-matching suffix, walking
    /// back from the peptide ends down to the first unmatched prefix position.
    fn extend_suffix<S: AsRef<str>>(&self, m: &mut PeptideMatch, peptide1: &[S], peptide2: &[S]) {
        let Some(stop) = m.aa_matches.iter().position(|x| !*x) else {
            return;
        };
        let stop = stop as isize;
        let mut i1 = peptide1.len() as isize - 1;
        let mut i2 = peptide2.len() as isize - 1;
        let (mut cum1, mut cum2) = (0.0f64, 0.0f64);
        while i1 >= stop && i2 >= stop {
            let aa1 = peptide1[i1 as usize].as_ref();
            let aa2 = peptide2[i2 as usize].as_ref();
            let mass1 = self.residues.mass_or_zero(aa1);
            let mass2 = self.residues.mass_or_zero(aa2);
            if ((cum1 + mass1) - (cum2 + mass2)).abs() < self.cum_mass_threshold {
                let idx = i1.max(i2) as usize;
                self.record(m, idx, aa1, aa2, mass1, mass2);
                i1 -= 1;
                i2 -= 1;
                cum1 += mass1;
                cum2 += mass2;
            } else if cum2 + mass2 > cum1 + mass1 {
                i1 -= 1;
                cum1 += mass1;
            } else {
                i2 -= 1;
                cum2 += mass2;
            }
        }
        m.pep_match = m.aa_matches.iter().all(|x| *x);
    }

    fn record(&self, m: &mut PeptideMatch, idx: usize, aa1: &str, aa2: &str, mass1: f64, mass2: f64) {
        let matched = (mass1 - mass2).abs() < self.ind_mass_threshold;
        m.aa_matches[idx] = matched;
        if matched {
            m.ptm_matches_true[idx] = self.is_ptm(aa1);
            m.ptm_matches_pred[idx] = self.is_ptm(aa2);
        }
    }

    /// Pair up one ground-truth peptide with one prediction.
    pub fn match_pair<S: AsRef<str>>(&self, peptide1: &[S], peptide2: &[S]) -> PeptideMatch {
        match self.mode {
            MatchMode::Forward => self.match_prefix(peptide1, peptide2),
            MatchMode::Best => {
                let mut m = self.match_prefix(peptide1, peptide2);
                if !m.pep_match {
                    self.extend_suffix(&mut m, peptide1, peptide2);
                }
                m
            }
            MatchMode::Backward => {
                let rev1: Vec<&str> = peptide1.iter().rev().map(AsRef::as_ref).collect();
                let rev2: Vec<&str> = peptide2.iter().rev().map(AsRef::as_ref).collect();
                let mut m = self.match_prefix(&rev1, &rev2);
                m.aa_matches.reverse();
                m.ptm_matches_true.reverse();
                m.ptm_matches_pred.reverse();
                m
            }
        }
    }

    /// Pair up tokenized peptides. Pairs beyond the shorter list are ignored.
    pub fn match_batch<S: AsRef<str>>(&self, peptides1: &[Vec<S>], peptides2: &[Vec<S>]) -> MatchBatch {
        let mut batch = MatchBatch::default();
        for (p1, p2) in peptides1.iter().zip(peptides2) {
            batch.n_aa_true += p1.len();
            batch.n_aa_pred += p2.len();
            batch.n_ptm_true += p1.iter().filter(|aa| self.is_ptm(aa.as_ref())).count();
            batch.n_ptm_pred += p2.iter().filter(|aa| self.is_ptm(aa.as_ref())).count();

            let m = if p2.is_empty() {
                PeptideMatch::unmatched(p1.len())
            } else {
                self.match_pair(p1, p2)
            };
            batch.matches.push(m);
        }
        batch
    }

    /// Tokenize peptide strings with the alphabet, then [`Self::match_batch`].
    pub fn match_batch_str<S: AsRef<str>>(&self, peptides1: &[S], peptides2: &[S]) -> Result<MatchBatch> {
        let tok1 = self.tokenize_all(peptides1)?;
        let tok2 = self.tokenize_all(peptides2)?;
        Ok(self.match_batch(&tok1, &tok2))
    }

    fn tokenize_all<S: AsRef<str>>(&self, peptides: &[S]) -> Result<Vec<Vec<String>>> {
        peptides
            .iter()
            .map(|p| self.residues.tokenize(p.as_ref()))
            .collect()
    }
}

/// Benchmark metrics for a set of predictions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricReport {
    pub n_spectra: usize,
    /// Correct AAs / predicted AAs.
    pub aa_precision: f64,
    /// Correct AAs / true AAs.
    pub aa_recall: f64,
    /// Fully correct peptides / peptides.
    pub pep_precision: f64,
    pub ptm_recall: f64,
    pub ptm_precision: f64,
    /// Area under the peptide precision–coverage curve.
    pub curve_auc: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aa_threshold: Option<ThresholdMetrics>,
}

/// AA precision and recall restricted to residues scored above a threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdMetrics {
    pub threshold: f64,
    pub aa_precision: f64,
    pub aa_recall: f64,
}

const EPS: f64 = 1e-8;

/// AA-, peptide- and PTM-level metrics. `scores` holds one confidence per
/// prediction, aligned with `batch.matches`.
pub fn aa_match_metrics(batch: &MatchBatch, scores: &[f64]) -> Result<MetricReport> {
    if scores.len() != batch.matches.len() {
        return Err(NovoError::ScoreCountMismatch {
            scores: scores.len(),
            peptides: batch.matches.len(),
        });
    }
    let n_aa_correct: usize = batch.matches.iter().map(PeptideMatch::n_aa_correct).sum();
    let n_pep_correct = batch.matches.iter().filter(|m| m.pep_match).count();
    let count = |v: &[bool]| v.iter().filter(|x| **x).count();
    let n_ptm_true_correct: usize = batch.matches.iter().map(|m| count(&m.ptm_matches_true)).sum();
    let n_ptm_pred_correct: usize = batch.matches.iter().map(|m| count(&m.ptm_matches_pred)).sum();

    let curve = precision_coverage_curve(batch, scores)?;

    Ok(MetricReport {
        n_spectra: batch.matches.len(),
        aa_precision: n_aa_correct as f64 / (batch.n_aa_pred as f64 + EPS),
        aa_recall: n_aa_correct as f64 / (batch.n_aa_true as f64 + EPS),
        pep_precision: n_pep_correct as f64 / (batch.matches.len() as f64 + EPS),
        ptm_recall: n_ptm_true_correct as f64 / (batch.n_ptm_true as f64 + EPS),
        ptm_precision: n_ptm_pred_correct as f64 / (batch.n_ptm_pred as f64 + EPS),
        curve_auc: curve_auc(&curve),
        aa_threshold: None,
    })
}

/// One point of the precision–coverage curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub recall: f64,
    pub precision: f64,
}

/// Peptide precision and recall after accepting the top-k predictions by
/// descending score, for every k. Ties keep their input order.
pub fn precision_coverage_curve(batch: &MatchBatch, scores: &[f64]) -> Result<Vec<CurvePoint>> {
    if scores.len() != batch.matches.len() {
        return Err(NovoError::ScoreCountMismatch {
            scores: scores.len(),
            peptides: batch.matches.len(),
        });
    }
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let n = order.len() as f64;
    let mut correct = 0usize;
    Ok(order
        .iter()
        .enumerate()
        .map(|(k, &i)| {
            if batch.matches[i].pep_match {
                correct += 1;
            }
            CurvePoint {
                recall: correct as f64 / n,
                precision: correct as f64 / (k + 1) as f64,
            }
        })
        .collect())
}

/// Trapezoidal area under precision as a function of recall. Fewer than two
/// points enclose no area.
pub fn curve_auc(curve: &[CurvePoint]) -> f64 {
    curve
        .windows(2)
        .map(|w| (w[1].recall - w[0].recall) * (w[1].precision + w[0].precision) / 2.0)
        .sum()
}

/// AA precision and recall counting only residues scored above `threshold`.
/// Empty denominators yield 0.
pub fn aa_precision_recall(
    aa_scores_correct: &[f64],
    aa_scores_all: &[f64],
    n_aa_total: usize,
    threshold: f64,
) -> (f64, f64) {
    let n_correct = aa_scores_correct.iter().filter(|s| **s > threshold).count() as f64;
    let n_predicted = aa_scores_all.iter().filter(|s| **s > threshold).count() as f64;
    let precision = if n_predicted > 0.0 { n_correct / n_predicted } else { 0.0 };
    let recall = if n_aa_total > 0 { n_correct / n_aa_total as f64 } else { 0.0 };
    (precision, recall)
}

/// Split per-residue prediction scores into (scores of correct residues,
/// all scores). A predicted residue at position `j` counts as correct when
/// the match flags it at `j`.
pub fn split_aa_scores(batch: &MatchBatch, aa_scores: &[Vec<f64>]) -> (Vec<f64>, Vec<f64>) {
    let mut correct = Vec::new();
    let mut all = Vec::new();
    for (m, scores) in batch.matches.iter().zip(aa_scores) {
        for (j, &s) in scores.iter().enumerate() {
            all.push(s);
            if m.aa_matches.get(j).copied().unwrap_or(false) {
                correct.push(s);
            }
        }
    }
    (correct, all)
}

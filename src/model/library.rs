//! Spectral library search baseline.
//!
//! Training memorises the unique labelled peptides. Prediction selects the
//! library peptides whose mass fits the precursor (within the ppm tolerance,
//! allowing 13C isotope errors) and keeps the one whose singly charged b/y
//! fragment ions best explain the observed peaks.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{DenovoModel, Prediction};
use crate::config::Config;
use crate::data::model::{SpectralDataset, Spectrum};
use crate::error::NovoError;
use crate::mass::{mass_diff, neutral_mass, C13_SHIFT, H2O, PROTON};
use crate::residues::ResidueSet;

const CHECKPOINT_VERSION: u32 = 1;
const MODEL_NAME: &str = "library";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub peptide: String,
    /// Neutral monoisotopic mass.
    pub mass: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Checkpoint {
    format_version: u32,
    model: String,
    residues: ResidueSet,
    precursor_mass_tol: f64,
    entries: Vec<LibraryEntry>,
}

/// Search parameters, always taken from the active config.
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// ppm.
    pub precursor_mass_tol: f64,
    pub isotope_error_range: (i32, i32),
    /// Da.
    pub fragment_tol: f64,
    pub min_peptide_len: usize,
    pub max_peptide_len: usize,
}

impl From<&Config> for SearchParams {
    fn from(cfg: &Config) -> Self {
        SearchParams {
            precursor_mass_tol: cfg.precursor_mass_tol,
            isotope_error_range: cfg.isotope_error_range,
            fragment_tol: cfg.fragment_tol,
            min_peptide_len: cfg.min_peptide_len,
            max_peptide_len: cfg.max_peptide_len,
        }
    }
}

pub struct LibraryModel {
    residues: ResidueSet,
    params: SearchParams,
    /// Sorted by mass.
    entries: Vec<LibraryEntry>,
    tokens: Vec<Vec<String>>,
}

impl LibraryModel {
    pub fn new(config: &Config) -> Self {
        LibraryModel {
            residues: config.residues.clone(),
            params: SearchParams::from(config),
            entries: Vec::new(),
            tokens: Vec::new(),
        }
    }

    /// Restore a trained library. Search tolerances come from `config`; the
    /// residue table stays the one the library was built with.
    pub fn load(path: &Path, config: &Config) -> Result<Self> {
        if !path.exists() {
            log::error!("Could not find the model weights at file {}", path.display());
            return Err(NovoError::ModelNotFound(path.to_path_buf()).into());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let ckpt: Checkpoint = serde_json::from_str(&text).map_err(|e| {
            NovoError::IncompatibleCheckpoint {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;
        if ckpt.format_version != CHECKPOINT_VERSION || ckpt.model != MODEL_NAME {
            return Err(NovoError::IncompatibleCheckpoint {
                path: path.to_path_buf(),
                reason: format!(
                    "expected {MODEL_NAME} v{CHECKPOINT_VERSION}, found {} v{}",
                    ckpt.model, ckpt.format_version
                ),
            }
            .into());
        }
        if ckpt.residues != config.residues {
            log::warn!(
                "Mismatching residues in model checkpoint ({} tokens) vs config file ({} tokens); using the checkpoint",
                ckpt.residues.len(),
                config.residues.len()
            );
        }
        if ckpt.precursor_mass_tol != config.precursor_mass_tol {
            log::debug!(
                "Checkpoint was built with precursor_mass_tol {}; searching with {}",
                ckpt.precursor_mass_tol,
                config.precursor_mass_tol
            );
        }

        let mut model = LibraryModel {
            residues: ckpt.residues,
            params: SearchParams::from(config),
            entries: Vec::new(),
            tokens: Vec::new(),
        };
        model.set_entries(ckpt.entries)?;
        log::info!("Loaded library of {} peptides from {}", model.len(), path.display());
        Ok(model)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Residue table the library was built with.
    pub fn residues(&self) -> &ResidueSet {
        &self.residues
    }

    pub fn entries(&self) -> &[LibraryEntry] {
        &self.entries
    }

    fn set_entries(&mut self, mut entries: Vec<LibraryEntry>) -> Result<()> {
        entries.sort_by(|a, b| a.mass.total_cmp(&b.mass).then_with(|| a.peptide.cmp(&b.peptide)));
        self.tokens = entries
            .iter()
            .map(|e| self.residues.tokenize(&e.peptide))
            .collect::<Result<_, _>>()?;
        self.entries = entries;
        Ok(())
    }

    /// Indices of entries whose mass matches `precursor_mass` for some isotope error.
    fn candidates(&self, precursor_mass: f64) -> Vec<usize> {
        let (lo_iso, hi_iso) = self.params.isotope_error_range;
        let mut out = Vec::new();
        for iso in lo_iso..=hi_iso {
            let target = precursor_mass - iso as f64 * C13_SHIFT;
            let window = target.abs() * self.params.precursor_mass_tol * 1e-6;
            let start = self.entries.partition_point(|e| e.mass < target - window);
            out.extend((start..self.entries.len()).take_while(|&i| {
                mass_diff(self.entries[i].mass, target, false) <= self.params.precursor_mass_tol
            }));
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn predict_one(&self, spectrum: &Spectrum) -> Prediction {
        let precursor_mass = neutral_mass(spectrum.precursor_mz, spectrum.precursor_charge);
        let peaks = sorted_peaks(spectrum);

        let mut best: Option<(f64, usize, Vec<f64>)> = None;
        for idx in self.candidates(precursor_mass) {
            let tokens = &self.tokens[idx];
            if tokens.len() < self.params.min_peptide_len {
                continue;
            }
            let (score, aa_scores) = self.score(tokens, &peaks);
            if best.as_ref().map_or(true, |(s, _, _)| score > *s) {
                best = Some((score, idx, aa_scores));
            }
        }
        match best {
            Some((score, idx, aa_scores)) => Prediction {
                peptide: self.tokens[idx].clone(),
                score,
                aa_scores,
            },
            None => Prediction::empty(),
        }
    }

    /// Mean of the fraction of peak intensity explained by b/y ions and the
    /// fraction of b/y ions observed, plus a per-residue flag telling whether
    /// a fragment ion delimiting it was seen.
    fn score(&self, tokens: &[String], peaks: &[(f64, f64)]) -> (f64, Vec<f64>) {
        let n = tokens.len();
        let masses: Vec<f64> = tokens.iter().map(|t| self.residues.mass_or_zero(t)).collect();
        let total_intensity: f64 = peaks.iter().map(|p| p.1).sum();

        let mut explained = vec![false; peaks.len()];
        let mut b_seen = vec![false; n];
        let mut y_seen = vec![false; n];
        let mut n_ions = 0usize;
        let mut n_seen = 0usize;

        let mut prefix = 0.0;
        for i in 1..n {
            prefix += masses[i - 1];
            let b = prefix + PROTON;
            let y = masses[i..].iter().sum::<f64>() + H2O + PROTON;
            for (mz, seen) in [(b, &mut b_seen[i]), (y, &mut y_seen[n - i])] {
                n_ions += 1;
                if let Some(peak) = nearest_peak(peaks, mz, self.params.fragment_tol) {
                    explained[peak] = true;
                    *seen = true;
                    n_seen += 1;
                }
            }
        }

        let explained_intensity: f64 = peaks
            .iter()
            .zip(&explained)
            .filter(|(_, e)| **e)
            .map(|(p, _)| p.1)
            .sum();
        let intensity_frac = if total_intensity > 0.0 {
            explained_intensity / total_intensity
        } else {
            0.0
        };
        let coverage = if n_ions > 0 { n_seen as f64 / n_ions as f64 } else { 0.0 };

        // Residue i sits between b_i / b_{i+1} and y_{n-i} / y_{n-i-1}.
        let aa_scores = (0..n)
            .map(|i| {
                let by_b = (i + 1 < n && b_seen[i + 1]) || (i > 0 && b_seen[i]);
                let by_y = (n - i < n && y_seen[n - i]) || (i + 1 < n && y_seen[n - i - 1]);
                if by_b || by_y { 1.0 } else { 0.0 }
            })
            .collect();

        ((intensity_frac + coverage) / 2.0, aa_scores)
    }
}

impl DenovoModel for LibraryModel {
    fn name(&self) -> &'static str {
        MODEL_NAME
    }

    fn train(&mut self, train: &SpectralDataset) -> Result<()> {
        let mut unique: BTreeMap<String, f64> = BTreeMap::new();
        let mut skipped = 0usize;
        for sp in &train.spectra {
            let Some(peptide) = sp.peptide.as_deref() else {
                continue;
            };
            match self.residues.tokenize(peptide) {
                Ok(tokens)
                    if tokens.len() >= self.params.min_peptide_len
                        && tokens.len() <= self.params.max_peptide_len =>
                {
                    let mass = self.residues.peptide_mass(&tokens);
                    unique.entry(peptide.to_string()).or_insert(mass);
                }
                Ok(_) => skipped += 1,
                Err(e) => {
                    log::debug!("Skipping training label: {e}");
                    skipped += 1;
                }
            }
        }
        if skipped > 0 {
            log::warn!("Skipped {skipped} training spectra with unusable peptide labels");
        }
        let entries = unique
            .into_iter()
            .map(|(peptide, mass)| LibraryEntry { peptide, mass })
            .collect();
        self.set_entries(entries)?;
        log::info!("Built library of {} unique peptides", self.len());
        Ok(())
    }

    fn predict(&self, dataset: &SpectralDataset) -> Result<Vec<Prediction>> {
        if self.is_empty() {
            log::warn!("Library is empty; every prediction will be empty");
        }
        Ok(dataset
            .spectra
            .par_iter()
            .map(|sp| self.predict_one(sp))
            .collect())
    }

    fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let ckpt = Checkpoint {
            format_version: CHECKPOINT_VERSION,
            model: MODEL_NAME.to_string(),
            residues: self.residues.clone(),
            precursor_mass_tol: self.params.precursor_mass_tol,
            entries: self.entries.clone(),
        };
        let file = std::fs::File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer(std::io::BufWriter::new(file), &ckpt)
            .context("writing checkpoint")?;
        log::info!("Saved checkpoint to {}", path.display());
        Ok(())
    }
}

fn sorted_peaks(spectrum: &Spectrum) -> Vec<(f64, f64)> {
    let mut peaks: Vec<(f64, f64)> = spectrum
        .mz
        .iter()
        .copied()
        .zip(spectrum.intensity.iter().copied())
        .collect();
    peaks.sort_by(|a, b| a.0.total_cmp(&b.0));
    peaks
}

/// Index of the peak closest to `mz`, if within `tol`.
fn nearest_peak(peaks: &[(f64, f64)], mz: f64, tol: f64) -> Option<usize> {
    let pos = peaks.partition_point(|p| p.0 < mz);
    [pos.checked_sub(1), Some(pos)]
        .into_iter()
        .flatten()
        .filter(|&i| i < peaks.len())
        .map(|i| (i, (peaks[i].0 - mz).abs()))
        .filter(|&(_, d)| d <= tol)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mass::mz_from_mass;

    /// Spectrum carrying every singly charged b and y ion of `peptide`.
    fn ideal_spectrum(residues: &ResidueSet, peptide: &str, charge: u32) -> Spectrum {
        let tokens = residues.tokenize(peptide).unwrap();
        let masses: Vec<f64> = tokens.iter().map(|t| residues.mass_of(t).unwrap()).collect();
        let mut mz = Vec::new();
        for i in 1..masses.len() {
            mz.push(masses[..i].iter().sum::<f64>() + PROTON);
            mz.push(masses[i..].iter().sum::<f64>() + H2O + PROTON);
        }
        let intensity = vec![1.0; mz.len()];
        let precursor_mz = mz_from_mass(residues.peptide_mass(&tokens), charge);
        Spectrum::new(mz, intensity, precursor_mz, charge).with_peptide(peptide)
    }

    fn trained(peptides: &[&str]) -> (Config, LibraryModel) {
        let cfg = Config::default();
        let spectra = peptides
            .iter()
            .map(|p| ideal_spectrum(&cfg.residues, p, 2))
            .collect();
        let mut model = LibraryModel::new(&cfg);
        model.train(&SpectralDataset::from_spectra(spectra)).unwrap();
        (cfg, model)
    }

    #[test]
    fn training_deduplicates_and_sorts_by_mass() {
        let (_, model) = trained(&["PEPTIDEK", "GGGGGGK", "PEPTIDEK", "SHORT"]);
        // O is not a residue token.
        let peptides: Vec<&str> = model.entries().iter().map(|e| e.peptide.as_str()).collect();
        assert_eq!(peptides, vec!["GGGGGGK", "PEPTIDEK"]);
        assert!(model.entries()[0].mass < model.entries()[1].mass);
    }

    #[test]
    fn predicts_the_matching_library_peptide() {
        let (cfg, model) = trained(&["PEPTIDEK", "AMDEFGHK", "LLLLLLK"]);
        let query = ideal_spectrum(&cfg.residues, "AMDEFGHK", 3);
        let pred = model.predict_one(&query);
        assert_eq!(pred.sequence(), "AMDEFGHK");
        assert!((pred.score - 1.0).abs() < 1e-9);
        assert_eq!(pred.aa_scores, vec![1.0; 8]);
    }

    #[test]
    fn precursor_window_is_ppm_wide() {
        let mut cfg = Config::default();
        cfg.isotope_error_range = (0, 0);
        let mut model = LibraryModel::new(&cfg);
        let spectra = vec![ideal_spectrum(&cfg.residues, "PEPTIDEK", 2)];
        model.train(&SpectralDataset::from_spectra(spectra)).unwrap();
        let mass = model.entries()[0].mass;
        for (ppm, hit) in [(0.0, true), (49.0, true), (-49.0, true), (51.0, false), (-51.0, false)] {
            let found = !model.candidates(mass * (1.0 + ppm * 1e-6)).is_empty();
            assert_eq!(found, hit, "{ppm} ppm");
        }
    }

    #[test]
    fn score_averages_explained_intensity_and_ion_coverage() {
        let (cfg, model) = trained(&["PEPTIDEK"]);
        let mut query = ideal_spectrum(&cfg.residues, "PEPTIDEK", 2);
        // 14 ions of intensity 1 plus one unexplained peak carrying as much.
        query.mz.push(1000.5);
        query.intensity.push(14.0);
        let pred = model.predict_one(&query);
        assert_eq!(pred.sequence(), "PEPTIDEK");
        assert!((pred.score - 0.75).abs() < 1e-9);
    }

    #[test]
    fn isotope_error_is_tolerated() {
        let (cfg, model) = trained(&["PEPTIDEK"]);
        let mut query = ideal_spectrum(&cfg.residues, "PEPTIDEK", 2);
        query.precursor_mz += C13_SHIFT / 2.0;
        assert_eq!(model.predict_one(&query).sequence(), "PEPTIDEK");

        query.precursor_mz += C13_SHIFT;
        assert!(model.predict_one(&query).is_empty());
    }

    #[test]
    fn no_candidate_gives_empty_prediction() {
        let (_, model) = trained(&["PEPTIDEK"]);
        let query = Spectrum::new(vec![100.0], vec![1.0], 1500.0, 2);
        let pred = model.predict_one(&query);
        assert_eq!(pred, Prediction::empty());
    }

    #[test]
    fn checkpoint_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ckpt/library.json");
        let (cfg, model) = trained(&["PEPTIDEK", "GGGGGGK"]);
        model.save(&path).unwrap();

        let loaded = LibraryModel::load(&path, &cfg).unwrap();
        assert_eq!(loaded.entries(), model.entries());
    }

    #[test]
    fn missing_or_foreign_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::default();
        let err = LibraryModel::load(&dir.path().join("none.json"), &cfg).err().unwrap();
        assert!(matches!(err.downcast_ref::<NovoError>(), Some(NovoError::ModelNotFound(_))));

        let path = dir.path().join("casanovo.ckpt");
        std::fs::write(&path, b"\x00\x01binary").unwrap();
        let err = LibraryModel::load(&path, &cfg).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<NovoError>(),
            Some(NovoError::IncompatibleCheckpoint { .. })
        ));
    }

    #[test]
    fn nearest_peak_respects_tolerance() {
        let peaks = [(100.0, 1.0), (100.04, 1.0), (200.0, 1.0)];
        assert_eq!(nearest_peak(&peaks, 100.03, 0.05), Some(1));
        assert_eq!(nearest_peak(&peaks, 150.0, 0.05), None);
        assert_eq!(nearest_peak(&peaks, 200.01, 0.05), Some(2));
        assert_eq!(nearest_peak(&[], 1.0, 0.05), None);
    }
}

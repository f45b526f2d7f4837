use super::model::{SpectralDataset, Spectrum};
use crate::config::Config;
use crate::residues::ResidueSet;

/// Spectrum-level eligibility checks applied before training and sequencing.
#[derive(Debug, Clone)]
pub struct SpectrumFilter {
    pub max_charge: u32,
    /// Only applied to labelled spectra.
    pub max_peptide_len: usize,
    pub min_peaks: usize,
}

impl SpectrumFilter {
    pub fn from_config(config: &Config) -> Self {
        SpectrumFilter {
            max_charge: config.max_charge,
            max_peptide_len: config.max_peptide_len,
            min_peaks: config.preprocessing.min_peaks,
        }
    }

    /// Charge within `1..=max_charge` and at least `min_peaks` peaks. The
    /// label is not consulted.
    pub fn is_sequenceable(&self, spectrum: &Spectrum) -> bool {
        spectrum.precursor_charge != 0
            && spectrum.precursor_charge <= self.max_charge
            && spectrum.n_peaks() >= self.min_peaks
    }

    /// Training eligibility: [`Self::is_sequenceable`] plus a label (if any)
    /// of at most `max_peptide_len` residues.
    pub fn accepts(&self, spectrum: &Spectrum, residues: &ResidueSet) -> bool {
        if !self.is_sequenceable(spectrum) {
            return false;
        }
        match spectrum.peptide.as_deref() {
            Some(p) => match residues.tokenize(p) {
                Ok(tokens) => tokens.len() <= self.max_peptide_len,
                // Unknown residues are scored by the metrics, not filtered here.
                Err(_) => true,
            },
            None => true,
        }
    }
}

/// Return indices of spectra that pass `filter` for training.
pub fn filtered_indices(
    dataset: &SpectralDataset,
    filter: &SpectrumFilter,
    residues: &ResidueSet,
) -> Vec<usize> {
    dataset
        .spectra
        .iter()
        .enumerate()
        .filter(|(_, sp)| filter.accepts(sp, residues))
        .map(|(i, _)| i)
        .collect()
}

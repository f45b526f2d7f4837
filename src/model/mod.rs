/// Sequencing backends.
///
/// ```text
///   SpectralDataset ──► DenovoModel::predict ──► Vec<Prediction>
///                          ▲
///        checkpoint ───────┘   (library: in-process)
///
///   paths ──► ExternalModel::run ──► third-party runner (train / seq)
/// ```

pub mod external;
pub mod library;

use std::path::Path;

use anyhow::Result;

use crate::data::model::SpectralDataset;

/// A predicted peptide with its confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub peptide: Vec<String>,
    pub score: f64,
    /// One score per residue of `peptide`.
    pub aa_scores: Vec<f64>,
}

impl Prediction {
    pub fn empty() -> Self {
        Prediction {
            peptide: Vec::new(),
            score: 0.0,
            aa_scores: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.peptide.is_empty()
    }

    pub fn sequence(&self) -> String {
        self.peptide.concat()
    }
}

/// An in-process de novo model.
pub trait DenovoModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fit on the labelled spectra of `train`.
    fn train(&mut self, train: &SpectralDataset) -> Result<()>;

    /// One prediction per spectrum, in dataset order.
    fn predict(&self, dataset: &SpectralDataset) -> Result<Vec<Prediction>>;

    fn save(&self, path: &Path) -> Result<()>;
}

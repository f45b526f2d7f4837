//! Benchmark configuration.
//!
//! Loaded from YAML (or JSON, by extension). Every field has a default, so an
//! empty file, or no file at all, is a valid configuration.
//!
//! ```yaml
//! model: library
//! precursor_mass_tol: 50      # ppm
//! isotope_error_range: [0, 1]
//! max_charge: 10
//! preprocessing:
//!   n_peaks: 150
//!   min_mz: 50.0
//! evaluation:
//!   ptm_list: ["M(+15.99)", "N(+.98)", "Q(+.98)"]
//! external:
//!   program: python
//!   args: ["tests/casanovo.py", "--mode", "{mode}", "--data_path", "{data_path}"]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{NovoError, Result};
use crate::metrics::MatchMode;
use crate::residues::{ResidueSet, DEFAULT_PTMS};

/// Which sequencing backend to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Built-in precursor-mass spectral library search.
    #[default]
    Library,
    /// A third-party model launched as an external command.
    External,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model: ModelKind,

    /// Residue token → monoisotopic mass.
    pub residues: ResidueSet,

    /// Precursor mass tolerance in ppm.
    pub precursor_mass_tol: f64,

    /// Inclusive range of 13C isotope errors tolerated on the precursor.
    pub isotope_error_range: (i32, i32),

    /// Fragment ion tolerance in Da.
    pub fragment_tol: f64,

    pub min_peptide_len: usize,
    pub max_peptide_len: usize,
    pub max_charge: u32,

    /// Worker threads for prediction; 0 lets rayon decide.
    pub n_workers: usize,

    pub preprocessing: PreprocessConfig,

    pub evaluation: EvaluationConfig,

    pub external: Option<ExternalConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: ModelKind::default(),
            residues: ResidueSet::default(),
            precursor_mass_tol: 50.0,
            isotope_error_range: (0, 1),
            fragment_tol: 0.05,
            min_peptide_len: 6,
            max_peptide_len: 100,
            max_charge: 10,
            n_workers: 0,
            preprocessing: PreprocessConfig::default(),
            evaluation: EvaluationConfig::default(),
            external: None,
        }
    }
}

/// Spectrum preprocessing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub min_mz: f64,
    pub max_mz: f64,
    pub n_peaks: usize,
    pub min_intensity: f64,
    /// Da.
    pub remove_precursor_tol: f64,
    /// Spectra with fewer raw peaks are skipped.
    pub min_peaks: usize,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            min_mz: 50.0,
            max_mz: 2500.0,
            n_peaks: 150,
            min_intensity: 0.01,
            remove_precursor_tol: 2.0,
            min_peaks: 1,
        }
    }
}

/// Metric parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Da.
    pub cum_mass_threshold: f64,
    /// Da.
    pub ind_mass_threshold: f64,
    pub ptm_list: Vec<String>,
    pub mode: MatchMode,
    /// Also report AA precision/recall over residues scored above this.
    pub aa_score_threshold: Option<f64>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            cum_mass_threshold: 0.5,
            ind_mass_threshold: 0.1,
            ptm_list: DEFAULT_PTMS.iter().map(|s| s.to_string()).collect(),
            mode: MatchMode::Best,
            aa_score_threshold: None,
        }
    }
}

/// Command line of an external model runner.
///
/// `{mode}`, `{data_path}`, `{model_path}`, `{denovo_output_path}` and
/// `{config_path}` in `args` are substituted before launch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file (YAML or JSON, auto-detected by extension)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| NovoError::ConfigIo(path.to_path_buf(), e.to_string()))?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        let config = match extension.as_str() {
            "json" => Self::from_json(&content)?,
            _ => Self::from_yaml(&content)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| NovoError::ConfigParse(e.to_string()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| NovoError::ConfigParse(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.residues.is_empty() {
            return Err(NovoError::ConfigParse("residue alphabet is empty".into()));
        }
        if self.isotope_error_range.0 > self.isotope_error_range.1 {
            return Err(NovoError::ConfigParse(format!(
                "isotope_error_range {:?} is reversed",
                self.isotope_error_range
            )));
        }
        if self.preprocessing.min_mz >= self.preprocessing.max_mz {
            return Err(NovoError::ConfigParse("preprocessing.min_mz must be below max_mz".into()));
        }
        for ptm in &self.evaluation.ptm_list {
            if !self.residues.contains(ptm) {
                return Err(NovoError::UnknownPtm(ptm.clone()));
            }
        }
        if self.model == ModelKind::External && self.external.is_none() {
            return Err(NovoError::ConfigParse(
                "model 'external' requires an 'external' section".into(),
            ));
        }
        Ok(())
    }

    /// Flattened `key = value` settings, excluding the residue table.
    /// Used for the mzTab software settings.
    pub fn settings(&self) -> Vec<(String, String)> {
        let value = match serde_json::to_value(self) {
            Ok(v) => v,
            Err(_) => return Vec::new(),
        };
        let mut out = Vec::new();
        if let serde_json::Value::Object(map) = value {
            for (key, val) in map {
                if key == "residues" {
                    continue;
                }
                out.push((key, val.to_string()));
            }
        }
        out
    }
}

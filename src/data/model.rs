use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ---------------------------------------------------------------------------
// MetadataValue – a single cell in a metadata column
// ---------------------------------------------------------------------------

/// A dynamically-typed metadata value (scan number, file name, retention time…).
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

impl MetadataValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(v) => Some(*v),
            MetadataValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Spectrum – one MS/MS scan
// ---------------------------------------------------------------------------

/// Metadata keys that identify a spectrum, in order of preference.
const ID_KEYS: &[&str] = &["spectrum_id", "title", "scan_number", "scans"];

/// A single MS/MS spectrum with its precursor and optional peptide label.
#[derive(Debug, Clone)]
pub struct Spectrum {
    /// Fragment m/z values.
    pub mz: Vec<f64>,
    /// Fragment intensities – same length as `mz`.
    pub intensity: Vec<f64>,
    pub precursor_mz: f64,
    pub precursor_charge: u32,
    /// Ground-truth peptide, when the dataset is annotated.
    pub peptide: Option<String>,
    /// Remaining columns: column_name → value.
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl Spectrum {
    pub fn new(mz: Vec<f64>, intensity: Vec<f64>, precursor_mz: f64, precursor_charge: u32) -> Self {
        Spectrum {
            mz,
            intensity,
            precursor_mz,
            precursor_charge,
            peptide: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_peptide(mut self, peptide: impl Into<String>) -> Self {
        self.peptide = Some(peptide.into());
        self
    }

    pub fn n_peaks(&self) -> usize {
        self.mz.len()
    }

    /// Identifier from metadata, falling back to the row index.
    pub fn identifier(&self, index: usize) -> String {
        ID_KEYS
            .iter()
            .find_map(|k| match self.metadata.get(*k) {
                Some(MetadataValue::Null) | None => None,
                Some(v) => Some(v.to_string()),
            })
            .unwrap_or_else(|| index.to_string())
    }
}

// ---------------------------------------------------------------------------
// SpectralDataset – the complete loaded dataset
// ---------------------------------------------------------------------------

/// A loaded dataset with its metadata column index.
#[derive(Debug, Clone, Default)]
pub struct SpectralDataset {
    pub spectra: Vec<Spectrum>,
    /// Ordered list of metadata column names.
    pub column_names: Vec<String>,
}

impl SpectralDataset {
    /// Build the column index from the loaded spectra.
    pub fn from_spectra(spectra: Vec<Spectrum>) -> Self {
        let columns: BTreeSet<String> = spectra
            .iter()
            .flat_map(|sp| sp.metadata.keys().cloned())
            .collect();
        SpectralDataset {
            spectra,
            column_names: columns.into_iter().collect(),
        }
    }

    /// Append another dataset, rebuilding the column index.
    pub fn extend(&mut self, other: SpectralDataset) {
        let mut spectra = std::mem::take(&mut self.spectra);
        spectra.extend(other.spectra);
        *self = SpectralDataset::from_spectra(spectra);
    }

    /// Keep only the spectra at `indices`, in the given order.
    pub fn select(&self, indices: &[usize]) -> SpectralDataset {
        SpectralDataset::from_spectra(indices.iter().map(|&i| self.spectra[i].clone()).collect())
    }

    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }

    /// Number of spectra carrying a ground-truth peptide.
    pub fn n_labelled(&self) -> usize {
        self.spectra.iter().filter(|sp| sp.peptide.is_some()).count()
    }
}

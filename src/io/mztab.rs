//! mzTab export of de novo identifications.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::psm::format_aa_scores;
use crate::config::Config;
use crate::natsort::{natural_cmp, natural_sort_by_key};
use crate::residues::Modification;

/// UNIMOD entries for common modification deltas.
const KNOWN_MODS: &[(f64, &str)] = &[
    (57.021, "[UNIMOD, UNIMOD:4, Carbamidomethyl, ]"),
    (15.995, "[UNIMOD, UNIMOD:35, Oxidation, ]"),
    (0.984, "[UNIMOD, UNIMOD:7, Deamidated, ]"),
    (42.011, "[UNIMOD, UNIMOD:1, Acetyl, ]"),
    (43.006, "[UNIMOD, UNIMOD:5, Carbamyl, ]"),
    (-17.027, "[UNIMOD, UNIMOD:385, Ammonia-loss, ]"),
];

/// Alphabets round deltas differently (`+15.99`, `+15.995`).
const KNOWN_MOD_TOL: f64 = 0.01;

#[derive(Debug, Clone, PartialEq)]
pub struct MztabPsm {
    pub sequence: String,
    pub spectrum_id: String,
    pub score: f64,
    pub charge: u32,
    pub exp_mz: f64,
    pub calc_mz: f64,
    pub aa_scores: Vec<f64>,
}

/// Collects metadata and PSMs, then writes them in one go with [`save`](Self::save).
#[derive(Debug)]
pub struct MztabWriter {
    path: PathBuf,
    metadata: Vec<(String, String)>,
    run_map: BTreeMap<PathBuf, usize>,
    psms: Vec<MztabPsm>,
}

impl MztabWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        MztabWriter {
            path: path.into(),
            metadata: Vec::new(),
            run_map: BTreeMap::new(),
            psms: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record modifications from the residue alphabet, then `extra` settings
    /// (e.g. the model path), then the config values.
    pub fn set_metadata(&mut self, config: &Config, extra: &[(String, String)]) {
        let mods = config.residues.modifications();

        if mods.fixed.is_empty() {
            self.push_meta(
                "fixed_mod[1]",
                "[MS, MS:1002453, No fixed modifications searched, ]",
            );
        } else {
            for (i, m) in mods.fixed.iter().enumerate() {
                self.push_modification("fixed_mod", i + 1, m);
            }
        }
        if mods.variable.is_empty() {
            self.push_meta(
                "variable_mod[1]",
                "[MS, MS:1002454, No variable modifications searched, ]",
            );
        } else {
            for (i, m) in mods.variable.iter().enumerate() {
                self.push_modification("variable_mod", i + 1, m);
            }
        }

        let settings = extra.iter().cloned().chain(config.settings());
        for (i, (key, value)) in settings.enumerate() {
            self.push_meta(
                &format!("software[1]-setting[{}]", i + 1),
                &format!("{key} = {value}"),
            );
        }
    }

    /// Register the input peak files as `ms_run` locations.
    pub fn set_ms_run(&mut self, peak_files: &[PathBuf]) {
        let mut files: Vec<PathBuf> = peak_files
            .iter()
            .map(|p| std::path::absolute(p).unwrap_or_else(|_| p.clone()))
            .collect();
        natural_sort_by_key(&mut files, |p| p.to_string_lossy().into_owned());
        for (i, file) in files.into_iter().enumerate() {
            self.push_meta(&format!("ms_run[{}]-location", i + 1), &file_uri(&file));
            self.run_map.insert(file, i + 1);
        }
    }

    /// 1-based `ms_run` index of a registered peak file.
    pub fn run_index(&self, file: &Path) -> Option<usize> {
        let abs = std::path::absolute(file).ok()?;
        self.run_map.get(&abs).copied()
    }

    pub fn add_psm(&mut self, psm: MztabPsm) {
        self.psms.push(psm);
    }

    pub fn metadata(&self) -> &[(String, String)] {
        &self.metadata
    }

    pub fn save(&self) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .quote_style(csv::QuoteStyle::Never)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_path(&self.path)
            .with_context(|| format!("creating {}", self.path.display()))?;

        for (key, value) in &self.metadata {
            writer.write_record(["MTD", key.as_str(), value.as_str()])?;
        }
        writer.write_record([
            "PSH",
            "sequence",
            "PSM_ID",
            "search_engine_score",
            "charge",
            "exp_mass_to_charge",
            "calc_mass_to_charge",
            "opt_ms_run[1]_aa_scores",
        ])?;

        let mut order: Vec<&MztabPsm> = self.psms.iter().collect();
        order.sort_by(|a, b| natural_cmp(&a.spectrum_id, &b.spectrum_id));
        for (i, psm) in order.into_iter().enumerate() {
            writer.write_record([
                "PSM".to_string(),
                psm.sequence.clone(),
                (i + 1).to_string(),
                psm.score.to_string(),
                psm.charge.to_string(),
                psm.exp_mz.to_string(),
                psm.calc_mz.to_string(),
                format_aa_scores(&psm.aa_scores),
            ])?;
        }
        writer.flush().context("flushing mzTab")?;
        log::info!("Wrote {} PSMs to {}", self.psms.len(), self.path.display());
        Ok(())
    }

    fn push_meta(&mut self, key: &str, value: &str) {
        self.metadata.push((key.to_string(), value.to_string()));
    }

    fn push_modification(&mut self, kind: &str, index: usize, m: &Modification) {
        let label = known_mod(m)
            .map(str::to_string)
            .unwrap_or_else(|| format!("[CHEMMOD, CHEMMOD:{}, , ]", m.delta));
        self.push_meta(&format!("{kind}[{index}]"), &label);
        self.push_meta(
            &format!("{kind}[{index}]-site"),
            m.site.as_deref().unwrap_or("N-term"),
        );
    }
}

fn known_mod(m: &Modification) -> Option<&'static str> {
    let delta = m.delta_mass()?;
    KNOWN_MODS
        .iter()
        .find(|(mass, _)| (mass - delta).abs() < KNOWN_MOD_TOL)
        .map(|(_, label)| *label)
}

/// `file://` URI with every byte outside `A-Za-z0-9/-._~` percent-encoded.
fn file_uri(path: &Path) -> String {
    let text = path.to_string_lossy().replace('\\', "/");
    let (prefix, drive, rest) = if text.starts_with('/') {
        ("file://", "", text.as_str())
    } else if text.as_bytes().get(1) == Some(&b':') {
        ("file:///", &text[..2], &text[2..])
    } else {
        ("file:///", "", text.as_str())
    };
    format!("{prefix}{drive}{}", percent_encode(rest))
}

fn percent_encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for b in text.bytes() {
        if b.is_ascii_alphanumeric() || b"/-._~".contains(&b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

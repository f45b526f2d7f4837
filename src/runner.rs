//! Train / sequence / evaluate orchestration around a model backend.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use rayon::prelude::*;

use crate::config::{Config, ModelKind};
use crate::data::filter::{filtered_indices, SpectrumFilter};
use crate::data::loader::{self, Split};
use crate::data::model::SpectralDataset;
use crate::data::transforms::preprocessing_pipeline;
use crate::error::NovoError;
use crate::io::mztab::{MztabPsm, MztabWriter};
use crate::io::psm::{metrics_from_records, write_psms, PsmRecord};
use crate::metrics::MetricReport;
use crate::model::external::{ExternalModel, RunPaths};
use crate::model::library::LibraryModel;
use crate::model::{DenovoModel, Prediction};
use crate::residues::ResidueSet;

pub struct BenchRunner {
    config: Config,
    model_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
}

impl BenchRunner {
    pub fn new(config: Config, model_path: Option<PathBuf>) -> Self {
        BenchRunner {
            config,
            model_path,
            config_path: None,
        }
    }

    /// Config file forwarded to external runners.
    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// `--mode train`: a dataset directory provides `train.parquet` and
    /// optionally `valid.parquet`; a single file is all training data.
    pub fn train_from_path(&self, data_path: &Path) -> Result<Option<MetricReport>> {
        if self.config.model == ModelKind::External {
            self.run_external("train", data_path, None)?;
            return Ok(None);
        }
        let train_file = loader::resolve_split(data_path, Split::Train).with_context(|| {
            format!("no {} found in {}", Split::Train.file_name(), data_path.display())
        })?;
        let train = loader::load_file(&train_file)?;
        let valid = if data_path.is_dir() {
            loader::resolve_split(data_path, Split::Valid)
                .map(|p| loader::load_file(&p))
                .transpose()?
        } else {
            None
        };
        self.train(train, valid)
    }

    /// Fit the library model, log validation metrics, save the checkpoint.
    pub fn train(
        &self,
        train: SpectralDataset,
        valid: Option<SpectralDataset>,
    ) -> Result<Option<MetricReport>> {
        let model_path = self.model_path.as_deref().ok_or(NovoError::MissingModel)?;
        let train = self.prepare_training(train);
        if train.n_labelled() == 0 {
            bail!("training data contains no labelled spectra");
        }
        log::info!("Training on {} spectra", train.len());

        let start = Instant::now();
        let mut model = LibraryModel::new(&self.config);
        model.train(&train)?;
        log::info!("Training {} model took {:.2?}", model.name(), start.elapsed());

        let report = match valid {
            Some(valid) => {
                let run = self.sequence(&model, valid)?;
                let report = metrics_from_records(&run.records, &run.config)?;
                log_report("Validation", &report);
                Some(report)
            }
            None => None,
        };

        model.save(model_path)?;
        Ok(report)
    }

    /// `--mode seq`: predict every spectrum under `peak_path`, write the
    /// CSV to `output` and an mzTab beside it. Rows follow input order.
    pub fn predict(&self, peak_path: &Path, output: &Path) -> Result<Vec<PsmRecord>> {
        if self.config.model == ModelKind::External {
            self.run_external("seq", peak_path, Some(output))?;
            return Ok(Vec::new());
        }
        let model = self.load_model()?;

        let peak_files = match loader::resolve_split(peak_path, Split::Test) {
            Some(file) => vec![file],
            None => loader::peak_files(peak_path)?,
        };
        if peak_files.is_empty() {
            bail!("no peak files found at {}", peak_path.display());
        }
        let mut dataset = SpectralDataset::default();
        for file in &peak_files {
            dataset.extend(loader::load_file(file)?);
        }

        let start = Instant::now();
        let run = self.sequence(&model, dataset)?;
        log::info!(
            "Sequenced {} spectra in {:.2?}",
            run.records.len(),
            start.elapsed()
        );

        write_psms(output, &run.records)?;
        log::info!("Wrote de novo results to {}", output.display());

        let mut mztab = MztabWriter::new(output.with_extension("mztab"));
        let model_setting = self
            .model_path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        mztab.set_metadata(&run.config, &[("model".to_string(), model_setting)]);
        mztab.set_ms_run(&peak_files);
        for (rec, pred) in run.records.iter().zip(&run.predictions) {
            mztab.add_psm(MztabPsm {
                sequence: rec.peptides_pred.clone(),
                spectrum_id: rec.spectrum_id.clone(),
                score: rec.peptides_score,
                charge: rec.precursor_charge,
                exp_mz: rec.precursor_mz,
                calc_mz: rec.calc_mz,
                aa_scores: pred.aa_scores.clone(),
            });
        }
        mztab.save()?;
        Ok(run.records)
    }

    /// Predict over a labelled dataset and score it, without writing files.
    pub fn evaluate(&self, dataset: SpectralDataset) -> Result<MetricReport> {
        let model = self.load_model()?;
        let run = self.sequence(&model, dataset)?;
        let report = metrics_from_records(&run.records, &run.config)?;
        log_report("Evaluation", &report);
        Ok(report)
    }

    fn load_model(&self) -> Result<LibraryModel> {
        let path = self.model_path.as_deref().ok_or_else(|| {
            log::error!("A model file must be provided");
            NovoError::MissingModel
        })?;
        LibraryModel::load(path, &self.config)
    }

    /// Active config with the residue table `model` predicts with. PTMs the
    /// table lacks are dropped from the metrics.
    fn config_for(&self, model: &LibraryModel) -> Config {
        let mut config = self.config.clone();
        if model.residues() != &config.residues {
            config.residues = model.residues().clone();
            let residues = &config.residues;
            config.evaluation.ptm_list.retain(|ptm| residues.contains(ptm));
        }
        config
    }

    /// Drop spectra unfit for training, then preprocess the rest.
    fn prepare_training(&self, dataset: SpectralDataset) -> SpectralDataset {
        let filter = SpectrumFilter::from_config(&self.config);
        let keep = filtered_indices(&dataset, &filter, &self.config.residues);
        let dropped = dataset.len() - keep.len();
        if dropped > 0 {
            log::warn!(
                "Skipped {dropped} of {} training spectra failing charge/peak/length checks",
                dataset.len()
            );
        }
        let mut dataset = if dropped > 0 { dataset.select(&keep) } else { dataset };
        self.preprocess(&mut dataset);
        dataset
    }

    fn preprocess(&self, dataset: &mut SpectralDataset) {
        let pipeline = preprocessing_pipeline(&self.config.preprocessing);
        log::debug!("Preprocessing: {}", pipeline.names().join(" → "));
        dataset
            .spectra
            .par_iter_mut()
            .for_each(|sp| pipeline.apply(sp));
    }

    /// One record per input spectrum. Spectra failing the charge or peak
    /// count checks get an empty prediction.
    fn sequence(&self, model: &LibraryModel, mut dataset: SpectralDataset) -> Result<Sequenced> {
        let filter = SpectrumFilter::from_config(&self.config);
        let eligible: Vec<usize> = dataset
            .spectra
            .iter()
            .enumerate()
            .filter(|(_, sp)| filter.is_sequenceable(sp))
            .map(|(i, _)| i)
            .collect();
        if eligible.len() < dataset.len() {
            log::warn!(
                "{} of {} spectra fail charge/peak checks and get empty predictions",
                dataset.len() - eligible.len(),
                dataset.len()
            );
        }

        self.preprocess(&mut dataset);
        let mut predictions = vec![Prediction::empty(); dataset.len()];
        let found = if eligible.len() == dataset.len() {
            self.run_model(model, &dataset)?
        } else {
            self.run_model(model, &dataset.select(&eligible))?
        };
        for (i, pred) in eligible.into_iter().zip(found) {
            predictions[i] = pred;
        }

        let config = self.config_for(model);
        let records = psm_records(&config.residues, &dataset, &predictions);
        Ok(Sequenced {
            config,
            records,
            predictions,
        })
    }

    fn run_model(&self, model: &dyn DenovoModel, dataset: &SpectralDataset) -> Result<Vec<Prediction>> {
        if self.config.n_workers == 0 {
            return model.predict(dataset);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.n_workers)
            .build()
            .context("building worker pool")?;
        pool.install(|| model.predict(dataset))
    }

    fn run_external(&self, mode: &str, data_path: &Path, output: Option<&Path>) -> Result<()> {
        let external = self
            .config
            .external
            .clone()
            .context("model 'external' requires an 'external' section")?;
        let paths = RunPaths {
            data_path: data_path.to_path_buf(),
            model_path: self.model_path.clone(),
            denovo_output_path: output.map(Path::to_path_buf),
            config_path: self.config_path.clone(),
        };
        let start = Instant::now();
        ExternalModel::new(external).run(mode, &paths)?;
        log::info!("{mode} finished in {:.2?}", start.elapsed());
        Ok(())
    }
}

/// Output of one sequencing pass, aligned with the input spectra.
struct Sequenced {
    /// Config with the model's residue table.
    config: Config,
    records: Vec<PsmRecord>,
    predictions: Vec<Prediction>,
}

fn psm_records(
    residues: &ResidueSet,
    dataset: &SpectralDataset,
    predictions: &[Prediction],
) -> Vec<PsmRecord> {
    dataset
        .spectra
        .iter()
        .zip(predictions)
        .enumerate()
        .map(|(i, (sp, pred))| {
            let calc_mz = if pred.is_empty() {
                0.0
            } else {
                residues.peptide_mz(&pred.peptide, sp.precursor_charge)
            };
            let mut rec = PsmRecord {
                spectrum_id: sp.identifier(i),
                peptides_true: sp.peptide.clone().unwrap_or_default(),
                peptides_pred: pred.sequence(),
                peptides_score: pred.score,
                aa_scores: String::new(),
                precursor_mz: sp.precursor_mz,
                precursor_charge: sp.precursor_charge,
                calc_mz,
            };
            rec.set_aa_scores(&pred.aa_scores);
            rec
        })
        .collect()
}

pub fn log_report(label: &str, report: &MetricReport) {
    log::info!(
        "{label}: {} spectra, aa_precision={:.4} aa_recall={:.4} pep_precision={:.4} ptm_recall={:.4} ptm_precision={:.4} curve_auc={:.4}",
        report.n_spectra,
        report.aa_precision,
        report.aa_recall,
        report.pep_precision,
        report.ptm_recall,
        report.ptm_precision,
        report.curve_auc,
    );
    if let Some(t) = &report.aa_threshold {
        log::info!(
            "{label}: aa_precision={:.4} aa_recall={:.4} above score {}",
            t.aa_precision,
            t.aa_recall,
            t.threshold
        );
    }
}

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Float64Array, Float64Builder, Int64Array, ListBuilder, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use novobench::config::Config;
use novobench::io::psm::{metrics_from_records, read_psms};
use novobench::mass::{H2O, PROTON};
use novobench::residues::ResidueSet;
use novobench::runner::BenchRunner;

const PEPTIDES: &[&str] = &["PEPTIDEK", "AMDEFGHK", "LLGGSSVR", "WYQ(+.98)NNTAK"];

/// Every singly charged b and y ion of `peptide`, m/z ascending.
fn ladder(residues: &ResidueSet, peptide: &str) -> Vec<f64> {
    let tokens = residues.tokenize(peptide).unwrap();
    let masses: Vec<f64> = tokens.iter().map(|t| residues.mass_of(t).unwrap()).collect();
    let mut mz = Vec::new();
    for i in 1..masses.len() {
        mz.push(masses[..i].iter().sum::<f64>() + PROTON);
        mz.push(masses[i..].iter().sum::<f64>() + H2O + PROTON);
    }
    mz.sort_by(f64::total_cmp);
    mz
}

fn write_mgf(path: &Path, residues: &ResidueSet, peptides: &[&str]) {
    let mut text = String::new();
    for (i, p) in peptides.iter().enumerate() {
        let tokens = residues.tokenize(p).unwrap();
        writeln!(text, "BEGIN IONS").unwrap();
        writeln!(text, "TITLE=scan{}", i + 1).unwrap();
        writeln!(text, "PEPMASS={}", residues.peptide_mz(&tokens, 2)).unwrap();
        writeln!(text, "CHARGE=2+").unwrap();
        writeln!(text, "SEQ={p}").unwrap();
        for mz in ladder(residues, p) {
            writeln!(text, "{mz:.5} 100.0").unwrap();
        }
        writeln!(text, "END IONS").unwrap();
    }
    std::fs::write(path, text).unwrap();
}

fn write_parquet(path: &Path, residues: &ResidueSet, peptides: &[&str]) {
    let mut mz_builder = ListBuilder::new(Float64Builder::new());
    let mut int_builder = ListBuilder::new(Float64Builder::new());
    let mut precursors = Vec::new();
    for p in peptides {
        let mz = ladder(residues, p);
        for &v in &mz {
            mz_builder.values().append_value(v);
            int_builder.values().append_value(50.0);
        }
        mz_builder.append(true);
        int_builder.append(true);
        precursors.push(residues.peptide_mz(&residues.tokenize(p).unwrap(), 3));
    }
    let item = Arc::new(Field::new("item", DataType::Float64, true));
    let schema = Arc::new(Schema::new(vec![
        Field::new("mz_array", DataType::List(item.clone()), false),
        Field::new("intensity_array", DataType::List(item), false),
        Field::new("precursor_mz", DataType::Float64, false),
        Field::new("precursor_charge", DataType::Int64, false),
        Field::new("modified_sequence", DataType::Utf8, false),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(mz_builder.finish()),
            Arc::new(int_builder.finish()),
            Arc::new(Float64Array::from(precursors)),
            Arc::new(Int64Array::from(vec![3i64; peptides.len()])),
            Arc::new(StringArray::from(peptides.to_vec())),
        ],
    )
    .unwrap();
    let file = std::fs::File::create(path).unwrap();
    let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
}

#[test]
fn train_sequence_and_score_an_mgf() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = Config::default();
    let mgf = dir.path().join("spectra.mgf");
    write_mgf(&mgf, &cfg.residues, PEPTIDES);

    let model_path = dir.path().join("model/library.json");
    let output = dir.path().join("out/denovo.csv");
    let runner = BenchRunner::new(cfg, Some(model_path.clone()));

    assert!(runner.train_from_path(&mgf).unwrap().is_none());
    assert!(model_path.is_file());

    let records = runner.predict(&mgf, &output).unwrap();
    assert_eq!(records.len(), PEPTIDES.len());
    assert!(dir.path().join("out/denovo.mztab").is_file());

    let read_back = read_psms(&output).unwrap();
    assert_eq!(read_back.len(), PEPTIDES.len());
    assert_eq!(read_back[0].spectrum_id, "scan1");
    for rec in &read_back {
        assert_eq!(rec.peptides_pred, rec.peptides_true);
    }

    let report = metrics_from_records(&read_back, runner.config()).unwrap();
    assert!((report.pep_precision - 1.0).abs() < 1e-6);
    assert!((report.ptm_recall - 1.0).abs() < 1e-6);
}

#[test]
fn dataset_directory_uses_named_splits() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = Config::default();
    write_parquet(&dir.path().join("train.parquet"), &cfg.residues, PEPTIDES);
    write_parquet(&dir.path().join("valid.parquet"), &cfg.residues, &PEPTIDES[..2]);
    write_parquet(&dir.path().join("test.parquet"), &cfg.residues, &PEPTIDES[2..]);

    let runner = BenchRunner::new(cfg, Some(dir.path().join("model.json")));
    let valid = runner.train_from_path(dir.path()).unwrap().unwrap();
    assert_eq!(valid.n_spectra, 2);
    assert!((valid.aa_precision - 1.0).abs() < 1e-6);

    let records = runner.predict(dir.path(), &dir.path().join("denovo.csv")).unwrap();
    let predicted: Vec<&str> = records.iter().map(|r| r.peptides_pred.as_str()).collect();
    assert_eq!(predicted, &PEPTIDES[2..]);
}

#[test]
fn sequencing_requires_a_trained_model() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = Config::default();
    let mgf = dir.path().join("spectra.mgf");
    write_mgf(&mgf, &cfg.residues, PEPTIDES);

    let runner = BenchRunner::new(cfg, Some(dir.path().join("missing.json")));
    assert!(runner.predict(&mgf, &dir.path().join("denovo.csv")).is_err());
    assert!(!dir.path().join("denovo.csv").exists());
}

#[test]
fn sequencing_keeps_one_row_per_input_spectrum() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = Config::default();
    let train = dir.path().join("train.mgf");
    write_mgf(&train, &cfg.residues, &["PEPTIDEK"]);
    let model_path = dir.path().join("model.json");
    let runner = BenchRunner::new(cfg.clone(), Some(model_path));
    runner.train_from_path(&train).unwrap();

    // Untitled spectra: a 12+ precursor, a 120-residue label, a normal 2+.
    let long_label = format!("{}K", "G".repeat(119));
    let mut text = String::new();
    for (charge, peptide) in [(12, "PEPTIDEK"), (2, long_label.as_str()), (2, "PEPTIDEK")] {
        let tokens = cfg.residues.tokenize(peptide).unwrap();
        writeln!(text, "BEGIN IONS").unwrap();
        writeln!(text, "PEPMASS={}", cfg.residues.peptide_mz(&tokens, charge)).unwrap();
        writeln!(text, "CHARGE={charge}+").unwrap();
        writeln!(text, "SEQ={peptide}").unwrap();
        for mz in ladder(&cfg.residues, peptide) {
            writeln!(text, "{mz:.5} 100.0").unwrap();
        }
        writeln!(text, "END IONS").unwrap();
    }
    let query = dir.path().join("query.mgf");
    std::fs::write(&query, text).unwrap();

    let output = dir.path().join("denovo.csv");
    let records = runner.predict(&query, &output).unwrap();
    let ids: Vec<&str> = records.iter().map(|r| r.spectrum_id.as_str()).collect();
    assert_eq!(ids, vec!["0", "1", "2"]);
    assert_eq!(records[0].peptides_pred, "");
    assert_eq!(records[2].peptides_pred, "PEPTIDEK");
    assert_eq!(read_psms(&output).unwrap().len(), 3);
}

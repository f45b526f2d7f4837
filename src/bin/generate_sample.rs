//! Write a small synthetic NovoBench-style dataset:
//! `<out_dir>/{train,valid,test}.parquet`.
//!
//! Usage: `generate_sample [OUT_DIR]` (default `sample_data`).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, Float64Builder, Int64Array, ListBuilder, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use novobench::mass::{H2O, PROTON};
use novobench::residues::ResidueSet;

/// Residues drawn when building random peptides.
const ALPHABET: &[&str] = &[
    "G", "A", "S", "P", "V", "T", "C(+57.02)", "L", "N", "D", "Q", "E", "M", "H", "F", "R",
    "Y", "W", "M(+15.99)",
];
const N_PEPTIDES: usize = 40;
const N_NOVEL: usize = 10;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Tryptic-looking peptide: 7 to 14 residues ending in K or R.
fn random_peptide(rng: &mut SimpleRng) -> String {
    let len = 6 + rng.below(8);
    let mut peptide: String = (0..len).map(|_| ALPHABET[rng.below(ALPHABET.len())]).collect();
    peptide.push_str(if rng.below(2) == 0 { "K" } else { "R" });
    peptide
}

struct Row {
    mz: Vec<f64>,
    intensity: Vec<f64>,
    precursor_mz: f64,
    charge: i64,
    peptide: String,
    spectrum_id: String,
}

/// b/y ladder with dropout, m/z jitter and noise peaks.
fn simulate(residues: &ResidueSet, peptide: &str, id: String, rng: &mut SimpleRng) -> Result<Row> {
    let tokens = residues.tokenize(peptide)?;
    let masses: Vec<f64> = tokens.iter().map(|t| residues.mass_or_zero(t)).collect();
    let charge = 2 + rng.below(2) as u32;

    let mut peaks: Vec<(f64, f64)> = Vec::new();
    for i in 1..masses.len() {
        let b = masses[..i].iter().sum::<f64>() + PROTON;
        let y = masses[i..].iter().sum::<f64>() + H2O + PROTON;
        for ion in [b, y] {
            if rng.next_f64() < 0.85 {
                peaks.push((ion + rng.gauss(0.0, 0.005), 0.2 + rng.next_f64()));
            }
        }
    }
    for _ in 0..10 + rng.below(20) {
        peaks.push((100.0 + rng.next_f64() * 1400.0, rng.next_f64() * 0.3));
    }
    peaks.sort_by(|a, b| a.0.total_cmp(&b.0));

    Ok(Row {
        mz: peaks.iter().map(|p| p.0).collect(),
        intensity: peaks.iter().map(|p| p.1 * 1e4).collect(),
        precursor_mz: residues.peptide_mz(&tokens, charge) + rng.gauss(0.0, 0.002),
        charge: charge as i64,
        peptide: peptide.to_string(),
        spectrum_id: id,
    })
}

fn list_array(rows: &[Row], field: impl Fn(&Row) -> &[f64]) -> arrow::array::ListArray {
    let mut builder = ListBuilder::new(Float64Builder::new());
    for row in rows {
        let values = builder.values();
        for &v in field(row) {
            values.append_value(v);
        }
        builder.append(true);
    }
    builder.finish()
}

fn write_split(path: &Path, rows: &[Row]) -> Result<()> {
    let item = Arc::new(Field::new("item", DataType::Float64, true));
    let schema = Arc::new(Schema::new(vec![
        Field::new("mz_array", DataType::List(item.clone()), false),
        Field::new("intensity_array", DataType::List(item), false),
        Field::new("precursor_mz", DataType::Float64, false),
        Field::new("precursor_charge", DataType::Int64, false),
        Field::new("modified_sequence", DataType::Utf8, false),
        Field::new("spectrum_id", DataType::Utf8, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(list_array(rows, |r| r.mz.as_slice())),
            Arc::new(list_array(rows, |r| r.intensity.as_slice())),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.precursor_mz))),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.charge))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.peptide.as_str()))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.spectrum_id.as_str()))),
        ],
    )
    .context("building record batch")?;

    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn main() -> Result<()> {
    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample_data"));
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let residues = ResidueSet::novobench_default();
    let mut rng = SimpleRng::new(42);
    let known: Vec<String> = (0..N_PEPTIDES).map(|_| random_peptide(&mut rng)).collect();
    let novel: Vec<String> = (0..N_NOVEL).map(|_| random_peptide(&mut rng)).collect();

    let mut splits: Vec<(&str, Vec<Row>)> = Vec::new();
    let mut train = Vec::new();
    for (i, p) in known.iter().cycle().take(N_PEPTIDES * 3).enumerate() {
        train.push(simulate(&residues, p, format!("train:{i}"), &mut rng)?);
    }
    splits.push(("train.parquet", train));

    let mut valid = Vec::new();
    for (i, p) in known.iter().enumerate() {
        valid.push(simulate(&residues, p, format!("valid:{i}"), &mut rng)?);
    }
    splits.push(("valid.parquet", valid));

    let mut test = Vec::new();
    for (i, p) in known.iter().chain(&novel).enumerate() {
        test.push(simulate(&residues, p, format!("test:{i}"), &mut rng)?);
    }
    splits.push(("test.parquet", test));

    for (name, rows) in &splits {
        let path = out_dir.join(name);
        write_split(&path, rows)?;
        println!("Wrote {} spectra to {}", rows.len(), path.display());
    }
    Ok(())
}

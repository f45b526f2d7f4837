use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    LargeListArray, ListArray,
};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{MetadataValue, SpectralDataset, Spectrum};
use crate::natsort::natural_sort_by_key;

pub const MZ_COLUMN: &str = "mz_array";
pub const INTENSITY_COLUMN: &str = "intensity_array";
pub const PRECURSOR_MZ_COLUMN: &str = "precursor_mz";
pub const PRECURSOR_CHARGE_COLUMN: &str = "precursor_charge";
/// Peptide label columns, in order of preference.
pub const SEQUENCE_COLUMNS: &[&str] = &["modified_sequence", "sequence"];

const SUPPORTED_EXTENSIONS: &[&str] = &["parquet", "pq", "mgf", "json", "csv"];

/// Which part of a NovoBench dataset directory to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Valid,
    Test,
}

impl Split {
    pub fn file_name(self) -> &'static str {
        match self {
            Split::Train => "train.parquet",
            Split::Valid => "valid.parquet",
            Split::Test => "test.parquet",
        }
    }
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a spectral dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – NovoBench layout with `mz_array` / `intensity_array` list columns
/// * `.mgf`     – Mascot generic format
/// * `.json`    – `[{ "mz_array": [...], "intensity_array": [...], ... }, ...]`
/// * `.csv`     – `mz_array` / `intensity_array` as semicolon-separated floats
pub fn load_file(path: &Path) -> Result<SpectralDataset> {
    let ext = extension_of(path);
    let dataset = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "mgf" => load_mgf(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading {}", path.display()))?;

    log::debug!(
        "Loaded {} spectra ({} labelled) from {}",
        dataset.len(),
        dataset.n_labelled(),
        path.display()
    );
    Ok(dataset)
}

/// Load a single file, or every supported peak file in a directory
/// (natural-sorted by file name) concatenated into one dataset.
pub fn load_path(path: &Path) -> Result<SpectralDataset> {
    if path.is_file() {
        return load_file(path);
    }
    let files = peak_files(path)?;
    if files.is_empty() {
        bail!("No supported peak files found in {}", path.display());
    }
    let mut dataset = SpectralDataset::default();
    for file in &files {
        dataset.extend(load_file(file)?);
    }
    Ok(dataset)
}

/// Supported peak files inside `dir`, natural-sorted.
pub fn peak_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if dir.is_file() {
        return Ok(vec![dir.to_path_buf()]);
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("reading directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && SUPPORTED_EXTENSIONS.contains(&extension_of(p).as_str()))
        .collect();
    natural_sort_by_key(&mut files, |p| p.to_string_lossy().into_owned());
    Ok(files)
}

/// Locate a split file in a dataset directory. A plain file is its own split.
pub fn resolve_split(path: &Path, split: Split) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }
    let candidate = path.join(split.file_name());
    candidate.is_file().then_some(candidate)
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

// ---------------------------------------------------------------------------
// MGF loader
// ---------------------------------------------------------------------------

/// Read Mascot generic format:
///
/// ```text
/// BEGIN IONS
/// TITLE=run1.100.100.2
/// PEPMASS=451.25 1200.0
/// CHARGE=2+
/// SEQ=PEPTIDEK
/// 101.07 10.0
/// END IONS
/// ```
///
/// `TITLE`, `PEPMASS`, `CHARGE` and `SEQ` are interpreted; other `KEY=VALUE`
/// lines become lower-cased metadata.
fn load_mgf(path: &Path) -> Result<SpectralDataset> {
    let file = std::fs::File::open(path).context("opening MGF file")?;
    parse_mgf(std::io::BufReader::new(file))
}

pub(crate) fn parse_mgf<R: BufRead>(reader: R) -> Result<SpectralDataset> {
    let mut spectra = Vec::new();
    let mut current: Option<Spectrum> = None;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("MGF line {}", line_no + 1))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.eq_ignore_ascii_case("BEGIN IONS") {
            if current.is_some() {
                bail!("MGF line {}: nested BEGIN IONS", line_no + 1);
            }
            current = Some(Spectrum::new(Vec::new(), Vec::new(), 0.0, 0));
            continue;
        }
        if line.eq_ignore_ascii_case("END IONS") {
            if let Some(sp) = current.take() {
                spectra.push(sp);
            }
            continue;
        }
        let Some(sp) = current.as_mut() else {
            // Global parameters outside a block.
            continue;
        };
        if let Some((key, value)) = line.split_once('=') {
            apply_mgf_param(sp, key, value)
                .with_context(|| format!("MGF line {}", line_no + 1))?;
            continue;
        }
        let mut fields = line.split_whitespace();
        let (Some(mz), Some(intensity)) = (fields.next(), fields.next()) else {
            bail!("MGF line {}: expected '<mz> <intensity>', got '{line}'", line_no + 1);
        };
        sp.mz.push(
            mz.parse::<f64>()
                .with_context(|| format!("MGF line {}: '{mz}' is not a number", line_no + 1))?,
        );
        sp.intensity.push(intensity.parse::<f64>().with_context(|| {
            format!("MGF line {}: '{intensity}' is not a number", line_no + 1)
        })?);
    }
    if current.is_some() {
        bail!("MGF ended inside a BEGIN IONS block");
    }
    Ok(SpectralDataset::from_spectra(spectra))
}

fn apply_mgf_param(sp: &mut Spectrum, key: &str, value: &str) -> Result<()> {
    let value = value.trim();
    match key.trim().to_ascii_uppercase().as_str() {
        "PEPMASS" => {
            let mz = value.split_whitespace().next().unwrap_or("");
            sp.precursor_mz = mz.parse::<f64>().with_context(|| format!("invalid PEPMASS '{value}'"))?;
        }
        "CHARGE" => sp.precursor_charge = parse_charge(value)?,
        "SEQ" => {
            if !value.is_empty() {
                sp.peptide = Some(value.to_string());
            }
        }
        "TITLE" => {
            sp.metadata
                .insert("title".into(), MetadataValue::String(value.to_string()));
        }
        other => {
            sp.metadata
                .insert(other.to_ascii_lowercase(), guess_metadata_type(value));
        }
    }
    Ok(())
}

/// Parse `2`, `2+`, `+2` or `2.0` as a positive charge. Only the first of
/// several `and`-separated charges is kept.
fn parse_charge(value: &str) -> Result<u32> {
    let first = value.split(|c: char| c == ',' || c.is_whitespace()).next().unwrap_or("");
    let digits = first.trim_matches(|c| c == '+' || c == '-');
    if let Ok(z) = digits.parse::<u32>() {
        return Ok(z);
    }
    let z: f64 = digits
        .parse()
        .with_context(|| format!("invalid charge '{value}'"))?;
    if z < 0.0 || z.fract() != 0.0 {
        bail!("invalid charge '{value}'");
    }
    Ok(z as u32)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON, as written by `df.to_json(orient='records')`.
fn load_json(path: &Path) -> Result<SpectralDataset> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    let mut spectra = Vec::with_capacity(records.len());

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let mz = json_array_to_f64(obj.get(MZ_COLUMN), i, MZ_COLUMN)?;
        let intensity = json_array_to_f64(obj.get(INTENSITY_COLUMN), i, INTENSITY_COLUMN)?;
        check_lengths(&mz, &intensity, i)?;

        let precursor_mz = obj
            .get(PRECURSOR_MZ_COLUMN)
            .and_then(JsonValue::as_f64)
            .with_context(|| format!("Row {i}: missing '{PRECURSOR_MZ_COLUMN}'"))?;
        let precursor_charge = match obj.get(PRECURSOR_CHARGE_COLUMN) {
            Some(JsonValue::String(s)) => parse_charge(s)?,
            Some(v) => v
                .as_f64()
                .map(|z| z as u32)
                .with_context(|| format!("Row {i}: invalid '{PRECURSOR_CHARGE_COLUMN}'"))?,
            None => bail!("Row {i}: missing '{PRECURSOR_CHARGE_COLUMN}'"),
        };

        let mut sp = Spectrum::new(mz, intensity, precursor_mz, precursor_charge);
        sp.peptide = SEQUENCE_COLUMNS
            .iter()
            .find_map(|c| obj.get(*c).and_then(JsonValue::as_str))
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        for (key, val) in obj {
            if is_reserved_column(key) {
                continue;
            }
            sp.metadata.insert(key.clone(), json_to_metadata(val));
        }

        spectra.push(sp);
    }

    Ok(SpectralDataset::from_spectra(spectra))
}

fn json_array_to_f64(val: Option<&JsonValue>, row: usize, col: &str) -> Result<Vec<f64>> {
    let arr = val
        .and_then(|v| v.as_array())
        .with_context(|| format!("Row {row}: missing or invalid '{col}' array"))?;

    arr.iter()
        .enumerate()
        .map(|(j, v)| {
            v.as_f64()
                .with_context(|| format!("Row {row}, {col}[{j}]: not a number"))
        })
        .collect()
}

fn json_to_metadata(val: &JsonValue) -> MetadataValue {
    match val {
        JsonValue::String(s) => MetadataValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                MetadataValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                MetadataValue::Float(f)
            } else {
                MetadataValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => MetadataValue::Bool(*b),
        JsonValue::Null => MetadataValue::Null,
        other => MetadataValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names.
/// `mz_array` and `intensity_array` contain semicolon-separated floats:
///   `"101.07;175.12"`, `"10.0;20.0"`
fn load_csv(path: &Path) -> Result<SpectralDataset> {
    let reader = csv::Reader::from_path(path).context("opening CSV")?;
    parse_csv(reader)
}

fn parse_csv<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<SpectralDataset> {
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .with_context(|| format!("CSV missing '{name}' column"))
    };
    let mz_idx = column(MZ_COLUMN)?;
    let intensity_idx = column(INTENSITY_COLUMN)?;
    let precursor_mz_idx = column(PRECURSOR_MZ_COLUMN)?;
    let charge_idx = column(PRECURSOR_CHARGE_COLUMN)?;
    let seq_idx = SEQUENCE_COLUMNS
        .iter()
        .find_map(|c| headers.iter().position(|h| h == c));

    let mut spectra = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let field = |idx: usize| record.get(idx).unwrap_or("");

        let mz = parse_semicolon_floats(field(mz_idx), row_no, MZ_COLUMN)?;
        let intensity = parse_semicolon_floats(field(intensity_idx), row_no, INTENSITY_COLUMN)?;
        check_lengths(&mz, &intensity, row_no)?;

        let precursor_mz: f64 = field(precursor_mz_idx)
            .trim()
            .parse()
            .with_context(|| format!("CSV row {row_no}: invalid '{PRECURSOR_MZ_COLUMN}'"))?;
        let precursor_charge = parse_charge(field(charge_idx))
            .with_context(|| format!("CSV row {row_no}"))?;

        let mut sp = Spectrum::new(mz, intensity, precursor_mz, precursor_charge);
        sp.peptide = seq_idx
            .map(|i| field(i).trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        for (col_idx, value) in record.iter().enumerate() {
            let col_name = &headers[col_idx];
            if is_reserved_column(col_name) {
                continue;
            }
            sp.metadata.insert(col_name.clone(), guess_metadata_type(value));
        }

        spectra.push(sp);
    }

    Ok(SpectralDataset::from_spectra(spectra))
}

fn parse_semicolon_floats(s: &str, row: usize, col: &str) -> Result<Vec<f64>> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    s.split(';')
        .enumerate()
        .map(|(j, tok)| {
            tok.trim()
                .parse::<f64>()
                .with_context(|| format!("Row {row}, {col}[{j}]: '{tok}' is not a number"))
        })
        .collect()
}

fn guess_metadata_type(s: &str) -> MetadataValue {
    if s.is_empty() {
        return MetadataValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return MetadataValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return MetadataValue::Float(f);
    }
    if s == "true" || s == "false" {
        return MetadataValue::Bool(s == "true");
    }
    MetadataValue::String(s.to_string())
}

fn is_reserved_column(name: &str) -> bool {
    name == MZ_COLUMN
        || name == INTENSITY_COLUMN
        || name == PRECURSOR_MZ_COLUMN
        || name == PRECURSOR_CHARGE_COLUMN
        || SEQUENCE_COLUMNS.contains(&name)
}

fn check_lengths(mz: &[f64], intensity: &[f64], row: usize) -> Result<()> {
    if mz.len() != intensity.len() {
        bail!(
            "Row {row}: {MZ_COLUMN} has {} values but {INTENSITY_COLUMN} has {}",
            mz.len(),
            intensity.len()
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file in the NovoBench layout.
///
/// Expected schema:
/// - `mz_array`, `intensity_array`: List<Float64|Float32> or LargeList
/// - `precursor_mz`: Float64/Float32
/// - `precursor_charge`: integer or float
/// - `modified_sequence` (or `sequence`): optional Utf8 label
/// - Any other columns are treated as metadata
///
/// Works with files written by both **Pandas** and **Polars**.
fn load_parquet(path: &Path) -> Result<SpectralDataset> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut spectra = Vec::new();
    let mut row_offset = 0;
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        spectra.extend(spectra_from_batch(&batch, row_offset)?);
        row_offset += batch.num_rows();
    }

    Ok(SpectralDataset::from_spectra(spectra))
}

/// Convert one Arrow record batch into spectra. `row_offset` only affects
/// error messages.
pub fn spectra_from_batch(batch: &RecordBatch, row_offset: usize) -> Result<Vec<Spectrum>> {
    let schema = batch.schema();
    let index_of = |name: &str| {
        schema
            .index_of(name)
            .map_err(|_| anyhow::anyhow!("Parquet file missing '{name}' column"))
    };
    let mz_col = batch.column(index_of(MZ_COLUMN)?);
    let intensity_col = batch.column(index_of(INTENSITY_COLUMN)?);
    let precursor_mz_col = batch.column(index_of(PRECURSOR_MZ_COLUMN)?);
    let charge_col = batch.column(index_of(PRECURSOR_CHARGE_COLUMN)?);
    let seq_col = SEQUENCE_COLUMNS
        .iter()
        .find_map(|c| schema.index_of(c).ok())
        .map(|i| batch.column(i));

    let meta_cols: Vec<(usize, String)> = schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| !is_reserved_column(f.name()))
        .map(|(i, f)| (i, f.name().clone()))
        .collect();

    let mut spectra = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let abs_row = row_offset + row;
        let mz = extract_f64_list(mz_col, row)
            .with_context(|| format!("Row {abs_row}: failed to read '{MZ_COLUMN}'"))?;
        let intensity = extract_f64_list(intensity_col, row)
            .with_context(|| format!("Row {abs_row}: failed to read '{INTENSITY_COLUMN}'"))?;
        check_lengths(&mz, &intensity, abs_row)?;

        let precursor_mz = extract_metadata_value(precursor_mz_col, row)
            .as_f64()
            .with_context(|| format!("Row {abs_row}: invalid '{PRECURSOR_MZ_COLUMN}'"))?;
        let precursor_charge = extract_metadata_value(charge_col, row)
            .as_f64()
            .filter(|z| *z >= 0.0)
            .with_context(|| format!("Row {abs_row}: invalid '{PRECURSOR_CHARGE_COLUMN}'"))?
            as u32;

        let mut sp = Spectrum::new(mz, intensity, precursor_mz, precursor_charge);
        if let Some(col) = seq_col {
            if let MetadataValue::String(s) = extract_metadata_value(col, row) {
                if !s.is_empty() {
                    sp.peptide = Some(s);
                }
            }
        }

        let metadata: BTreeMap<String, MetadataValue> = meta_cols
            .iter()
            .map(|(col_idx, col_name)| {
                (col_name.clone(), extract_metadata_value(batch.column(*col_idx), row))
            })
            .collect();
        sp.metadata = metadata;

        spectra.push(sp);
    }
    Ok(spectra)
}

// -- Parquet / Arrow helpers --

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &Arc<dyn Array>, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null value in list column");
    }

    let values_array = match col.data_type() {
        DataType::List(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<ListArray>()
                .context("expected ListArray")?;
            list_arr.value(row)
        }
        DataType::LargeList(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<LargeListArray>()
                .context("expected LargeListArray")?;
            list_arr.value(row)
        }
        other => bail!("Expected List or LargeList column, got {other:?}"),
    };

    // The inner array can be Float64 or Float32
    if let Some(f64_arr) = values_array.as_any().downcast_ref::<Float64Array>() {
        Ok(f64_arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(f32_arr) = values_array.as_any().downcast_ref::<Float32Array>() {
        Ok(f32_arr.iter().map(|v| v.unwrap_or(f32::NAN) as f64).collect())
    } else {
        bail!(
            "List inner type is {:?}, expected Float64 or Float32",
            values_array.data_type()
        )
    }
}

/// Extract a single scalar value from an Arrow column at a given row.
fn extract_metadata_value(col: &Arc<dyn Array>, row: usize) -> MetadataValue {
    if col.is_null(row) {
        return MetadataValue::Null;
    }
    match col.data_type() {
        DataType::Utf8 => {
            let s = col.as_string::<i32>();
            MetadataValue::String(s.value(row).to_string())
        }
        DataType::LargeUtf8 => {
            let s = col.as_string::<i64>();
            MetadataValue::String(s.value(row).to_string())
        }
        DataType::Int32 => col
            .as_any()
            .downcast_ref::<Int32Array>()
            .map_or(MetadataValue::Null, |a| MetadataValue::Integer(a.value(row) as i64)),
        DataType::Int64 => col
            .as_any()
            .downcast_ref::<Int64Array>()
            .map_or(MetadataValue::Null, |a| MetadataValue::Integer(a.value(row))),
        DataType::Float32 => col
            .as_any()
            .downcast_ref::<Float32Array>()
            .map_or(MetadataValue::Null, |a| MetadataValue::Float(a.value(row) as f64)),
        DataType::Float64 => col
            .as_any()
            .downcast_ref::<Float64Array>()
            .map_or(MetadataValue::Null, |a| MetadataValue::Float(a.value(row))),
        DataType::Boolean => col
            .as_any()
            .downcast_ref::<BooleanArray>()
            .map_or(MetadataValue::Null, |a| MetadataValue::Bool(a.value(row))),
        _ => MetadataValue::String(format!("{:?}", col.data_type())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Builder, ListBuilder, StringArray};
    use arrow::datatypes::{Field, Schema};
    use parquet::arrow::ArrowWriter;

    const MGF: &str = "\
BEGIN IONS
TITLE=run1.10.10.2
PEPMASS=451.2504 1200.5
CHARGE=2+
SCANS=10
SEQ=PEPTIDEK
RTINSECONDS=33.5
101.0709 10.0
175.1190 20.0
END IONS
BEGIN IONS
TITLE=run1.11.11.3
PEPMASS=300.5
CHARGE=3+
120.0 5.0
END IONS
";

    #[test]
    fn parses_mgf_blocks() {
        let ds = parse_mgf(MGF.as_bytes()).unwrap();
        assert_eq!(ds.len(), 2);

        let first = &ds.spectra[0];
        assert_eq!(first.mz, vec![101.0709, 175.1190]);
        assert_eq!(first.intensity, vec![10.0, 20.0]);
        assert!((first.precursor_mz - 451.2504).abs() < 1e-9);
        assert_eq!(first.precursor_charge, 2);
        assert_eq!(first.peptide.as_deref(), Some("PEPTIDEK"));
        assert_eq!(first.metadata.get("scans"), Some(&MetadataValue::Integer(10)));
        assert_eq!(first.metadata.get("rtinseconds"), Some(&MetadataValue::Float(33.5)));
        assert_eq!(first.identifier(0), "run1.10.10.2");

        assert_eq!(ds.spectra[1].precursor_charge, 3);
        assert!(ds.spectra[1].peptide.is_none());
    }

    #[test]
    fn unterminated_mgf_block_is_an_error() {
        let text = "BEGIN IONS\nPEPMASS=100.0\n100.0 1.0\n";
        assert!(parse_mgf(text.as_bytes()).is_err());
    }

    #[test]
    fn charge_syntaxes() {
        assert_eq!(parse_charge("2+").unwrap(), 2);
        assert_eq!(parse_charge("+3").unwrap(), 3);
        assert_eq!(parse_charge("2.0").unwrap(), 2);
        assert_eq!(parse_charge("2+ and 3+").unwrap(), 2);
        assert!(parse_charge("two").is_err());
    }

    #[test]
    fn parses_csv_rows() {
        let text = "mz_array,intensity_array,precursor_mz,precursor_charge,modified_sequence,scan_number\n\
                    101.0;175.1,1.0;2.0,450.5,2,PEPTIDEK,7\n\
                    120.0,5.0,300.1,3,,8\n";
        let ds = parse_csv(csv::Reader::from_reader(text.as_bytes())).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.spectra[0].mz, vec![101.0, 175.1]);
        assert_eq!(ds.spectra[0].peptide.as_deref(), Some("PEPTIDEK"));
        assert!(ds.spectra[1].peptide.is_none());
        assert_eq!(ds.column_names, vec!["scan_number".to_string()]);
    }

    #[test]
    fn csv_length_mismatch_names_row() {
        let text = "mz_array,intensity_array,precursor_mz,precursor_charge\n101.0;175.1,1.0,450.5,2\n";
        let err = parse_csv(csv::Reader::from_reader(text.as_bytes())).unwrap_err();
        assert!(format!("{err:#}").contains("Row 0"));
    }

    fn list_column(rows: &[Vec<f64>]) -> arrow::array::ListArray {
        let mut builder = ListBuilder::new(Float64Builder::new());
        for row in rows {
            builder.values().append_slice(row);
            builder.append(true);
        }
        builder.finish()
    }

    #[test]
    fn reads_novobench_parquet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.parquet");

        let list_type = DataType::List(Arc::new(Field::new("item", DataType::Float64, true)));
        let schema = Arc::new(Schema::new(vec![
            Field::new(MZ_COLUMN, list_type.clone(), false),
            Field::new(INTENSITY_COLUMN, list_type, false),
            Field::new(PRECURSOR_MZ_COLUMN, DataType::Float64, false),
            Field::new(PRECURSOR_CHARGE_COLUMN, DataType::Int64, false),
            Field::new("modified_sequence", DataType::Utf8, true),
            Field::new("experiment_name", DataType::Utf8, false),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(list_column(&[vec![100.0, 200.0], vec![150.0]])),
                Arc::new(list_column(&[vec![1.0, 2.0], vec![3.0]])),
                Arc::new(Float64Array::from(vec![500.25, 612.5])),
                Arc::new(Int64Array::from(vec![2, 3])),
                Arc::new(StringArray::from(vec![Some("PEPTIDEK"), None])),
                Arc::new(StringArray::from(vec!["exp1", "exp1"])),
            ],
        )
        .unwrap();
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let ds = load_path(dir.path()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.spectra[0].mz, vec![100.0, 200.0]);
        assert_eq!(ds.spectra[0].precursor_charge, 2);
        assert_eq!(ds.spectra[0].peptide.as_deref(), Some("PEPTIDEK"));
        assert!(ds.spectra[1].peptide.is_none());
        assert_eq!(ds.column_names, vec!["experiment_name".to_string()]);

        assert_eq!(resolve_split(dir.path(), Split::Test), Some(path));
        assert_eq!(resolve_split(dir.path(), Split::Train), None);
    }

    #[test]
    fn unsupported_extension() {
        let err = load_file(Path::new("spectra.mzML")).unwrap_err();
        assert!(format!("{err:#}").contains("Unsupported file extension"));
    }
}

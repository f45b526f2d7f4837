/// Data layer: core types, loading, preprocessing and filtering.
///
/// Architecture:
/// ```text
///  .parquet / .mgf / .json / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file(s) → SpectralDataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  charge / peak count / label length → kept indices
///   └──────────┘
///        │
///        ▼
///   ┌────────────┐
///   │ transforms  │  m/z range, precursor removal, top-n, sqrt + L2
///   └────────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod transforms;

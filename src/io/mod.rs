/// Result files: the de novo PSM table and mzTab export.
pub mod mztab;
pub mod psm;

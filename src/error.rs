use std::path::PathBuf;

/// Library-level failures. File loading and the CLI wrap these in `anyhow`.
#[derive(Debug, thiserror::Error)]
pub enum NovoError {
    #[error("peptide '{peptide}' contains characters not in the residue alphabet (at offset {offset})")]
    UnknownResidue { peptide: String, offset: usize },

    #[error("PTM type {0} is not in the residue alphabet")]
    UnknownPtm(String),

    #[error("got {scores} scores for {peptides} peptide predictions")]
    ScoreCountMismatch { scores: usize, peptides: usize },

    #[error("a model file must be provided")]
    MissingModel,

    #[error("could not find the model weights at {0}")]
    ModelNotFound(PathBuf),

    #[error("checkpoint {path} is incompatible: {reason}")]
    IncompatibleCheckpoint { path: PathBuf, reason: String },

    #[error("failed to read config {0}: {1}")]
    ConfigIo(PathBuf, String),

    #[error("invalid config: {0}")]
    ConfigParse(String),

    #[error("external model command `{program}` failed: {reason}")]
    ExternalCommand { program: String, reason: String },
}

pub type Result<T> = std::result::Result<T, NovoError>;

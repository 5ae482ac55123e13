use thiserror::Error;

#[derive(Error, Debug)]
pub enum FusionError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required column '{column}' in table {table}")]
    MissingColumn { table: String, column: String },

    #[error("Unknown rating source: {0}")]
    UnknownSource(String),
}

pub type Result<T> = std::result::Result<T, FusionError>;

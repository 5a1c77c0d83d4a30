use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("insufficient history: need {need} bars, got {got}")]
    InsufficientHistory { need: usize, got: usize },

    #[error("malformed bar input: {0}")]
    MalformedInput(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("state store error: {0}")]
    StateStore(#[from] rusqlite::Error),

    #[error("bar store error: {0}")]
    BarStore(#[from] duckdb::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

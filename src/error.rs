use thiserror::Error;

#[derive(Error, Debug)]
pub enum Nl2SqlError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Schema catalog error: {0}")]
    Catalog(String),

    #[error("Error taxonomy error: {0}")]
    Taxonomy(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Database error: {0}")]
    Database(String),

    /// Model output that parsed but did not have the expected shape
    #[error("Malformed model output: {0}")]
    Parse(String),
}

impl From<rusqlite::Error> for Nl2SqlError {
    fn from(err: rusqlite::Error) -> Self {
        Nl2SqlError::Database(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Nl2SqlError>;

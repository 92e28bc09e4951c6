use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("duplicate key in {collection}.{field_key}")]
    DuplicateKey {
        collection: String,
        field_key: String,
    },

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("field {collection}.{field_key} is not an integer")]
    TypeMismatch {
        collection: String,
        field_key: String,
    },

    #[error("config error: {0}")]
    Config(String),
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to open attendance database at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("failed to create database directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("storage query failed: {0}")]
    Query(#[from] rusqlite::Error),
    #[error("invalid timestamp '{0}' in attendance log")]
    BadTimestamp(String),
}

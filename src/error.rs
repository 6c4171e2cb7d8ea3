//! Error types for docvalues

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Database corruption: {0}")]
    Corruption(String),

    #[error("Value out of range: {0}")]
    Range(String),

    #[error("Feature unavailable: {0}")]
    FeatureUnavailable(String),

    #[error("Database is closed")]
    DatabaseClosed,
}

pub type Result<T> = std::result::Result<T, Error>;

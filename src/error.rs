use crate::source::SourceLocation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    ImageProcessing(#[from] image::ImageError),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Walkdir error: {0}")]
    WalkdirError(#[from] walkdir::Error),

    #[error("Invalid glob pattern: {0}")]
    InvalidPattern(#[from] glob::PatternError),

    #[error("Invalid quality value: {0}. Must be between 1 and 100")]
    InvalidQuality(u8),

    #[error("Invalid image dimensions: {0}x{1}. Maximum allowed: {2}x{2}")]
    InvalidDimensions(u32, u32, u32),

    #[error("File too large: {0} bytes. Maximum allowed: {1} bytes")]
    FileTooLarge(u64, u64),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),
}

pub type Result<T> = std::result::Result<T, ConvertError>;

/// An input path that yielded no candidates because it could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("cannot expand {}: {reason}", .path.display())]
pub struct ExpansionFailure {
    pub path: PathBuf,
    pub reason: String,
}

impl ExpansionFailure {
    pub fn new(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// A candidate whose header could not be read; it is dropped from the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("cannot probe {location}: {reason}")]
pub struct ProbeFailure {
    pub location: SourceLocation,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStage {
    Read,
    Decode,
    Encode,
    Write,
}

impl fmt::Display for ItemStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ItemStage::Read => "read",
            ItemStage::Decode => "decode",
            ItemStage::Encode => "encode",
            ItemStage::Write => "write",
        };
        write!(f, "{}", name)
    }
}

/// One entry that failed during a conversion run. Excluded from the package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{name}: {stage} failed: {reason}")]
pub struct ItemFailure {
    pub name: String,
    pub location: SourceLocation,
    pub stage: ItemStage,
    pub reason: String,
}

/// Batch-fatal errors. Any of these aborts the run and leaves no package behind.
#[derive(Debug, Error)]
pub enum SystemicFailure {
    #[error("No entries to convert")]
    NoEntries,

    #[error("A conversion is already in progress")]
    Busy,

    #[error("Destination {} is not writable: {source}", .path.display())]
    DestinationUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Destination {} is out of space", .path.display())]
    DiskFull { path: PathBuf },

    #[error("Failed to package output into {}: {reason}", .path.display())]
    Package { path: PathBuf, reason: String },

    #[error("Failed to start workers: {0}")]
    Workers(String),
}

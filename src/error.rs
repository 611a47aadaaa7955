use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the SWAN bookkeeping layer.
///
/// Parsing errors are fatal for a single file. Bulk ingestion logs and skips
/// them; direct lookups propagate them. Dimension and filter errors are
/// configuration bugs and always propagate.
#[derive(Debug, Error, PartialEq)]
pub enum SwanError {
    #[error("malformed filename {name}: {reason}")]
    MalformedFilename { name: String, reason: String },

    #[error("unknown {field} code {value:?}")]
    UnknownCode { field: &'static str, value: String },

    #[error("file does not match the expected recording shape: {0}")]
    SchemaMismatch(String),

    #[error("file {path} is stored under a directory that disagrees with its name: {reason}")]
    PathMismatch { path: PathBuf, reason: String },

    #[error("identity {0} is excluded from the group bands")]
    ExcludedIdentity(u32),

    #[error("unknown protocol {dimension} {value:?}")]
    UnknownProtocolDimension {
        dimension: &'static str,
        value: String,
    },

    #[error("invalid value {value:?} for filter {filter}")]
    InvalidFilterValue {
        filter: &'static str,
        value: String,
    },

    #[error("protocol {protocol}: {bucket} needs {requested} files but the pool only has {available}")]
    InsufficientPoolSize {
        protocol: String,
        bucket: String,
        requested: usize,
        available: usize,
    },

    #[error("protocol {protocol} puts {path} in both enroll and probe of {group}")]
    ClassOverlap {
        protocol: String,
        group: String,
        path: String,
    },

    #[error("duplicate {entity} key {key}")]
    DuplicateKey { entity: &'static str, key: String },
}

impl SwanError {
    pub fn malformed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        SwanError::MalformedFilename {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn unknown_code(field: &'static str, value: impl Into<String>) -> Self {
        SwanError::UnknownCode {
            field,
            value: value.into(),
        }
    }

    pub fn invalid_filter(filter: &'static str, value: impl Into<String>) -> Self {
        SwanError::InvalidFilterValue {
            filter,
            value: value.into(),
        }
    }

    pub fn unknown_dimension(dimension: &'static str, value: impl Into<String>) -> Self {
        SwanError::UnknownProtocolDimension {
            dimension,
            value: value.into(),
        }
    }
}

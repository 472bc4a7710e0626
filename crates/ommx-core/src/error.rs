//! Error types for the ommx-core library.
//!
//! This module provides error handling using the `thiserror` crate, with
//! variants for I/O, wire decoding, evaluation and validation failures.

use crate::validate::ValidationError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ommx operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all ommx operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to write output file
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        /// Path to the file that failed to write
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to create output directory
    #[error("failed to create directory '{path}': {source}")]
    DirectoryCreate {
        /// Path to the directory that failed to create
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Malformed protobuf wire data
    #[error("failed to decode message: {0}")]
    Decode(#[from] prost::DecodeError),

    /// A function refers to a decision variable the state does not assign
    #[error("no value assigned to decision variable {id}")]
    MissingVariable {
        /// Id of the unassigned decision variable
        id: u64,
    },

    /// The instance decoded but violates a semantic invariant
    #[error("invalid instance: {0}")]
    Validation(#[from] ValidationError),

    /// Failed to build the schema descriptor with prost-reflect
    #[error("failed to build schema descriptor: {0}")]
    DescriptorBuild(String),
}

impl Error {
    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new file write error
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Creates a new directory creation error
    pub fn directory_create(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DirectoryCreate {
            path: path.into(),
            source,
        }
    }

    /// Creates a new missing variable error
    pub fn missing_variable(id: u64) -> Self {
        Self::MissingVariable { id }
    }

    /// Creates a new descriptor build error
    pub fn descriptor_build(msg: impl Into<String>) -> Self {
        Self::DescriptorBuild(msg.into())
    }

    /// Returns true if the error concerns the content of one input
    /// and processing of other inputs can continue
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Decode(_) | Self::Validation(_) | Self::MissingVariable { .. }
        )
    }
}

//! Error types for fixdex.
//!
//! Nothing in this crate is fatal to the process: validation and import
//! problems surface as a single user-facing message, persistence problems
//! propagate as rejected operations, and a missing image is not an error at
//! all (the probe just returns no hits).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A required field was empty on save.
    #[error("missing required field: {field}")]
    Validation {
        /// Wire name of the offending field.
        field: &'static str,
    },

    /// The import file was not a JSON array of records.
    #[error("import file is not valid JSON: {0}")]
    ImportParse(#[from] serde_json::Error),

    /// The backing store rejected an operation.
    #[error("store operation failed: {message}")]
    Persistence { message: String },

    /// An unrecognized search-field selector was supplied.
    #[error("unknown field selector \"{0}\"")]
    UnknownField(String),
}

impl Error {
    pub fn persistence(message: impl Into<String>) -> Self {
        Error::Persistence {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

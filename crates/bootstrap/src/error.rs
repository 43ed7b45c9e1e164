// error.rs - error taxonomy for descriptor loading and application

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BootstrapError {
    /// The target database is unreachable. Fatal, never retried.
    #[error("cannot reach database target: {source}")]
    Connection { source: mongodb::error::Error },

    /// An index already exists with the same fields but incompatible
    /// options. Left for the operator to resolve manually.
    #[error("index conflict on '{collection}': existing {existing} is incompatible with requested {requested}")]
    Conflict {
        collection: String,
        existing: String,
        requested: String,
    },

    /// A seed document was rejected by a unique index.
    #[error("seed data rejected by unique index on '{collection}': {source}")]
    Validation {
        collection: String,
        source: mongodb::error::Error,
    },

    /// A descriptor manifest or seed file failed to parse.
    #[error("invalid descriptor file {path:?}: {reason}")]
    Descriptor { path: PathBuf, reason: String },

    /// A descriptor manifest or seed file could not be read.
    #[error("failed to read {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },

    /// Any other driver failure, propagated verbatim.
    #[error("database error: {source}")]
    Driver { source: mongodb::error::Error },
}

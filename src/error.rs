use std::{io, path::PathBuf};

use thiserror::Error;

/// Result type used across the stockroom library.
pub type Result<T> = std::result::Result<T, Error>;

/// Every way a stockroom operation can fail.
///
/// None of these abort the process: the command that hit the error is
/// abandoned, and nothing derived (such as the inventory cache) is written.
#[derive(Debug, Error)]
pub enum Error {
    /// A persisted record is malformed or lacks a required column.
    #[error("invalid format of {}: {message}", path.display())]
    Format { path: PathBuf, message: String },

    /// A sale asked for more units than are currently in stock.
    #[error(
        "insufficient quantity in stock: requested {requested} of {product:?}, \
         {available} available"
    )]
    InsufficientStock {
        product: String,
        requested: u32,
        available: i64,
    },

    /// A date argument could not be parsed.
    #[error("invalid date {input:?} (expected {expected})")]
    InvalidDate {
        input: String,
        expected: &'static str,
    },

    /// A money amount could not be parsed.
    #[error("invalid amount {0:?}")]
    InvalidAmount(String),

    /// An unknown profit period kind.
    #[error("invalid period {0:?} (expected day, month, year, all or product)")]
    InvalidPeriod(String),

    /// The underlying storage could not be read or written.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Another process holds the data directory's write lock.
    #[error(
        "data directory is locked ({}); remove the lock file if no other \
         stockroom process is running",
        .0.display()
    )]
    Locked(PathBuf),

    /// A money total does not fit in the range amounts are kept in.
    #[error("amount out of range")]
    Overflow,

    /// A spreadsheet export could not be written.
    #[error("cannot write spreadsheet {}: {source}", path.display())]
    Spreadsheet {
        path: PathBuf,
        #[source]
        source: rust_xlsxwriter::XlsxError,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn format(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Classifies a CSV error: I/O failures stay I/O failures, anything else
    /// means the file content is malformed.
    pub(crate) fn from_csv(path: impl Into<PathBuf>, err: csv::Error) -> Self {
        let message = err.to_string();
        match err.into_kind() {
            csv::ErrorKind::Io(source) => Self::io(path, source),
            _ => Self::format(path, message),
        }
    }
}

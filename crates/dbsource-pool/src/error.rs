//! Error types for dbsource-pool

use std::time::Duration;

use thiserror::Error;

/// Boxed error produced by driver implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that may occur when loading a connection source or leasing connections from it
#[derive(Error, Debug)]
pub enum Error {
   /// No driver is registered under the requested identifier
   #[error("database driver '{0}' is not available")]
   DriverUnavailable(String),

   /// The source was used before `load` completed
   #[error("connection source has not been loaded")]
   NotLoaded,

   /// `load` was called on a source that is already loaded
   #[error("connection source has already been loaded")]
   AlreadyLoaded,

   /// A required key was absent from a key/value configuration
   #[error("missing connection parameter '{0}'")]
   MissingParameter(&'static str),

   /// The pool configuration can never hand out a connection
   #[error("invalid pool configuration: {0}")]
   InvalidConfig(&'static str),

   /// IO error while setting up driver infrastructure. Standard library IO
   /// errors are converted to this variant.
   #[error("IO error: {0}")]
   Io(#[from] std::io::Error),

   /// Failure while establishing, leasing or releasing a physical connection
   #[error(transparent)]
   Connection(#[from] ConnectionError),
}

/// Failures around physical connections. The underlying driver error is always attached.
#[derive(Error, Debug)]
pub enum ConnectionError {
   /// The driver could not open a physical connection
   #[error("failed to connect to '{uri}': {source}")]
   Establish {
      uri: String,
      #[source]
      source: BoxError,
   },

   /// The driver reported an error while closing a physical connection
   #[error("failed to close connection: {0}")]
   Close(#[source] BoxError),

   /// A bounded pool stayed exhausted for the whole wait
   #[error("timed out after {0:?} waiting for a pooled connection")]
   PoolTimedOut(Duration),

   /// The source has been closed and no longer hands out connections
   #[error("connection source has been closed")]
   SourceClosed,

   /// The connection was leased from a different source
   #[error("connection was not borrowed from this source")]
   ForeignConnection,
}

impl Error {
   /// Machine-readable error code
   pub fn error_code(&self) -> &'static str {
      match self {
         Error::DriverUnavailable(_) => "DRIVER_UNAVAILABLE",
         Error::NotLoaded => "SOURCE_NOT_LOADED",
         Error::AlreadyLoaded => "SOURCE_ALREADY_LOADED",
         Error::MissingParameter(_) => "MISSING_PARAMETER",
         Error::InvalidConfig(_) => "INVALID_CONFIG",
         Error::Io(_) => "IO_ERROR",
         Error::Connection(_) => "CONNECTION_ERROR",
      }
   }
}

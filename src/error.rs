/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the connection registry.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// A source is already registered under this name.
   #[error("duplicate connection source name: [{0}]")]
   DuplicateName(String),

   /// Error from loading a source or using its connections.
   #[error(transparent)]
   Source(#[from] dbsource_pool::Error),
}

impl Error {
   /// Extract a structured error code from the error type.
   ///
   /// This provides machine-readable error codes for error handling.
   pub fn error_code(&self) -> &'static str {
      match self {
         Error::DuplicateName(_) => "DUPLICATE_NAME",
         Error::Source(e) => e.error_code(),
      }
   }
}

impl From<dbsource_pool::ConnectionError> for Error {
   fn from(err: dbsource_pool::ConnectionError) -> Self {
      Error::Source(err.into())
   }
}

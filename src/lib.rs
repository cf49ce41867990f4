//! # dbsource
//!
//! Named database connection sources handing out pooled, reusable physical
//! connections.
//!
//! A [`ConnectionRegistry`] maps caller-chosen names to
//! [`ConnectionSource`]s. Registration is a one-time setup step; afterwards
//! callers resolve a name, borrow a connection, use it and release it.
//!
//! ```no_run
//! use std::collections::HashMap;
//! use dbsource::{ConnectionRegistry, DriverRegistry};
//!
//! fn main() -> dbsource::Result<()> {
//!     let registry = ConnectionRegistry::new(DriverRegistry::with_defaults()?);
//!
//!     // Default source (name "") from a key/value configuration
//!     let mut properties = HashMap::new();
//!     properties.insert("database.driver".to_string(), "sqlite".to_string());
//!     properties.insert("database.uri".to_string(), "sqlite::memory:".to_string());
//!     registry.load_properties_default(&properties)?;
//!
//!     let source = registry.get_default().expect("registered above");
//!     let conn = source.borrow(true)?;
//!     source.release(conn, true)?;
//!
//!     registry.shutdown()?;
//!     Ok(())
//! }
//! ```

mod error;
mod registry;

pub use error::{Error, Result};
pub use registry::{ConnectionRegistry, DEFAULT_SOURCE_NAME};

pub use dbsource_pool::{
   AcquireMode, BoxError, Connection, ConnectionError, ConnectionParameters, ConnectionSource,
   Driver, DriverRegistry, PoolConfig, PoolStatus, PooledConnection, PropertySource,
};

/// Error type of connection sources, carried by [`Error::Source`]
pub use dbsource_pool::Error as SourceError;

#[cfg(feature = "sqlite")]
pub use dbsource_pool::sqlite;

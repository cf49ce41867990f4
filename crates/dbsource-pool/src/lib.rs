//! # dbsource-pool
//!
//! Connection sources that hide driver loading and pool lifecycle behind a
//! stable handle.
//!
//! ## Core Types
//!
//! - **[`ConnectionSource`]**: Driver identity, connection parameters and a pool for one database
//! - **[`PooledConnection`]**: A leased physical connection, returned on release or drop
//! - **[`ConnectionParameters`]**: Immutable driver / URI / user / password value
//! - **[`DriverRegistry`]**: Maps driver identifiers to [`Driver`] factories
//! - **[`PoolConfig`]**: Idle limit, optional bound and acquire timeout
//! - **[`Error`]**: Error type for source and connection operations
//!
//! ## Architecture
//!
//! - **Two acquisition modes**: every `borrow`/`release` call says whether it goes
//!   through the pool (`true`) or opens and closes a direct connection (`false`)
//! - **Stack discipline**: the most recently released idle connection is handed out first
//! - **Unbounded by default**: connections are created on demand; an optional
//!   bound makes `borrow` wait up to a timeout
//! - **Synchronous**: calls block on connect I/O; the pool serialises its free-list internally
//!
//! ## Usage
//!
//! ```no_run
//! use dbsource_pool::{ConnectionParameters, ConnectionSource, DriverRegistry, PoolConfig};
//!
//! fn main() -> dbsource_pool::Result<()> {
//!     let drivers = DriverRegistry::with_defaults()?;
//!     let params = ConnectionParameters::new("sqlite", "sqlite::memory:", "", "");
//!     let source = ConnectionSource::open(params, &drivers, PoolConfig::default())?;
//!
//!     // Pooled: released connections are reused
//!     let conn = source.borrow(true)?;
//!     source.release(conn, true)?;
//!
//!     // Direct: a fresh connection, closed on release
//!     let conn = source.borrow(false)?;
//!     source.release(conn, false)?;
//!
//!     source.close()?;
//!     Ok(())
//! }
//! ```
//!
mod config;
mod connection;
mod driver;
mod error;
mod parameters;
mod pool;
mod source;

#[cfg(feature = "sqlite")]
pub mod sqlite;

// Re-export public types
pub use config::PoolConfig;
pub use connection::{AcquireMode, PooledConnection};
pub use driver::{Connection, Driver, DriverRegistry};
pub use error::{BoxError, ConnectionError, Error};
pub use parameters::{
   ConnectionParameters, DRIVER_KEY, PASSWORD_KEY, PropertySource, URI_KEY, USER_KEY,
};
pub use pool::PoolStatus;
pub use source::ConnectionSource;

/// A type alias for Results with our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

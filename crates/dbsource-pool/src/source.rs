//! Connection source: one database's parameters plus its pool

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use crate::Result;
use crate::config::PoolConfig;
use crate::connection::PooledConnection;
use crate::driver::DriverRegistry;
use crate::error::Error;
use crate::parameters::ConnectionParameters;
use crate::pool::{ConnectionPool, PoolStatus};

/// Driver identity, connection parameters and a pool of physical connections
/// to one database.
///
/// A source starts out unloaded. [`load`](Self::load) resolves the driver and
/// builds the pool; until then every borrow fails with [`Error::NotLoaded`].
/// A source is loaded at most once.
///
/// Connections are obtained in one of two modes, chosen per call:
///
/// - **pooled** (`use_pool = true`): the most recently released idle
///   connection is reused, otherwise a new one is opened
/// - **direct** (`use_pool = false`): a fresh physical connection that
///   bypasses the pool and is closed on release
///
/// # Example
///
/// ```no_run
/// use dbsource_pool::{ConnectionParameters, ConnectionSource, DriverRegistry, PoolConfig};
///
/// # fn example() -> dbsource_pool::Result<()> {
/// let drivers = DriverRegistry::with_defaults()?;
/// let params = ConnectionParameters::new("sqlite", "sqlite://app.db?mode=rwc", "", "");
/// let source = ConnectionSource::open(params, &drivers, PoolConfig::default())?;
///
/// let conn = source.borrow(true)?;
/// // ... use the connection ...
/// source.release(conn, true)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConnectionSource {
   id: Uuid,
   pool: OnceLock<ConnectionPool>,
}

impl ConnectionSource {
   /// Create an unloaded source
   pub fn new() -> Self {
      Self {
         id: Uuid::new_v4(),
         pool: OnceLock::new(),
      }
   }

   /// Create and load a source in one step
   pub fn open(
      parameters: ConnectionParameters,
      drivers: &DriverRegistry,
      config: PoolConfig,
   ) -> Result<Arc<Self>> {
      let source = Self::new();
      source.load(parameters, drivers, config)?;
      Ok(Arc::new(source))
   }

   /// Resolve the driver and construct the backing pool.
   ///
   /// No physical connection is opened here. Fails with
   /// [`Error::DriverUnavailable`] when the driver identifier is unknown,
   /// [`Error::InvalidConfig`] for a zero connection bound and
   /// [`Error::AlreadyLoaded`] on a second call.
   pub fn load(
      &self,
      parameters: ConnectionParameters,
      drivers: &DriverRegistry,
      config: PoolConfig,
   ) -> Result<()> {
      if self.pool.get().is_some() {
         return Err(Error::AlreadyLoaded);
      }

      config.validate()?;
      let driver = drivers.resolve(parameters.driver())?;

      debug!(
         source = %self.id,
         driver = parameters.driver(),
         uri = parameters.uri(),
         "Loading connection source"
      );

      let pool = ConnectionPool::new(self.id, driver, parameters, config);
      self.pool.set(pool).map_err(|_| Error::AlreadyLoaded)
   }

   fn pool(&self) -> Result<&ConnectionPool> {
      self.pool.get().ok_or(Error::NotLoaded)
   }

   pub fn id(&self) -> Uuid {
      self.id
   }

   pub fn is_loaded(&self) -> bool {
      self.pool.get().is_some()
   }

   pub fn is_closed(&self) -> bool {
      self.pool.get().is_some_and(ConnectionPool::is_closed)
   }

   pub fn parameters(&self) -> Result<&ConnectionParameters> {
      Ok(self.pool()?.parameters())
   }

   pub fn status(&self) -> Result<PoolStatus> {
      Ok(self.pool()?.status())
   }

   /// Obtain a connection, pooled or direct.
   ///
   /// A bounded, exhausted pool waits up to the configured
   /// `acquire_timeout_secs` before failing.
   pub fn borrow(&self, use_pool: bool) -> Result<PooledConnection> {
      let pool = self.pool()?;
      self.borrow_timeout(use_pool, pool.config().acquire_timeout())
   }

   /// Like [`borrow`](Self::borrow) with an explicit wait for bounded pools.
   ///
   /// Direct connections never wait on the pool, so `timeout` does not apply to them.
   pub fn borrow_timeout(&self, use_pool: bool, timeout: Duration) -> Result<PooledConnection> {
      let pool = self.pool()?;

      if use_pool {
         pool.acquire(timeout)
      } else {
         pool.open_direct()
      }
   }

   /// Return a connection obtained from this source.
   ///
   /// With `use_pool` the connection is kept for reuse; without it the
   /// physical connection is closed. A connection from another source is
   /// rejected with `ConnectionError::ForeignConnection`.
   pub fn release(&self, conn: PooledConnection, use_pool: bool) -> Result<()> {
      self.pool()?.release(conn, use_pool)
   }

   /// Close every idle connection and refuse further borrows.
   ///
   /// Closing an unloaded source does nothing.
   pub fn close(&self) -> Result<()> {
      match self.pool.get() {
         Some(pool) => pool.close(),
         None => Ok(()),
      }
   }
}

impl Default for ConnectionSource {
   fn default() -> Self {
      Self::new()
   }
}

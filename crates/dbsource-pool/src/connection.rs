//! Leased connection handle

use std::any::Any;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::driver::Connection;
use crate::pool::{IdleConnection, PoolInner};

const DEREF_ERR: &str = "(bug) connection already detached from its handle";

/// How a connection was obtained from its source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireMode {
   /// Leased from the pool; counts against the pool bound
   Pooled,
   /// Opened outside the pool
   Direct,
}

/// A physical connection leased from a [`ConnectionSource`](crate::ConnectionSource).
///
/// Hand it back with `ConnectionSource::release`, which reports close
/// failures. A handle that is simply dropped goes back to its pool if it was
/// leased from the pool, and is closed if it was opened directly.
///
/// Derefs to `dyn Connection`; use [`downcast_ref`](Self::downcast_ref) or
/// [`downcast_mut`](Self::downcast_mut) to reach the driver's concrete type.
///
/// # Example
///
/// ```no_run
/// use dbsource_pool::{ConnectionParameters, ConnectionSource, DriverRegistry, PoolConfig};
/// use dbsource_pool::sqlite::SqliteDriverConnection;
///
/// # fn example() -> dbsource_pool::Result<()> {
/// let drivers = DriverRegistry::with_defaults()?;
/// let params = ConnectionParameters::new("sqlite", "sqlite::memory:", "", "");
/// let source = ConnectionSource::open(params, &drivers, PoolConfig::default())?;
///
/// let mut conn = source.borrow(true)?;
/// if let Some(sqlite) = conn.downcast_mut::<SqliteDriverConnection>() {
///     sqlite.execute("CREATE TABLE t (id INTEGER)").unwrap();
/// }
/// source.release(conn, true)?;
/// # Ok(())
/// # }
/// ```
pub struct PooledConnection {
   raw: Option<Box<dyn Connection>>,
   id: u64,
   mode: AcquireMode,
   pool: Arc<PoolInner>,
}

impl PooledConnection {
   pub(crate) fn new(conn: IdleConnection, mode: AcquireMode, pool: Arc<PoolInner>) -> Self {
      Self {
         raw: Some(conn.raw),
         id: conn.id,
         mode,
         pool,
      }
   }

   /// Identifier of the physical connection, unique within its source
   pub fn id(&self) -> u64 {
      self.id
   }

   /// Identifier of the source this connection was obtained from
   pub fn source_id(&self) -> Uuid {
      self.pool.source_id()
   }

   pub fn mode(&self) -> AcquireMode {
      self.mode
   }

   pub fn is_pooled(&self) -> bool {
      self.mode == AcquireMode::Pooled
   }

   pub fn downcast_ref<T: Connection>(&self) -> Option<&T> {
      let conn: &dyn Any = &**self;
      conn.downcast_ref()
   }

   pub fn downcast_mut<T: Connection>(&mut self) -> Option<&mut T> {
      let conn: &mut dyn Any = &mut **self;
      conn.downcast_mut()
   }

   pub(crate) fn belongs_to(&self, pool: &Arc<PoolInner>) -> bool {
      Arc::ptr_eq(&self.pool, pool)
   }

   /// Take the physical connection out, leaving nothing for `Drop` to do.
   pub(crate) fn detach(&mut self) -> (IdleConnection, AcquireMode) {
      let raw = self.raw.take().expect(DEREF_ERR);
      (IdleConnection { id: self.id, raw }, self.mode)
   }
}

impl Deref for PooledConnection {
   type Target = dyn Connection;

   fn deref(&self) -> &Self::Target {
      &**self.raw.as_ref().expect(DEREF_ERR)
   }
}

impl DerefMut for PooledConnection {
   fn deref_mut(&mut self) -> &mut Self::Target {
      &mut **self.raw.as_mut().expect(DEREF_ERR)
   }
}

impl fmt::Debug for PooledConnection {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("PooledConnection")
         .field("id", &self.id)
         .field("source_id", &self.pool.source_id())
         .field("mode", &self.mode)
         .finish()
   }
}

impl Drop for PooledConnection {
   fn drop(&mut self) {
      if self.raw.is_none() {
         return;
      }

      let (conn, mode) = self.detach();
      let to_close = match mode {
         AcquireMode::Pooled => self.pool.put_back(conn, mode),
         AcquireMode::Direct => Some(conn),
      };

      if let Some(conn) = to_close
         && let Err(e) = self.pool.close_connection(conn)
      {
         warn!(source = %self.pool.source_id(), "Failed to close dropped connection: {}", e);
      }
   }
}

//! Stack-discipline pool of physical connections
//!
//! Idle connections live on a LIFO free-list guarded by a mutex, so the most
//! recently released connection is the next one handed out. New physical
//! connections are only opened when the free-list is empty. A condition
//! variable wakes borrowers waiting on a bounded pool.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::Result;
use crate::config::PoolConfig;
use crate::connection::{AcquireMode, PooledConnection};
use crate::driver::{Connection, Driver};
use crate::error::ConnectionError;
use crate::parameters::ConnectionParameters;

/// Snapshot of pool occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStatus {
   /// Connections waiting on the free-list
   pub idle: usize,
   /// Pooled connections currently leased to callers
   pub leased: usize,
}

pub(crate) struct IdleConnection {
   pub(crate) id: u64,
   pub(crate) raw: Box<dyn Connection>,
}

#[derive(Default)]
struct PoolState {
   idle: Vec<IdleConnection>,
   leased: usize,
   closed: bool,
}

pub(crate) struct PoolInner {
   source_id: Uuid,
   driver: Arc<dyn Driver>,
   parameters: ConnectionParameters,
   config: PoolConfig,
   state: Mutex<PoolState>,
   released: Condvar,
   next_id: AtomicU64,
}

impl PoolInner {
   pub(crate) fn source_id(&self) -> Uuid {
      self.source_id
   }

   fn has_capacity(&self, state: &PoolState) -> bool {
      self
         .config
         .max_connections
         .is_none_or(|max| state.idle.len() + state.leased < max)
   }

   fn connect(&self) -> Result<IdleConnection> {
      let id = self.next_id.fetch_add(1, Ordering::Relaxed);

      let raw = self
         .driver
         .connect(&self.parameters)
         .map_err(|source| ConnectionError::Establish {
            uri: self.parameters.uri().to_string(),
            source,
         })?;

      debug!(
         source = %self.source_id,
         connection = id,
         driver = self.parameters.driver(),
         "Opened physical connection"
      );

      Ok(IdleConnection { id, raw })
   }

   /// Put a connection back on the free-list.
   ///
   /// Returns the connection when it cannot be kept (pool closed, `max_idle`
   /// reached or the bound would be exceeded) so the caller can close it
   /// outside the lock.
   pub(crate) fn put_back(
      &self,
      conn: IdleConnection,
      mode: AcquireMode,
   ) -> Option<IdleConnection> {
      let mut state = self.state.lock();

      if mode == AcquireMode::Pooled {
         state.leased = state.leased.saturating_sub(1);
      }

      let keep = !state.closed
         && state.idle.len() < self.config.max_idle
         && self.has_capacity(&state);

      let rejected = if keep {
         trace!(source = %self.source_id, connection = conn.id, "Connection returned to pool");
         state.idle.push(conn);
         None
      } else {
         Some(conn)
      };

      drop(state);
      self.released.notify_one();

      rejected
   }

   /// Give up a connection's slot without returning the connection itself.
   pub(crate) fn forget(&self, mode: AcquireMode) {
      if mode == AcquireMode::Pooled {
         let mut state = self.state.lock();
         state.leased = state.leased.saturating_sub(1);
         drop(state);
         self.released.notify_one();
      }
   }

   pub(crate) fn close_connection(&self, conn: IdleConnection) -> Result<()> {
      trace!(source = %self.source_id, connection = conn.id, "Closing physical connection");
      conn
         .raw
         .close()
         .map_err(|e| ConnectionError::Close(e).into())
   }
}

impl Drop for PoolInner {
   fn drop(&mut self) {
      // Last handle gone: close whatever is still idle
      for conn in std::mem::take(&mut self.state.get_mut().idle) {
         if let Err(e) = conn.raw.close() {
            warn!(source = %self.source_id, connection = conn.id, "Failed to close idle connection: {}", e);
         }
      }
   }
}

/// Pool of physical connections for one connection source.
pub struct ConnectionPool {
   inner: Arc<PoolInner>,
}

impl ConnectionPool {
   pub(crate) fn new(
      source_id: Uuid,
      driver: Arc<dyn Driver>,
      parameters: ConnectionParameters,
      config: PoolConfig,
   ) -> Self {
      Self {
         inner: Arc::new(PoolInner {
            source_id,
            driver,
            parameters,
            config,
            state: Mutex::new(PoolState::default()),
            released: Condvar::new(),
            next_id: AtomicU64::new(1),
         }),
      }
   }

   pub fn parameters(&self) -> &ConnectionParameters {
      &self.inner.parameters
   }

   pub fn config(&self) -> &PoolConfig {
      &self.inner.config
   }

   /// Lease a connection, reusing the most recently released idle one if any.
   ///
   /// When the pool is bounded and exhausted, blocks for at most `timeout`
   /// waiting for another caller to release a connection.
   pub fn acquire(&self, timeout: Duration) -> Result<PooledConnection> {
      let deadline = Instant::now().checked_add(timeout);
      let mut state = self.inner.state.lock();

      loop {
         if state.closed {
            return Err(ConnectionError::SourceClosed.into());
         }

         if let Some(conn) = state.idle.pop() {
            state.leased += 1;
            drop(state);

            trace!(source = %self.inner.source_id, connection = conn.id, "Reusing idle connection");
            return Ok(PooledConnection::new(
               conn,
               AcquireMode::Pooled,
               Arc::clone(&self.inner),
            ));
         }

         if self.inner.has_capacity(&state) {
            // Reserve the slot before connecting so concurrent borrowers respect the bound
            state.leased += 1;
            break;
         }

         trace!(source = %self.inner.source_id, "Pool exhausted, waiting for a release");
         match deadline {
            Some(deadline) => {
               if self.inner.released.wait_until(&mut state, deadline).timed_out()
                  && !state.closed
                  && state.idle.is_empty()
                  && !self.inner.has_capacity(&state)
               {
                  return Err(ConnectionError::PoolTimedOut(timeout).into());
               }
            }
            None => self.inner.released.wait(&mut state),
         }
      }

      drop(state);

      match self.inner.connect() {
         Ok(conn) => Ok(PooledConnection::new(
            conn,
            AcquireMode::Pooled,
            Arc::clone(&self.inner),
         )),
         Err(e) => {
            self.inner.forget(AcquireMode::Pooled);
            Err(e)
         }
      }
   }

   /// Open a fresh physical connection that never enters the pool.
   pub fn open_direct(&self) -> Result<PooledConnection> {
      if self.inner.state.lock().closed {
         return Err(ConnectionError::SourceClosed.into());
      }

      let conn = self.inner.connect()?;
      Ok(PooledConnection::new(
         conn,
         AcquireMode::Direct,
         Arc::clone(&self.inner),
      ))
   }

   /// Hand a leased connection back.
   ///
   /// With `use_pool` the connection is kept for reuse (or closed when the
   /// pool cannot keep it); without it the physical connection is closed.
   pub fn release(&self, mut conn: PooledConnection, use_pool: bool) -> Result<()> {
      if !conn.belongs_to(&self.inner) {
         warn!(
            source = %self.inner.source_id,
            owner = %conn.source_id(),
            "Rejected release of a connection leased from another source"
         );
         // Dropping `conn` returns it to the source it came from
         return Err(ConnectionError::ForeignConnection.into());
      }

      let (idle, mode) = conn.detach();

      if use_pool {
         match self.inner.put_back(idle, mode) {
            Some(rejected) => self.inner.close_connection(rejected),
            None => Ok(()),
         }
      } else {
         self.inner.forget(mode);
         self.inner.close_connection(idle)
      }
   }

   /// Close the pool and every idle connection.
   ///
   /// Later acquisitions fail with `SourceClosed`. Connections still leased
   /// are closed when they are released. Every idle connection is closed even
   /// if some fail; the first failure is returned.
   pub fn close(&self) -> Result<()> {
      let idle = {
         let mut state = self.inner.state.lock();
         state.closed = true;
         std::mem::take(&mut state.idle)
      };
      self.inner.released.notify_all();

      debug!(
         source = %self.inner.source_id,
         idle = idle.len(),
         "Closing connection pool"
      );

      let mut first_error = None;
      for conn in idle {
         if let Err(e) = self.inner.close_connection(conn) {
            warn!(source = %self.inner.source_id, "Failed to close idle connection: {}", e);
            first_error.get_or_insert(e);
         }
      }

      match first_error {
         Some(e) => Err(e),
         None => Ok(()),
      }
   }

   pub fn is_closed(&self) -> bool {
      self.inner.state.lock().closed
   }

   pub fn status(&self) -> PoolStatus {
      let state = self.inner.state.lock();
      PoolStatus {
         idle: state.idle.len(),
         leased: state.leased,
      }
   }
}

impl std::fmt::Debug for ConnectionPool {
   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      f.debug_struct("ConnectionPool")
         .field("source_id", &self.inner.source_id)
         .field("parameters", &self.inner.parameters)
         .field("config", &self.inner.config)
         .field("status", &self.status())
         .finish()
   }
}

//! Bundled SQLite driver built on sqlx
//!
//! sqlx is async; this driver owns a small tokio runtime and blocks on it so
//! the driver fits the synchronous [`Driver`] contract. Called from inside
//! another tokio runtime, the work is driven from a short-lived helper thread
//! instead, so the caller's thread still blocks but nothing panics.
//!
//! The URI is parsed by [`SqliteConnectOptions`], e.g. `sqlite::memory:` or
//! `sqlite://data/app.db?mode=rwc`. SQLite has no authentication, so the user
//! and password parameters are ignored.

use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use sqlx::Connection as _;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::ConnectOptions;
use tokio::runtime::{Builder, Handle, Runtime};

use crate::driver::{Connection, Driver};
use crate::error::BoxError;
use crate::parameters::ConnectionParameters;

/// Driver identifier registered by [`DriverRegistry::with_defaults`](crate::DriverRegistry::with_defaults)
pub const SQLITE_DRIVER: &str = "sqlite";

/// Private runtime shared by the driver and its connections
struct DriverRuntime {
   runtime: Option<Runtime>,
}

impl DriverRuntime {
   fn block_on<F>(&self, future: F) -> Result<F::Output, BoxError>
   where
      F: Future + Send,
      F::Output: Send,
   {
      let runtime = self
         .runtime
         .as_ref()
         .ok_or("SQLite driver runtime has shut down")?;

      if Handle::try_current().is_err() {
         return Ok(runtime.block_on(future));
      }

      // `block_on` panics inside another runtime's context
      std::thread::scope(|scope| match scope.spawn(|| runtime.block_on(future)).join() {
         Ok(output) => Ok(output),
         Err(_) => Err("SQLite driver helper thread panicked".into()),
      })
   }
}

impl Drop for DriverRuntime {
   fn drop(&mut self) {
      // A plain drop blocks on worker shutdown, which panics in async contexts
      if let Some(runtime) = self.runtime.take() {
         runtime.shutdown_background();
      }
   }
}

/// SQLite driver producing [`SqliteDriverConnection`]s
pub struct SqliteDriver {
   runtime: Arc<DriverRuntime>,
}

impl SqliteDriver {
   /// Create the driver and its runtime
   pub fn new() -> std::io::Result<Self> {
      let runtime = Builder::new_multi_thread()
         .worker_threads(1)
         .thread_name("dbsource-sqlite")
         .enable_all()
         .build()?;

      Ok(Self {
         runtime: Arc::new(DriverRuntime {
            runtime: Some(runtime),
         }),
      })
   }
}

impl Driver for SqliteDriver {
   fn name(&self) -> &str {
      SQLITE_DRIVER
   }

   fn connect(
      &self,
      parameters: &ConnectionParameters,
   ) -> std::result::Result<Box<dyn Connection>, BoxError> {
      let options = SqliteConnectOptions::from_str(parameters.uri())?;
      let conn = self.runtime.block_on(options.connect())??;

      Ok(Box::new(SqliteDriverConnection {
         conn,
         runtime: Arc::clone(&self.runtime),
      }))
   }
}

/// Physical SQLite connection.
///
/// Only the two statement helpers needed to observe a connection are
/// provided; this crate is not a query API.
pub struct SqliteDriverConnection {
   conn: SqliteConnection,
   runtime: Arc<DriverRuntime>,
}

impl SqliteDriverConnection {
   /// Execute a statement, returning the number of rows affected
   pub fn execute(&mut self, sql: &str) -> Result<u64, BoxError> {
      let result = self
         .runtime
         .block_on(sqlx::query(sql).execute(&mut self.conn))??;
      Ok(result.rows_affected())
   }

   /// Run a query returning a single integer
   pub fn fetch_i64(&mut self, sql: &str) -> Result<i64, BoxError> {
      let value = self
         .runtime
         .block_on(sqlx::query_scalar::<_, i64>(sql).fetch_one(&mut self.conn))??;
      Ok(value)
   }
}

impl Connection for SqliteDriverConnection {
   fn close(self: Box<Self>) -> std::result::Result<(), BoxError> {
      let Self { conn, runtime } = *self;
      runtime.block_on(conn.close())??;
      Ok(())
   }
}

//! Driver abstraction and the identifier → driver lookup table

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::Result;
use crate::error::{BoxError, Error};
use crate::parameters::ConnectionParameters;

/// A live physical connection produced by a [`Driver`].
///
/// Concrete connection types are recovered from a
/// [`PooledConnection`](crate::PooledConnection) with `downcast_ref` / `downcast_mut`.
pub trait Connection: Any + Send {
   /// Close the physical connection permanently
   fn close(self: Box<Self>) -> std::result::Result<(), BoxError>;
}

/// Factory for physical connections to one kind of database.
pub trait Driver: Send + Sync {
   /// Identifier this driver registers under by default
   fn name(&self) -> &str;

   /// Open a new physical connection. May block on network I/O.
   fn connect(
      &self,
      parameters: &ConnectionParameters,
   ) -> std::result::Result<Box<dyn Connection>, BoxError>;
}

/// Maps driver identifiers to drivers, resolved explicitly when a source is loaded.
///
/// # Example
///
/// ```
/// use dbsource_pool::{DriverRegistry, Error};
///
/// let drivers = DriverRegistry::new();
/// assert!(matches!(drivers.resolve("oracle"), Err(Error::DriverUnavailable(_))));
/// ```
#[derive(Clone, Default)]
pub struct DriverRegistry {
   drivers: HashMap<String, Arc<dyn Driver>>,
}

impl DriverRegistry {
   /// Create an empty registry.
   pub fn new() -> Self {
      Self::default()
   }

   /// Create a registry holding the bundled drivers.
   ///
   /// With the `sqlite` feature this registers [`SqliteDriver`](crate::sqlite::SqliteDriver)
   /// under `"sqlite"`.
   pub fn with_defaults() -> Result<Self> {
      #[allow(unused_mut)]
      let mut registry = Self::new();

      #[cfg(feature = "sqlite")]
      {
         registry = registry.register(crate::sqlite::SqliteDriver::new()?);
      }

      Ok(registry)
   }

   /// Register a driver under its own [`Driver::name`].
   pub fn register(self, driver: impl Driver + 'static) -> Self {
      let driver: Arc<dyn Driver> = Arc::new(driver);
      let id = driver.name().to_string();
      self.register_as(id, driver)
   }

   /// Register a (possibly shared) driver under an explicit identifier.
   ///
   /// Registering the same identifier again replaces the previous driver.
   pub fn register_as(mut self, id: impl Into<String>, driver: Arc<dyn Driver>) -> Self {
      self.drivers.insert(id.into(), driver);
      self
   }

   /// Look up the driver registered under `id`.
   pub fn resolve(&self, id: &str) -> Result<Arc<dyn Driver>> {
      self
         .drivers
         .get(id)
         .cloned()
         .ok_or_else(|| Error::DriverUnavailable(id.to_string()))
   }

   pub fn contains(&self, id: &str) -> bool {
      self.drivers.contains_key(id)
   }

   /// Registered identifiers, sorted
   pub fn ids(&self) -> Vec<&str> {
      let mut ids: Vec<&str> = self.drivers.keys().map(String::as_str).collect();
      ids.sort_unstable();
      ids
   }
}

impl fmt::Debug for DriverRegistry {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("DriverRegistry")
         .field("drivers", &self.ids())
         .finish()
   }
}

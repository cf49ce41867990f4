//! Named registry of connection sources

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dbsource_pool::{
   ConnectionParameters, ConnectionSource, DriverRegistry, PoolConfig, PropertySource,
};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::{Error, Result};

/// Name of the conventional default source.
pub const DEFAULT_SOURCE_NAME: &str = "";

/// Registry of named connection sources.
///
/// Each name is registered at most once; a second `load` under the same name
/// fails with [`Error::DuplicateName`] and leaves the existing source in
/// place. The duplicate check and the insert happen under one write lock, so
/// concurrent registrations of the same name yield exactly one success.
///
/// The registry is an ordinary value: create it at startup, share it by
/// reference or `Arc`, and call [`shutdown`](Self::shutdown) when done.
///
/// # Example
///
/// ```no_run
/// use dbsource::{ConnectionRegistry, DriverRegistry};
///
/// # fn example() -> dbsource::Result<()> {
/// let registry = ConnectionRegistry::new(DriverRegistry::with_defaults()?);
/// registry.load_with("primary", "sqlite", "sqlite::memory:", "", "")?;
///
/// if let Some(source) = registry.get("primary") {
///     let conn = source.borrow(true)?;
///     // ... use the connection ...
///     source.release(conn, true)?;
/// }
///
/// registry.shutdown()?;
/// # Ok(())
/// # }
/// ```
pub struct ConnectionRegistry {
   drivers: DriverRegistry,
   config: PoolConfig,
   sources: RwLock<HashMap<String, Arc<ConnectionSource>>>,
}

impl ConnectionRegistry {
   /// Create an empty registry whose sources use the default pool configuration.
   pub fn new(drivers: DriverRegistry) -> Self {
      Self::with_config(drivers, PoolConfig::default())
   }

   /// Create an empty registry with a pool configuration shared by every source.
   pub fn with_config(drivers: DriverRegistry, config: PoolConfig) -> Self {
      Self {
         drivers,
         config,
         sources: RwLock::new(HashMap::new()),
      }
   }

   /// Drivers that sources of this registry resolve against
   pub fn drivers(&self) -> &DriverRegistry {
      &self.drivers
   }

   /// Pool configuration applied by [`load`](Self::load)
   pub fn config(&self) -> &PoolConfig {
      &self.config
   }

   /// Register a new source under `name`.
   ///
   /// # Errors
   ///
   /// - [`Error::DuplicateName`] if `name` is already registered
   /// - `DriverUnavailable` (wrapped in [`Error::Source`]) if the driver identifier is unknown
   ///
   /// A failed call never changes the registry.
   pub fn load(
      &self,
      name: &str,
      parameters: ConnectionParameters,
   ) -> Result<Arc<ConnectionSource>> {
      self.load_with_config(name, parameters, self.config.clone())
   }

   /// Register a new source under `name` with its own pool configuration.
   pub fn load_with_config(
      &self,
      name: &str,
      parameters: ConnectionParameters,
      config: PoolConfig,
   ) -> Result<Arc<ConnectionSource>> {
      let mut sources = self.sources.write();

      if sources.contains_key(name) {
         warn!(name = %name, "Rejected duplicate connection source name");
         return Err(Error::DuplicateName(name.to_string()));
      }

      // Loading only resolves the driver, so holding the write lock here is cheap
      let source = ConnectionSource::new();
      source.load(parameters, &self.drivers, config)?;

      let source = Arc::new(source);
      sources.insert(name.to_string(), Arc::clone(&source));

      debug!(name = %name, source = %source.id(), "Registered connection source");
      Ok(source)
   }

   /// Register a new source from four discrete fields.
   pub fn load_with(
      &self,
      name: &str,
      driver: &str,
      uri: &str,
      user: &str,
      password: &str,
   ) -> Result<Arc<ConnectionSource>> {
      self.load(name, ConnectionParameters::new(driver, uri, user, password))
   }

   /// Register a new source from a key/value configuration.
   ///
   /// Reads `database.driver`, `database.uri`, `database.user` and
   /// `database.password`.
   pub fn load_properties(
      &self,
      name: &str,
      properties: &impl PropertySource,
   ) -> Result<Arc<ConnectionSource>> {
      let parameters = ConnectionParameters::from_properties(properties)?;
      self.load(name, parameters)
   }

   /// Register the default source (name `""`).
   pub fn load_default(&self, parameters: ConnectionParameters) -> Result<Arc<ConnectionSource>> {
      self.load(DEFAULT_SOURCE_NAME, parameters)
   }

   /// Register the default source (name `""`) from a key/value configuration.
   pub fn load_properties_default(
      &self,
      properties: &impl PropertySource,
   ) -> Result<Arc<ConnectionSource>> {
      self.load_properties(DEFAULT_SOURCE_NAME, properties)
   }

   /// Resolve a registered source. An unknown name yields `None`.
   pub fn get(&self, name: &str) -> Option<Arc<ConnectionSource>> {
      self.sources.read().get(name).cloned()
   }

   /// Resolve the default source (name `""`).
   pub fn get_default(&self) -> Option<Arc<ConnectionSource>> {
      self.get(DEFAULT_SOURCE_NAME)
   }

   pub fn contains(&self, name: &str) -> bool {
      self.sources.read().contains_key(name)
   }

   /// Registered names, sorted
   pub fn names(&self) -> Vec<String> {
      let mut names: Vec<String> = self.sources.read().keys().cloned().collect();
      names.sort_unstable();
      names
   }

   pub fn len(&self) -> usize {
      self.sources.read().len()
   }

   pub fn is_empty(&self) -> bool {
      self.sources.read().is_empty()
   }

   /// Remove every source and close its idle connections.
   ///
   /// Returns the number of sources that were registered. Handles obtained
   /// earlier stay valid but refuse new borrows. Every source is closed even
   /// if some fail; the first failure is returned.
   pub fn shutdown(&self) -> Result<usize> {
      let sources: Vec<(String, Arc<ConnectionSource>)> = self.sources.write().drain().collect();
      let count = sources.len();

      debug!("Shutting down {} connection source(s)", count);

      let mut first_error = None;
      for (name, source) in sources {
         if let Err(e) = source.close() {
            warn!(name = %name, "Failed to close connection source: {}", e);
            first_error.get_or_insert(e);
         }
      }

      match first_error {
         Some(e) => Err(e.into()),
         None => Ok(count),
      }
   }
}

impl fmt::Debug for ConnectionRegistry {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("ConnectionRegistry")
         .field("drivers", &self.drivers)
         .field("config", &self.config)
         .field("sources", &self.names())
         .finish()
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use dbsource_pool::{BoxError, Connection, Driver};

   struct NullConnection;

   impl Connection for NullConnection {
      fn close(self: Box<Self>) -> std::result::Result<(), BoxError> {
         Ok(())
      }
   }

   struct NullDriver;

   impl Driver for NullDriver {
      fn name(&self) -> &str {
         "null"
      }

      fn connect(
         &self,
         _parameters: &ConnectionParameters,
      ) -> std::result::Result<Box<dyn Connection>, BoxError> {
         Ok(Box::new(NullConnection))
      }
   }

   fn registry() -> ConnectionRegistry {
      ConnectionRegistry::new(DriverRegistry::new().register(NullDriver))
   }

   #[test]
   fn test_default_name_sugar() {
      let registry = registry();
      assert!(registry.get_default().is_none());

      let source = registry
         .load_default(ConnectionParameters::new("null", "null://", "", ""))
         .unwrap();

      assert!(Arc::ptr_eq(&registry.get("").unwrap(), &source));
      assert!(Arc::ptr_eq(&registry.get_default().unwrap(), &source));
      assert_eq!(registry.names(), vec![String::new()]);
   }

   #[test]
   fn test_per_source_pool_config() {
      let registry = registry();
      let config = PoolConfig {
         max_connections: Some(1),
         ..Default::default()
      };

      let source = registry
         .load_with_config(
            "bounded",
            ConnectionParameters::new("null", "null://", "", ""),
            config,
         )
         .unwrap();

      let held = source.borrow(true).unwrap();
      let waited = source.borrow_timeout(true, std::time::Duration::from_millis(20));
      assert_eq!(waited.unwrap_err().error_code(), "CONNECTION_ERROR");
      drop(held);
   }

   #[test]
   fn test_registry_wide_config_applies_to_load() {
      let config = PoolConfig {
         max_idle: 1,
         ..Default::default()
      };
      let registry =
         ConnectionRegistry::with_config(DriverRegistry::new().register(NullDriver), config.clone());

      assert!(registry.drivers().contains("null"));
      assert!(!registry.drivers().contains("sqlite"));
      assert_eq!(registry.config(), &config);

      let source = registry
         .load("capped", ConnectionParameters::new("null", "null://", "", ""))
         .unwrap();
      let a = source.borrow(true).unwrap();
      let b = source.borrow(true).unwrap();
      source.release(a, true).unwrap();
      source.release(b, true).unwrap();

      assert_eq!(source.status().unwrap().idle, registry.config().max_idle);
   }

   #[test]
   fn test_missing_property_leaves_registry_untouched() {
      let registry = registry();
      let properties: HashMap<String, String> =
         [("database.driver".to_string(), "null".to_string())].into();

      let err = registry.load_properties("partial", &properties).unwrap_err();

      assert_eq!(err.error_code(), "MISSING_PARAMETER");
      assert!(registry.is_empty());
   }
}

//! Connection parameters and key/value configuration lookup

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::error::Error;

/// Key holding the driver identifier in a key/value configuration
pub const DRIVER_KEY: &str = "database.driver";
/// Key holding the connection URI in a key/value configuration
pub const URI_KEY: &str = "database.uri";
/// Key holding the user name in a key/value configuration
pub const USER_KEY: &str = "database.user";
/// Key holding the password in a key/value configuration
pub const PASSWORD_KEY: &str = "database.password";

/// Read-only view over a named key/value configuration.
///
/// Implemented for the standard string maps; configuration loaders that keep
/// their own representation can implement it directly.
pub trait PropertySource {
   fn property(&self, key: &str) -> Option<&str>;
}

impl PropertySource for HashMap<String, String> {
   fn property(&self, key: &str) -> Option<&str> {
      self.get(key).map(String::as_str)
   }
}

impl PropertySource for BTreeMap<String, String> {
   fn property(&self, key: &str) -> Option<&str> {
      self.get(key).map(String::as_str)
   }
}

impl<P: PropertySource + ?Sized> PropertySource for &P {
   fn property(&self, key: &str) -> Option<&str> {
      (**self).property(key)
   }
}

/// Everything needed to open a physical connection to one database.
///
/// Immutable once built. The password is never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParameters {
   driver: String,
   uri: String,
   #[serde(default)]
   user: String,
   #[serde(default)]
   password: String,
}

impl ConnectionParameters {
   pub fn new(
      driver: impl Into<String>,
      uri: impl Into<String>,
      user: impl Into<String>,
      password: impl Into<String>,
   ) -> Self {
      Self {
         driver: driver.into(),
         uri: uri.into(),
         user: user.into(),
         password: password.into(),
      }
   }

   /// Build parameters from a key/value configuration using the
   /// `database.driver`, `database.uri`, `database.user` and `database.password` keys.
   ///
   /// Driver and URI are required; user and password default to empty.
   ///
   /// # Example
   ///
   /// ```
   /// use std::collections::HashMap;
   /// use dbsource_pool::ConnectionParameters;
   ///
   /// let mut properties = HashMap::new();
   /// properties.insert("database.driver".to_string(), "sqlite".to_string());
   /// properties.insert("database.uri".to_string(), "sqlite::memory:".to_string());
   ///
   /// let parameters = ConnectionParameters::from_properties(&properties).unwrap();
   /// assert_eq!(parameters.driver(), "sqlite");
   /// assert_eq!(parameters.user(), "");
   /// ```
   pub fn from_properties(properties: &impl PropertySource) -> Result<Self> {
      let driver = properties
         .property(DRIVER_KEY)
         .ok_or(Error::MissingParameter(DRIVER_KEY))?;
      let uri = properties
         .property(URI_KEY)
         .ok_or(Error::MissingParameter(URI_KEY))?;

      Ok(Self::new(
         driver,
         uri,
         properties.property(USER_KEY).unwrap_or_default(),
         properties.property(PASSWORD_KEY).unwrap_or_default(),
      ))
   }

   pub fn driver(&self) -> &str {
      &self.driver
   }

   pub fn uri(&self) -> &str {
      &self.uri
   }

   pub fn user(&self) -> &str {
      &self.user
   }

   pub fn password(&self) -> &str {
      &self.password
   }
}

impl fmt::Debug for ConnectionParameters {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("ConnectionParameters")
         .field("driver", &self.driver)
         .field("uri", &self.uri)
         .field("user", &self.user)
         .field("password", &"<redacted>")
         .finish()
   }
}

//! Configuration for connection source pools

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Configuration for the pool behind a `ConnectionSource`
///
/// The defaults describe an unbounded pool: connections are created on demand
/// and released ones are reused before new ones are opened.
///
/// # Examples
///
/// ```
/// use dbsource_pool::PoolConfig;
///
/// // Use defaults
/// let config = PoolConfig::default();
///
/// // Cap the pool at 4 connections, waiting at most 5 seconds for a free one
/// let config = PoolConfig {
///     max_connections: Some(4),
///     acquire_timeout_secs: 5,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
   /// Maximum number of idle connections kept for reuse
   ///
   /// A pooled connection released while this many are already idle is
   /// closed instead of being kept.
   ///
   /// Default: 8
   pub max_idle: usize,

   /// Upper bound on pooled connections (idle plus leased)
   ///
   /// `None` leaves the pool unbounded. Direct connections never count
   /// against this limit. `Some(0)` is rejected when the source is loaded.
   ///
   /// Default: None
   pub max_connections: Option<usize>,

   /// How long `borrow` waits for a slot when a bounded pool is exhausted (in seconds)
   ///
   /// Default: 30
   pub acquire_timeout_secs: u64,
}

impl PoolConfig {
   pub fn acquire_timeout(&self) -> Duration {
      Duration::from_secs(self.acquire_timeout_secs)
   }

   pub(crate) fn validate(&self) -> Result<()> {
      if self.max_connections == Some(0) {
         return Err(Error::InvalidConfig("max_connections must be at least 1"));
      }
      Ok(())
   }
}

impl Default for PoolConfig {
   fn default() -> Self {
      Self {
         max_idle: 8,
         max_connections: None,
         acquire_timeout_secs: 30,
      }
   }
}

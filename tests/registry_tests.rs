use dbsource::{
   BoxError, Connection, ConnectionError, ConnectionParameters, ConnectionRegistry, Driver,
   DriverRegistry, Error, PoolStatus, PooledConnection, SourceError,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

/// Driver double whose connections carry a unique token
#[derive(Default)]
struct FakeDriver {
   opened: AtomicU64,
   closed: Arc<AtomicUsize>,
}

struct FakeConnection {
   token: u64,
   uri: String,
   closed: Arc<AtomicUsize>,
}

impl Connection for FakeConnection {
   fn close(self: Box<Self>) -> Result<(), BoxError> {
      self.closed.fetch_add(1, Ordering::SeqCst);
      Ok(())
   }
}

impl Driver for FakeDriver {
   fn name(&self) -> &str {
      "fake"
   }

   fn connect(&self, parameters: &ConnectionParameters) -> Result<Box<dyn Connection>, BoxError> {
      Ok(Box::new(FakeConnection {
         token: self.opened.fetch_add(1, Ordering::SeqCst) + 1,
         uri: parameters.uri().to_string(),
         closed: Arc::clone(&self.closed),
      }))
   }
}

fn create_registry() -> (ConnectionRegistry, Arc<FakeDriver>) {
   let driver = Arc::new(FakeDriver::default());
   let drivers = DriverRegistry::new().register_as("fake", driver.clone());
   (ConnectionRegistry::new(drivers), driver)
}

fn fake(conn: &PooledConnection) -> &FakeConnection {
   conn.downcast_ref::<FakeConnection>().unwrap()
}

#[test]
fn test_distinct_names_resolve_to_distinct_sources() {
   let (registry, _driver) = create_registry();

   registry
      .load_with("orders", "fake", "fake://orders", "app", "pw")
      .unwrap();
   registry
      .load_with("audit", "fake", "fake://audit", "app", "pw")
      .unwrap();

   let orders = registry.get("orders").unwrap();
   let audit = registry.get("audit").unwrap();

   assert!(!Arc::ptr_eq(&orders, &audit));
   assert_eq!(orders.parameters().unwrap().uri(), "fake://orders");
   assert_eq!(audit.parameters().unwrap().uri(), "fake://audit");

   let conn = audit.borrow(true).unwrap();
   assert_eq!(fake(&conn).uri, "fake://audit");

   assert_eq!(registry.names(), vec!["audit".to_string(), "orders".to_string()]);
}

#[test]
fn test_duplicate_name_keeps_first_source() {
   let (registry, _driver) = create_registry();

   let first = registry
      .load_default(ConnectionParameters::new("fake", "fake://first", "", ""))
      .unwrap();

   let err = registry
      .load_default(ConnectionParameters::new("fake", "fake://second", "", ""))
      .unwrap_err();

   assert!(matches!(&err, Error::DuplicateName(name) if name.is_empty()));
   assert_eq!(err.error_code(), "DUPLICATE_NAME");

   let current = registry.get_default().unwrap();
   assert!(Arc::ptr_eq(&current, &first));
   assert_eq!(current.parameters().unwrap().uri(), "fake://first");
   assert_eq!(registry.len(), 1);
}

#[test]
fn test_unknown_name_is_not_found() {
   let (registry, _driver) = create_registry();

   assert!(registry.get("missing").is_none());
   assert!(registry.get_default().is_none());
   assert!(!registry.contains("missing"));
}

#[test]
fn test_unknown_driver_is_rejected_without_registering() {
   let (registry, _driver) = create_registry();

   let err = registry
      .load_with("legacy", "org.postgresql.Driver", "jdbc:postgresql://db", "", "")
      .unwrap_err();

   assert!(matches!(
      err,
      Error::Source(SourceError::DriverUnavailable(ref id)) if id == "org.postgresql.Driver"
   ));
   assert_eq!(err.error_code(), "DRIVER_UNAVAILABLE");
   assert!(registry.get("legacy").is_none());

   // The name is still free after the failure
   registry
      .load_with("legacy", "fake", "fake://legacy", "", "")
      .unwrap();
}

#[test]
fn test_load_from_properties() {
   let (registry, _driver) = create_registry();

   let properties: HashMap<String, String> = [
      ("database.driver", "fake"),
      ("database.uri", "fake://reports"),
      ("database.user", "reporter"),
      ("database.password", "pw"),
   ]
   .into_iter()
   .map(|(k, v)| (k.to_string(), v.to_string()))
   .collect();

   let source = registry.load_properties("reports", &properties).unwrap();
   let params = source.parameters().unwrap();

   assert_eq!(params.driver(), "fake");
   assert_eq!(params.user(), "reporter");
   assert!(Arc::ptr_eq(&registry.get("reports").unwrap(), &source));
}

#[test]
fn test_pooled_and_direct_acquisition() {
   let (registry, driver) = create_registry();
   let source = registry
      .load_with("main", "fake", "fake://main", "", "")
      .unwrap();

   let pooled = source.borrow(true).unwrap();
   let pooled_token = fake(&pooled).token;
   source.release(pooled, true).unwrap();

   let again = source.borrow(true).unwrap();
   assert_eq!(fake(&again).token, pooled_token);
   source.release(again, true).unwrap();

   let direct_a = source.borrow(false).unwrap();
   let direct_b = source.borrow(false).unwrap();
   assert_ne!(fake(&direct_a).token, pooled_token);
   assert_ne!(fake(&direct_a).token, fake(&direct_b).token);

   source.release(direct_a, false).unwrap();
   source.release(direct_b, false).unwrap();

   assert_eq!(driver.closed.load(Ordering::SeqCst), 2);
   assert_eq!(source.status().unwrap(), PoolStatus { idle: 1, leased: 0 });
}

#[test]
fn test_concurrent_registration_of_distinct_names() {
   let (registry, _driver) = create_registry();
   let registry = Arc::new(registry);
   let threads = 16;
   let barrier = Arc::new(Barrier::new(threads));

   let handles: Vec<_> = (0..threads)
      .map(|i| {
         let (registry, barrier) = (Arc::clone(&registry), Arc::clone(&barrier));
         std::thread::spawn(move || {
            barrier.wait();
            registry
               .load_with(&format!("db{}", i), "fake", &format!("fake://db{}", i), "", "")
               .map(|_| ())
         })
      })
      .collect();

   for handle in handles {
      handle.join().unwrap().unwrap();
   }

   assert_eq!(registry.len(), threads);
   for i in 0..threads {
      let source = registry.get(&format!("db{}", i)).unwrap();
      assert_eq!(source.parameters().unwrap().uri(), format!("fake://db{}", i));
   }
}

#[test]
fn test_concurrent_registration_of_same_name() {
   let (registry, _driver) = create_registry();
   let registry = Arc::new(registry);
   let threads = 16;
   let barrier = Arc::new(Barrier::new(threads));

   let handles: Vec<_> = (0..threads)
      .map(|i| {
         let (registry, barrier) = (Arc::clone(&registry), Arc::clone(&barrier));
         std::thread::spawn(move || {
            barrier.wait();
            registry
               .load_with("shared", "fake", &format!("fake://attempt{}", i), "", "")
               .map(|source| source.id())
         })
      })
      .collect();

   let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

   let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
   assert_eq!(winners.len(), 1, "Exactly one registration should succeed");

   let duplicates = results
      .iter()
      .filter(|r| matches!(r, Err(Error::DuplicateName(name)) if name == "shared"))
      .count();
   assert_eq!(duplicates, threads - 1);

   assert_eq!(registry.len(), 1);
   assert_eq!(registry.get("shared").unwrap().id(), *winners[0]);
}

#[test]
fn test_primary_end_to_end() {
   let (registry, driver) = create_registry();

   registry
      .load_with("primary", "fake", "fake://primary:5432/app", "app", "s3cret")
      .unwrap();

   let source = registry.get("primary").unwrap();

   let handle = source.borrow(true).unwrap();
   let first_token = fake(&handle).token;
   source.release(handle, true).unwrap();

   let handle = source.borrow(true).unwrap();
   assert_eq!(fake(&handle).token, first_token);
   assert_eq!(
      driver.opened.load(Ordering::SeqCst),
      1,
      "Second pooled borrow must not open a new physical connection"
   );
   source.release(handle, true).unwrap();
}

#[test]
fn test_shutdown_closes_sources_and_clears_names() {
   let (registry, driver) = create_registry();

   let a = registry.load_with("a", "fake", "fake://a", "", "").unwrap();
   let b = registry.load_with("b", "fake", "fake://b", "", "").unwrap();

   let conn = a.borrow(true).unwrap();
   a.release(conn, true).unwrap();
   let conn = b.borrow(true).unwrap();
   b.release(conn, true).unwrap();

   assert_eq!(registry.shutdown().unwrap(), 2);

   assert!(registry.is_empty());
   assert!(registry.get("a").is_none());
   assert_eq!(driver.closed.load(Ordering::SeqCst), 2);

   // Handles resolved before shutdown refuse new borrows
   assert!(a.is_closed());
   assert!(matches!(
      a.borrow(true),
      Err(SourceError::Connection(ConnectionError::SourceClosed))
   ));

   // Names can be registered again after shutdown
   registry.load_with("a", "fake", "fake://a", "", "").unwrap();
}

#[cfg(feature = "sqlite")]
mod sqlite {
   use super::*;
   use dbsource::sqlite::SqliteDriverConnection;
   use tempfile::TempDir;

   fn sqlite(conn: &mut PooledConnection) -> &mut SqliteDriverConnection {
      conn.downcast_mut::<SqliteDriverConnection>().unwrap()
   }

   #[test]
   fn test_sqlite_pooled_connection_keeps_session_state() {
      let registry = ConnectionRegistry::new(DriverRegistry::with_defaults().unwrap());
      registry
         .load_with("primary", "sqlite", "sqlite::memory:", "", "")
         .unwrap();
      let source = registry.get("primary").unwrap();

      // Each :memory: connection is its own database, so a table created on
      // one connection is only visible if the same connection comes back
      let mut conn = source.borrow(true).unwrap();
      sqlite(&mut conn)
         .execute("CREATE TABLE marker (id INTEGER)")
         .unwrap();
      sqlite(&mut conn)
         .execute("INSERT INTO marker VALUES (42)")
         .unwrap();
      source.release(conn, true).unwrap();

      let mut conn = source.borrow(true).unwrap();
      assert_eq!(
         sqlite(&mut conn).fetch_i64("SELECT id FROM marker").unwrap(),
         42
      );
      source.release(conn, true).unwrap();

      // A direct connection is a different physical connection
      let mut direct = source.borrow(false).unwrap();
      assert!(sqlite(&mut direct).fetch_i64("SELECT id FROM marker").is_err());
      source.release(direct, false).unwrap();

      registry.shutdown().unwrap();
   }

   #[test]
   fn test_sqlite_file_database_shared_across_connections() {
      let temp_dir = TempDir::new().unwrap();
      let path = temp_dir.path().join("app.db");
      let uri = format!("sqlite://{}?mode=rwc", path.display());

      let registry = ConnectionRegistry::new(DriverRegistry::with_defaults().unwrap());
      let source = registry.load_with("", "sqlite", &uri, "", "").unwrap();

      let mut writer = source.borrow(false).unwrap();
      sqlite(&mut writer)
         .execute("CREATE TABLE t (id INTEGER)")
         .unwrap();
      sqlite(&mut writer)
         .execute("INSERT INTO t VALUES (1), (2), (3)")
         .unwrap();
      source.release(writer, false).unwrap();

      let mut reader = source.borrow(true).unwrap();
      assert_eq!(sqlite(&mut reader).fetch_i64("SELECT COUNT(*) FROM t").unwrap(), 3);
      source.release(reader, true).unwrap();

      assert!(path.exists());
      registry.shutdown().unwrap();
   }

   #[test]
   fn test_sqlite_connect_failure_is_connection_error() {
      let temp_dir = TempDir::new().unwrap();
      let uri = format!("sqlite://{}", temp_dir.path().join("absent.db").display());

      let registry = ConnectionRegistry::new(DriverRegistry::with_defaults().unwrap());
      let source = registry.load_with("absent", "sqlite", &uri, "", "").unwrap();

      let err = source.borrow(true).unwrap_err();
      assert!(matches!(
         err,
         SourceError::Connection(ConnectionError::Establish { .. })
      ));
   }
}

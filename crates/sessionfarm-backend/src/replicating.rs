//! Fan-out over several independent backend clusters.
//!
//! Writes and deletes go to every replica; reads go to exactly one. Expiry
//! results are unioned across replicas because any replica's index may hold
//! entries the others lack.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::adapter::KeyValueBackend;
use crate::address::{Endpoint, split_address_list};
use crate::error::{Error, Result};
use crate::expiry::ExpiryThreshold;
use crate::service::BackendService;
use crate::store::{ConnectOptions, StoreFactory};

/// Backend service that replicates over a fixed list of member services.
///
/// The member list is built once by `init` from a `;`-separated address list
/// and never changes afterwards.
pub struct ReplicatingBackend {
    address: String,
    expiry: ExpiryThreshold,
    factory: StoreFactory,
    options: ConnectOptions,
    members: OnceLock<Vec<Arc<dyn BackendService>>>,
    shut_down: AtomicBool,
}

impl ReplicatingBackend {
    pub fn new(
        address: impl Into<String>,
        expiry: ExpiryThreshold,
        factory: StoreFactory,
        options: ConnectOptions,
    ) -> Self {
        Self {
            address: address.into(),
            expiry,
            factory,
            options,
            members: OnceLock::new(),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Replicate over already constructed members.
    ///
    /// `init` still initialises each member; members must tolerate repeated
    /// `init` calls.
    pub fn from_members(members: Vec<Arc<dyn BackendService>>) -> Self {
        Self {
            address: String::new(),
            expiry: ExpiryThreshold::Never,
            factory: crate::memory::MemoryStore::connect,
            options: ConnectOptions::default(),
            members: OnceLock::from(members),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Number of configured replicas (zero before `init`).
    pub fn replica_count(&self) -> usize {
        self.members.get().map_or(0, Vec::len)
    }

    fn members(&self) -> Result<&[Arc<dyn BackendService>]> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(Error::ServiceUnavailable(
                "replicating backend has been shut down".to_string(),
            ));
        }
        match self.members.get() {
            Some(members) if !members.is_empty() => Ok(members),
            _ => Err(Error::ServiceUnavailable(
                "replicating backend has not been initialised".to_string(),
            )),
        }
    }

    fn build_members(&self) -> Result<Vec<Arc<dyn BackendService>>> {
        let addresses = split_address_list(&self.address)?;
        let mut members: Vec<Arc<dyn BackendService>> = Vec::with_capacity(addresses.len());

        for address in addresses {
            let member = KeyValueBackend::new(address, self.expiry, self.factory, self.options);
            if let Err(e) = member.init() {
                for started in &members {
                    started.shutdown();
                }
                return Err(e);
            }
            members.push(Arc::new(member));
        }
        Ok(members)
    }

    /// Run `op` against every member, returning the first error after all
    /// members have been attempted.
    fn fan_out(
        &self,
        operation: &'static str,
        key: &str,
        op: impl Fn(&dyn BackendService) -> Result<()>,
    ) -> Result<()> {
        let members = self.members()?;
        let mut first_error = None;
        for (replica, member) in members.iter().enumerate() {
            if let Err(e) = op(member.as_ref()) {
                warn!(replica, key = %key, operation, error = %e, "Replica operation failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn union(&self, op: impl Fn(&dyn BackendService) -> Result<Vec<String>>) -> Result<Vec<String>> {
        let members = self.members()?;
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for member in members {
            for key in op(member.as_ref())? {
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }
        }
        Ok(keys)
    }
}

impl BackendService for ReplicatingBackend {
    fn init(&self) -> Result<()> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(Error::ServiceUnavailable(
                "replicating backend has been shut down".to_string(),
            ));
        }

        if let Some(members) = self.members.get() {
            if members.is_empty() {
                return Err(Error::Configuration(
                    "replicating backend needs at least one member".to_string(),
                ));
            }
            for member in members {
                member.init()?;
            }
            return Ok(());
        }

        let members = self.build_members()?;
        let count = members.len();
        if self.members.set(members).is_err() {
            debug!("Replicating backend initialised concurrently, keeping first member list");
        }
        info!(replicas = count, "Replicating backend initialised");
        Ok(())
    }

    fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(members) = self.members.get() {
            for member in members {
                member.shutdown();
            }
        }
        info!("Replicating backend shut down");
    }

    fn persist(&self, key: &str, payload: &[u8]) -> Result<()> {
        self.fan_out("persist", key, |member| member.persist(key, payload))
    }

    fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let members = self.members()?;
        match members.first() {
            Some(member) => member.fetch(key),
            None => Err(Error::ServiceUnavailable("no replicas configured".to_string())),
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.fan_out("delete", key, |member| member.delete(key))
    }

    fn expired_keys(&self) -> Result<Vec<String>> {
        self.union(|member| member.expired_keys())
    }

    fn remove_expired(&self) -> Result<Vec<String>> {
        self.union(|member| member.remove_expired())
    }

    /// The first member's threshold once members exist; members built by
    /// `init` all share the configured one.
    fn expiry_threshold(&self) -> ExpiryThreshold {
        self.members
            .get()
            .and_then(|members| members.first())
            .map_or(self.expiry, |member| member.expiry_threshold())
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        self.members
            .get()
            .map(|members| members.iter().flat_map(|m| m.endpoints()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use parking_lot::Mutex;
    use std::time::Duration;

    /// Member that records every call and optionally fails writes.
    #[derive(Default)]
    struct RecordingMember {
        calls: Mutex<Vec<String>>,
        fail_writes: bool,
        expired: Vec<String>,
        payload: Option<Vec<u8>>,
    }

    impl RecordingMember {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().push(call);
        }
    }

    impl BackendService for RecordingMember {
        fn init(&self) -> Result<()> {
            Ok(())
        }

        fn shutdown(&self) {
            self.record("shutdown".to_string());
        }

        fn persist(&self, key: &str, _payload: &[u8]) -> Result<()> {
            self.record(format!("persist:{key}"));
            if self.fail_writes {
                return Err(Error::access(
                    "persist",
                    std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out"),
                ));
            }
            Ok(())
        }

        fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>> {
            self.record(format!("fetch:{key}"));
            Ok(self.payload.clone())
        }

        fn delete(&self, key: &str) -> Result<()> {
            self.record(format!("delete:{key}"));
            Ok(())
        }

        fn expired_keys(&self) -> Result<Vec<String>> {
            self.record("expired_keys".to_string());
            Ok(self.expired.clone())
        }

        fn remove_expired(&self) -> Result<Vec<String>> {
            self.record("remove_expired".to_string());
            Ok(self.expired.clone())
        }

        fn expiry_threshold(&self) -> ExpiryThreshold {
            ExpiryThreshold::After(Duration::from_secs(90))
        }
    }

    fn replicas(n: usize) -> (Vec<Arc<RecordingMember>>, ReplicatingBackend) {
        let members: Vec<Arc<RecordingMember>> = (0..n)
            .map(|_| Arc::new(RecordingMember::default()))
            .collect();
        let dyn_members = members
            .iter()
            .map(|m| Arc::clone(m) as Arc<dyn BackendService>)
            .collect();
        (members, ReplicatingBackend::from_members(dyn_members))
    }

    #[test]
    fn test_persist_and_delete_fan_out_to_every_replica() {
        let (members, backend) = replicas(3);
        backend.init().unwrap();

        backend.persist("abc", b"payload").unwrap();
        backend.delete("abc").unwrap();

        for member in &members {
            assert_eq!(member.calls(), vec!["persist:abc", "delete:abc"]);
        }
    }

    #[test]
    fn test_fetch_reads_exactly_one_replica() {
        let (members, backend) = replicas(4);

        backend.fetch("abc").unwrap();

        let reads: usize = members
            .iter()
            .map(|m| m.calls().iter().filter(|c| c.starts_with("fetch:")).count())
            .sum();
        assert_eq!(reads, 1);
    }

    #[test]
    fn test_failed_replica_does_not_stop_fan_out() {
        let failing = Arc::new(RecordingMember {
            fail_writes: true,
            ..Default::default()
        });
        let healthy = Arc::new(RecordingMember::default());
        let backend = ReplicatingBackend::from_members(vec![
            Arc::clone(&failing) as Arc<dyn BackendService>,
            Arc::clone(&healthy) as Arc<dyn BackendService>,
        ]);

        let err = backend.persist("abc", b"").unwrap_err();
        assert!(matches!(err, Error::BackendAccess { .. }));
        assert_eq!(failing.calls(), vec!["persist:abc"]);
        assert_eq!(healthy.calls(), vec!["persist:abc"]);
    }

    #[test]
    fn test_expired_keys_are_unioned_and_deduplicated() {
        let a = Arc::new(RecordingMember {
            expired: vec!["x".to_string(), "y".to_string()],
            ..Default::default()
        });
        let b = Arc::new(RecordingMember {
            expired: vec!["y".to_string(), "z".to_string()],
            ..Default::default()
        });
        let backend = ReplicatingBackend::from_members(vec![
            Arc::clone(&a) as Arc<dyn BackendService>,
            Arc::clone(&b) as Arc<dyn BackendService>,
        ]);

        let mut expired = backend.expired_keys().unwrap();
        expired.sort();
        assert_eq!(expired, vec!["x", "y", "z"]);

        let mut removed = backend.remove_expired().unwrap();
        removed.sort();
        assert_eq!(removed, vec!["x", "y", "z"]);
        assert!(a.calls().contains(&"remove_expired".to_string()));
        assert!(b.calls().contains(&"remove_expired".to_string()));
    }

    #[test]
    fn test_init_builds_one_member_per_address() {
        let backend = ReplicatingBackend::new(
            "dc1:6379;dc2:6380;dc3",
            ExpiryThreshold::After(Duration::from_secs(60)),
            MemoryStore::connect,
            ConnectOptions::default(),
        );
        assert_eq!(backend.replica_count(), 0);

        backend.init().unwrap();

        assert_eq!(backend.replica_count(), 3);
        let endpoints: Vec<String> = backend.endpoints().iter().map(ToString::to_string).collect();
        assert_eq!(endpoints, vec!["dc1:6379", "dc2:6380", "dc3:6379"]);

        backend.persist("k", b"v").unwrap();
        assert_eq!(backend.fetch("k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_expiry_threshold_follows_members() {
        let (_, backend) = replicas(2);
        assert_eq!(
            backend.expiry_threshold(),
            ExpiryThreshold::After(Duration::from_secs(90))
        );

        let configured = ReplicatingBackend::new(
            "dc1;dc2",
            ExpiryThreshold::After(Duration::from_secs(60)),
            MemoryStore::connect,
            ConnectOptions::default(),
        );
        assert_eq!(
            configured.expiry_threshold(),
            ExpiryThreshold::After(Duration::from_secs(60))
        );
        configured.init().unwrap();
        assert_eq!(
            configured.expiry_threshold(),
            ExpiryThreshold::After(Duration::from_secs(60))
        );
    }

    #[test]
    fn test_init_rejects_empty_or_malformed_lists() {
        for bad in ["", "dc1;;dc2", "dc1;dc2:"] {
            let backend = ReplicatingBackend::new(
                bad,
                ExpiryThreshold::Never,
                MemoryStore::connect,
                ConnectOptions::default(),
            );
            assert!(matches!(backend.init(), Err(Error::Configuration(_))), "{bad:?}");
        }
    }

    #[test]
    fn test_shutdown_reaches_every_member_and_is_terminal() {
        let (members, backend) = replicas(2);
        backend.shutdown();

        for member in &members {
            assert_eq!(member.calls(), vec!["shutdown"]);
        }
        assert!(matches!(backend.persist("k", b""), Err(Error::ServiceUnavailable(_))));
        assert!(matches!(backend.fetch("k"), Err(Error::ServiceUnavailable(_))));
        assert!(matches!(backend.remove_expired(), Err(Error::ServiceUnavailable(_))));

        // No I/O reached the members after shutdown.
        for member in &members {
            assert_eq!(member.calls().len(), 1);
        }
    }
}

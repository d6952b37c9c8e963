//! In-memory control plane for tests.
//!
//! Mimics the contracts the controller relies on: identifier uniqueness
//! on create, existence checks on delete, `NotFound` for missing
//! primaries, and a monotonic creation clock so oldest-first selection
//! is observable. Per-operation failure queues inject errors into
//! upcoming calls, which is how retry and conflict paths are exercised.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use replicaband_core::{ReplicaInfo, ReplicaTopology, epoch_secs};

use crate::client::{
    ControlPlaneError, CreateReplicaRequest, LifecycleClient, LifecycleFuture,
};

#[derive(Debug, Default)]
struct Inner {
    /// Replica sets per primary, in creation order.
    primaries: HashMap<String, Vec<ReplicaInfo>>,
    /// Monotonic creation clock.
    clock: u64,
    fail_describe: VecDeque<ControlPlaneError>,
    fail_create: VecDeque<ControlPlaneError>,
    fail_delete: VecDeque<ControlPlaneError>,
    describe_calls: u32,
    create_calls: u32,
    delete_calls: u32,
}

/// Shared in-memory control plane; clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryControlPlane {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a primary with the given replica identifiers, created
    /// in listing order (first is oldest).
    pub fn register_primary(&self, primary_id: &str, replica_ids: &[&str]) {
        let mut inner = self.inner.lock().unwrap();
        let mut replicas = Vec::new();
        for id in replica_ids {
            inner.clock += 1;
            replicas.push(ReplicaInfo {
                id: id.to_string(),
                created_at: inner.clock,
            });
        }
        inner.primaries.insert(primary_id.to_string(), replicas);
    }

    /// Queue an error for the next describe call.
    pub fn fail_next_describe(&self, error: ControlPlaneError) {
        self.inner.lock().unwrap().fail_describe.push_back(error);
    }

    /// Queue an error for the next create call.
    pub fn fail_next_create(&self, error: ControlPlaneError) {
        self.inner.lock().unwrap().fail_create.push_back(error);
    }

    /// Queue an error for the next delete call.
    pub fn fail_next_delete(&self, error: ControlPlaneError) {
        self.inner.lock().unwrap().fail_delete.push_back(error);
    }

    /// Current replica identifiers for a primary, creation order.
    pub fn replica_ids(&self, primary_id: &str) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .primaries
            .get(primary_id)
            .map(|rs| rs.iter().map(|r| r.id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn describe_calls(&self) -> u32 {
        self.inner.lock().unwrap().describe_calls
    }

    pub fn create_calls(&self) -> u32 {
        self.inner.lock().unwrap().create_calls
    }

    pub fn delete_calls(&self) -> u32 {
        self.inner.lock().unwrap().delete_calls
    }
}

impl LifecycleClient for InMemoryControlPlane {
    fn describe<'a>(&'a self, primary_id: &'a str) -> LifecycleFuture<'a, ReplicaTopology> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            inner.describe_calls += 1;
            if let Some(e) = inner.fail_describe.pop_front() {
                return Err(e);
            }
            let replicas = inner
                .primaries
                .get(primary_id)
                .ok_or_else(|| ControlPlaneError::NotFound(primary_id.to_string()))?
                .clone();
            Ok(ReplicaTopology {
                primary_id: primary_id.to_string(),
                replicas,
                observed_at: epoch_secs(),
            })
        })
    }

    fn create_replica<'a>(&'a self, req: CreateReplicaRequest) -> LifecycleFuture<'a, ()> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            inner.create_calls += 1;
            if let Some(e) = inner.fail_create.pop_front() {
                return Err(e);
            }
            inner.clock += 1;
            let created_at = inner.clock;
            let replicas = inner
                .primaries
                .get_mut(&req.source_id)
                .ok_or_else(|| ControlPlaneError::NotFound(req.source_id.clone()))?;
            if replicas.iter().any(|r| r.id == req.new_id) {
                return Err(ControlPlaneError::Conflict(format!(
                    "replica {} already exists",
                    req.new_id
                )));
            }
            replicas.push(ReplicaInfo {
                id: req.new_id.clone(),
                created_at,
            });
            Ok(())
        })
    }

    fn delete_replica<'a>(&'a self, replica_id: &'a str) -> LifecycleFuture<'a, ()> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            inner.delete_calls += 1;
            if let Some(e) = inner.fail_delete.pop_front() {
                return Err(e);
            }
            for replicas in inner.primaries.values_mut() {
                if let Some(pos) = replicas.iter().position(|r| r.id == replica_id) {
                    replicas.remove(pos);
                    return Ok(());
                }
            }
            Err(ControlPlaneError::Conflict(format!(
                "replica {replica_id} already absent"
            )))
        })
    }
}

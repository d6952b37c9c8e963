//! Control-plane client trait and error taxonomy.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use replicaband_core::{ReplicaId, ReplicaTopology};

/// Errors surfaced by control-plane operations.
///
/// `Transient` and `RateLimited` are retryable within the invocation's
/// budget. `Conflict` means the target is already in the desired end
/// state and callers treat it as success. The rest are fatal for the
/// invocation and require operator action.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ControlPlaneError {
    #[error("instance not found: {0}")]
    NotFound(String),

    #[error("control plane unavailable: {0}")]
    Transient(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl ControlPlaneError {
    /// Whether another attempt within the budget may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::RateLimited(_))
    }
}

pub type ControlPlaneResult<T> = Result<T, ControlPlaneError>;

/// Parameters for a create-replica call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateReplicaRequest {
    /// Primary the replica is derived from.
    pub source_id: String,
    /// Identifier the new replica must take. The control plane enforces
    /// uniqueness, which is what makes duplicate creates collapse into
    /// `Conflict`.
    pub new_id: ReplicaId,
    pub instance_class: String,
    pub placement_hint: String,
}

/// Boxed future returned by client operations.
pub type LifecycleFuture<'a, T> =
    Pin<Box<dyn Future<Output = ControlPlaneResult<T>> + Send + 'a>>;

/// Asynchronous control-plane API for replica lifecycle management.
///
/// `describe` is the topology reader: a live read, never cached.
/// `create_replica` and `delete_replica` are accepted-vs-rejected calls
/// against an asynchronous control plane; acceptance does not mean the
/// replica exists or is gone yet.
pub trait LifecycleClient: Send + Sync {
    fn describe<'a>(&'a self, primary_id: &'a str) -> LifecycleFuture<'a, ReplicaTopology>;

    fn create_replica<'a>(&'a self, req: CreateReplicaRequest) -> LifecycleFuture<'a, ()>;

    fn delete_replica<'a>(&'a self, replica_id: &'a str) -> LifecycleFuture<'a, ()>;
}

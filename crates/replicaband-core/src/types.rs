//! Domain types for the replicaband scaling pipeline.
//!
//! These types flow through a single controller invocation: a notification
//! is classified into a `ScalingEvent`, the control plane is described into
//! a `ReplicaTopology`, and the policy engine maps both (plus the static
//! `ScalingPolicy`) onto a `ScalingDecision`. All types are serializable
//! to JSON for wire payloads and completion reports.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Identifier of a primary database instance.
pub type PrimaryId = String;

/// Identifier of a read-replica instance.
pub type ReplicaId = String;

// ── Events ─────────────────────────────────────────────────────────

/// Direction of a scaling request carried by a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleDirection {
    /// Add a replica.
    ScaleUp,
    /// Remove a replica.
    ScaleDown,
    /// The payload carried no structurally recognizable direction.
    /// Terminal classification — always resolves to a no-op, never a guess.
    Unknown,
}

/// A classified scaling notification.
///
/// Immutable once constructed. The delivery token identifies one logical
/// delivery across redeliveries and drives deterministic replica naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingEvent {
    pub primary_id: PrimaryId,
    pub direction: ScaleDirection,
    /// Unix timestamp (seconds) when the delivery was received.
    pub received_at: u64,
    /// Opaque per-delivery token used for dedup and retry jitter.
    pub delivery_token: String,
}

impl ScalingEvent {
    /// Derive the replica identifier this event would create.
    ///
    /// The name is a pure function of (primary, delivery token), so a
    /// redelivered event derives the same name and the executor's
    /// existence check turns the duplicate into a no-op.
    pub fn derived_replica_id(&self) -> ReplicaId {
        let mut hasher = DefaultHasher::new();
        self.primary_id.hash(&mut hasher);
        self.delivery_token.hash(&mut hasher);
        format!("{}-ro-{:08x}", self.primary_id, hasher.finish() as u32)
    }
}

// ── Topology ───────────────────────────────────────────────────────

/// A single replica as observed at describe time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaInfo {
    pub id: ReplicaId,
    /// Unix timestamp (seconds) the replica was created, for
    /// oldest-first scale-down selection.
    pub created_at: u64,
}

/// The replica set of one primary, as observed by a single live read.
///
/// Always fetched fresh from the control plane immediately before a
/// decision; never cached across invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaTopology {
    pub primary_id: PrimaryId,
    pub replicas: Vec<ReplicaInfo>,
    /// Unix timestamp (seconds) of the observation.
    pub observed_at: u64,
}

impl ReplicaTopology {
    /// Number of replicas currently attached.
    pub fn replica_count(&self) -> u32 {
        self.replicas.len() as u32
    }

    /// Whether a replica with the given identifier exists.
    pub fn contains(&self, id: &str) -> bool {
        self.replicas.iter().any(|r| r.id == id)
    }

    /// The oldest replica by creation time, identifier as tie-break.
    pub fn oldest(&self) -> Option<&ReplicaInfo> {
        self.replicas
            .iter()
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
    }
}

// ── Policy ─────────────────────────────────────────────────────────

/// Operator-configured scaling band, immutable for the controller's
/// lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingPolicy {
    pub min_replicas: u32,
    pub max_replicas: u32,
    /// Instance class for newly created replicas.
    pub instance_class: String,
    /// Placement hint (zone / subnet group) for new replicas.
    pub placement_hint: String,
}

// ── Decisions ──────────────────────────────────────────────────────

/// The outcome of the policy engine for one event.
///
/// Pure function of (event, topology, policy); at most one mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScalingDecision {
    CreateReplica { id: ReplicaId },
    DeleteReplica { id: ReplicaId },
    NoOp { reason: String },
}

impl ScalingDecision {
    pub fn no_op(reason: &str) -> Self {
        Self::NoOp {
            reason: reason.to_string(),
        }
    }

    /// Whether this decision mutates the control plane.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::NoOp { .. })
    }
}

/// Current Unix time in seconds.
pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

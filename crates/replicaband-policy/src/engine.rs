//! Scaling decision rules.

use tracing::debug;

use replicaband_core::{ReplicaTopology, ScaleDirection, ScalingDecision, ScalingEvent, ScalingPolicy};

/// No-op reason strings, shared with the executor so duplicate
/// deliveries and policy bounds report consistently.
pub mod reason {
    pub const AT_CAPACITY: &str = "at capacity";
    pub const AT_FLOOR: &str = "at floor";
    pub const UNCLASSIFIABLE: &str = "unclassifiable event";
    pub const ALREADY_SATISFIED: &str = "already satisfied";
    pub const ALREADY_DELETED: &str = "already deleted";
}

/// Decide what, if anything, to do for one event.
///
/// Pure function: no clock, no I/O, no retained state. The replica
/// identifier for a scale-up is derived from the event itself, so a
/// redelivered event resolves to `NoOp("already satisfied")` once the
/// topology reflects the first delivery.
pub fn decide(
    event: &ScalingEvent,
    topology: &ReplicaTopology,
    policy: &ScalingPolicy,
) -> ScalingDecision {
    let count = topology.replica_count();

    match event.direction {
        ScaleDirection::ScaleUp => {
            let new_id = event.derived_replica_id();
            if topology.contains(&new_id) {
                debug!(primary = %event.primary_id, replica = %new_id, "replica already present");
                return ScalingDecision::no_op(reason::ALREADY_SATISFIED);
            }
            if count >= policy.max_replicas {
                debug!(
                    primary = %event.primary_id,
                    count,
                    max = policy.max_replicas,
                    "scale-up refused at capacity"
                );
                return ScalingDecision::no_op(reason::AT_CAPACITY);
            }
            ScalingDecision::CreateReplica { id: new_id }
        }
        ScaleDirection::ScaleDown => {
            if count <= policy.min_replicas {
                debug!(
                    primary = %event.primary_id,
                    count,
                    min = policy.min_replicas,
                    "scale-down refused at floor"
                );
                return ScalingDecision::no_op(reason::AT_FLOOR);
            }
            // Delete the oldest replica: deterministic, and spares the
            // newest, still-warming replica from repeated targeting.
            match topology.oldest() {
                Some(oldest) => ScalingDecision::DeleteReplica {
                    id: oldest.id.clone(),
                },
                None => ScalingDecision::no_op(reason::AT_FLOOR),
            }
        }
        ScaleDirection::Unknown => ScalingDecision::no_op(reason::UNCLASSIFIABLE),
    }
}

//! Mutation execution with duplicate-delivery protection.
//!
//! A non-no-op decision is validated against a freshly re-read topology
//! immediately before the mutation is issued. This converts duplicate
//! scale-up deliveries into "already satisfied" and duplicate
//! scale-down deliveries into "already deleted" rather than
//! double-creates or failed second deletes. `Conflict` from the control
//! plane means the desired end state already holds and is success.

use tracing::{info, warn};

use replicaband_core::{ReplicaTopology, ScalingDecision, ScalingEvent, ScalingPolicy};
use replicaband_lifecycle::{
    ControlPlaneError, CreateReplicaRequest, LifecycleClient, RetryPolicy, with_retries,
};
use replicaband_policy::reason;

use crate::controller::{ControllerError, InvocationOutcome};

/// Terminal result of executing one decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub outcome: InvocationOutcome,
    pub reason: String,
}

impl ExecutionResult {
    fn executed(reason: &str) -> Self {
        Self {
            outcome: InvocationOutcome::Executed,
            reason: reason.to_string(),
        }
    }

    fn skipped(reason: &str) -> Self {
        Self {
            outcome: InvocationOutcome::Skipped,
            reason: reason.to_string(),
        }
    }
}

/// Carry out a `CreateReplica` or `DeleteReplica` decision.
///
/// The caller passes a `NoOp` decision straight to the report; handing
/// one here is a programming error and is treated as a skip.
pub async fn execute(
    client: &dyn LifecycleClient,
    retry: &RetryPolicy,
    policy: &ScalingPolicy,
    event: &ScalingEvent,
    decision: &ScalingDecision,
) -> Result<ExecutionResult, ControllerError> {
    match decision {
        ScalingDecision::CreateReplica { id } => {
            let fresh = reread_topology(client, retry, event).await?;
            if fresh.contains(id) {
                // A previous delivery of this event already created it.
                return Ok(ExecutionResult::skipped(reason::ALREADY_SATISFIED));
            }
            if fresh.replica_count() >= policy.max_replicas {
                // A concurrent invocation filled the band between the
                // decision read and now.
                return Ok(ExecutionResult::skipped(reason::AT_CAPACITY));
            }

            info!(
                primary = %event.primary_id,
                replica = %id,
                instance_class = %policy.instance_class,
                "issuing create_replica"
            );
            let request = CreateReplicaRequest {
                source_id: event.primary_id.clone(),
                new_id: id.clone(),
                instance_class: policy.instance_class.clone(),
                placement_hint: policy.placement_hint.clone(),
            };
            let result = with_retries(retry, &event.delivery_token, "create_replica", || {
                client.create_replica(request.clone())
            })
            .await;

            match result {
                Ok(()) => Ok(ExecutionResult::executed("replica create accepted")),
                Err(ControlPlaneError::Conflict(_)) => {
                    // Identifier already taken: the duplicate delivery
                    // raced us past the re-check. Desired end state holds.
                    Ok(ExecutionResult::skipped(reason::ALREADY_SATISFIED))
                }
                Err(e) => Err(fatal(event, "create_replica", e)),
            }
        }
        ScalingDecision::DeleteReplica { id } => {
            let fresh = reread_topology(client, retry, event).await?;
            if !fresh.contains(id) {
                return Ok(ExecutionResult::skipped(reason::ALREADY_DELETED));
            }
            if fresh.replica_count() <= policy.min_replicas {
                return Ok(ExecutionResult::skipped(reason::AT_FLOOR));
            }

            info!(primary = %event.primary_id, replica = %id, "issuing delete_replica");
            let result = with_retries(retry, &event.delivery_token, "delete_replica", || {
                client.delete_replica(id)
            })
            .await;

            match result {
                Ok(()) => Ok(ExecutionResult::executed("replica delete accepted")),
                Err(ControlPlaneError::Conflict(_)) => {
                    Ok(ExecutionResult::skipped(reason::ALREADY_DELETED))
                }
                Err(e) => Err(fatal(event, "delete_replica", e)),
            }
        }
        ScalingDecision::NoOp { reason } => Ok(ExecutionResult::skipped(reason)),
    }
}

async fn reread_topology(
    client: &dyn LifecycleClient,
    retry: &RetryPolicy,
    event: &ScalingEvent,
) -> Result<ReplicaTopology, ControllerError> {
    with_retries(retry, &event.delivery_token, "describe", || {
        client.describe(&event.primary_id)
    })
    .await
    .map_err(|e| match e {
        ControlPlaneError::NotFound(id) => ControllerError::PrimaryNotFound(id),
        other => ControllerError::ControlPlane(other),
    })
}

fn fatal(event: &ScalingEvent, op: &str, error: ControlPlaneError) -> ControllerError {
    warn!(
        primary = %event.primary_id,
        op = %op,
        error = %error,
        "mutation failed"
    );
    ControllerError::ControlPlane(error)
}

//! Controller entry point — the per-invocation pipeline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use replicaband_classify::{Classification, RawDelivery, classify};
use replicaband_core::{
    ControllerConfig, ScaleDirection, ScalingDecision, ScalingEvent, ScalingPolicy, epoch_secs,
};
use replicaband_lifecycle::{ControlPlaneError, LifecycleClient, RetryPolicy, with_retries};
use replicaband_policy::{decide, reason};

use crate::dedup::DeliveryLedger;
use crate::executor::{ExecutionResult, execute};

/// Skip reason for a redelivered token.
const DUPLICATE_DELIVERY: &str = "duplicate delivery";

/// Tokens remembered before the oldest are evicted.
const LEDGER_CAPACITY: usize = 1024;

/// Errors that fail an invocation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ControllerError {
    /// The primary no longer exists; no mutation, alert the operator.
    #[error("primary not found: {0}")]
    PrimaryNotFound(String),

    /// A control-plane call failed beyond the retry budget or fatally.
    #[error("control plane error: {0}")]
    ControlPlane(#[from] ControlPlaneError),

    /// The invocation deadline expired; retries were abandoned.
    #[error("invocation deadline exceeded")]
    DeadlineExceeded,
}

/// Terminal outcome of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationOutcome {
    /// A mutation request was accepted by the control plane.
    Executed,
    /// Nothing needed doing (no-op decision, duplicate, or unrelated
    /// payload).
    Skipped,
    /// The invocation could not complete; alert-worthy.
    Failed,
}

/// Structured completion record emitted once per invocation.
///
/// This is the only durable trace of controller behavior — there is no
/// other persisted state.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<ScalingDecision>,
    pub reason: String,
    pub outcome: InvocationOutcome,
    pub duration_ms: u64,
}

/// The scaling controller.
///
/// Everything topology-shaped is re-derived from the control plane per
/// delivery, so concurrent and duplicate invocations never diverge on a
/// controller-local count. The only carried state is a bounded ledger
/// of completed delivery tokens, which turns sequential redeliveries
/// into skips before any control-plane call. Cheap to clone and share
/// across spawned tasks; clones share the ledger.
#[derive(Clone)]
pub struct ScalingController {
    client: Arc<dyn LifecycleClient>,
    policy: ScalingPolicy,
    retry: RetryPolicy,
    deadline: Duration,
    ledger: Arc<DeliveryLedger>,
}

impl ScalingController {
    pub fn new(
        client: Arc<dyn LifecycleClient>,
        policy: ScalingPolicy,
        retry: RetryPolicy,
        deadline: Duration,
    ) -> Self {
        Self {
            client,
            policy,
            retry,
            deadline,
            ledger: Arc::new(DeliveryLedger::new(LEDGER_CAPACITY)),
        }
    }

    pub fn from_config(config: &ControllerConfig, client: Arc<dyn LifecycleClient>) -> Self {
        Self::new(
            client,
            config.scaling_policy(),
            RetryPolicy::from_config(config),
            config.invocation_deadline(),
        )
    }

    /// Run one invocation for a raw delivery.
    ///
    /// Never returns an error: every path terminates in a report, and
    /// failures surface through `InvocationOutcome::Failed` plus a
    /// warn-level log. The reason string carries the policy reason on
    /// skips and the underlying error on failures.
    pub async fn handle(&self, delivery: RawDelivery<'_>) -> CompletionReport {
        let started = Instant::now();

        let event = match classify(&delivery) {
            Classification::Scaling(event) => event,
            Classification::Unrelated { reason } => {
                debug!(%reason, "delivery not related to scaling, ignoring");
                return self.report(
                    None,
                    None,
                    None,
                    &reason,
                    InvocationOutcome::Skipped,
                    started,
                );
            }
        };
        debug!(
            primary = %event.primary_id,
            direction = ?event.direction,
            token = %event.delivery_token,
            "delivery classified"
        );

        // An unclassifiable direction is terminal; no topology read.
        if event.direction == ScaleDirection::Unknown {
            return self.report(
                Some(event.primary_id),
                Some(event.delivery_token),
                Some(ScalingDecision::no_op(reason::UNCLASSIFIABLE)),
                reason::UNCLASSIFIABLE,
                InvocationOutcome::Skipped,
                started,
            );
        }

        // A token that already completed an invocation is a redelivery.
        // Scale-ups would also be caught by the token-derived name, but
        // a finished scale-down leaves nothing in the topology to check
        // against, so the ledger is what keeps a duplicate from taking
        // out the next-oldest replica.
        if self.ledger.contains(&event.delivery_token) {
            debug!(
                primary = %event.primary_id,
                token = %event.delivery_token,
                "delivery token already completed, skipping"
            );
            return self.report(
                Some(event.primary_id),
                Some(event.delivery_token),
                None,
                DUPLICATE_DELIVERY,
                InvocationOutcome::Skipped,
                started,
            );
        }

        let (decision, result) =
            match tokio::time::timeout(self.deadline, self.run(&event)).await {
                Ok((decision, result)) => (decision, result),
                Err(_) => {
                    // Retries abandoned. A mutation attempt may already
                    // have been logged by the executor; operators
                    // reconcile from the next topology read.
                    warn!(
                        primary = %event.primary_id,
                        token = %event.delivery_token,
                        deadline_ms = self.deadline.as_millis() as u64,
                        "invocation deadline exceeded, abandoning"
                    );
                    (None, Err(ControllerError::DeadlineExceeded))
                }
            };

        match result {
            Ok(exec) => {
                // Failed invocations are left out so the channel's
                // redelivery can retry them.
                self.ledger.record(&event.delivery_token);
                self.report(
                    Some(event.primary_id),
                    Some(event.delivery_token),
                    decision,
                    &exec.reason,
                    exec.outcome,
                    started,
                )
            }
            Err(e) => {
                warn!(
                    primary = %event.primary_id,
                    token = %event.delivery_token,
                    decision = ?decision,
                    error = %e,
                    "invocation failed"
                );
                self.report(
                    Some(event.primary_id),
                    Some(event.delivery_token),
                    decision,
                    &e.to_string(),
                    InvocationOutcome::Failed,
                    started,
                )
            }
        }
    }

    /// TopologyLoaded → Decided → Executed|Skipped.
    ///
    /// The decision is returned even when execution fails, so a
    /// `Failed` report still says what the controller was attempting.
    async fn run(
        &self,
        event: &ScalingEvent,
    ) -> (Option<ScalingDecision>, Result<ExecutionResult, ControllerError>) {
        let topology = match with_retries(&self.retry, &event.delivery_token, "describe", || {
            self.client.describe(&event.primary_id)
        })
        .await
        {
            Ok(topology) => topology,
            Err(ControlPlaneError::NotFound(id)) => {
                return (None, Err(ControllerError::PrimaryNotFound(id)));
            }
            Err(other) => return (None, Err(ControllerError::ControlPlane(other))),
        };
        debug!(
            primary = %event.primary_id,
            replicas = topology.replica_count(),
            "topology loaded"
        );

        let decision = decide(event, &topology, &self.policy);
        debug!(primary = %event.primary_id, decision = ?decision, "decision made");

        let result = execute(
            self.client.as_ref(),
            &self.retry,
            &self.policy,
            event,
            &decision,
        )
        .await;
        (Some(decision), result)
    }

    /// Reported: emit the structured completion record and return it.
    fn report(
        &self,
        primary_id: Option<String>,
        delivery_token: Option<String>,
        decision: Option<ScalingDecision>,
        reason: &str,
        outcome: InvocationOutcome,
        started: Instant,
    ) -> CompletionReport {
        let report = CompletionReport {
            primary_id,
            delivery_token,
            decision,
            reason: reason.to_string(),
            outcome,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        match report.outcome {
            InvocationOutcome::Failed => warn!(
                primary = report.primary_id.as_deref().unwrap_or("-"),
                outcome = ?report.outcome,
                decision = ?report.decision,
                reason = %report.reason,
                duration_ms = report.duration_ms,
                "invocation complete"
            ),
            _ => info!(
                primary = report.primary_id.as_deref().unwrap_or("-"),
                outcome = ?report.outcome,
                decision = ?report.decision,
                reason = %report.reason,
                duration_ms = report.duration_ms,
                "invocation complete"
            ),
        }

        report
    }
}

/// Build a `RawDelivery` for the current instant.
pub fn delivery_now<'a>(body: &'a [u8], token: Option<&'a str>) -> RawDelivery<'a> {
    RawDelivery {
        body,
        delivery_token: token,
        received_at: epoch_secs(),
    }
}

//! replicaband-controller — one stateless pass per notification.
//!
//! Each delivery runs the pipeline
//!
//! ```text
//! Received → Classified → TopologyLoaded → Decided → Executed|Skipped
//!                                                  ↘ Failed
//! ```
//!
//! with no scaling state retained across invocations: counts are
//! re-derived from the control plane every time, never from a
//! controller-local counter. The one thing that is remembered is a
//! bounded ledger of completed delivery tokens, because a redelivered
//! scale-down cannot be recognized from the topology alone. The whole
//! pass runs under a configurable deadline; exceeding it abandons
//! retries and reports `Failed`.
//!
//! # Components
//!
//! - **`controller`** — `ScalingController::handle()`, the pipeline and
//!   the per-invocation `CompletionReport`
//! - **`dedup`** — the bounded ledger of completed delivery tokens
//! - **`executor`** — carries out a mutation decision with a fresh
//!   topology re-check, converting racing duplicates into no-ops

pub mod controller;
pub mod dedup;
pub mod executor;

pub use controller::{
    CompletionReport, ControllerError, InvocationOutcome, ScalingController, delivery_now,
};

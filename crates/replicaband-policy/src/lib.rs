//! replicaband-policy — the pure scaling decision engine.
//!
//! Maps (event, topology, policy) onto a `ScalingDecision`:
//!
//! ```text
//! ScaleUp   ∧ count < max  →  CreateReplica(derived id)
//! ScaleUp   ∧ count ≥ max  →  NoOp("at capacity")
//! ScaleDown ∧ count > min  →  DeleteReplica(oldest)
//! ScaleDown ∧ count ≤ min  →  NoOp("at floor")
//! Unknown                  →  NoOp("unclassifiable event")
//! ```
//!
//! Fully deterministic given its inputs and free of side effects, which
//! is what makes it independently testable. The topology must be a
//! fresh control-plane read; the engine never sees cached state.

pub mod engine;

pub use engine::{decide, reason};

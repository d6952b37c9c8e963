//! replicaband-core — domain types and configuration.
//!
//! Everything the scaling pipeline passes around lives here: the
//! classified `ScalingEvent`, the live `ReplicaTopology` read from the
//! control plane, the operator-supplied `ScalingPolicy`, and the derived
//! `ScalingDecision`. The `config` module holds the TOML configuration
//! surface loaded once at daemon startup.

pub mod config;
pub mod types;

pub use config::{ControllerConfig, parse_duration};
pub use types::*;

//! replicaband.toml configuration parser.
//!
//! Loaded once at daemon startup and immutable thereafter. The file is
//! split into three sections: the scaling band (`[policy]`), the
//! control-plane endpoint (`[control_plane]`), and the retry/deadline
//! budget (`[retry]`).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::ScalingPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub policy: PolicyConfig,
    pub control_plane: ControlPlaneConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub min_replicas: u32,
    pub max_replicas: u32,
    pub instance_class: String,
    pub placement_hint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPlaneConfig {
    /// host:port of the control-plane API.
    pub endpoint: String,
    /// Per-call timeout, e.g. "5s".
    #[serde(default = "default_call_timeout")]
    pub call_timeout: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per control-plane call, first included.
    pub max_attempts: u32,
    /// Backoff before the second attempt, doubled thereafter.
    pub base_backoff: String,
    /// Cap on the exponential backoff.
    pub max_backoff: String,
    /// Wall-clock budget for one whole invocation.
    pub invocation_deadline: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_backoff: "200ms".to_string(),
            max_backoff: "5s".to_string(),
            invocation_deadline: "30s".to_string(),
        }
    }
}

fn default_call_timeout() -> String {
    "5s".to_string()
}

impl ControllerConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ControllerConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject bands that can never be satisfied.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.policy.max_replicas < self.policy.min_replicas {
            anyhow::bail!(
                "max_replicas ({}) must be >= min_replicas ({})",
                self.policy.max_replicas,
                self.policy.min_replicas
            );
        }
        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }
        Ok(())
    }

    pub fn scaling_policy(&self) -> ScalingPolicy {
        ScalingPolicy {
            min_replicas: self.policy.min_replicas,
            max_replicas: self.policy.max_replicas,
            instance_class: self.policy.instance_class.clone(),
            placement_hint: self.policy.placement_hint.clone(),
        }
    }

    pub fn call_timeout(&self) -> Duration {
        parse_duration(&self.control_plane.call_timeout).unwrap_or(Duration::from_secs(5))
    }

    pub fn base_backoff(&self) -> Duration {
        parse_duration(&self.retry.base_backoff).unwrap_or(Duration::from_millis(200))
    }

    pub fn max_backoff(&self) -> Duration {
        parse_duration(&self.retry.max_backoff).unwrap_or(Duration::from_secs(5))
    }

    pub fn invocation_deadline(&self) -> Duration {
        parse_duration(&self.retry.invocation_deadline).unwrap_or(Duration::from_secs(30))
    }
}

/// Parse a duration string like "5s", "500ms", "1m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

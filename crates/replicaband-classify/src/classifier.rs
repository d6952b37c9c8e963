//! Event classification.
//!
//! Pure parse: raw body bytes plus delivery metadata in, classification
//! out. No control-plane access, no side effects beyond diagnostics.

use std::hash::{DefaultHasher, Hash, Hasher};

use serde::Deserialize;
use tracing::debug;

use replicaband_core::{ScaleDirection, ScalingEvent};

/// One notification delivery as received from the channel.
#[derive(Debug, Clone, Copy)]
pub struct RawDelivery<'a> {
    /// Raw notification body, expected to be JSON.
    pub body: &'a [u8],
    /// Delivery token from transport metadata, if the channel provided one.
    pub delivery_token: Option<&'a str>,
    /// Unix timestamp (seconds) the delivery was received.
    pub received_at: u64,
}

/// Result of classifying one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The payload names a primary; `direction` may still be `Unknown`.
    Scaling(ScalingEvent),
    /// The payload does not concern scaling at all (no primary named,
    /// or not JSON). Ignored without error per the channel contract.
    Unrelated { reason: String },
}

/// Structured fields we accept from a notification body.
///
/// Everything is optional at the serde level; classification decides
/// what is usable. Unknown fields are ignored so unrelated payloads
/// sharing the channel never fail to parse.
#[derive(Debug, Deserialize)]
struct NotificationBody {
    primary_id: Option<String>,
    direction: Option<String>,
    delivery_token: Option<String>,
}

/// Classify a raw delivery into a `ScalingEvent` or reject it.
///
/// The direction must be an exact structured value; any other string
/// (including free text that merely mentions scaling) classifies as
/// `Unknown` and never as a destructive default.
pub fn classify(delivery: &RawDelivery<'_>) -> Classification {
    let body: NotificationBody = match serde_json::from_slice(delivery.body) {
        Ok(b) => b,
        Err(e) => {
            debug!(error = %e, "notification body is not valid JSON");
            return Classification::Unrelated {
                reason: "payload is not valid JSON".to_string(),
            };
        }
    };

    let primary_id = match body.primary_id {
        Some(id) if !id.trim().is_empty() => id,
        _ => {
            return Classification::Unrelated {
                reason: "payload names no primary".to_string(),
            };
        }
    };

    let direction = match body.direction.as_deref() {
        Some("scale_up") => ScaleDirection::ScaleUp,
        Some("scale_down") => ScaleDirection::ScaleDown,
        other => {
            debug!(
                primary = %primary_id,
                direction = ?other,
                "no structured scaling direction in payload"
            );
            ScaleDirection::Unknown
        }
    };

    // Header token wins; a body token is the fallback. With neither,
    // synthesize one from the receipt time plus the payload bytes so an
    // identical redelivery collapses while distinct token-less events
    // in the same second stay distinct.
    let delivery_token = delivery
        .delivery_token
        .map(str::to_string)
        .or(body.delivery_token)
        .unwrap_or_else(|| synthesize_token(delivery));

    Classification::Scaling(ScalingEvent {
        primary_id,
        direction,
        received_at: delivery.received_at,
        delivery_token,
    })
}

fn synthesize_token(delivery: &RawDelivery<'_>) -> String {
    let mut hasher = DefaultHasher::new();
    delivery.body.hash(&mut hasher);
    format!(
        "synthetic-{}-{:08x}",
        delivery.received_at,
        hasher.finish() as u32
    )
}

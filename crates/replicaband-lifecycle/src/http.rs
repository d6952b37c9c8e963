//! JSON-over-HTTP control-plane client.
//!
//! Wire surface:
//!
//! ```text
//! GET    /instances/{primary}            → ReplicaTopology (JSON)
//! POST   /instances/{primary}/replicas   → accepted
//! DELETE /replicas/{replica}             → accepted
//! ```
//!
//! Status codes map onto the error taxonomy; connection failures and
//! 5xx responses are `Transient` so the retry layer handles throttled
//! or briefly unavailable control planes. Per-call timeouts are applied
//! by the retry layer, not here.

use bytes::Bytes;
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tracing::debug;

use replicaband_core::{ReplicaInfo, ReplicaTopology, epoch_secs};

use crate::client::{
    ControlPlaneError, ControlPlaneResult, CreateReplicaRequest, LifecycleClient, LifecycleFuture,
};

/// HTTP client for a control plane reachable at `host:port`.
#[derive(Debug, Clone)]
pub struct HttpLifecycleClient {
    endpoint: String,
}

/// Body of a describe response.
#[derive(Debug, Serialize, Deserialize)]
struct DescribeResponse {
    primary_id: String,
    replicas: Vec<ReplicaInfo>,
}

/// Body of a create-replica request.
#[derive(Debug, Serialize, Deserialize)]
struct CreateReplicaBody {
    replica_id: String,
    instance_class: String,
    placement_hint: String,
}

impl HttpLifecycleClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    /// Issue one HTTP request and return (status, body).
    ///
    /// One connection per call: invocations are rare (one per alarm
    /// transition), so pooling buys nothing and a fresh connection keeps
    /// failure modes simple.
    async fn request(
        &self,
        method: Method,
        path: String,
        body: Option<Vec<u8>>,
    ) -> ControlPlaneResult<(StatusCode, Bytes)> {
        let stream = TcpStream::connect(&self.endpoint)
            .await
            .map_err(|e| ControlPlaneError::Transient(format!("connect failed: {e}")))?;

        let io = TokioIo::new(stream);
        let (mut sender, conn) = http1::handshake(io)
            .await
            .map_err(|e| ControlPlaneError::Transient(format!("handshake failed: {e}")))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let uri = format!("http://{}{}", self.endpoint, path);
        let req = http::Request::builder()
            .method(method)
            .uri(&uri)
            .header("host", &self.endpoint)
            .header("content-type", "application/json")
            .header("user-agent", "replicaband/0.1")
            .body(Full::new(Bytes::from(body.unwrap_or_default())))
            .map_err(|e| ControlPlaneError::InvalidConfiguration(format!("bad request: {e}")))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| ControlPlaneError::Transient(format!("request failed: {e}")))?;

        let status = resp.status();
        let bytes = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| ControlPlaneError::Transient(format!("body read failed: {e}")))?
            .to_bytes();

        debug!(%uri, status = %status, "control-plane call");
        Ok((status, bytes))
    }
}

/// Map a non-success status onto the error taxonomy.
fn map_status(status: StatusCode, context: &str) -> ControlPlaneError {
    match status {
        StatusCode::NOT_FOUND => ControlPlaneError::NotFound(context.to_string()),
        StatusCode::CONFLICT => ControlPlaneError::Conflict(context.to_string()),
        StatusCode::TOO_MANY_REQUESTS => ControlPlaneError::RateLimited(context.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ControlPlaneError::PermissionDenied(context.to_string())
        }
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            ControlPlaneError::InvalidConfiguration(context.to_string())
        }
        other => ControlPlaneError::Transient(format!("{context}: status {other}")),
    }
}

impl LifecycleClient for HttpLifecycleClient {
    fn describe<'a>(&'a self, primary_id: &'a str) -> LifecycleFuture<'a, ReplicaTopology> {
        Box::pin(async move {
            let (status, body) = self
                .request(Method::GET, format!("/instances/{primary_id}"), None)
                .await?;

            if !status.is_success() {
                return Err(map_status(status, primary_id));
            }

            let parsed: DescribeResponse = serde_json::from_slice(&body).map_err(|e| {
                ControlPlaneError::Transient(format!("malformed describe response: {e}"))
            })?;

            Ok(ReplicaTopology {
                primary_id: parsed.primary_id,
                replicas: parsed.replicas,
                observed_at: epoch_secs(),
            })
        })
    }

    fn create_replica<'a>(&'a self, req: CreateReplicaRequest) -> LifecycleFuture<'a, ()> {
        Box::pin(async move {
            let body = serde_json::to_vec(&CreateReplicaBody {
                replica_id: req.new_id.clone(),
                instance_class: req.instance_class.clone(),
                placement_hint: req.placement_hint.clone(),
            })
            .map_err(|e| ControlPlaneError::InvalidConfiguration(e.to_string()))?;

            let (status, _) = self
                .request(
                    Method::POST,
                    format!("/instances/{}/replicas", req.source_id),
                    Some(body),
                )
                .await?;

            if !status.is_success() {
                return Err(map_status(status, &req.new_id));
            }
            Ok(())
        })
    }

    fn delete_replica<'a>(&'a self, replica_id: &'a str) -> LifecycleFuture<'a, ()> {
        Box::pin(async move {
            let (status, _) = self
                .request(Method::DELETE, format!("/replicas/{replica_id}"), None)
                .await?;

            if !status.is_success() {
                return Err(map_status(status, replica_id));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps() {
        assert_eq!(
            map_status(StatusCode::NOT_FOUND, "orders-db"),
            ControlPlaneError::NotFound("orders-db".into())
        );
    }

    #[test]
    fn conflict_maps() {
        assert!(matches!(
            map_status(StatusCode::CONFLICT, "r1"),
            ControlPlaneError::Conflict(_)
        ));
    }

    #[test]
    fn throttling_maps_to_rate_limited() {
        assert!(matches!(
            map_status(StatusCode::TOO_MANY_REQUESTS, "r1"),
            ControlPlaneError::RateLimited(_)
        ));
    }

    #[test]
    fn auth_failures_map_to_permission_denied() {
        assert!(matches!(
            map_status(StatusCode::UNAUTHORIZED, "r1"),
            ControlPlaneError::PermissionDenied(_)
        ));
        assert!(matches!(
            map_status(StatusCode::FORBIDDEN, "r1"),
            ControlPlaneError::PermissionDenied(_)
        ));
    }

    #[test]
    fn client_errors_map_to_invalid_configuration() {
        assert!(matches!(
            map_status(StatusCode::BAD_REQUEST, "r1"),
            ControlPlaneError::InvalidConfiguration(_)
        ));
        assert!(matches!(
            map_status(StatusCode::UNPROCESSABLE_ENTITY, "r1"),
            ControlPlaneError::InvalidConfiguration(_)
        ));
    }

    #[test]
    fn server_errors_map_to_transient() {
        assert!(matches!(
            map_status(StatusCode::INTERNAL_SERVER_ERROR, "r1"),
            ControlPlaneError::Transient(_)
        ));
        assert!(matches!(
            map_status(StatusCode::SERVICE_UNAVAILABLE, "r1"),
            ControlPlaneError::Transient(_)
        ));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transient() {
        // Nothing listens on loopback port 1; the connect is refused.
        let client = HttpLifecycleClient::new("127.0.0.1:1");
        let result = client.describe("orders-db").await;
        assert!(matches!(result, Err(ControlPlaneError::Transient(_))));
    }

    #[test]
    fn describe_response_parses() {
        let json = r#"{"primary_id":"orders-db","replicas":[{"id":"r1","created_at":100}]}"#;
        let parsed: DescribeResponse = serde_json::from_slice(json.as_bytes()).unwrap();
        assert_eq!(parsed.primary_id, "orders-db");
        assert_eq!(parsed.replicas.len(), 1);
    }
}

//! Endpoint client — talks to a peer's endpoint over its Unix socket.
//!
//! One HTTP/1.1 connection per request, driven by `hyper`. Error bodies
//! are decoded back into the [`BusError`] the peer reported.

use std::path::PathBuf;

use hyper::body::Bytes;
use hyper_util::rt::TokioIo;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::net::UnixStream;
use tracing::{debug, warn};

use super::types::*;
use crate::bus::status::{BusError, BusResult};

/// Client for a single peer endpoint.
#[derive(Debug, Clone)]
pub struct EndpointClient {
    socket_path: PathBuf,
}

impl EndpointClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    async fn request(&self, method: hyper::Method, path: &str, body: Option<Vec<u8>>) -> BusResult<Bytes> {
        let stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
            BusError::Transport(format!(
                "failed to connect to {}: {e}",
                self.socket_path.display()
            ))
        })?;

        let (mut sender, conn) =
            hyper::client::conn::http1::handshake::<_, http_body_util::Full<Bytes>>(TokioIo::new(
                stream,
            ))
            .await
            .map_err(|e| BusError::Transport(format!("HTTP handshake failed: {e}")))?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                warn!(error = %e, "endpoint connection error");
            }
        });

        debug!(%method, path, socket = %self.socket_path.display(), "endpoint request");

        let mut builder = hyper::Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost");
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let req = builder
            .body(http_body_util::Full::new(Bytes::from(body.unwrap_or_default())))
            .map_err(|e| BusError::Transport(format!("failed to build request: {e}")))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| BusError::Transport(format!("request failed: {e}")))?;
        let status = resp.status();

        let bytes = http_body_util::BodyExt::collect(resp.into_body())
            .await
            .map_err(|e| BusError::Transport(format!("failed to read response body: {e}")))?
            .to_bytes();

        if !status.is_success() {
            return Err(match serde_json::from_slice::<ErrorResponse>(&bytes) {
                Ok(err) => err.error,
                Err(_) => BusError::Transport(format!("unexpected status: {status}")),
            });
        }
        Ok(bytes)
    }

    async fn post<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        path: &str,
        req: &Req,
    ) -> BusResult<Resp> {
        let body = serde_json::to_vec(req)
            .map_err(|e| BusError::Protocol(format!("failed to encode {path}: {e}")))?;
        let bytes = self.request(hyper::Method::POST, path, Some(body)).await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| BusError::Protocol(format!("failed to decode {path}: {e}")))
    }

    pub async fn ping(&self) -> BusResult<PingResponse> {
        let bytes = self.request(hyper::Method::GET, "/ping", None).await?;
        serde_json::from_slice(&bytes).map_err(|e| BusError::Protocol(format!("ping: {e}")))
    }

    pub async fn join(&self, req: &JoinRequest) -> BusResult<JoinResponse> {
        self.post("/session/join", req).await
    }

    pub async fn leave(&self, req: &LeaveRequest) -> BusResult<LeaveResponse> {
        self.post("/session/leave", req).await
    }

    pub async fn call(&self, req: &CallRequest) -> BusResult<CallResponse> {
        self.post("/call", req).await
    }
}

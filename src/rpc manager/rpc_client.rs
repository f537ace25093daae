//! JSON-RPC 2.0 transport over HTTP
//!
//! Talks to a single trusted endpoint. Three calls are needed by the
//! dispatch engine: `query` (access key view), `broadcast_tx_async` and
//! `EXPERIMENTAL_tx_status`, the latter waiting for all receipts of the
//! transaction, not just the first block.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use super::rpc_errors::{RpcError, RpcResult};
use super::RpcTransport;
use crate::metrics::metrics;
use crate::tx_builder::SignedTransaction;
use crate::types::{AccessKeyView, ConfirmedTx, CryptoHash, PublicKey, TxHash};

/// HTTP JSON-RPC client for one endpoint
#[derive(Debug, Clone)]
pub struct JsonRpcTransport {
    http: Client,
    url: String,
    timeout: Duration,
}

impl JsonRpcTransport {
    /// Create a transport for `url` with a per-request timeout
    pub fn new(url: impl Into<String>, timeout: Duration) -> RpcResult<Self> {
        let url = url.into();
        let http = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(50)
            .build()
            .map_err(|e| RpcError::Transport {
                endpoint: url.clone(),
                message: e.to_string(),
            })?;

        Ok(Self { http, url, timeout })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue one JSON-RPC call and return its `result` member
    async fn call(&self, method: &str, params: Value, hash: Option<&str>) -> RpcResult<Value> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": "dontcare",
            "method": method,
            "params": params,
        });

        let started = Instant::now();
        let response = self.http.post(&self.url).json(&payload).send().await;
        metrics()
            .rpc_latency
            .with_label_values(&[method])
            .observe(started.elapsed().as_secs_f64());

        let timeout_ms = self.timeout.as_millis() as u64;
        let response = response.map_err(|e| RpcError::from_http_error(e, &self.url, timeout_ms))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RpcError::from_http_error(e, &self.url, timeout_ms))?;
        trace!(method, %status, body_len = body.len(), "RPC response received");

        // Error bodies are JSON-RPC objects even on non-2xx replies; fall
        // back to the HTTP status only when the body is not JSON at all.
        let envelope: Value = match serde_json::from_str(&body) {
            Ok(v) => v,
            Err(_) if !status.is_success() => {
                return Err(RpcError::RpcResponse {
                    endpoint: self.url.clone(),
                    code: Some(i64::from(status.as_u16())),
                    name: None,
                    cause: None,
                    message: body,
                });
            }
            Err(e) => {
                return Err(RpcError::InvalidResponse(format!(
                    "{} returned non-JSON body: {}",
                    method, e
                )))
            }
        };

        if let Some(error) = envelope.get("error") {
            return Err(RpcError::from_error_object(&self.url, error, hash));
        }

        envelope
            .get("result")
            .cloned()
            .ok_or_else(|| RpcError::InvalidResponse(format!("{} response has no result", method)))
    }
}

#[async_trait]
impl RpcTransport for JsonRpcTransport {
    async fn view_access_key(
        &self,
        account_id: &str,
        public_key: &PublicKey,
    ) -> RpcResult<AccessKeyView> {
        let params = json!({
            "request_type": "view_access_key",
            "finality": "final",
            "account_id": account_id,
            "public_key": public_key.to_string(),
        });
        let result = self.call("query", params, None).await?;

        // Query errors may also come back inside an otherwise successful result
        if let Some(error) = result.get("error").and_then(Value::as_str) {
            return Err(RpcError::RpcResponse {
                endpoint: self.url.clone(),
                code: None,
                name: Some("QUERY_ERROR".to_string()),
                cause: None,
                message: error.to_string(),
            });
        }

        let nonce = result
            .get("nonce")
            .and_then(Value::as_u64)
            .ok_or_else(|| RpcError::InvalidResponse("access key view without nonce".into()))?;
        let block_hash: CryptoHash = result
            .get("block_hash")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::InvalidResponse("access key view without block_hash".into()))?
            .parse()
            .map_err(RpcError::InvalidResponse)?;

        debug!(account_id, nonce, %block_hash, "Fetched access key");
        Ok(AccessKeyView { nonce, block_hash })
    }

    async fn broadcast_tx_async(&self, tx: &SignedTransaction) -> RpcResult<TxHash> {
        let encoded = tx
            .to_base64()
            .map_err(|e| RpcError::Encoding(e.to_string()))?;
        let result = self.call("broadcast_tx_async", json!([encoded]), None).await?;

        result
            .as_str()
            .ok_or_else(|| RpcError::InvalidResponse("broadcast result is not a hash".into()))?
            .parse()
            .map_err(RpcError::InvalidResponse)
    }

    async fn tx_status(&self, hash: &TxHash, sender_id: &str) -> RpcResult<ConfirmedTx> {
        let hash_str = hash.to_string();
        let result = self
            .call(
                "EXPERIMENTAL_tx_status",
                json!([hash_str, sender_id]),
                Some(&hash_str),
            )
            .await?;

        let status = result
            .get("status")
            .cloned()
            .ok_or_else(|| RpcError::InvalidResponse("tx status without status".into()))?;
        let final_hash = result
            .pointer("/transaction/hash")
            .and_then(Value::as_str)
            .unwrap_or(&hash_str)
            .to_string();
        let block_hash = result
            .pointer("/transaction_outcome/block_hash")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::InvalidResponse("tx status without block hash".into()))?
            .to_string();

        Ok(ConfirmedTx {
            status,
            hash: final_hash,
            block_hash,
        })
    }
}

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

/// Error cause the node reports for a hash it has not seen (yet)
const UNKNOWN_TRANSACTION_CAUSE: &str = "UNKNOWN_TRANSACTION";

/// Older nodes only return a message; this is the shape of it
static LEGACY_NOT_FOUND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[-32000\].* Transaction .* doesn't exist").expect("valid regex")
});

/// Comprehensive RPC error types
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    /// The node does not know this transaction hash (yet)
    #[error("Transaction {hash} doesn't exist (endpoint: {endpoint})")]
    UnknownTransaction {
        endpoint: String,
        hash: String,
    },

    /// Transport-level errors (network, connection, HTTP)
    #[error("Transport error: {message} (endpoint: {endpoint})")]
    Transport {
        endpoint: String,
        message: String,
    },

    /// Timeout errors
    #[error("Timeout after {timeout_ms}ms (endpoint: {endpoint})")]
    Timeout {
        endpoint: String,
        timeout_ms: u64,
    },

    /// RPC response errors (from the RPC server)
    #[error("RPC response error: {message} (endpoint: {endpoint}, code: {code:?}, cause: {cause:?})")]
    RpcResponse {
        endpoint: String,
        code: Option<i64>,
        name: Option<String>,
        cause: Option<String>,
        message: String,
    },

    /// Response did not have the expected shape
    #[error("Invalid RPC response: {0}")]
    InvalidResponse(String),

    /// Transaction could not be put on the wire
    #[error("Failed to encode transaction: {0}")]
    Encoding(String),
}

/// Result type for RPC operations
pub type RpcResult<T> = Result<T, RpcError>;

impl RpcError {
    /// The "not yet visible" condition the confirmation resolver retries on
    pub fn is_not_found(&self) -> bool {
        matches!(self, RpcError::UnknownTransaction { .. })
    }

    /// Get the endpoint associated with this error, if any
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            RpcError::UnknownTransaction { endpoint, .. } => Some(endpoint),
            RpcError::Transport { endpoint, .. } => Some(endpoint),
            RpcError::Timeout { endpoint, .. } => Some(endpoint),
            RpcError::RpcResponse { endpoint, .. } => Some(endpoint),
            _ => None,
        }
    }

    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            RpcError::UnknownTransaction { .. } => "not_found",
            RpcError::Transport { .. } => "transport",
            RpcError::Timeout { .. } => "timeout",
            RpcError::RpcResponse { .. } => "response",
            RpcError::InvalidResponse(_) => "invalid_response",
            RpcError::Encoding(_) => "encoding",
        }
    }

    /// Classify a JSON-RPC `error` object.
    ///
    /// Structured nodes report `cause.name == "UNKNOWN_TRANSACTION"`. Nodes
    /// that only send a code and message are matched against the legacy
    /// `[-32000] ... Transaction ... doesn't exist` text.
    pub fn from_error_object(endpoint: &str, error: &Value, hash: Option<&str>) -> Self {
        let code = error.get("code").and_then(Value::as_i64);
        let name = error
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string);
        let cause = error
            .get("cause")
            .and_then(|c| c.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        let data = match error.get("data") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };

        let legacy_text = format!("[{}] {}: {}", code.unwrap_or_default(), message, data);
        let not_found = cause.as_deref() == Some(UNKNOWN_TRANSACTION_CAUSE)
            || LEGACY_NOT_FOUND.is_match(&legacy_text);

        if not_found {
            return RpcError::UnknownTransaction {
                endpoint: endpoint.to_string(),
                hash: hash.unwrap_or("unknown").to_string(),
            };
        }

        let message = if data.is_empty() {
            message
        } else {
            format!("{}: {}", message, data)
        };
        RpcError::RpcResponse {
            endpoint: endpoint.to_string(),
            code,
            name,
            cause,
            message,
        }
    }

    /// Create from a reqwest error with context
    pub fn from_http_error(err: reqwest::Error, endpoint: &str, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            RpcError::Timeout {
                endpoint: endpoint.to_string(),
                timeout_ms,
            }
        } else {
            RpcError::Transport {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_structured_unknown_transaction() {
        let error = json!({
            "name": "HANDLER_ERROR",
            "cause": { "name": "UNKNOWN_TRANSACTION", "info": {} },
            "code": -32000,
            "message": "Server error",
        });
        let err = RpcError::from_error_object("http://rpc", &error, Some("abc"));
        assert!(err.is_not_found());
        assert_eq!(err.category(), "not_found");
        assert_eq!(err.endpoint(), Some("http://rpc"));
    }

    #[test]
    fn test_legacy_message_unknown_transaction() {
        let error = json!({
            "code": -32000,
            "message": "Server error",
            "data": "Transaction 9Y3kZ doesn't exist",
        });
        let err = RpcError::from_error_object("http://rpc", &error, None);
        assert!(err.is_not_found());
    }

    #[test]
    fn test_other_errors_are_not_not_found() {
        let error = json!({
            "name": "HANDLER_ERROR",
            "cause": { "name": "INVALID_TRANSACTION" },
            "code": -32000,
            "message": "Server error",
            "data": "InvalidNonce",
        });
        let err = RpcError::from_error_object("http://rpc", &error, None);
        assert!(!err.is_not_found());
        match err {
            RpcError::RpcResponse { code, cause, message, .. } => {
                assert_eq!(code, Some(-32000));
                assert_eq!(cause.as_deref(), Some("INVALID_TRANSACTION"));
                assert!(message.contains("InvalidNonce"));
            }
            other => panic!("Expected RpcResponse, got {:?}", other),
        }
    }

    #[test]
    fn test_timeout_display() {
        let err = RpcError::Timeout {
            endpoint: "http://rpc".to_string(),
            timeout_ms: 30_000,
        };
        assert_eq!(err.to_string(), "Timeout after 30000ms (endpoint: http://rpc)");
        assert!(!err.is_not_found());
        assert_eq!(err.endpoint(), Some("http://rpc"));
        assert_eq!(RpcError::InvalidResponse("garbage".into()).endpoint(), None);
    }
}

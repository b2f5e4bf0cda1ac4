//! Remote coordination service client
//!
//! The coordination service collects confirmations from every co-signer and
//! is the authoritative source of truth when configured for the active
//! chain. The engine consumes it through the [`CoordinationService`] trait;
//! [`HttpCoordinationService`] is the JSON-RPC implementation.
//!
//! Transport failures are always surfaced as
//! [`EngineError::RemoteServiceUnavailable`], never flattened into "zero
//! confirmations" — a ready operation must not be demoted by a flaky fetch.

use async_trait::async_trait;
use base64::Engine as _;
use covault_types::{
    AccAddress, Confirmation, EngineError, Operation, OperationHash, Result,
};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// One confirmation as reported by the service
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteConfirmation {
    pub signer: String,
    /// Base64 signature bytes
    pub signature: String,
}

/// The service's view of one operation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteOperationView {
    pub operation_hash: OperationHash,
    pub confirmations: Vec<RemoteConfirmation>,
    pub is_executed: bool,
    pub execution_tx_hash: Option<String>,
}

impl RemoteOperationView {
    /// Decode the reported confirmations into engine types, one entry per
    /// signer. A service that stores one row per confirm call may report the
    /// same signer twice; the latest row wins so a re-confirming signer never
    /// counts double toward quorum. Entries with an unparseable signer are
    /// dropped rather than failing the whole view.
    pub fn decoded_confirmations(&self) -> Vec<Confirmation> {
        let mut by_signer: Vec<Confirmation> = Vec::with_capacity(self.confirmations.len());
        for c in &self.confirmations {
            let signer: AccAddress = match c.signer.parse() {
                Ok(signer) => signer,
                Err(_) => continue,
            };
            let signature = base64::engine::general_purpose::STANDARD
                .decode(&c.signature)
                .unwrap_or_default();
            let confirmation = Confirmation {
                operation_hash: self.operation_hash.clone(),
                signer,
                signature,
                observed_at: chrono::Utc::now(),
            };
            if let Some(existing) = by_signer.iter_mut().find(|e| e.signer == signer) {
                *existing = confirmation;
            } else {
                by_signer.push(confirmation);
            }
        }
        by_signer
    }
}

/// Operations the coordination service must expose
#[async_trait]
pub trait CoordinationService: Send + Sync {
    /// Register a new operation together with the proposer's confirmation
    async fn propose(&self, operation: &Operation, confirmation: &Confirmation) -> Result<()>;

    /// Fetch the service's current view of an operation
    async fn get_operation(&self, hash: &OperationHash) -> Result<RemoteOperationView>;

    /// Add one co-signer confirmation
    async fn confirm(&self, hash: &OperationHash, confirmation: &Confirmation) -> Result<()>;

    /// All pending operations for an account
    async fn list_pending(&self, account: &AccAddress) -> Result<Vec<RemoteOperationView>>;
}

/// RPC request envelope
#[derive(Serialize)]
struct RpcRequest {
    jsonrpc: String,
    id: String,
    method: String,
    params: serde_json::Value,
}

/// RPC response envelope
#[derive(Deserialize)]
struct RpcResponse<T> {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: String,
    result: Option<T>,
    error: Option<RpcError>,
}

/// RPC error payload
#[derive(Deserialize)]
struct RpcError {
    code: i32,
    message: String,
}

/// HTTP client for a coordination service endpoint
pub struct HttpCoordinationService {
    endpoint: Url,
    http_client: HttpClient,
}

impl HttpCoordinationService {
    /// Create a client for the given endpoint
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| EngineError::RemoteServiceUnavailable(format!("invalid endpoint: {e}")))?;
        let http_client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::RemoteServiceUnavailable(e.to_string()))?;
        Ok(Self {
            endpoint,
            http_client,
        })
    }

    /// Make an RPC request against the service
    async fn rpc_request<T>(&self, method: &str, params: serde_json::Value) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let request = RpcRequest {
            jsonrpc: "2.0".to_string(),
            id: "1".to_string(),
            method: method.to_string(),
            params,
        };

        let response = self
            .http_client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::RemoteServiceUnavailable(e.to_string()))?;

        let rpc_response: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| EngineError::RemoteServiceUnavailable(e.to_string()))?;

        if let Some(error) = rpc_response.error {
            return Err(EngineError::RemoteServiceUnavailable(format!(
                "rpc error {}: {}",
                error.code, error.message
            )));
        }

        rpc_response.result.ok_or_else(|| {
            EngineError::RemoteServiceUnavailable("missing result field".to_string())
        })
    }
}

#[async_trait]
impl CoordinationService for HttpCoordinationService {
    async fn propose(&self, operation: &Operation, confirmation: &Confirmation) -> Result<()> {
        let params = serde_json::json!({
            "operation": {
                "account": operation.account.to_string(),
                "chain_id": operation.chain_id,
                "to": operation.to.to_string(),
                "value": operation.value.to_string(),
                "payload": base64::engine::general_purpose::STANDARD.encode(&operation.payload),
                "call_type": operation.call_type,
                "nonce": operation.nonce,
            },
            "confirmation": {
                "signer": confirmation.signer.to_string(),
                "signature":
                    base64::engine::general_purpose::STANDARD.encode(&confirmation.signature),
            },
        });
        let _: serde_json::Value = self.rpc_request("propose", params).await?;
        Ok(())
    }

    async fn get_operation(&self, hash: &OperationHash) -> Result<RemoteOperationView> {
        let params = serde_json::json!({ "hash": hash });
        self.rpc_request("get_operation", params).await
    }

    async fn confirm(&self, hash: &OperationHash, confirmation: &Confirmation) -> Result<()> {
        let params = serde_json::json!({
            "hash": hash,
            "signer": confirmation.signer.to_string(),
            "signature": base64::engine::general_purpose::STANDARD.encode(&confirmation.signature),
        });
        let _: serde_json::Value = self.rpc_request("confirm", params).await?;
        Ok(())
    }

    async fn list_pending(&self, account: &AccAddress) -> Result<Vec<RemoteOperationView>> {
        let params = serde_json::json!({ "account": account.to_string() });
        self.rpc_request("list_pending", params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_endpoint() {
        let result = HttpCoordinationService::new("not a url", Duration::from_secs(5));
        assert!(matches!(
            result,
            Err(EngineError::RemoteServiceUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_service_surfaces_unavailable() {
        // nothing listens on this port
        let service =
            HttpCoordinationService::new("http://127.0.0.1:19", Duration::from_millis(200))
                .unwrap();
        let err = service
            .get_operation(&OperationHash::new("AB".repeat(32)))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::RemoteServiceUnavailable(_)));
    }

    #[test]
    fn test_decoded_confirmations_skip_bad_signers() {
        let hash = OperationHash::new("CD".repeat(32));
        let good = AccAddress::from_pubkey(&[3u8; 33]);
        let view = RemoteOperationView {
            operation_hash: hash,
            confirmations: vec![
                RemoteConfirmation {
                    signer: good.to_string(),
                    signature: base64::engine::general_purpose::STANDARD.encode([1u8; 64]),
                },
                RemoteConfirmation {
                    signer: "garbage".to_string(),
                    signature: String::new(),
                },
            ],
            is_executed: false,
            execution_tx_hash: None,
        };
        let decoded = view.decoded_confirmations();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].signer, good);
    }

    #[test]
    fn test_decoded_confirmations_keep_one_entry_per_signer() {
        let hash = OperationHash::new("EF".repeat(32));
        let signer = AccAddress::from_pubkey(&[4u8; 33]);
        let view = RemoteOperationView {
            operation_hash: hash,
            confirmations: vec![
                RemoteConfirmation {
                    signer: signer.to_string(),
                    signature: base64::engine::general_purpose::STANDARD.encode([1u8; 64]),
                },
                RemoteConfirmation {
                    signer: signer.to_string(),
                    signature: base64::engine::general_purpose::STANDARD.encode([2u8; 64]),
                },
            ],
            is_executed: false,
            execution_tx_hash: None,
        };
        let decoded = view.decoded_confirmations();
        // the re-confirmation replaces the first entry
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].signature, vec![2u8; 64]);
    }
}

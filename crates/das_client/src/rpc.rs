//! JSON-RPC client for a single committee member.

use crate::hexutil;
use crate::{parse_url, ClientError};
use async_trait::async_trait;
use das_schema::pretty::first_few_bytes;
use das_schema::{
    bls, DataAvailabilityCertificate, DataAvailabilityStatus, DataAvailabilityWriter,
    ExpirationPolicy, Hash32,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// JSON-RPC request structure.
#[derive(Serialize)]
struct JsonRpcRequest<T> {
    jsonrpc: &'static str,
    id: u64,
    method: String,
    params: T,
}

/// JSON-RPC response structure.
#[derive(Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Result of `das_store` as returned by a committee member.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreResult {
    #[serde(with = "hexutil::bytes")]
    pub data_hash: Vec<u8>,
    #[serde(with = "hexutil::quantity")]
    pub timeout: u64,
    #[serde(with = "hexutil::quantity")]
    pub signers_mask: u64,
    #[serde(with = "hexutil::bytes")]
    pub keyset_hash: Vec<u8>,
    #[serde(with = "hexutil::bytes")]
    pub sig: Vec<u8>,
    #[serde(with = "hexutil::quantity")]
    pub version: u64,
}

impl StoreResult {
    /// Convert into a certificate carrying this member's partial signature.
    pub fn into_certificate(self) -> Result<DataAvailabilityCertificate, ClientError> {
        let sig = bls::signature_from_bytes(&self.sig)
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        let version = u8::try_from(self.version)
            .map_err(|_| ClientError::InvalidResponse(format!("version {}", self.version)))?;
        Ok(DataAvailabilityCertificate {
            data_hash: to_hash32(&self.data_hash, "dataHash")?,
            timeout: self.timeout,
            signers_mask: self.signers_mask,
            sig,
            keyset_hash: to_hash32(&self.keyset_hash, "keysetHash")?,
            version,
        })
    }

    pub fn from_certificate(cert: &DataAvailabilityCertificate) -> Self {
        Self {
            data_hash: cert.data_hash.to_vec(),
            timeout: cert.timeout,
            signers_mask: cert.signers_mask,
            keyset_hash: cert.keyset_hash.to_vec(),
            sig: cert.sig.to_bytes().to_vec(),
            version: u64::from(cert.version),
        }
    }
}

fn to_hash32(bytes: &[u8], field: &str) -> Result<Hash32, ClientError> {
    bytes
        .try_into()
        .map_err(|_| ClientError::InvalidResponse(format!("{} must be 32 bytes", field)))
}

/// JSON-RPC client for a committee member's `das_*` namespace.
#[derive(Clone)]
pub struct DasRpcClient {
    client: reqwest::Client,
    url: String,
    request_id: Arc<AtomicU64>,
}

impl DasRpcClient {
    /// Create a client for the member at `url`.
    pub fn new(url: &str) -> Result<Self, ClientError> {
        Self::build(url, reqwest::Client::new())
    }

    /// Create a client whose every call is bounded by `timeout`.
    pub fn with_timeout(url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Self::build(url, client)
    }

    fn build(url: &str, client: reqwest::Client) -> Result<Self, ClientError> {
        parse_url(url)?;
        Ok(Self {
            client,
            url: url.to_string(),
            request_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Call `method`, returning its (possibly null) result.
    async fn call_raw<P: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: P,
    ) -> Result<Option<R>, ClientError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id(),
            method: method.to_string(),
            params,
        };

        debug!("Calling {} on {}", method, self.url);

        let response = self.client.post(&self.url).json(&request).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Status(response.status().as_u16()));
        }

        let json: JsonRpcResponse<R> = response.json().await?;

        if let Some(error) = json.error {
            return Err(ClientError::JsonRpc {
                code: error.code,
                message: error.message,
            });
        }

        Ok(json.result)
    }

    async fn call<P: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: P,
    ) -> Result<R, ClientError> {
        self.call_raw(method, params)
            .await?
            .ok_or_else(|| ClientError::InvalidResponse("no result in response".to_string()))
    }

    /// Raw `das_store` call.
    pub async fn store_raw(
        &self,
        message: &[u8],
        timeout: u64,
        sig: &[u8],
    ) -> Result<StoreResult, ClientError> {
        trace!(
            message = %first_few_bytes(message),
            timeout,
            sig = %first_few_bytes(sig),
            "das_store on {}",
            self.url
        );
        let params = serde_json::json!([
            hexutil::encode_bytes(message),
            hexutil::encode_quantity(timeout),
            hexutil::encode_bytes(sig),
        ]);
        self.call("das_store", params).await
    }
}

impl fmt::Display for DasRpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DasRpcClient{{url:{}}}", self.url)
    }
}

#[async_trait]
impl DataAvailabilityWriter for DasRpcClient {
    async fn store(
        &self,
        message: &[u8],
        timeout: u64,
        sig: &[u8],
    ) -> das_schema::Result<DataAvailabilityCertificate> {
        let result = self.store_raw(message, timeout, sig).await?;
        Ok(result.into_certificate()?)
    }
}

#[async_trait]
impl DataAvailabilityStatus for DasRpcClient {
    async fn health_check(&self) -> das_schema::Result<()> {
        let params: [u8; 0] = [];
        self.call_raw::<_, serde_json::Value>("das_healthCheck", params)
            .await?;
        Ok(())
    }

    async fn expiration_policy(&self) -> das_schema::Result<ExpirationPolicy> {
        let params: [u8; 0] = [];
        let policy: String = self.call("das_expirationPolicy", params).await?;
        policy.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use das_schema::{content_hash, DasError, CERTIFICATE_VERSION};
    use serde_json::{json, Value};

    const SIGNER_IKM: [u8; 32] = [42u8; 32];

    async fn handle(Json(req): Json<Value>) -> Json<Value> {
        let id = req["id"].clone();
        let method = req["method"].as_str().unwrap_or_default();
        let params = req["params"].as_array().cloned().unwrap_or_default();
        let response = match method {
            "das_store" => {
                let message =
                    hex::decode(params[0].as_str().unwrap().trim_start_matches("0x")).unwrap();
                let timeout =
                    u64::from_str_radix(params[1].as_str().unwrap().trim_start_matches("0x"), 16)
                        .unwrap();
                let (_, sk) = bls::keys_from_ikm(&SIGNER_IKM).unwrap();
                let data_hash = content_hash(&message);
                let sig = bls::sign(
                    &sk,
                    &DataAvailabilityCertificate::signable_message(&data_hash, timeout),
                );
                let cert = DataAvailabilityCertificate {
                    data_hash,
                    timeout,
                    signers_mask: 1,
                    sig,
                    keyset_hash: [0u8; 32],
                    version: CERTIFICATE_VERSION,
                };
                json!({"jsonrpc": "2.0", "id": id, "result": StoreResult::from_certificate(&cert)})
            }
            "das_healthCheck" => json!({"jsonrpc": "2.0", "id": id, "result": null}),
            "das_expirationPolicy" => {
                json!({"jsonrpc": "2.0", "id": id, "result": "DiscardAfterDataTimeout"})
            }
            _ => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": -32601, "message": "method not found"}
            }),
        };
        Json(response)
    }

    async fn spawn_member() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = Router::new().route("/", post(handle));
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn test_store_returns_partial_certificate() {
        let url = spawn_member().await;
        let client = DasRpcClient::new(&url).unwrap();

        let cert = client.store(b"batch", 1234, b"reqsig").await.unwrap();
        assert_eq!(cert.data_hash, content_hash(b"batch"));
        assert_eq!(cert.timeout, 1234);
        assert_eq!(cert.signers_mask, 1);

        let (pk, _) = bls::keys_from_ikm(&SIGNER_IKM).unwrap();
        assert!(bls::verify(&cert.sig, &cert.signable_fields(), &pk));
    }

    #[tokio::test]
    async fn test_health_and_expiration_policy() {
        let url = spawn_member().await;
        let client = DasRpcClient::new(&url).unwrap();

        client.health_check().await.unwrap();
        assert_eq!(
            client.expiration_policy().await.unwrap(),
            ExpirationPolicy::DiscardAfterDataTimeout
        );
    }

    #[tokio::test]
    async fn test_unreachable_member_is_transport_error() {
        // Bind then drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client =
            DasRpcClient::with_timeout(&format!("http://{}/", addr), Duration::from_secs(2))
                .unwrap();
        let err = client.health_check().await.unwrap_err();
        assert!(matches!(err, DasError::Transport(_)));
    }

    #[test]
    fn test_store_result_rejects_short_hash() {
        let (_, sk) = bls::keys_from_ikm(&SIGNER_IKM).unwrap();
        let result = StoreResult {
            data_hash: vec![1, 2, 3],
            timeout: 1,
            signers_mask: 1,
            keyset_hash: vec![0u8; 32],
            sig: bls::sign(&sk, b"x").to_bytes().to_vec(),
            version: 1,
        };
        assert!(matches!(
            result.into_certificate(),
            Err(ClientError::InvalidResponse(_))
        ));
    }
}

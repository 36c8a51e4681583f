//! REST client for retrieving data from a committee member's read endpoint.

use crate::{parse_url, ClientError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use das_schema::pretty::pretty_hash;
use das_schema::{DataAvailabilityReader, DataAvailabilityStatus, ExpirationPolicy, Hash32};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::trace;

pub const GET_BY_HASH_PATH: &str = "/get-by-hash/";
pub const HEALTH_PATH: &str = "/health";
pub const EXPIRATION_POLICY_PATH: &str = "/expiration-policy";

/// Response body shared by every REST endpoint.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RestfulDasServerResponse {
    /// Base64 encoded blob.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub health: String,
    #[serde(
        default,
        rename = "expirationPolicy",
        skip_serializing_if = "String::is_empty"
    )]
    pub expiration_policy: String,
}

/// REST reader for one committee member.
#[derive(Clone)]
pub struct RestfulDasClient {
    client: reqwest::Client,
    base_url: String,
}

impl RestfulDasClient {
    /// Create a new client with the given base URL.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::build(base_url, reqwest::Client::new())
    }

    /// Create a client whose every call is bounded by `timeout`.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Self::build(base_url, client)
    }

    fn build(base_url: &str, client: reqwest::Client) -> Result<Self, ClientError> {
        parse_url(base_url)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json(&self, path: &str) -> Result<RestfulDasServerResponse, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).send().await?;
        match response.status() {
            reqwest::StatusCode::NOT_FOUND => Err(ClientError::NotFound),
            status if !status.is_success() => Err(ClientError::Status(status.as_u16())),
            _ => Ok(response.json().await?),
        }
    }

    /// Fetch the blob stored under `hash`. The content is not validated here.
    pub async fn fetch(&self, hash: &Hash32) -> Result<Vec<u8>, ClientError> {
        trace!(key = %pretty_hash(hash), "get-by-hash from {}", self.base_url);
        let path = format!("{}{}", GET_BY_HASH_PATH, hex::encode(hash));
        let body = self.get_json(&path).await?;
        BASE64
            .decode(&body.data)
            .map_err(|e| ClientError::InvalidResponse(format!("invalid base64 data: {}", e)))
    }
}

impl fmt::Display for RestfulDasClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RestfulDasClient{{url:{}}}", self.base_url)
    }
}

#[async_trait]
impl DataAvailabilityStatus for RestfulDasClient {
    async fn health_check(&self) -> das_schema::Result<()> {
        self.get_json(HEALTH_PATH).await?;
        Ok(())
    }

    async fn expiration_policy(&self) -> das_schema::Result<ExpirationPolicy> {
        let body = self.get_json(EXPIRATION_POLICY_PATH).await?;
        body.expiration_policy.parse()
    }
}

#[async_trait]
impl DataAvailabilityReader for RestfulDasClient {
    async fn get_by_hash(&self, hash: &Hash32) -> das_schema::Result<Vec<u8>> {
        Ok(self.fetch(hash).await?)
    }
}

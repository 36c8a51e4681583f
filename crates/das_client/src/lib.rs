//! Clients for individual DA committee members.
//!
//! This crate provides the transport-level stubs the aggregators fan out to:
//! - [`DasRpcClient`]: JSON-RPC client for storing data and querying health
//!   and expiration policy of a committee member
//! - [`RestfulDasClient`]: REST client for retrieving data by hash
//!
//! Neither client retries; redundancy is the aggregators' job.

mod hexutil;
pub mod rest;
pub mod rpc;

use das_schema::DasError;
use thiserror::Error;

pub use rest::RestfulDasClient;
pub use rpc::{DasRpcClient, StoreResult};

/// Errors that can occur when talking to a committee member.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("JSON-RPC error: code={code}, message={message}")]
    JsonRpc { code: i64, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("blob not found")]
    NotFound,
}

impl From<ClientError> for DasError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::NotFound => DasError::NotFound,
            ClientError::InvalidResponse(msg) => DasError::Encoding(msg),
            ClientError::InvalidUrl(msg) => DasError::Config(msg),
            other => DasError::Transport(other.to_string()),
        }
    }
}

fn parse_url(url: &str) -> Result<reqwest::Url, ClientError> {
    reqwest::Url::parse(url).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", url, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use das_schema::ErrorKind;

    #[test]
    fn test_error_conversion() {
        assert!(DasError::from(ClientError::NotFound).is_not_found());
        assert_eq!(
            DasError::from(ClientError::Status(500)).kind(),
            ErrorKind::Transport
        );
        assert_eq!(
            DasError::from(ClientError::JsonRpc {
                code: -32000,
                message: "boom".into()
            })
            .kind(),
            ErrorKind::Transport
        );
        assert_eq!(
            DasError::from(ClientError::InvalidUrl("x".into())).kind(),
            ErrorKind::Config
        );
    }

    #[test]
    fn test_parse_url() {
        assert!(parse_url("http://localhost:9876").is_ok());
        assert!(parse_url("not a url").is_err());
    }
}

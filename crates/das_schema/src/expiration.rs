//! Expiration policies reported by storage backends.

use crate::error::DasError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How long a backend keeps the data it accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpirationPolicy {
    KeepForever,
    DiscardAfterArchiveTimeout,
    DiscardAfterDataTimeout,
}

impl ExpirationPolicy {
    fn permissiveness(self) -> u8 {
        match self {
            ExpirationPolicy::KeepForever => 2,
            ExpirationPolicy::DiscardAfterArchiveTimeout => 1,
            ExpirationPolicy::DiscardAfterDataTimeout => 0,
        }
    }

    /// The policy a set of redundant services can jointly honour: data is
    /// served as long as the most permissive member keeps it.
    ///
    /// Returns `None` for an empty set.
    pub fn most_permissive<I>(policies: I) -> Option<ExpirationPolicy>
    where
        I: IntoIterator<Item = ExpirationPolicy>,
    {
        policies.into_iter().max_by_key(|p| p.permissiveness())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExpirationPolicy::KeepForever => "KeepForever",
            ExpirationPolicy::DiscardAfterArchiveTimeout => "DiscardAfterArchiveTimeout",
            ExpirationPolicy::DiscardAfterDataTimeout => "DiscardAfterDataTimeout",
        }
    }
}

impl fmt::Display for ExpirationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpirationPolicy {
    type Err = DasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "KeepForever" => Ok(ExpirationPolicy::KeepForever),
            "DiscardAfterArchiveTimeout" => Ok(ExpirationPolicy::DiscardAfterArchiveTimeout),
            "DiscardAfterDataTimeout" => Ok(ExpirationPolicy::DiscardAfterDataTimeout),
            other => Err(DasError::Encoding(format!(
                "unknown expiration policy: {}",
                other
            ))),
        }
    }
}

//! Crawl request and its validation
//!
//! Requests arrive untyped from the boundary (CLI arguments, JSON bodies) and
//! are checked before any run id is generated or any resource is touched.

use crate::ValidationError;
use serde::{Deserialize, Serialize};
use url::Url;

/// A crawl request as received from a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlRequest {
    pub start_url: String,
    pub number_of_links_to_follow: i64,
}

/// A request that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub start_url: Url,
    pub link_count: usize,
}

impl CrawlRequest {
    pub fn new(start_url: impl Into<String>, number_of_links_to_follow: i64) -> Self {
        Self {
            start_url: start_url.into(),
            number_of_links_to_follow,
        }
    }

    /// Checks that the start URL is an absolute http(s) URL and the link
    /// count is not negative
    pub fn validate(&self) -> Result<ValidatedRequest, ValidationError> {
        let start_url = Url::parse(self.start_url.trim()).map_err(|e| ValidationError::InvalidUrl {
            url: self.start_url.clone(),
            reason: e.to_string(),
        })?;

        if start_url.scheme() != "http" && start_url.scheme() != "https" {
            return Err(ValidationError::UnsupportedScheme {
                url: self.start_url.clone(),
                scheme: start_url.scheme().to_string(),
            });
        }

        if start_url.host_str().map_or(true, str::is_empty) {
            return Err(ValidationError::InvalidUrl {
                url: self.start_url.clone(),
                reason: "missing host".to_string(),
            });
        }

        let link_count = usize::try_from(self.number_of_links_to_follow)
            .map_err(|_| ValidationError::NegativeLinkCount(self.number_of_links_to_follow))?;

        Ok(ValidatedRequest {
            start_url,
            link_count,
        })
    }
}

//! Output module for reporting finished runs
//!
//! Crawl and lookup results share one response shape, printed either as JSON
//! or as a short text listing.

mod response;

pub use response::{RunResponse, ScreenshotEntry, ARTIFACT_URL_PREFIX};

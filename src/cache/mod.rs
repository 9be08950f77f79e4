//! Result cache for finished runs
//!
//! A read accelerator in front of the artifact store. Entries are keyed by
//! run id and bounded by a TTL.

mod memory;
mod traits;

pub use memory::{CachedRun, MemoryResultCache};
pub use traits::{CacheError, CacheResult, ResultCache};

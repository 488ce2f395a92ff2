//! Caching module
//!
//! Per-process cache of the latest neighbor list per requester.

mod recent;

pub use recent::{RecentResult, RecentResults};

//! ============================================================================
//! FEED-ACCESS-CORE: Content access resolution for the trading feed
//! ============================================================================
//! This crate decides who may see which feed posts:
//! - Pure access policy over explicit entitlement facts
//! - Concurrent, failure-isolated entitlement lookups
//! - Short-lived verdict cache with invalidation on purchase/subscription
//! - Typed request/response envelopes for the feed boundary
//! ============================================================================

pub mod access;
pub mod config;
pub mod contract;
pub mod types;

// Re-export main types for convenience
pub use types::*;
pub use access::{AccessResolver, AccessVerdict, EntitlementFacts, VerdictCache, VerdictReason};
pub use config::AccessConfig;
pub use contract::{
    AccessCheckResponse, ApiEnvelope, ApiError, FeedFilters, FeedItem, FeedResponse, FeedTab,
};

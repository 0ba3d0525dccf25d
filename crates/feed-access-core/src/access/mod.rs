//! ============================================================================
//! Access Module - Feed content access resolution
//! ============================================================================
//! Decides whether a viewer may see a post in full, and if not, which gate
//! blocks them.
//!
//! ## Gates
//! - **Public**: everyone
//! - **Followers**: viewer follows the author
//! - **Subscribers**: viewer holds an active, unexpired subscription
//! - **Purchase**: viewer bought this exact post
//!
//! The author always sees their own posts. Tips never grant access.
//!
//! ## Flow
//! ```text
//! EntitlementSource ─┬─ follow ───────┐
//!                    ├─ subscription ─┼─> EntitlementFacts ─> evaluate ─> AccessVerdict
//!                    └─ purchase ─────┘                                        │
//!                                                   VerdictCache <─────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! use feed_access_core::access::{AccessResolver, SnapshotSource, VerdictCache};
//!
//! let resolver = AccessResolver::new(source, Arc::new(VerdictCache::new()), &config);
//! let verdict = resolver.resolve(viewer_id, &post, Utc::now()).await?;
//! ```
//! ============================================================================

mod cache;
mod evaluator;
mod facts;
mod resolver;
mod snapshot;
mod types;

// Re-export public types
pub use cache::{CacheTicket, EntryLifetime, VerdictCache, VerdictStore};
pub use evaluator::evaluate;
pub use facts::{EntitlementSource, FactAssembler};
pub use resolver::AccessResolver;
pub use snapshot::{EntitlementSnapshot, Follow, SnapshotSource};
pub use types::{AccessVerdict, EntitlementFacts, VerdictReason};

//! ============================================================================
//! Core Types for Feed Access
//! ============================================================================
//! Posts, entitlement records, and the error type shared by every module.
//! These types are serialized to JSON (camelCase) at the feed boundary.
//! ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Entitlement tier required to view a post in full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// Anyone can view
    Public,
    /// Viewer must follow the author
    Followers,
    /// Viewer must hold an active subscription to the author
    Subscribers,
    /// Viewer must have bought this exact post
    Purchase,
}

impl AccessLevel {
    pub const ALL: [AccessLevel; 4] = [
        AccessLevel::Public,
        AccessLevel::Followers,
        AccessLevel::Subscribers,
        AccessLevel::Purchase,
    ];

    /// Wire name of this level
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Public => "public",
            AccessLevel::Followers => "followers",
            AccessLevel::Subscribers => "subscribers",
            AccessLevel::Purchase => "purchase",
        }
    }

    /// Human-readable gate name for denial messages
    pub fn display_name(&self) -> &'static str {
        match self {
            AccessLevel::Public => "Public",
            AccessLevel::Followers => "Followers only",
            AccessLevel::Subscribers => "Subscribers only",
            AccessLevel::Purchase => "Paid post",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(AccessLevel::Public),
            "followers" => Ok(AccessLevel::Followers),
            "subscribers" => Ok(AccessLevel::Subscribers),
            "purchase" => Ok(AccessLevel::Purchase),
            other => Err(other.to_string()),
        }
    }
}

/// Access level exactly as it arrived on the post.
///
/// Kept as raw text so that a post carrying a value this core does not know
/// can still be deserialized and then rejected as `InvalidPostState`, instead
/// of failing the whole feed payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeclaredAccessLevel(String);

impl DeclaredAccessLevel {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve to a known level, or `None` if unrecognized
    pub fn known(&self) -> Option<AccessLevel> {
        self.0.parse().ok()
    }
}

impl From<AccessLevel> for DeclaredAccessLevel {
    fn from(level: AccessLevel) -> Self {
        Self(level.as_str().to_string())
    }
}

/// Market a post is tagged with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketType {
    Crypto,
    Stocks,
    Forex,
    Futures,
    Options,
}

impl FromStr for MarketType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "crypto" => Ok(MarketType::Crypto),
            "stocks" | "stock" => Ok(MarketType::Stocks),
            "forex" | "fx" => Ok(MarketType::Forex),
            "futures" => Ok(MarketType::Futures),
            "options" => Ok(MarketType::Options),
            other => Err(format!(
                "Unknown market type '{}'. Valid values: crypto, stocks, forex, futures, options",
                other
            )),
        }
    }
}

/// A published feed post. Owned by the backend; read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub access_level: DeclaredAccessLevel,
    pub market_type: MarketType,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn new(
        id: impl Into<String>,
        author_id: impl Into<String>,
        access_level: AccessLevel,
        market_type: MarketType,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            author_id: author_id.into(),
            access_level: access_level.into(),
            market_type,
            created_at,
        }
    }

    /// Resolve the declared access level, failing on unknown values
    pub fn required_level(&self) -> Result<AccessLevel, AccessError> {
        self.access_level
            .known()
            .ok_or_else(|| AccessError::InvalidPostState {
                post_id: self.id.clone(),
                value: self.access_level.as_str().to_string(),
            })
    }
}

/// Subscription of a viewer to an author
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub subscriber_id: String,
    pub author_id: String,
    pub active: bool,
    pub expires_at: DateTime<Utc>,
}

impl Subscription {
    /// Active iff flagged active and not yet expired at `now`
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at > now
    }
}

/// One-off purchase of a single post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub buyer_id: String,
    pub post_id: String,
    pub purchased_at: DateTime<Utc>,
}

/// Tip sent to an author. Informational; grants nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tip {
    pub sender_id: String,
    pub recipient_id: String,
    pub amount: f64,
    pub sent_at: DateTime<Utc>,
}

/// Entitlement facts that can be looked up independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactKind {
    Follow,
    Subscription,
    Purchase,
}

impl FactKind {
    /// The fact that decides a given access level, if any
    pub fn for_level(level: AccessLevel) -> Option<FactKind> {
        match level {
            AccessLevel::Public => None,
            AccessLevel::Followers => Some(FactKind::Follow),
            AccessLevel::Subscribers => Some(FactKind::Subscription),
            AccessLevel::Purchase => Some(FactKind::Purchase),
        }
    }
}

impl fmt::Display for FactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FactKind::Follow => "follow",
            FactKind::Subscription => "subscription",
            FactKind::Purchase => "purchase",
        };
        f.write_str(name)
    }
}

/// Error types for access resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum AccessError {
    #[error("Post {post_id} has unrecognized access level '{value}'")]
    InvalidPostState { post_id: String, value: String },

    #[error("Failed to look up {fact} fact: {reason}")]
    FactLookupFailure { fact: FactKind, reason: String },

    #[error("Verdict cache unavailable: {0}")]
    CacheUnavailable(String),
}

impl AccessError {
    /// Stable error code used in response envelopes
    pub fn code(&self) -> &'static str {
        match self {
            AccessError::InvalidPostState { .. } => "INVALID_POST_STATE",
            AccessError::FactLookupFailure { .. } => "FACT_LOOKUP_FAILURE",
            AccessError::CacheUnavailable(_) => "CACHE_UNAVAILABLE",
        }
    }
}

//! ============================================================================
//! Feed Contract - Request/response envelopes at the feed boundary
//! ============================================================================
//! Every endpoint answers with the same envelope:
//!   { success: true, data }  |  { success: false, error: { code, message } }
//! Shapes only. The access decision itself lives in `access`.
//! ============================================================================

use serde::{Deserialize, Serialize};

use crate::access::AccessVerdict;
use crate::types::{AccessError, MarketType, Post, Purchase, Subscription};

/// Error body of a failed envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<&AccessError> for ApiError {
    fn from(err: &AccessError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

/// Success/error envelope shared by all endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError::new(code, message)),
        }
    }

    /// Payload of a successful envelope; `None` for failures or a
    /// malformed `success: true` envelope without data.
    pub fn into_data(self) -> Option<T> {
        if self.success {
            self.data
        } else {
            None
        }
    }
}

impl<T> From<Result<T, AccessError>> for ApiEnvelope<T> {
    fn from(result: Result<T, AccessError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::err(e.code(), e.to_string()),
        }
    }
}

// ============================================================================
// Feed request / response
// ============================================================================

/// Feed tab selected in the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedTab {
    #[default]
    All,
    Following,
    Premium,
}

impl std::str::FromStr for FeedTab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(FeedTab::All),
            "following" => Ok(FeedTab::Following),
            "premium" => Ok(FeedTab::Premium),
            other => Err(format!(
                "Unknown tab '{}'. Valid values: all, following, premium",
                other
            )),
        }
    }
}

/// Inbound feed query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedFilters {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub market_type: Option<MarketType>,
    /// Requested tab, passed through; ranking per tab belongs to the transport layer
    #[serde(default)]
    pub tab: FeedTab,
    /// Opaque pagination cursor, passed through to the transport layer
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cursor: Option<String>,
}

impl FeedFilters {
    /// Whether a post belongs on this page's market selection
    pub fn matches(&self, post: &Post) -> bool {
        self.market_type
            .map(|m| m == post.market_type)
            .unwrap_or(true)
    }
}

/// One feed entry: the post and its access verdict.
/// `error` replaces `verdict` when the post itself is in an invalid state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub post: Post,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub verdict: Option<AccessVerdict>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<ApiError>,
}

impl FeedItem {
    pub fn resolved(post: Post, result: Result<AccessVerdict, AccessError>) -> Self {
        match result {
            Ok(verdict) => Self {
                post,
                verdict: Some(verdict),
                error: None,
            },
            Err(e) => Self {
                post,
                verdict: None,
                error: Some(ApiError::from(&e)),
            },
        }
    }
}

pub type FeedResponse = ApiEnvelope<Vec<FeedItem>>;

// ============================================================================
// Access / fact check envelopes
// ============================================================================

/// Result of a single-post access check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessCheck {
    pub post_id: String,
    pub verdict: AccessVerdict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowCheck {
    pub is_following: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionCheck {
    #[serde(default)]
    pub subscription: Option<Subscription>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseCheck {
    #[serde(default)]
    pub purchase: Option<Purchase>,
}

pub type AccessCheckResponse = ApiEnvelope<AccessCheck>;
pub type FollowCheckResponse = ApiEnvelope<FollowCheck>;
pub type SubscriptionCheckResponse = ApiEnvelope<SubscriptionCheck>;
pub type PurchaseCheckResponse = ApiEnvelope<PurchaseCheck>;

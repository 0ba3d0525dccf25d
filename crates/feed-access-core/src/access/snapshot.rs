//! ============================================================================
//! Snapshot Source - In-memory entitlement records
//! ============================================================================
//! Answers entitlement lookups from a loaded snapshot of follows,
//! subscriptions, purchases, and tips. Backs the CLI and local testing.
//! ============================================================================

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use super::facts::EntitlementSource;
use crate::contract::{
    ApiEnvelope, FollowCheck, FollowCheckResponse, PurchaseCheck, PurchaseCheckResponse,
    SubscriptionCheck, SubscriptionCheckResponse,
};
use crate::types::{Purchase, Subscription, Tip};

/// Follow edge from a viewer to an author
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Follow {
    pub follower_id: String,
    pub author_id: String,
}

/// Serializable set of entitlement records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntitlementSnapshot {
    pub follows: Vec<Follow>,
    pub subscriptions: Vec<Subscription>,
    pub purchases: Vec<Purchase>,
    pub tips: Vec<Tip>,
}

/// Entitlement source over an in-memory snapshot
#[derive(Debug, Default)]
pub struct SnapshotSource {
    records: RwLock<EntitlementSnapshot>,
}

impl SnapshotSource {
    pub fn new(snapshot: EntitlementSnapshot) -> Self {
        Self {
            records: RwLock::new(snapshot),
        }
    }

    pub async fn add_follow(&self, follower_id: &str, author_id: &str) {
        let mut records = self.records.write().await;
        let follow = Follow {
            follower_id: follower_id.to_string(),
            author_id: author_id.to_string(),
        };
        if !records.follows.contains(&follow) {
            records.follows.push(follow);
        }
    }

    pub async fn remove_follow(&self, follower_id: &str, author_id: &str) {
        let mut records = self.records.write().await;
        records
            .follows
            .retain(|f| !(f.follower_id == follower_id && f.author_id == author_id));
    }

    pub async fn add_subscription(&self, subscription: Subscription) {
        self.records.write().await.subscriptions.push(subscription);
    }

    pub async fn add_purchase(&self, purchase: Purchase) {
        self.records.write().await.purchases.push(purchase);
    }

    pub async fn add_tip(&self, tip: Tip) {
        self.records.write().await.tips.push(tip);
    }
}

#[async_trait]
impl EntitlementSource for SnapshotSource {
    async fn check_follow(&self, viewer_id: &str, author_id: &str) -> Result<FollowCheckResponse> {
        let records = self.records.read().await;
        let is_following = records
            .follows
            .iter()
            .any(|f| f.follower_id == viewer_id && f.author_id == author_id);
        Ok(ApiEnvelope::ok(FollowCheck { is_following }))
    }

    async fn check_subscription(
        &self,
        viewer_id: &str,
        author_id: &str,
    ) -> Result<SubscriptionCheckResponse> {
        let records = self.records.read().await;
        // Several records can exist for one pair (renewals); report the
        // active one reaching furthest into the future, else the latest.
        let subscription = records
            .subscriptions
            .iter()
            .filter(|s| s.subscriber_id == viewer_id && s.author_id == author_id)
            .max_by_key(|s| (s.active, s.expires_at))
            .cloned();
        debug!(
            "Snapshot subscription lookup for {} -> {}: {}",
            viewer_id,
            author_id,
            subscription.is_some()
        );
        Ok(ApiEnvelope::ok(SubscriptionCheck { subscription }))
    }

    async fn check_purchase(&self, viewer_id: &str, post_id: &str) -> Result<PurchaseCheckResponse> {
        let records = self.records.read().await;
        let purchase = records
            .purchases
            .iter()
            .find(|p| p.buyer_id == viewer_id && p.post_id == post_id)
            .cloned();
        Ok(ApiEnvelope::ok(PurchaseCheck { purchase }))
    }

    async fn tip_history(&self, viewer_id: &str, author_id: &str) -> Result<Vec<Tip>> {
        let records = self.records.read().await;
        Ok(records
            .tips
            .iter()
            .filter(|t| t.sender_id == viewer_id && t.recipient_id == author_id)
            .cloned()
            .collect())
    }
}

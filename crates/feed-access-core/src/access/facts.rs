//! ============================================================================
//! Fact Assembly - Concurrent entitlement lookups
//! ============================================================================
//! Gathers follow, subscription, and purchase facts for a (viewer, post) pair.
//! Lookups run concurrently and fail independently: a failed, timed-out, or
//! `success: false` lookup leaves its fact absent and marks it unresolved.
//! It never grants access and never fails the other lookups.
//! ============================================================================

use anyhow::Result;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::types::EntitlementFacts;
use crate::contract::{
    ApiEnvelope, FollowCheckResponse, PurchaseCheckResponse, SubscriptionCheckResponse,
};
use crate::types::{AccessError, FactKind, Post, Tip};

/// Backend collaborator that answers entitlement lookups
#[async_trait]
pub trait EntitlementSource: Send + Sync {
    async fn check_follow(&self, viewer_id: &str, author_id: &str) -> Result<FollowCheckResponse>;

    async fn check_subscription(
        &self,
        viewer_id: &str,
        author_id: &str,
    ) -> Result<SubscriptionCheckResponse>;

    async fn check_purchase(&self, viewer_id: &str, post_id: &str) -> Result<PurchaseCheckResponse>;

    /// Tips from viewer to author. Informational, so sources may skip it.
    async fn tip_history(&self, _viewer_id: &str, _author_id: &str) -> Result<Vec<Tip>> {
        Ok(Vec::new())
    }
}

/// Runs the lookups for one (viewer, post) pair and joins them into facts
pub struct FactAssembler {
    source: Arc<dyn EntitlementSource>,
    lookup_timeout: Duration,
}

impl FactAssembler {
    pub fn new(source: Arc<dyn EntitlementSource>, lookup_timeout: Duration) -> Self {
        Self {
            source,
            lookup_timeout,
        }
    }

    /// Assemble entitlement facts for `viewer_id` against `post`
    pub async fn assemble(&self, viewer_id: &str, post: &Post) -> EntitlementFacts {
        let source = self.source.as_ref();

        let (follow, subscription, purchase, tips) = tokio::join!(
            self.lookup(FactKind::Follow, source.check_follow(viewer_id, &post.author_id)),
            self.lookup(
                FactKind::Subscription,
                source.check_subscription(viewer_id, &post.author_id)
            ),
            self.lookup(FactKind::Purchase, source.check_purchase(viewer_id, &post.id)),
            tokio::time::timeout(
                self.lookup_timeout,
                source.tip_history(viewer_id, &post.author_id)
            ),
        );

        let mut facts = EntitlementFacts::default();

        match follow {
            Ok(check) => facts.is_following = check.is_following,
            Err(e) => self.record_failure(&mut facts, e),
        }
        match subscription {
            Ok(check) => facts.subscription = check.subscription,
            Err(e) => self.record_failure(&mut facts, e),
        }
        match purchase {
            Ok(check) => facts.purchase = check.purchase,
            Err(e) => self.record_failure(&mut facts, e),
        }
        match tips {
            Ok(Ok(tips)) => facts.tips = tips,
            Ok(Err(e)) => debug!("Tip history unavailable for {}: {}", viewer_id, e),
            Err(_) => debug!("Tip history lookup timed out for {}", viewer_id),
        }

        debug!(
            "Assembled facts for viewer {} on post {}: following={}, subscription={}, purchase={}, unresolved={:?}",
            viewer_id,
            post.id,
            facts.is_following,
            facts.subscription.is_some(),
            facts.purchase.is_some(),
            facts.unresolved
        );

        facts
    }

    /// Await one lookup under the timeout and unwrap its envelope
    async fn lookup<T, F>(&self, fact: FactKind, call: F) -> std::result::Result<T, AccessError>
    where
        F: Future<Output = Result<ApiEnvelope<T>>>,
    {
        let failure = |reason: String| AccessError::FactLookupFailure { fact, reason };

        let envelope = tokio::time::timeout(self.lookup_timeout, call)
            .await
            .map_err(|_| failure(format!("timed out after {:?}", self.lookup_timeout)))?
            .map_err(|e| failure(e.to_string()))?;

        if !envelope.success {
            let reason = envelope
                .error
                .map(|e| format!("{}: {}", e.code, e.message))
                .unwrap_or_else(|| "unsuccessful response".to_string());
            return Err(failure(reason));
        }

        envelope
            .data
            .ok_or_else(|| failure("successful response without data".to_string()))
    }

    fn record_failure(&self, facts: &mut EntitlementFacts, err: AccessError) {
        warn!("{} - treating fact as absent", err);
        if let AccessError::FactLookupFailure { fact, .. } = err {
            facts.mark_unresolved(fact);
        }
    }
}

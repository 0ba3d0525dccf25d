//! ============================================================================
//! Access Resolver - Cached verdicts for posts and feed pages
//! ============================================================================
//! cache lookup -> fact assembly -> evaluation -> cache store.
//! Lookup and cache hiccups degrade to conservative verdicts; they never
//! fail a feed request or grant access.
//! ============================================================================

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::cache::{EntryLifetime, VerdictStore};
use super::evaluator::evaluate;
use super::facts::{EntitlementSource, FactAssembler};
use super::types::{AccessVerdict, EntitlementFacts, VerdictReason};
use crate::config::AccessConfig;
use crate::contract::{AccessCheck, AccessCheckResponse, ApiEnvelope, FeedFilters, FeedItem, FeedResponse};
use crate::types::{AccessError, AccessLevel, Post};

/// Resolves access verdicts with caching
pub struct AccessResolver {
    assembler: FactAssembler,
    store: Arc<dyn VerdictStore>,
    cache_ttl: Duration,
}

impl AccessResolver {
    pub fn new(
        source: Arc<dyn EntitlementSource>,
        store: Arc<dyn VerdictStore>,
        config: &AccessConfig,
    ) -> Self {
        Self {
            assembler: FactAssembler::new(source, config.lookup_timeout()),
            store,
            cache_ttl: config.cache_ttl(),
        }
    }

    /// Resolve the verdict for one post at evaluation time `now`
    pub async fn resolve(
        &self,
        viewer_id: &str,
        post: &Post,
        now: DateTime<Utc>,
    ) -> Result<AccessVerdict, AccessError> {
        if viewer_id == post.author_id {
            return Ok(AccessVerdict::granted(VerdictReason::Owner));
        }

        // Invalid posts fail before any lookup is spent on them
        let level = post.required_level()?;
        if level == AccessLevel::Public {
            return Ok(AccessVerdict::granted(VerdictReason::Public));
        }

        match self.store.get(viewer_id, &post.id, now).await {
            Ok(Some(verdict)) if verdict.applies_to(level) => return Ok(verdict),
            Ok(Some(_)) => debug!("Cached verdict for post {} predates its {} level", post.id, level),
            Ok(None) => {}
            Err(e) => warn!("{} - bypassing cache for post {}", e, post.id),
        }

        let ticket = match self.store.ticket().await {
            Ok(ticket) => Some(ticket),
            Err(e) => {
                warn!("{} - verdict for post {} will not be cached", e, post.id);
                None
            }
        };

        let facts = self.assembler.assemble(viewer_id, post).await;
        let verdict = evaluate(post, viewer_id, &facts, now)?;

        if let Some(ticket) = ticket {
            if let Some(lifetime) = self.lifetime_for(&verdict, &facts, now) {
                match self
                    .store
                    .put_if_current(viewer_id, &post.id, verdict.clone(), lifetime, ticket)
                    .await
                {
                    Ok(true) => {}
                    Ok(false) => debug!("Verdict for post {} superseded by invalidation", post.id),
                    Err(e) => warn!("{} - verdict for post {} not cached", e, post.id),
                }
            }
        }

        info!(
            "Access for viewer {} on post {}: granted={} reason={:?}",
            viewer_id, post.id, verdict.granted, verdict.reason
        );

        Ok(verdict)
    }

    /// How long a verdict may be cached, or `None` if it must not be.
    /// Subscription grants end at the subscription's expiry.
    fn lifetime_for(
        &self,
        verdict: &AccessVerdict,
        facts: &EntitlementFacts,
        now: DateTime<Utc>,
    ) -> Option<EntryLifetime> {
        if verdict.lookup_failed {
            return None;
        }

        if verdict.granted && verdict.reason == VerdictReason::Subscribers {
            let expires_at = facts.subscription.as_ref()?.expires_at;
            let remaining = (expires_at - now).to_std().ok().filter(|d| !d.is_zero())?;
            return Some(EntryLifetime::for_ttl(self.cache_ttl.min(remaining)).until(expires_at));
        }

        Some(EntryLifetime::for_ttl(self.cache_ttl))
    }

    /// Single-post access check wrapped in the response envelope
    pub async fn check_access(
        &self,
        viewer_id: &str,
        post: &Post,
        now: DateTime<Utc>,
    ) -> AccessCheckResponse {
        self.resolve(viewer_id, post, now)
            .await
            .map(|verdict| AccessCheck {
                post_id: post.id.clone(),
                verdict,
            })
            .into()
    }

    /// Resolve a page of posts, preserving order. Posts are resolved
    /// concurrently; an invalid post gets an item error without failing
    /// the page.
    pub async fn resolve_feed(
        &self,
        viewer_id: &str,
        filters: &FeedFilters,
        posts: Vec<Post>,
        now: DateTime<Utc>,
    ) -> FeedResponse {
        let page: Vec<Post> = posts.into_iter().filter(|p| filters.matches(p)).collect();

        let results = join_all(page.iter().map(|post| self.resolve(viewer_id, post, now))).await;

        let items: Vec<FeedItem> = page
            .into_iter()
            .zip(results)
            .map(|(post, result)| {
                if let Err(e) = &result {
                    warn!("Feed item {} rejected: {}", post.id, e);
                }
                FeedItem::resolved(post, result)
            })
            .collect();

        debug!(
            "Resolved feed page for viewer {} ({:?} tab): {} items",
            viewer_id,
            filters.tab,
            items.len()
        );

        ApiEnvelope::ok(items)
    }

    /// Called after a purchase succeeds, so the old denial is not served
    pub async fn record_purchase(&self, viewer_id: &str, post_id: &str) {
        if let Err(e) = self.store.invalidate(viewer_id, post_id).await {
            warn!("{} - could not invalidate after purchase of {}", e, post_id);
        }
    }

    /// Called after a subscription starts, renews, or ends. Subscriptions
    /// span all of an author's posts, so every verdict for the viewer goes.
    pub async fn record_subscription_change(&self, viewer_id: &str) {
        if let Err(e) = self.store.invalidate_viewer(viewer_id).await {
            warn!("{} - could not invalidate after subscription change", e);
        }
    }

    /// Called after a follow or unfollow
    pub async fn record_follow_change(&self, viewer_id: &str) {
        if let Err(e) = self.store.invalidate_viewer(viewer_id).await {
            warn!("{} - could not invalidate after follow change", e);
        }
    }
}

//! ============================================================================
//! Access Evaluator - Pure access policy over explicit facts
//! ============================================================================
//! Gates, most permissive first:
//! - Owner: the author always sees their own post
//! - Public: everyone
//! - Followers: requires following the author
//! - Subscribers: requires an active, unexpired subscription to the author
//! - Purchase: requires a purchase of this exact post
//!
//! Each level requires exactly its own fact. Following never stands in for a
//! subscription, and a subscription never stands in for a purchase.
//! ============================================================================

use chrono::{DateTime, Utc};
use tracing::debug;

use super::types::{AccessVerdict, EntitlementFacts, VerdictReason};
use crate::types::{AccessError, AccessLevel, FactKind, Post};

/// Decide whether `viewer_id` may see `post` in full.
///
/// `now` is the evaluation time used for subscription expiry; the system
/// clock is never consulted.
pub fn evaluate(
    post: &Post,
    viewer_id: &str,
    facts: &EntitlementFacts,
    now: DateTime<Utc>,
) -> Result<AccessVerdict, AccessError> {
    if viewer_id == post.author_id {
        return Ok(AccessVerdict::granted(VerdictReason::Owner));
    }

    let level = post.required_level()?;

    let satisfied = match level {
        AccessLevel::Public => return Ok(AccessVerdict::granted(VerdictReason::Public)),
        AccessLevel::Followers => facts.is_following,
        AccessLevel::Subscribers => facts
            .subscription
            .as_ref()
            .map(|s| {
                s.subscriber_id == viewer_id && s.author_id == post.author_id && s.is_active_at(now)
            })
            .unwrap_or(false),
        AccessLevel::Purchase => facts
            .purchase
            .as_ref()
            .map(|p| p.post_id == post.id && p.buyer_id == viewer_id)
            .unwrap_or(false),
    };

    if satisfied {
        let reason = match level {
            AccessLevel::Purchase => VerdictReason::Purchased,
            other => other.into(),
        };
        return Ok(AccessVerdict::granted(reason));
    }

    let unresolved = FactKind::for_level(level)
        .map(|fact| !facts.is_resolved(fact))
        .unwrap_or(false);

    debug!(
        "Access denied for viewer {} on post {}: requires {} (lookup failed: {})",
        viewer_id, post.id, level, unresolved
    );

    if unresolved {
        Ok(AccessVerdict::denied_unresolved(level))
    } else {
        Ok(AccessVerdict::denied(level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeclaredAccessLevel, MarketType, Purchase, Subscription, Tip};
    use chrono::{Duration, TimeZone};

    const AUTHOR: &str = "alice";
    const VIEWER: &str = "bob";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn post(level: AccessLevel) -> Post {
        Post::new("post-1", AUTHOR, level, MarketType::Crypto, now() - Duration::hours(2))
    }

    fn subscription(active: bool, expires_in: Duration) -> Subscription {
        Subscription {
            subscriber_id: VIEWER.into(),
            author_id: AUTHOR.into(),
            active,
            expires_at: now() + expires_in,
        }
    }

    fn purchase(post_id: &str) -> Purchase {
        Purchase {
            buyer_id: VIEWER.into(),
            post_id: post_id.into(),
            purchased_at: now() - Duration::days(3),
        }
    }

    /// Every combination of present/absent facts for a viewer
    fn all_fact_combinations() -> Vec<EntitlementFacts> {
        let mut out = Vec::new();
        for following in [false, true] {
            for sub in [None, Some(subscription(true, Duration::days(30)))] {
                for buy in [None, Some(purchase("post-1"))] {
                    out.push(EntitlementFacts {
                        is_following: following,
                        subscription: sub.clone(),
                        purchase: buy.clone(),
                        ..EntitlementFacts::default()
                    });
                }
            }
        }
        out
    }

    #[test]
    fn test_owner_always_granted() {
        for level in AccessLevel::ALL {
            for facts in all_fact_combinations() {
                let verdict = evaluate(&post(level), AUTHOR, &facts, now()).unwrap();
                assert!(verdict.granted);
                assert_eq!(verdict.reason, VerdictReason::Owner);
                assert_eq!(verdict.missing_gate, None);
            }
        }
    }

    #[test]
    fn test_owner_granted_even_with_invalid_level() {
        let mut p = post(AccessLevel::Public);
        p.access_level = DeclaredAccessLevel::new("vip");
        let verdict = evaluate(&p, AUTHOR, &EntitlementFacts::default(), now()).unwrap();
        assert_eq!(verdict.reason, VerdictReason::Owner);
    }

    #[test]
    fn test_public_always_granted() {
        for facts in all_fact_combinations() {
            let verdict = evaluate(&post(AccessLevel::Public), VIEWER, &facts, now()).unwrap();
            assert!(verdict.granted);
            assert_eq!(verdict.reason, VerdictReason::Public);
        }
    }

    #[test]
    fn test_followers_matches_follow_fact_exactly() {
        for facts in all_fact_combinations() {
            let verdict = evaluate(&post(AccessLevel::Followers), VIEWER, &facts, now()).unwrap();
            assert_eq!(verdict.granted, facts.is_following);
            if !verdict.granted {
                assert_eq!(verdict.missing_gate, Some(AccessLevel::Followers));
            }
        }
    }

    #[test]
    fn test_active_subscription_granted() {
        let facts = EntitlementFacts::default().with_subscription(subscription(true, Duration::days(1)));
        let verdict = evaluate(&post(AccessLevel::Subscribers), VIEWER, &facts, now()).unwrap();
        assert_eq!(verdict, AccessVerdict::granted(VerdictReason::Subscribers));
    }

    #[test]
    fn test_expired_subscription_denied() {
        let facts =
            EntitlementFacts::default().with_subscription(subscription(true, -Duration::seconds(1)));
        let verdict = evaluate(&post(AccessLevel::Subscribers), VIEWER, &facts, now()).unwrap();
        assert!(!verdict.granted);
        assert_eq!(verdict.missing_gate, Some(AccessLevel::Subscribers));
        assert!(!verdict.lookup_failed);
    }

    #[test]
    fn test_inactive_subscription_denied() {
        let facts = EntitlementFacts::default().with_subscription(subscription(false, Duration::days(30)));
        let verdict = evaluate(&post(AccessLevel::Subscribers), VIEWER, &facts, now()).unwrap();
        assert_eq!(verdict, AccessVerdict::denied(AccessLevel::Subscribers));
    }

    #[test]
    fn test_subscription_expiry_uses_evaluation_time() {
        let facts = EntitlementFacts::default().with_subscription(subscription(true, Duration::hours(1)));
        let p = post(AccessLevel::Subscribers);
        assert!(evaluate(&p, VIEWER, &facts, now()).unwrap().granted);
        assert!(!evaluate(&p, VIEWER, &facts, now() + Duration::hours(2)).unwrap().granted);
    }

    #[test]
    fn test_subscription_to_other_author_denied() {
        let mut sub = subscription(true, Duration::days(30));
        sub.author_id = "carol".into();
        let facts = EntitlementFacts::default().with_subscription(sub);
        let verdict = evaluate(&post(AccessLevel::Subscribers), VIEWER, &facts, now()).unwrap();
        assert!(!verdict.granted);
    }

    #[test]
    fn test_purchase_of_this_post_granted() {
        let facts = EntitlementFacts::default().with_purchase(purchase("post-1"));
        let verdict = evaluate(&post(AccessLevel::Purchase), VIEWER, &facts, now()).unwrap();
        assert_eq!(verdict, AccessVerdict::granted(VerdictReason::Purchased));
    }

    #[test]
    fn test_purchase_of_other_post_denied() {
        let facts = EntitlementFacts::default().with_purchase(purchase("post-2"));
        let verdict = evaluate(&post(AccessLevel::Purchase), VIEWER, &facts, now()).unwrap();
        assert_eq!(verdict, AccessVerdict::denied(AccessLevel::Purchase));
        assert_eq!(verdict.reason, VerdictReason::Purchase);
    }

    #[test]
    fn test_following_does_not_substitute_for_purchase() {
        let facts = EntitlementFacts::following();
        let verdict = evaluate(&post(AccessLevel::Purchase), VIEWER, &facts, now()).unwrap();
        assert!(!verdict.granted);
        assert_eq!(verdict.missing_gate, Some(AccessLevel::Purchase));
    }

    #[test]
    fn test_subscription_does_not_substitute_for_purchase() {
        let facts = EntitlementFacts::following().with_subscription(subscription(true, Duration::days(30)));
        let verdict = evaluate(&post(AccessLevel::Purchase), VIEWER, &facts, now()).unwrap();
        assert_eq!(verdict.missing_gate, Some(AccessLevel::Purchase));
    }

    #[test]
    fn test_purchase_does_not_substitute_for_follow() {
        let facts = EntitlementFacts::default().with_purchase(purchase("post-1"));
        let verdict = evaluate(&post(AccessLevel::Followers), VIEWER, &facts, now()).unwrap();
        assert_eq!(verdict.missing_gate, Some(AccessLevel::Followers));
    }

    #[test]
    fn test_tips_grant_nothing() {
        let facts = EntitlementFacts {
            tips: vec![Tip {
                sender_id: VIEWER.into(),
                recipient_id: AUTHOR.into(),
                amount: 500.0,
                sent_at: now(),
            }],
            ..EntitlementFacts::default()
        };
        for level in [AccessLevel::Followers, AccessLevel::Subscribers, AccessLevel::Purchase] {
            assert!(!evaluate(&post(level), VIEWER, &facts, now()).unwrap().granted);
        }
    }

    #[test]
    fn test_unresolved_gate_fact_reports_lookup_failure() {
        let mut facts = EntitlementFacts::default();
        facts.mark_unresolved(FactKind::Subscription);
        let verdict = evaluate(&post(AccessLevel::Subscribers), VIEWER, &facts, now()).unwrap();
        assert_eq!(verdict, AccessVerdict::denied_unresolved(AccessLevel::Subscribers));
    }

    #[test]
    fn test_unresolved_unrelated_fact_is_plain_denial() {
        let mut facts = EntitlementFacts::default();
        facts.mark_unresolved(FactKind::Purchase);
        let verdict = evaluate(&post(AccessLevel::Followers), VIEWER, &facts, now()).unwrap();
        assert_eq!(verdict, AccessVerdict::denied(AccessLevel::Followers));

        facts.is_following = true;
        assert!(evaluate(&post(AccessLevel::Followers), VIEWER, &facts, now()).unwrap().granted);
    }

    #[test]
    fn test_invalid_access_level_is_error() {
        let mut p = post(AccessLevel::Public);
        p.access_level = DeclaredAccessLevel::new("platinum");
        let err = evaluate(&p, VIEWER, &EntitlementFacts::following(), now()).unwrap_err();
        assert_eq!(err.code(), "INVALID_POST_STATE");
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let facts = EntitlementFacts::following().with_subscription(subscription(true, Duration::minutes(5)));
        for level in AccessLevel::ALL {
            let first = evaluate(&post(level), VIEWER, &facts, now());
            let second = evaluate(&post(level), VIEWER, &facts, now());
            assert_eq!(first, second);
        }
    }
}

//! ============================================================================
//! Access Types - Entitlement facts and access verdicts
//! ============================================================================
//! Facts describe what is known about a viewer's relationship to a post and
//! its author. Verdicts are what the evaluator derives from them.
//! ============================================================================

use serde::{Deserialize, Serialize};

use crate::types::{AccessLevel, FactKind, Purchase, Subscription, Tip};

/// Snapshot of a viewer's entitlements for one (viewer, post) pair.
/// Assembled fresh per evaluation; absent fields mean "not satisfied".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntitlementFacts {
    pub is_following: bool,
    pub subscription: Option<Subscription>,
    pub purchase: Option<Purchase>,
    /// Tip history with the author (never grants access)
    pub tips: Vec<Tip>,
    /// Facts whose lookup failed and are therefore treated as absent
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<FactKind>,
}

impl EntitlementFacts {
    pub fn following() -> Self {
        Self {
            is_following: true,
            ..Self::default()
        }
    }

    pub fn with_subscription(mut self, subscription: Subscription) -> Self {
        self.subscription = Some(subscription);
        self
    }

    pub fn with_purchase(mut self, purchase: Purchase) -> Self {
        self.purchase = Some(purchase);
        self
    }

    /// Record that a fact could not be resolved
    pub fn mark_unresolved(&mut self, fact: FactKind) {
        if !self.unresolved.contains(&fact) {
            self.unresolved.push(fact);
        }
    }

    pub fn is_resolved(&self, fact: FactKind) -> bool {
        !self.unresolved.contains(&fact)
    }

    /// Total tipped to the author across the tip history
    pub fn total_tipped(&self) -> f64 {
        self.tips.iter().map(|t| t.amount).sum()
    }
}

/// Why a verdict came out the way it did.
/// For denials this is the access level that was required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictReason {
    Owner,
    Public,
    Followers,
    Subscribers,
    Purchase,
    Purchased,
}

impl From<AccessLevel> for VerdictReason {
    fn from(level: AccessLevel) -> Self {
        match level {
            AccessLevel::Public => VerdictReason::Public,
            AccessLevel::Followers => VerdictReason::Followers,
            AccessLevel::Subscribers => VerdictReason::Subscribers,
            AccessLevel::Purchase => VerdictReason::Purchase,
        }
    }
}

/// Access decision for one viewer and one post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessVerdict {
    pub granted: bool,
    pub reason: VerdictReason,
    /// The unmet requirement; present only on denial
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub missing_gate: Option<AccessLevel>,
    /// Denied because the gating fact could not be looked up
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub lookup_failed: bool,
}

impl AccessVerdict {
    pub fn granted(reason: VerdictReason) -> Self {
        Self {
            granted: true,
            reason,
            missing_gate: None,
            lookup_failed: false,
        }
    }

    pub fn denied(gate: AccessLevel) -> Self {
        Self {
            granted: false,
            reason: gate.into(),
            missing_gate: Some(gate),
            lookup_failed: false,
        }
    }

    pub fn denied_unresolved(gate: AccessLevel) -> Self {
        Self {
            lookup_failed: true,
            ..Self::denied(gate)
        }
    }

    /// Whether this verdict could have been derived for a post at `level`.
    /// Owner grants hold at any level.
    pub fn applies_to(&self, level: AccessLevel) -> bool {
        if self.granted {
            match (self.reason, level) {
                (VerdictReason::Owner, _) => true,
                (VerdictReason::Purchased, AccessLevel::Purchase) => true,
                (reason, level) => level != AccessLevel::Purchase && reason == VerdictReason::from(level),
            }
        } else {
            self.missing_gate == Some(level)
        }
    }

    /// Human-readable summary for logs and the CLI
    pub fn describe(&self) -> String {
        match (self.granted, self.missing_gate) {
            (true, _) => format!("Access granted ({:?})", self.reason),
            (false, Some(gate)) if self.lookup_failed => format!(
                "Access denied. {} check could not be completed.",
                gate.display_name()
            ),
            (false, Some(gate)) => format!("Access denied. Requires {}.", gate.display_name()),
            (false, None) => "Access denied.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denied_verdict_shape() {
        let verdict = AccessVerdict::denied(AccessLevel::Subscribers);
        assert!(!verdict.granted);
        assert_eq!(verdict.reason, VerdictReason::Subscribers);
        assert_eq!(verdict.missing_gate, Some(AccessLevel::Subscribers));

        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "granted": false, "reason": "subscribers", "missingGate": "subscribers" })
        );
    }

    #[test]
    fn test_granted_verdict_omits_gate() {
        let json = serde_json::to_value(AccessVerdict::granted(VerdictReason::Owner)).unwrap();
        assert_eq!(json, serde_json::json!({ "granted": true, "reason": "owner" }));
    }

    #[test]
    fn test_unresolved_verdict_flags_lookup() {
        let verdict = AccessVerdict::denied_unresolved(AccessLevel::Purchase);
        assert!(verdict.lookup_failed);
        assert_eq!(serde_json::to_value(&verdict).unwrap()["lookupFailed"], true);
        assert!(verdict.describe().contains("could not be completed"));
    }

    #[test]
    fn test_verdict_applies_only_to_its_level() {
        let followers = AccessVerdict::granted(VerdictReason::Followers);
        assert!(followers.applies_to(AccessLevel::Followers));
        assert!(!followers.applies_to(AccessLevel::Purchase));
        assert!(!followers.applies_to(AccessLevel::Subscribers));

        let purchased = AccessVerdict::granted(VerdictReason::Purchased);
        assert!(purchased.applies_to(AccessLevel::Purchase));
        assert!(!purchased.applies_to(AccessLevel::Followers));
        assert!(!AccessVerdict::granted(VerdictReason::Purchase).applies_to(AccessLevel::Purchase));

        let denied = AccessVerdict::denied(AccessLevel::Subscribers);
        assert!(denied.applies_to(AccessLevel::Subscribers));
        assert!(!denied.applies_to(AccessLevel::Followers));

        assert!(AccessVerdict::granted(VerdictReason::Owner).applies_to(AccessLevel::Purchase));
    }

    #[test]
    fn test_facts_deserialize_with_missing_fields() {
        let facts: EntitlementFacts = serde_json::from_str(r#"{"isFollowing":true}"#).unwrap();
        assert!(facts.is_following);
        assert!(facts.subscription.is_none());
        assert!(facts.purchase.is_none());
        assert!(facts.unresolved.is_empty());
    }

    #[test]
    fn test_mark_unresolved_is_idempotent() {
        let mut facts = EntitlementFacts::default();
        facts.mark_unresolved(FactKind::Follow);
        facts.mark_unresolved(FactKind::Follow);
        assert_eq!(facts.unresolved, vec![FactKind::Follow]);
        assert!(!facts.is_resolved(FactKind::Follow));
        assert!(facts.is_resolved(FactKind::Purchase));
    }
}

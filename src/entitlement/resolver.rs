//! Maps subscription state to the tier that actually applies, and a tier plus
//! feature to the entitlement the enforcer must apply.
//!
//! This is the single source of truth for the trial check: a non-subscribed
//! user inside the trial window gets Pro-equivalent limits. Resolution is
//! recomputed on every call and never cached, since trial expiry and plan
//! changes can happen between calls.

use chrono::{DateTime, Utc};

use super::catalog::{Feature, Period, PlanCatalog, TierKey};
use crate::profile::SubscriptionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entitlement {
    /// The resolved tier does not grant the feature at all.
    Blocked,
    /// No cap; never counted against the ledger.
    Unlimited,
    Metered { limit: u32, period: Period },
}

pub fn effective_tier(subscription: &SubscriptionState, now: DateTime<Utc>) -> TierKey {
    if subscription.trial_active(now) {
        return TierKey::Pro;
    }
    if subscription.is_subscribed {
        if let Some(plan) = subscription.current_plan {
            return plan;
        }
    }
    TierKey::Basic
}

pub fn resolve(subscription: &SubscriptionState, feature: Feature, now: DateTime<Utc>) -> Entitlement {
    let tier = effective_tier(subscription, now);
    match PlanCatalog::get().feature(tier, feature) {
        None => Entitlement::Blocked,
        Some(spec) if !spec.available => Entitlement::Blocked,
        Some(spec) => match spec.limit {
            None => Entitlement::Unlimited,
            Some(limit) => Entitlement::Metered {
                limit,
                period: spec.period,
            },
        },
    }
}

//! The single chokepoint every AI-backed action passes through.
//!
//! `check()` resolves the entitlement, applies rollover, compares usage plus
//! purchased credits against the limit and, on allow, increments the ledger
//! and persists the profile before the caller proceeds to invoke the AI
//! backend. Consumption is charged on attempt: a failed AI call afterwards is
//! never refunded.
//!
//! The enforcer is shared as `Arc<RwLock<QuotaEnforcer>>`; the write lock
//! makes each read-then-increment a critical section, so two actions fired in
//! quick succession cannot both take the last remaining slot.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::catalog::{Feature, Period, PlanCatalog};
use super::ledger::week_start_of;
use super::resolver::{self, Entitlement};
use crate::profile::{ProfileStore, SubscriptionState, UserProfile};

/// Outcome of a quota check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QuotaGate {
    Allowed,

    /// The resolved tier does not grant the feature at all.
    NotAvailable { feature: Feature, label: String },

    /// Feature granted but the period allowance plus purchased credits is
    /// exhausted.
    LimitExceeded {
        feature: Feature,
        label: String,
        used: u32,
        limit: u32,
        purchased: u32,
        resets_at: DateTime<Utc>,
    },
}

impl QuotaGate {
    pub fn is_allowed(&self) -> bool {
        matches!(self, QuotaGate::Allowed)
    }
}

/// Read-only quota state for one feature, for UI badges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaStatus {
    pub feature: Feature,
    pub label: String,
    pub available: bool,
    /// `None` means uncapped.
    pub limit: Option<u32>,
    pub period: Option<Period>,
    pub used: u32,
    pub purchased: u32,
    /// `None` means unlimited; blocked features report `Some(0)`.
    pub remaining: Option<u32>,
}

pub struct QuotaEnforcer {
    store: Box<dyn ProfileStore>,
    profile: UserProfile,
}

impl QuotaEnforcer {
    pub fn new(store: Box<dyn ProfileStore>) -> Result<Self> {
        let profile = store.load()?;
        let mut enforcer = Self { store, profile };
        enforcer.rollover(Utc::now());
        enforcer.store.save(&enforcer.profile)?;
        Ok(enforcer)
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    pub fn subscription(&self) -> &SubscriptionState {
        &self.profile.subscription
    }

    fn rollover(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        self.profile.daily_usage.reset_if_stale(today);
        self.profile.weekly_usage.reset_if_stale(today);
    }

    pub fn check(&mut self, feature: Feature, amount: u32) -> Result<QuotaGate> {
        self.check_at(feature, amount, Utc::now())
    }

    pub fn check_at(
        &mut self,
        feature: Feature,
        amount: u32,
        now: DateTime<Utc>,
    ) -> Result<QuotaGate> {
        let (limit, period) = match resolver::resolve(&self.profile.subscription, feature, now) {
            Entitlement::Blocked => {
                return Ok(QuotaGate::NotAvailable {
                    feature,
                    label: feature.label().to_string(),
                })
            }
            // Unlimited features bypass the ledger entirely.
            Entitlement::Unlimited => return Ok(QuotaGate::Allowed),
            Entitlement::Metered { limit, period } => (limit, period),
        };

        self.rollover(now);
        let today = now.date_naive();
        let used = match period {
            Period::Day => self.profile.daily_usage.count(feature),
            Period::Week => self.profile.weekly_usage.count(feature),
        };
        let purchased = self.profile.purchased_credits.get(feature);

        if used.saturating_add(amount) > limit.saturating_add(purchased) {
            return Ok(QuotaGate::LimitExceeded {
                feature,
                label: feature.label().to_string(),
                used,
                limit,
                purchased,
                resets_at: next_reset(period, today),
            });
        }

        match period {
            Period::Day => self.profile.daily_usage.record(feature, amount),
            Period::Week => self.profile.weekly_usage.record(feature, amount),
        }
        self.store.save(&self.profile)?;
        Ok(QuotaGate::Allowed)
    }

    /// Unconditionally adds a pack to the purchased balance. Payment is
    /// handled (or simulated) outside this engine.
    pub fn purchase_credits(&mut self, feature: Feature, pack_size: u32) -> Result<()> {
        self.profile.purchased_credits.add(feature, pack_size);
        self.store.save(&self.profile)
    }

    pub fn set_subscription(&mut self, subscription: SubscriptionState) -> Result<()> {
        self.profile.subscription = subscription;
        self.store.save(&self.profile)
    }

    pub fn remaining_uses(&self, feature: Feature) -> QuotaStatus {
        self.remaining_uses_at(feature, Utc::now())
    }

    /// Same rollover-aware view as `check()`, without mutating or persisting
    /// anything: a stale record reads as zero.
    pub fn remaining_uses_at(&self, feature: Feature, now: DateTime<Utc>) -> QuotaStatus {
        let label = feature.label().to_string();
        let purchased = self.profile.purchased_credits.get(feature);

        match resolver::resolve(&self.profile.subscription, feature, now) {
            Entitlement::Blocked => QuotaStatus {
                feature,
                label,
                available: false,
                limit: None,
                period: None,
                used: 0,
                purchased,
                remaining: Some(0),
            },
            Entitlement::Unlimited => {
                // The feature still has a nominal cadence in the catalog;
                // report it even though nothing is ledgered.
                let tier = resolver::effective_tier(&self.profile.subscription, now);
                let period = PlanCatalog::get().feature(tier, feature).map(|s| s.period);
                QuotaStatus {
                    feature,
                    label,
                    available: true,
                    limit: None,
                    period,
                    used: 0,
                    purchased,
                    remaining: None,
                }
            }
            Entitlement::Metered { limit, period } => {
                let today = now.date_naive();
                let used = match period {
                    Period::Day => self.profile.daily_usage.current_count(feature, today),
                    Period::Week => self.profile.weekly_usage.current_count(feature, today),
                };
                QuotaStatus {
                    feature,
                    label,
                    available: true,
                    limit: Some(limit),
                    period: Some(period),
                    used,
                    purchased,
                    remaining: Some(limit.saturating_add(purchased).saturating_sub(used)),
                }
            }
        }
    }

    pub fn status_report(&self) -> Vec<QuotaStatus> {
        self.status_report_at(Utc::now())
    }

    pub fn status_report_at(&self, now: DateTime<Utc>) -> Vec<QuotaStatus> {
        Feature::ALL
            .iter()
            .map(|f| self.remaining_uses_at(*f, now))
            .collect()
    }
}

fn next_reset(period: Period, today: chrono::NaiveDate) -> DateTime<Utc> {
    let next = match period {
        Period::Day => today + chrono::Duration::days(1),
        Period::Week => week_start_of(today) + chrono::Duration::days(7),
    };
    next.and_hms_opt(0, 0, 0).unwrap().and_utc()
}

/// Shared enforcer type: the write lock serializes every check.
pub type SharedQuotaEnforcer = Arc<RwLock<QuotaEnforcer>>;

pub fn create_shared_enforcer(store: Box<dyn ProfileStore>) -> Result<SharedQuotaEnforcer> {
    let enforcer = QuotaEnforcer::new(store)?;
    Ok(Arc::new(RwLock::new(enforcer)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    use crate::entitlement::catalog::TierKey;
    use crate::profile::JsonProfileStore;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn enforcer_in(dir: &std::path::Path) -> QuotaEnforcer {
        let store = JsonProfileStore::new(dir.to_path_buf()).unwrap();
        QuotaEnforcer::new(Box::new(store)).unwrap()
    }

    /// Basic, non-trial user.
    fn basic_enforcer(dir: &std::path::Path) -> QuotaEnforcer {
        let mut enforcer = enforcer_in(dir);
        enforcer
            .set_subscription(SubscriptionState::default())
            .unwrap();
        enforcer
    }

    fn subscribed(plan: TierKey) -> SubscriptionState {
        SubscriptionState {
            is_subscribed: true,
            current_plan: Some(plan),
            billing_cycle: None,
            trial_end_date: None,
        }
    }

    #[test]
    fn test_exactly_limit_allowed_then_denied() {
        let dir = tempdir().unwrap();
        let mut enforcer = basic_enforcer(dir.path());
        let now = at(2026, 3, 3);

        // Basic chatInteractions: 5/day.
        for _ in 0..5 {
            assert!(enforcer
                .check_at(Feature::ChatInteractions, 1, now)
                .unwrap()
                .is_allowed());
        }

        let gate = enforcer.check_at(Feature::ChatInteractions, 1, now).unwrap();
        match gate {
            QuotaGate::LimitExceeded { used, limit, .. } => {
                assert_eq!(used, 5);
                assert_eq!(limit, 5);
            }
            other => panic!("expected LimitExceeded, got {:?}", other),
        }
        // The stored count never exceeds the limit.
        assert_eq!(enforcer.profile.daily_usage.count(Feature::ChatInteractions), 5);
    }

    #[test]
    fn test_purchased_credits_extend_limit() {
        let dir = tempdir().unwrap();
        let mut enforcer = basic_enforcer(dir.path());
        let now = at(2026, 3, 3);

        // Basic recipeSearches: 3/day, plus a 2-credit pack: 5 total.
        enforcer.purchase_credits(Feature::RecipeSearches, 2).unwrap();
        for _ in 0..5 {
            assert!(enforcer
                .check_at(Feature::RecipeSearches, 1, now)
                .unwrap()
                .is_allowed());
        }

        let gate = enforcer.check_at(Feature::RecipeSearches, 1, now).unwrap();
        match gate {
            QuotaGate::LimitExceeded {
                used,
                limit,
                purchased,
                ..
            } => {
                assert_eq!(used, 5);
                assert_eq!(limit, 3);
                assert_eq!(purchased, 2);
            }
            other => panic!("expected LimitExceeded, got {:?}", other),
        }
    }

    #[test]
    fn test_unlimited_bypasses_ledger() {
        let dir = tempdir().unwrap();
        let mut enforcer = enforcer_in(dir.path());
        enforcer
            .set_subscription(subscribed(TierKey::Premium))
            .unwrap();
        let now = at(2026, 3, 3);

        for _ in 0..1000 {
            assert!(enforcer
                .check_at(Feature::ChatInteractions, 1, now)
                .unwrap()
                .is_allowed());
        }
        assert_eq!(enforcer.profile.daily_usage.count(Feature::ChatInteractions), 0);
    }

    #[test]
    fn test_blocked_feature_denied_with_label() {
        let dir = tempdir().unwrap();
        let mut enforcer = basic_enforcer(dir.path());

        let gate = enforcer
            .check_at(Feature::RecipeImageGen, 1, at(2026, 3, 3))
            .unwrap();
        match gate {
            QuotaGate::NotAvailable { label, .. } => {
                assert_eq!(label, "Geração de imagem de receita");
            }
            other => panic!("expected NotAvailable, got {:?}", other),
        }
    }

    #[test]
    fn test_meal_analysis_daily_scenario() {
        let dir = tempdir().unwrap();
        let mut enforcer = basic_enforcer(dir.path());

        // Basic mealAnalysesImage: 1/day.
        let day1 = at(2026, 3, 3);
        assert!(enforcer
            .check_at(Feature::MealAnalysesImage, 1, day1)
            .unwrap()
            .is_allowed());

        let gate = enforcer.check_at(Feature::MealAnalysesImage, 1, day1).unwrap();
        match gate {
            QuotaGate::LimitExceeded { label, .. } => {
                assert_eq!(label, "Análise de imagem da refeição");
            }
            other => panic!("expected LimitExceeded, got {:?}", other),
        }

        // First call the next calendar day rolls the record over and is
        // allowed again.
        let day2 = at(2026, 3, 4);
        assert!(enforcer
            .check_at(Feature::MealAnalysesImage, 1, day2)
            .unwrap()
            .is_allowed());
        assert_eq!(enforcer.profile.daily_usage.date, day2.date_naive());
        assert_eq!(
            enforcer.profile.daily_usage.count(Feature::MealAnalysesImage),
            1
        );
    }

    #[test]
    fn test_weekly_plan_scenario() {
        let dir = tempdir().unwrap();
        let mut enforcer = basic_enforcer(dir.path());

        // Basic weeklyPlanGenerations: 1/week. Monday then Wednesday of the
        // same ISO week, then the following Monday.
        let monday = at(2026, 3, 2);
        let wednesday = at(2026, 3, 4);
        let next_monday = at(2026, 3, 9);

        assert!(enforcer
            .check_at(Feature::WeeklyPlanGenerations, 1, monday)
            .unwrap()
            .is_allowed());
        assert!(!enforcer
            .check_at(Feature::WeeklyPlanGenerations, 1, wednesday)
            .unwrap()
            .is_allowed());
        assert!(enforcer
            .check_at(Feature::WeeklyPlanGenerations, 1, next_monday)
            .unwrap()
            .is_allowed());
    }

    #[test]
    fn test_trial_grants_pro_limits_until_expiry() {
        let dir = tempdir().unwrap();
        let mut enforcer = enforcer_in(dir.path());
        enforcer
            .set_subscription(SubscriptionState {
                is_subscribed: false,
                current_plan: None,
                billing_cycle: None,
                trial_end_date: Some(at(2026, 3, 10)),
            })
            .unwrap();

        // In trial: Pro grants recipeImageGen.
        assert!(enforcer
            .check_at(Feature::RecipeImageGen, 1, at(2026, 3, 5))
            .unwrap()
            .is_allowed());

        // Past the trial end, with no other state change, the same feature
        // is blocked at Basic.
        let gate = enforcer
            .check_at(Feature::RecipeImageGen, 1, at(2026, 3, 11))
            .unwrap();
        assert!(matches!(gate, QuotaGate::NotAvailable { .. }));
    }

    #[test]
    fn test_amount_greater_than_remaining_is_denied_whole() {
        let dir = tempdir().unwrap();
        let mut enforcer = basic_enforcer(dir.path());
        let now = at(2026, 3, 3);

        // Basic recipeSearches: 3/day; a 2-use batch fits, a 2-use batch
        // after that does not and charges nothing.
        assert!(enforcer
            .check_at(Feature::RecipeSearches, 2, now)
            .unwrap()
            .is_allowed());
        assert!(!enforcer
            .check_at(Feature::RecipeSearches, 2, now)
            .unwrap()
            .is_allowed());
        assert_eq!(enforcer.profile.daily_usage.count(Feature::RecipeSearches), 2);
    }

    #[test]
    fn test_remaining_uses_is_rollover_aware_and_pure() {
        let dir = tempdir().unwrap();
        let mut enforcer = basic_enforcer(dir.path());
        let day1 = at(2026, 3, 3);

        enforcer.check_at(Feature::ChatInteractions, 3, day1).unwrap();

        let status = enforcer.remaining_uses_at(Feature::ChatInteractions, day1);
        assert_eq!(status.used, 3);
        assert_eq!(status.remaining, Some(2));
        assert_eq!(status.period, Some(Period::Day));

        // Next day the same read reports a full allowance without touching
        // the stored record.
        let status = enforcer.remaining_uses_at(Feature::ChatInteractions, at(2026, 3, 4));
        assert_eq!(status.used, 0);
        assert_eq!(status.remaining, Some(5));
        assert_eq!(enforcer.profile.daily_usage.date, day1.date_naive());
    }

    #[test]
    fn test_remaining_uses_unlimited_and_blocked() {
        let dir = tempdir().unwrap();
        let mut enforcer = enforcer_in(dir.path());
        enforcer
            .set_subscription(subscribed(TierKey::Premium))
            .unwrap();

        let status = enforcer.remaining_uses_at(Feature::ChatInteractions, at(2026, 3, 3));
        assert!(status.available);
        assert_eq!(status.limit, None);
        assert_eq!(status.remaining, None);

        enforcer
            .set_subscription(SubscriptionState::default())
            .unwrap();
        let status = enforcer.remaining_uses_at(Feature::RecipeImageGen, at(2026, 3, 3));
        assert!(!status.available);
        assert_eq!(status.remaining, Some(0));
    }

    #[test]
    fn test_usage_persists_across_instances() {
        let dir = tempdir().unwrap();
        // The constructor applies rollover against the real clock, so this
        // test has to record against it too.
        let now = Utc::now();

        {
            let mut enforcer = basic_enforcer(dir.path());
            enforcer.check_at(Feature::ChatInteractions, 1, now).unwrap();
            enforcer.purchase_credits(Feature::MealAnalysesImage, 4).unwrap();
        }

        let enforcer = enforcer_in(dir.path());
        assert_eq!(
            enforcer.profile.daily_usage.count(Feature::ChatInteractions),
            1
        );
        assert_eq!(
            enforcer.profile.purchased_credits.get(Feature::MealAnalysesImage),
            4
        );
    }

    #[test]
    fn test_status_report_covers_all_features() {
        let dir = tempdir().unwrap();
        let enforcer = basic_enforcer(dir.path());
        let report = enforcer.status_report_at(at(2026, 3, 3));
        assert_eq!(report.len(), Feature::ALL.len());
    }

    #[test]
    fn test_next_reset_boundaries() {
        let wednesday = chrono::NaiveDate::from_ymd_opt(2026, 3, 4).unwrap();
        assert_eq!(
            next_reset(Period::Day, wednesday),
            at(2026, 3, 5) - chrono::Duration::hours(12)
        );
        assert_eq!(
            next_reset(Period::Week, wednesday),
            at(2026, 3, 9) - chrono::Duration::hours(12)
        );
    }
}

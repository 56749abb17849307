//! User profile and its persistence boundary.
//!
//! The profile holds everything the entitlement engine needs: subscription
//! state, the daily/weekly usage records and purchased credits. It is
//! persisted wholesale as a JSON file; a single `save` is atomic from the
//! perspective of one `check()` call because the enforcer serializes access.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::entitlement::{BillingCycle, DailyUsage, PurchasedCredits, TierKey, WeeklyUsage};

/// Trial window granted at registration, in days.
pub const TRIAL_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SubscriptionState {
    pub is_subscribed: bool,
    pub current_plan: Option<TierKey>,
    pub billing_cycle: Option<BillingCycle>,
    pub trial_end_date: Option<DateTime<Utc>>,
}

impl SubscriptionState {
    /// True while the user is not subscribed and the trial window has not
    /// closed. A missing trial end date means no trial.
    pub fn trial_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_subscribed && self.trial_end_date.is_some_and(|end| now < end)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub subscription: SubscriptionState,
    pub daily_usage: DailyUsage,
    pub weekly_usage: WeeklyUsage,
    pub purchased_credits: PurchasedCredits,
}

impl UserProfile {
    /// Fresh profile as created at registration: unsubscribed, trial window
    /// stamped from `now`, zeroed usage records for the current day/week.
    pub fn registered_at(now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: None,
            created_at: now,
            subscription: SubscriptionState {
                is_subscribed: false,
                current_plan: None,
                billing_cycle: None,
                trial_end_date: Some(now + chrono::Duration::days(TRIAL_DAYS)),
            },
            daily_usage: DailyUsage::new(now.date_naive()),
            weekly_usage: WeeklyUsage::new(now.date_naive()),
            purchased_credits: PurchasedCredits::default(),
        }
    }
}

/// Persistence boundary for the profile. Load/save failures are local fatal
/// errors surfaced to the caller, never swallowed.
pub trait ProfileStore: Send + Sync {
    fn load(&self) -> Result<UserProfile>;
    fn save(&self, profile: &UserProfile) -> Result<()>;
}

pub struct JsonProfileStore {
    path: PathBuf,
}

impl JsonProfileStore {
    const PROFILE_FILE: &'static str = "profile.json";

    pub fn new(data_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self {
            path: data_dir.join(Self::PROFILE_FILE),
        })
    }
}

impl ProfileStore for JsonProfileStore {
    fn load(&self) -> Result<UserProfile> {
        if self.path.exists() {
            let content = std::fs::read_to_string(&self.path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(UserProfile::registered_at(Utc::now()))
        }
    }

    fn save(&self, profile: &UserProfile) -> Result<()> {
        let content = serde_json::to_string_pretty(profile)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

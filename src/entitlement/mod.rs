pub mod catalog;
pub mod credits;
pub mod enforcer;
pub mod ledger;
pub mod resolver;

pub use catalog::{BillingCycle, EntitlementError, Feature, Period, PlanCatalog, TierKey};
pub use credits::PurchasedCredits;
pub use enforcer::{
    create_shared_enforcer, QuotaEnforcer, QuotaGate, QuotaStatus, SharedQuotaEnforcer,
};
pub use ledger::{week_start_of, DailyUsage, WeeklyUsage};
pub use resolver::{effective_tier, resolve, Entitlement};

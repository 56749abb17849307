//! Static plan catalog for the subscription tiers.
//!
//! Defines the three tiers (Basic/Pro/Premium), the meterable features and
//! the per-tier limit each tier grants. Pure data, consulted by the resolver
//! and the enforcer.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EntitlementError {
    #[error("unknown tier: {0}")]
    UnknownTier(String),
    #[error("unknown feature: {0}")]
    UnknownFeature(String),
}

/// Meterable AI-backed actions. Wire keys are camelCase, as the client apps
/// send them; labels are the pt-BR copy shown in paywall messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    #[serde(rename = "dailyPlanGenerations")]
    DailyPlanGenerations,
    #[serde(rename = "weeklyPlanGenerations")]
    WeeklyPlanGenerations,
    #[serde(rename = "chatInteractions")]
    ChatInteractions,
    #[serde(rename = "recipeSearches")]
    RecipeSearches,
    #[serde(rename = "mealAnalysesImage")]
    MealAnalysesImage,
    #[serde(rename = "recipeImageGen")]
    RecipeImageGen,
}

impl Feature {
    pub const ALL: [Feature; 6] = [
        Feature::DailyPlanGenerations,
        Feature::WeeklyPlanGenerations,
        Feature::ChatInteractions,
        Feature::RecipeSearches,
        Feature::MealAnalysesImage,
        Feature::RecipeImageGen,
    ];

    pub fn as_key(&self) -> &'static str {
        match self {
            Feature::DailyPlanGenerations => "dailyPlanGenerations",
            Feature::WeeklyPlanGenerations => "weeklyPlanGenerations",
            Feature::ChatInteractions => "chatInteractions",
            Feature::RecipeSearches => "recipeSearches",
            Feature::MealAnalysesImage => "mealAnalysesImage",
            Feature::RecipeImageGen => "recipeImageGen",
        }
    }

    pub fn from_key(key: &str) -> Result<Self, EntitlementError> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.as_key() == key)
            .ok_or_else(|| EntitlementError::UnknownFeature(key.to_string()))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Feature::DailyPlanGenerations => "Geração de plano diário",
            Feature::WeeklyPlanGenerations => "Geração de plano semanal",
            Feature::ChatInteractions => "Conversas com o nutricionista IA",
            Feature::RecipeSearches => "Busca de receitas",
            Feature::MealAnalysesImage => "Análise de imagem da refeição",
            Feature::RecipeImageGen => "Geração de imagem de receita",
        }
    }
}

/// Subscription tiers, ordered for upgrade/downgrade comparisons.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum TierKey {
    #[default]
    Basic,
    Pro,
    Premium,
}

impl TierKey {
    pub fn as_key(&self) -> &'static str {
        match self {
            TierKey::Basic => "basic",
            TierKey::Pro => "pro",
            TierKey::Premium => "premium",
        }
    }

    pub fn from_key(key: &str) -> Result<Self, EntitlementError> {
        match key {
            "basic" => Ok(TierKey::Basic),
            "pro" => Ok(TierKey::Pro),
            "premium" => Ok(TierKey::Premium),
            other => Err(EntitlementError::UnknownTier(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Monthly,
    Annual,
}

/// Rollover cadence of a feature's quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Period {
    Day,
    Week,
}

/// What a tier grants for one feature. `limit: None` means uncapped.
#[derive(Debug, Clone, Copy)]
pub struct FeatureSpec {
    pub limit: Option<u32>,
    pub period: Period,
    pub available: bool,
}

impl FeatureSpec {
    fn capped(limit: u32, period: Period) -> Self {
        Self {
            limit: Some(limit),
            period,
            available: true,
        }
    }

    fn unlimited(period: Period) -> Self {
        Self {
            limit: None,
            period,
            available: true,
        }
    }

    fn unavailable(period: Period) -> Self {
        Self {
            limit: Some(0),
            period,
            available: false,
        }
    }
}

pub struct TierPlan {
    pub key: TierKey,
    pub name: &'static str,
    /// Prices in BRL.
    pub monthly_price: f64,
    pub annual_price: f64,
    features: HashMap<Feature, FeatureSpec>,
}

impl TierPlan {
    pub fn price(&self, cycle: BillingCycle) -> f64 {
        match cycle {
            BillingCycle::Monthly => self.monthly_price,
            BillingCycle::Annual => self.annual_price,
        }
    }

    pub fn feature(&self, feature: Feature) -> Option<&FeatureSpec> {
        self.features.get(&feature)
    }
}

pub struct PlanCatalog {
    basic: TierPlan,
    pro: TierPlan,
    premium: TierPlan,
}

impl PlanCatalog {
    pub fn get() -> &'static Self {
        static CATALOG: std::sync::OnceLock<PlanCatalog> = std::sync::OnceLock::new();
        CATALOG.get_or_init(PlanCatalog::default_catalog)
    }

    pub fn tier(&self, key: TierKey) -> &TierPlan {
        match key {
            TierKey::Basic => &self.basic,
            TierKey::Pro => &self.pro,
            TierKey::Premium => &self.premium,
        }
    }

    /// `None` means the tier does not define the feature at all, which
    /// callers must treat the same as not available.
    pub fn feature(&self, tier: TierKey, feature: Feature) -> Option<&FeatureSpec> {
        self.tier(tier).feature(feature)
    }

    fn default_catalog() -> Self {
        use Feature::*;
        use Period::{Day, Week};

        let basic = TierPlan {
            key: TierKey::Basic,
            name: "Basic",
            monthly_price: 0.0,
            annual_price: 0.0,
            features: HashMap::from([
                (DailyPlanGenerations, FeatureSpec::capped(1, Day)),
                (WeeklyPlanGenerations, FeatureSpec::capped(1, Week)),
                (ChatInteractions, FeatureSpec::capped(5, Day)),
                (RecipeSearches, FeatureSpec::capped(3, Day)),
                (MealAnalysesImage, FeatureSpec::capped(1, Day)),
                (RecipeImageGen, FeatureSpec::unavailable(Week)),
            ]),
        };

        let pro = TierPlan {
            key: TierKey::Pro,
            name: "Pro",
            monthly_price: 29.90,
            annual_price: 299.90,
            features: HashMap::from([
                (DailyPlanGenerations, FeatureSpec::capped(5, Day)),
                (WeeklyPlanGenerations, FeatureSpec::capped(3, Week)),
                (ChatInteractions, FeatureSpec::capped(30, Day)),
                (RecipeSearches, FeatureSpec::capped(20, Day)),
                (MealAnalysesImage, FeatureSpec::capped(10, Day)),
                (RecipeImageGen, FeatureSpec::capped(5, Week)),
            ]),
        };

        let premium = TierPlan {
            key: TierKey::Premium,
            name: "Premium",
            monthly_price: 49.90,
            annual_price: 499.90,
            features: HashMap::from([
                (DailyPlanGenerations, FeatureSpec::unlimited(Day)),
                (WeeklyPlanGenerations, FeatureSpec::unlimited(Week)),
                (ChatInteractions, FeatureSpec::unlimited(Day)),
                (RecipeSearches, FeatureSpec::unlimited(Day)),
                (MealAnalysesImage, FeatureSpec::capped(30, Day)),
                (RecipeImageGen, FeatureSpec::capped(20, Week)),
            ]),
        };

        Self {
            basic,
            pro,
            premium,
        }
    }
}

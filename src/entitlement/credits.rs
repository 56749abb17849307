//! À-la-carte credit packs purchased per feature.
//!
//! Credits accumulate indefinitely and are never decremented: consumption is
//! computed on the fly as overflow past the plan limit (`limit + purchased`),
//! so a purchased pack behaves as a permanent limit raise.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::catalog::Feature;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PurchasedCredits {
    #[serde(default)]
    credits: HashMap<Feature, u32>,
}

impl PurchasedCredits {
    pub fn get(&self, feature: Feature) -> u32 {
        self.credits.get(&feature).copied().unwrap_or(0)
    }

    pub fn add(&mut self, feature: Feature, amount: u32) {
        let balance = self.credits.entry(feature).or_insert(0);
        *balance = balance.saturating_add(amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_zero() {
        let credits = PurchasedCredits::default();
        assert_eq!(credits.get(Feature::ChatInteractions), 0);
    }

    #[test]
    fn test_add_accumulates() {
        let mut credits = PurchasedCredits::default();
        credits.add(Feature::MealAnalysesImage, 5);
        credits.add(Feature::MealAnalysesImage, 3);
        assert_eq!(credits.get(Feature::MealAnalysesImage), 8);
        assert_eq!(credits.get(Feature::ChatInteractions), 0);
    }
}

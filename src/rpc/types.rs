use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ai::ChatMessage;
use crate::entitlement::{BillingCycle, EntitlementError, QuotaGate, TierKey};
use crate::profile::SubscriptionState;

#[derive(Debug, Clone, Deserialize)]
pub struct QuotaCheckRequest {
    pub feature: String,
    pub amount: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreditsPurchaseRequest {
    pub feature: String,
    pub pack_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionUpdateRequest {
    pub is_subscribed: bool,
    pub current_plan: Option<String>,
    pub billing_cycle: Option<BillingCycle>,
    pub trial_end_date: Option<DateTime<Utc>>,
}

impl SubscriptionUpdateRequest {
    pub fn into_state(self) -> Result<SubscriptionState, EntitlementError> {
        let current_plan = self
            .current_plan
            .as_deref()
            .map(TierKey::from_key)
            .transpose()?;
        Ok(SubscriptionState {
            is_subscribed: self.is_subscribed,
            current_plan,
            billing_cycle: self.billing_cycle,
            trial_end_date: self.trial_end_date,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub history: Option<Vec<ChatMessage>>,
    pub provider: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DailyPlanRequest {
    pub calories_target: Option<u32>,
    pub meals_per_day: Option<u32>,
    pub dietary_preferences: Option<Vec<String>>,
    pub exclusions: Option<Vec<String>>,
    pub provider: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeeklyPlanRequest {
    pub calories_target: Option<u32>,
    pub dietary_preferences: Option<Vec<String>>,
    pub exclusions: Option<Vec<String>>,
    pub provider: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanResponse {
    pub plan: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MealAnalyzeRequest {
    pub meal_description: String,
    pub provider: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MealAnalyzeResponse {
    pub analysis: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecipeSearchRequest {
    pub query: String,
    pub max_results: Option<usize>,
    pub provider: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeSearchResponse {
    pub results: String,
}

/// Denial payload sent to the clients, which react with the paywall UI.
#[derive(Debug, Serialize)]
pub struct PaywallResponse {
    pub error: String,
    pub code: PaywallCode,
    pub feature: String,
    pub label: String,
    pub upgrade_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchased: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resets_at: Option<String>,
}

#[derive(Debug, Serialize, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaywallCode {
    NotAvailable,
    LimitExceeded,
}

impl PaywallResponse {
    const UPGRADE_URL: &'static str = "https://nutria.app/planos";

    pub fn not_available(feature: &str, label: &str) -> Self {
        Self {
            error: format!("'{}' não está incluído no seu plano", label),
            code: PaywallCode::NotAvailable,
            feature: feature.to_string(),
            label: label.to_string(),
            upgrade_url: Self::UPGRADE_URL.to_string(),
            used: None,
            limit: None,
            purchased: None,
            resets_at: None,
        }
    }

    pub fn from_gate(gate: QuotaGate) -> Option<Self> {
        match gate {
            QuotaGate::Allowed => None,
            QuotaGate::NotAvailable { feature, label } => {
                Some(Self::not_available(feature.as_key(), &label))
            }
            QuotaGate::LimitExceeded {
                feature,
                label,
                used,
                limit,
                purchased,
                resets_at,
            } => Some(Self {
                error: format!("Limite de '{}' atingido ({}/{})", label, used, limit + purchased),
                code: PaywallCode::LimitExceeded,
                feature: feature.as_key().to_string(),
                label,
                upgrade_url: Self::UPGRADE_URL.to_string(),
                used: Some(used),
                limit: Some(limit),
                purchased: Some(purchased),
                resets_at: Some(resets_at.to_rfc3339()),
            }),
        }
    }
}

impl IntoResponse for PaywallResponse {
    fn into_response(self) -> Response {
        let status = match self.code {
            PaywallCode::NotAvailable => StatusCode::PAYMENT_REQUIRED,
            PaywallCode::LimitExceeded => StatusCode::TOO_MANY_REQUESTS,
        };
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entitlement::Feature;
    use chrono::TimeZone;

    #[test]
    fn test_paywall_not_available_json() {
        let paywall = PaywallResponse::not_available("recipeImageGen", "Geração de imagem de receita");
        let json = serde_json::to_string(&paywall).unwrap();
        assert!(json.contains("NOT_AVAILABLE"));
        assert!(json.contains("recipeImageGen"));
        assert!(!json.contains("resets_at"));
    }

    #[test]
    fn test_paywall_from_limit_exceeded() {
        let gate = QuotaGate::LimitExceeded {
            feature: Feature::MealAnalysesImage,
            label: Feature::MealAnalysesImage.label().to_string(),
            used: 1,
            limit: 1,
            purchased: 0,
            resets_at: Utc.with_ymd_and_hms(2026, 3, 4, 0, 0, 0).unwrap(),
        };
        let paywall = PaywallResponse::from_gate(gate).unwrap();
        let json = serde_json::to_string(&paywall).unwrap();
        assert!(json.contains("LIMIT_EXCEEDED"));
        assert!(json.contains("mealAnalysesImage"));
        assert!(json.contains("Análise de imagem da refeição"));
        assert!(json.contains("2026-03-04"));
    }

    #[test]
    fn test_paywall_from_allowed_is_none() {
        assert!(PaywallResponse::from_gate(QuotaGate::Allowed).is_none());
    }

    #[test]
    fn test_subscription_update_parses_plan() {
        let request = SubscriptionUpdateRequest {
            is_subscribed: true,
            current_plan: Some("premium".to_string()),
            billing_cycle: Some(BillingCycle::Annual),
            trial_end_date: None,
        };
        let state = request.into_state().unwrap();
        assert_eq!(state.current_plan, Some(TierKey::Premium));
    }

    #[test]
    fn test_subscription_update_rejects_unknown_plan() {
        let request = SubscriptionUpdateRequest {
            is_subscribed: true,
            current_plan: Some("diamond".to_string()),
            billing_cycle: None,
            trial_end_date: None,
        };
        assert!(request.into_state().is_err());
    }
}

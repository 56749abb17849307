pub mod providers;

pub use providers::{create_backend, AiBackend, AiConfig, AiProvider, ChatMessage};

use anyhow::Result;

use crate::rpc::{
    ChatRequest, DailyPlanRequest, MealAnalyzeRequest, RecipeSearchRequest, WeeklyPlanRequest,
};

const COACH_SYSTEM_PROMPT: &str = "Você é um nutricionista virtual acolhedor e objetivo. \
Responda em português, com orientações práticas baseadas em evidências. \
Não prescreva dietas restritivas para condições clínicas; nesses casos, \
recomende a consulta a um profissional de saúde.";

fn config_from(
    provider: Option<&str>,
    api_key: Option<String>,
    model: Option<String>,
) -> Result<AiConfig> {
    let provider = match provider {
        Some(name) => match name.to_lowercase().as_str() {
            "openai" | "open-ai" => AiProvider::OpenAi,
            "anthropic" => AiProvider::Anthropic,
            other => anyhow::bail!("Unknown AI provider: {}", other),
        },
        None => AiProvider::default(),
    };

    Ok(AiConfig {
        provider,
        api_key,
        model,
        base_url: None,
    })
}

pub async fn coach_chat(request: &ChatRequest) -> Result<String> {
    let config = config_from(
        request.provider.as_deref(),
        request.api_key.clone(),
        request.model.clone(),
    )?;
    let backend = create_backend(&config)?;

    let mut messages = vec![ChatMessage {
        role: "system".to_string(),
        content: COACH_SYSTEM_PROMPT.to_string(),
    }];
    if let Some(ref history) = request.history {
        messages.extend(history.iter().cloned());
    }
    messages.push(ChatMessage {
        role: "user".to_string(),
        content: request.message.clone(),
    });

    backend.chat(messages, 1024).await
}

pub async fn generate_daily_plan(request: &DailyPlanRequest) -> Result<String> {
    let config = config_from(
        request.provider.as_deref(),
        request.api_key.clone(),
        request.model.clone(),
    )?;
    let backend = create_backend(&config)?;
    backend.generate(&daily_plan_prompt(request), 2048).await
}

pub async fn generate_weekly_plan(request: &WeeklyPlanRequest) -> Result<String> {
    let config = config_from(
        request.provider.as_deref(),
        request.api_key.clone(),
        request.model.clone(),
    )?;
    let backend = create_backend(&config)?;
    backend.generate(&weekly_plan_prompt(request), 4096).await
}

pub async fn analyze_meal(request: &MealAnalyzeRequest) -> Result<String> {
    let config = config_from(
        request.provider.as_deref(),
        request.api_key.clone(),
        request.model.clone(),
    )?;
    let backend = create_backend(&config)?;

    let prompt = format!(
        "Analise a refeição descrita abaixo e estime calorias e macronutrientes \
         (proteínas, carboidratos, gorduras). Aponte pontos positivos e sugestões \
         de melhoria, em tom construtivo.\n\nRefeição: {}",
        request.meal_description
    );
    backend.generate(&prompt, 1024).await
}

pub async fn search_recipes(request: &RecipeSearchRequest) -> Result<String> {
    let config = config_from(
        request.provider.as_deref(),
        request.api_key.clone(),
        request.model.clone(),
    )?;
    let backend = create_backend(&config)?;

    let max_results = request.max_results.unwrap_or(5);
    let prompt = format!(
        "Sugira até {} receitas saudáveis para: {}. Para cada receita, liste \
         ingredientes, modo de preparo resumido e calorias aproximadas por porção.",
        max_results, request.query
    );
    backend.generate(&prompt, 2048).await
}

fn daily_plan_prompt(request: &DailyPlanRequest) -> String {
    let calories = request
        .calories_target
        .map(|c| format!("{} kcal", c))
        .unwrap_or_else(|| "adequado ao perfil".to_string());
    let meals = request.meals_per_day.unwrap_or(4);

    let mut prompt = format!(
        "Monte um plano alimentar para um dia, com {} refeições e meta de {}. \
         Para cada refeição, descreva os alimentos, as porções e as calorias.",
        meals, calories
    );
    if let Some(ref preferences) = request.dietary_preferences {
        if !preferences.is_empty() {
            prompt.push_str(&format!("\nPreferências: {}.", preferences.join(", ")));
        }
    }
    if let Some(ref exclusions) = request.exclusions {
        if !exclusions.is_empty() {
            prompt.push_str(&format!("\nNão incluir: {}.", exclusions.join(", ")));
        }
    }
    prompt
}

fn weekly_plan_prompt(request: &WeeklyPlanRequest) -> String {
    let calories = request
        .calories_target
        .map(|c| format!("{} kcal por dia", c))
        .unwrap_or_else(|| "adequada ao perfil".to_string());

    let mut prompt = format!(
        "Monte um plano alimentar para sete dias (segunda a domingo), com meta de {}. \
         Varie as refeições ao longo da semana e resuma cada dia em café da manhã, \
         almoço, lanche e jantar.",
        calories
    );
    if let Some(ref preferences) = request.dietary_preferences {
        if !preferences.is_empty() {
            prompt.push_str(&format!("\nPreferências: {}.", preferences.join(", ")));
        }
    }
    if let Some(ref exclusions) = request.exclusions {
        if !exclusions.is_empty() {
            prompt.push_str(&format!("\nNão incluir: {}.", exclusions.join(", ")));
        }
    }
    prompt
}

use dotenvy::dotenv;
use std::env;

const DEFAULT_AI_API_URL: &str = "https://api.io-intelligence.ai";
const DEFAULT_AI_MODEL: &str = "meta-llama/Llama-3.3-70B-Instruct";

/// Credentials for the hosted chat-completion endpoint. Absent entirely
/// when no key is configured, in which case chat degrades to canned
/// replies without ever touching the network.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub ai: Option<AiConfig>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenv().ok();

        let ai = env::var("AI_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .map(|api_key| AiConfig {
                api_url: env::var("AI_API_URL").unwrap_or_else(|_| DEFAULT_AI_API_URL.to_string()),
                api_key,
                model: env::var("AI_MODEL").unwrap_or_else(|_| DEFAULT_AI_MODEL.to_string()),
            });
        if ai.is_none() {
            tracing::warn!("AI_API_KEY not set; chat replies will use the canned fallback");
        }

        Self { ai }
    }
}

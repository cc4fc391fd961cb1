use anyhow::{Context, Result};
use url::Url;

pub const APP_NAME: &str = "banter";

pub const DEFAULT_API_BASE: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-r1-0528:free";

/// Endpoint configuration resolved from the environment. The API key may
/// be empty, in which case no Authorization header is sent (local
/// OpenAI-compatible endpoints accept that).
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base: Url,
    pub api_key: String,
    pub default_model: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let base = std::env::var("BANTER_API_BASE")
            .unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let api_base = Url::parse(&base)
            .with_context(|| format!("Invalid BANTER_API_BASE: {}", base))?;

        let api_key = std::env::var("BANTER_API_KEY")
            .or_else(|_| std::env::var("OPENROUTER_API_KEY"))
            .unwrap_or_default();

        let default_model =
            std::env::var("BANTER_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Ok(Self {
            api_base,
            api_key,
            default_model,
        })
    }
}

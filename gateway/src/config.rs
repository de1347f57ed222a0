use std::{env, fmt::Display, fs::read_to_string, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{bail, Context, Result};
use chef_core::{AssistantConfig, LlmConfig};
use chef_tools::{format, CardStyle, SYSTEM_PROMPT};
use tracing::{info, warn};

pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// SQL loaded into an empty catalog at startup.
    pub catalog_seed_file: Option<PathBuf>,
    pub client_url: String,
    pub llm: LlmConfig,
    pub max_steps: usize,
    pub tool_timeout: Duration,
    pub meal_instructions_preview: usize,
    pub ingredient_description_preview: usize,
    pub system_prompt_file: Option<PathBuf>,
}

impl Config {
    /// Reads the environment, after merging a `.env` file if one exists.
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            info!("Loaded environment from {}", path.display());
        }

        Ok(Self {
            port: try_load("PORT", "3000")?,
            database_url: try_load("DATABASE_URL", "sqlite://catalog.db?mode=rwc")?,
            catalog_seed_file: optional("CATALOG_SEED_FILE").map(PathBuf::from),
            client_url: try_load("CLIENT_URL", format::DEFAULT_CLIENT_URL)?,
            llm: LlmConfig {
                api_key: required("OPENAI_API_KEY")?,
                model: try_load("OPENAI_MODEL", "gpt-4o")?,
                api_base: optional("OPENAI_API_BASE"),
            },
            max_steps: try_load_nonzero("CHAT_MAX_STEPS", "20")?,
            tool_timeout: Duration::from_secs(try_load_nonzero("TOOL_TIMEOUT_SECS", "15")?),
            meal_instructions_preview: try_load("MEAL_INSTRUCTIONS_PREVIEW", "150")?,
            ingredient_description_preview: try_load("INGREDIENT_DESCRIPTION_PREVIEW", "100")?,
            system_prompt_file: optional("SYSTEM_PROMPT_FILE").map(PathBuf::from),
        })
    }

    pub fn card_style(&self) -> CardStyle {
        CardStyle {
            client_url: self.client_url.clone(),
            meal_instructions_chars: self.meal_instructions_preview,
            ingredient_description_chars: self.ingredient_description_preview,
        }
    }

    /// The built-in instruction, unless a prompt file overrides it.
    pub fn assistant(&self) -> Result<AssistantConfig> {
        let system_prompt = match &self.system_prompt_file {
            Some(path) => read_to_string(path)
                .with_context(|| format!("failed to read system prompt {}", path.display()))?,
            None => SYSTEM_PROMPT.to_string(),
        };

        Ok(AssistantConfig {
            system_prompt,
            max_steps: self.max_steps,
            tool_timeout: self.tool_timeout,
        })
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn required(key: &str) -> Result<String> {
    optional(key).with_context(|| format!("{key} must be set"))
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = optional(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse().map_err(|e| {
        warn!("Invalid {key} value: {e}");
        anyhow::anyhow!("environment misconfigured: {key}={raw}: {e}")
    })
}

/// Like [`try_load`], but a zero value is a misconfiguration.
fn try_load_nonzero<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr + Default + PartialEq,
    T::Err: Display,
{
    let value: T = try_load(key, default)?;
    if value == T::default() {
        bail!("{key} must be at least 1");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_values_fall_back_to_defaults() {
        let port: u16 = try_load("CHEF_TEST_UNSET_PORT", "3000").unwrap();
        assert_eq!(port, 3000);
    }

    #[test]
    fn set_values_are_parsed() {
        env::set_var("CHEF_TEST_STEPS", "7");
        let steps: usize = try_load("CHEF_TEST_STEPS", "20").unwrap();
        assert_eq!(steps, 7);
    }

    #[test]
    fn unparsable_values_are_errors() {
        env::set_var("CHEF_TEST_BAD_PORT", "eighty");
        assert!(try_load::<u16>("CHEF_TEST_BAD_PORT", "3000").is_err());
    }

    #[test]
    fn zero_is_rejected_where_a_limit_is_expected() {
        env::set_var("CHEF_TEST_ZERO_TIMEOUT", "0");
        assert!(try_load_nonzero::<u64>("CHEF_TEST_ZERO_TIMEOUT", "15").is_err());
        assert!(try_load_nonzero::<usize>("CHEF_TEST_ZERO_STEPS", "0").is_err());
        assert_eq!(try_load_nonzero::<u64>("CHEF_TEST_UNSET_TIMEOUT", "15").unwrap(), 15);
    }

    #[test]
    fn blank_values_count_as_unset() {
        env::set_var("CHEF_TEST_BLANK", "  ");
        assert_eq!(optional("CHEF_TEST_BLANK"), None);
        assert!(required("CHEF_TEST_BLANK").is_err());
    }
}

//! Configuration loaded from YAML with a fallback chain.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::DEFAULT_MAX_ITERATIONS;
use crate::llm::{AnthropicConfig, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, LlmClient};
use crate::prompt::{PromptLoader, PromptRenderer};
use crate::runner::LoopController;
use crate::stages::{StageContext, StageOptions, StageSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub llm: LlmConfig,
    pub refine: RefineConfig,
    pub temperatures: TemperatureConfig,
    pub prompts: PromptsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            llm: LlmConfig::default(),
            refine: RefineConfig::default(),
            temperatures: TemperatureConfig::default(),
            prompts: PromptsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub max_tokens: u32,
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_ms: 300000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineConfig {
    pub max_iterations: u32,
    /// Extra attempts for a stage whose output cannot be extracted
    pub malformed_retries: u32,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            malformed_retries: 0,
        }
    }
}

/// Sampling temperatures for the generating stages. Evaluate is fixed at 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemperatureConfig {
    pub decompose: f32,
    pub plan: f32,
    pub apply: f32,
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        let options = StageOptions::default();
        Self {
            decompose: options.decompose_temperature,
            plan: options.plan_temperature,
            apply: options.apply_temperature,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Directory holding `<stage>.md` template overrides
    pub templates_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path)
                .context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config =
                config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!(
                            "Failed to load config from {}: {}",
                            primary_config.display(),
                            e
                        );
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Reject settings a run cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.refine.max_iterations == 0 {
            eyre::bail!("refine.max_iterations must be > 0");
        }
        if self.llm.max_tokens == 0 {
            eyre::bail!("llm.max_tokens must be > 0");
        }
        for (name, value) in [
            ("decompose", self.temperatures.decompose),
            ("plan", self.temperatures.plan),
            ("apply", self.temperatures.apply),
        ] {
            if !(0.0..=1.0).contains(&value) {
                eyre::bail!("temperatures.{} must be between 0.0 and 1.0, got {}", name, value);
            }
        }
        Ok(())
    }

    pub fn stage_options(&self) -> StageOptions {
        StageOptions {
            decompose_temperature: self.temperatures.decompose,
            plan_temperature: self.temperatures.plan,
            apply_temperature: self.temperatures.apply,
            max_tokens: Some(self.llm.max_tokens),
        }
    }

    pub fn anthropic(&self) -> AnthropicConfig {
        AnthropicConfig {
            model: self.llm.model.clone(),
            max_tokens: self.llm.max_tokens,
            timeout: Duration::from_millis(self.llm.timeout_ms),
        }
    }

    /// Template loader honoring `prompts.templates_dir`
    pub fn prompt_loader(&self) -> PromptLoader {
        match &self.prompts.templates_dir {
            Some(dir) => PromptLoader::new(dir),
            None => PromptLoader::builtin(),
        }
    }

    /// Controller wired with the configured templates, sampling and retries
    pub fn controller(&self, llm: Arc<dyn LlmClient>) -> Result<LoopController> {
        if !llm.is_ready() {
            eyre::bail!("LLM client for model {} is not ready to send requests", llm.model());
        }
        let renderer = PromptRenderer::from_loader(&self.prompt_loader())
            .context("Failed to load prompt templates")?;
        let options = self.stage_options();
        let context =
            StageContext::new(llm, Arc::new(renderer)).with_max_tokens(options.max_tokens);

        Ok(LoopController::new(StageSet::new(context, &options))
            .with_malformed_retries(self.refine.malformed_retries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(yaml: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.refine.max_iterations, 3);
        assert_eq!(config.refine.malformed_retries, 0);
        assert_eq!(config.temperatures.decompose, 0.2);
        assert_eq!(config.temperatures.plan, 0.5);
        assert_eq!(config.temperatures.apply, 0.7);
        assert!(config.prompts.templates_dir.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_explicit_path_with_partial_sections() {
        let file = write_config(
            r#"
log_level: debug
refine:
  max_iterations: 5
temperatures:
  apply: 0.9
"#,
        );

        let config = Config::load(Some(&file.path().to_path_buf())).unwrap();

        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.refine.max_iterations, 5);
        assert_eq!(config.refine.malformed_retries, 0);
        assert_eq!(config.temperatures.apply, 0.9);
        assert_eq!(config.temperatures.plan, 0.5);
        assert_eq!(config.llm, LlmConfig::default());
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let path = PathBuf::from("/nonexistent/refinr.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_load_rejects_zero_budget() {
        let file = write_config("refine:\n  max_iterations: 0\n");
        let err = Config::load(Some(&file.path().to_path_buf())).unwrap_err();
        assert!(format!("{:#}", err).contains("max_iterations"));
    }

    #[test]
    fn test_validate_rejects_out_of_range_temperature() {
        let mut config = Config::default();
        config.temperatures.plan = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stage_options_from_config() {
        let mut config = Config::default();
        config.temperatures.decompose = 0.1;
        config.llm.max_tokens = 2048;

        let options = config.stage_options();
        assert_eq!(options.decompose_temperature, 0.1);
        assert_eq!(options.max_tokens, Some(2048));
    }

    #[test]
    fn test_anthropic_config_from_config() {
        let mut config = Config::default();
        config.llm.model = "claude-test".to_string();
        config.llm.timeout_ms = 1500;

        let anthropic = config.anthropic();
        assert_eq!(anthropic.model, "claude-test");
        assert_eq!(anthropic.timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_prompt_loader_uses_templates_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        assert!(config.prompt_loader().templates_dir().is_none());

        config.prompts.templates_dir = Some(dir.path().to_path_buf());
        assert_eq!(config.prompt_loader().templates_dir(), Some(dir.path()));
    }

    #[test]
    fn test_controller_carries_malformed_retries() {
        let mut config = Config::default();
        config.refine.malformed_retries = 2;

        let controller = config.controller(Arc::new(crate::llm::MockLlmClient::new())).unwrap();
        assert_eq!(controller.malformed_retries(), 2);
    }

    #[test]
    fn test_controller_rejects_broken_template_override() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("plan.md"), "{{#if unclosed}}").unwrap();
        let mut config = Config::default();
        config.prompts.templates_dir = Some(dir.path().to_path_buf());

        assert!(config.controller(Arc::new(crate::llm::MockLlmClient::new())).is_err());
    }

    #[test]
    fn test_controller_rejects_client_without_credentials() {
        let anthropic = Config::default().anthropic();
        let client = crate::llm::AnthropicClient::with_api_key(String::new(), anthropic).unwrap();

        let err = Config::default().controller(Arc::new(client)).unwrap_err();
        assert!(err.to_string().contains(DEFAULT_MODEL));
    }
}

use crate::error::ConfigError;
use serde::Deserialize;
use std::{fs, path::Path};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmSection,
    pub form: FormSection,
}

/// Which vision provider reads the note images.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    OpenAi,
    #[default]
    OpenRouter,
    DeepSeek,
}

impl LlmBackend {
    pub fn name(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::OpenRouter => "openrouter",
            Self::DeepSeek => "deepseek",
        }
    }

    /// Environment variable holding the provider's API key.
    pub fn api_key_var(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::OpenRouter => "OPENROUTER_API_KEY",
            Self::DeepSeek => "DEEPSEEK_API_KEY",
        }
    }
}

impl std::str::FromStr for LlmBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "openrouter" => Ok(Self::OpenRouter),
            "deepseek" => Ok(Self::DeepSeek),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub backend: LlmBackend,
    pub openai: EndpointConfig,
    pub openrouter: OpenRouterConfig,
    pub deepseek: EndpointConfig,
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            backend: LlmBackend::default(),
            openai: EndpointConfig {
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o".to_string(),
            },
            openrouter: OpenRouterConfig::default(),
            deepseek: EndpointConfig {
                base_url: "https://api.deepseek.com/v1".to_string(),
                model: "deepseek-vision".to_string(),
            },
            timeout_secs: 60,
            max_tokens: 2000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    pub base_url: String,
    pub model: String,
}

/// OpenRouter rotates across free vision models.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenRouterConfig {
    pub base_url: String,
    pub models: Vec<String>,
    pub referer: String,
    pub title: String,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            models: [
                "google/gemini-2.0-flash-exp:free",
                "google/gemini-exp-1206:free",
                "meta-llama/llama-3.2-90b-vision-instruct:free",
                "meta-llama/llama-3.2-11b-vision-instruct:free",
                "qwen/qwen-2-vl-7b-instruct:free",
            ]
            .map(String::from)
            .into(),
            referer: "https://github.com/delivery-note-processor".to_string(),
            title: "Delivery Note Processor".to_string(),
        }
    }
}

/// The stock-movement form the notes end up on.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FormSection {
    pub url: String,
    pub salida: String,
    pub entrada: String,
}

fn default_salida() -> String {
    "Superi".to_string()
}

fn default_entrada() -> String {
    "Instalación Cliente".to_string()
}

impl Default for FormSection {
    fn default() -> Self {
        Self {
            url: "https://forms.fillout.com/t/jkCP1KMMq8us".to_string(),
            salida: default_salida(),
            entrada: default_entrada(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path` if given (defaults otherwise), then apply env overrides.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let cfg = match path {
            Some(p) => Self::load(p)?,
            None => Self::default(),
        };
        cfg.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply `LLM_PROVIDER`, `DEFAULT_SALIDA` and `DEFAULT_ENTRADA` from `lookup`.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(provider) = lookup("LLM_PROVIDER") {
            self.llm.backend = provider.parse()?;
        }
        if let Some(salida) = lookup("DEFAULT_SALIDA") {
            self.form.salida = salida;
        }
        if let Some(entrada) = lookup("DEFAULT_ENTRADA") {
            self.form.entrada = entrada;
        }
        Ok(self)
    }
}

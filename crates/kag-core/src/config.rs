//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars.
//! `Config::settings` extracts the typed `Settings` once at startup; components
//! take the section they need by reference.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract and validate the typed settings tree. Missing keys fall back
    /// to their defaults.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        match env {
            "prod" | "production" => {
                let provider: String = self.get("embedding.provider").unwrap_or_default();
                if provider == "hash" {
                    anyhow::bail!("hash embeddings are not allowed in production");
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub storage: StorageSettings,
    pub embedding: EmbeddingSettings,
    pub search: SearchSettings,
    pub linking: LinkingSettings,
    pub context: ContextSettings,
    pub llm: LlmSettings,
    pub expansion: ExpansionSettings,
    pub generation: GenerationSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.embedding.dim == 0 {
            return Err(Error::InvalidConfig("embedding.dim must be positive".to_string()));
        }
        if self.search.candidate_limit == 0 {
            return Err(Error::InvalidConfig("search.candidate_limit must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.search.min_score_threshold) {
            return Err(Error::InvalidConfig(format!(
                "search.min_score_threshold must be within [0, 1], got {}",
                self.search.min_score_threshold
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub tantivy_index_dir: String,
    pub lancedb_dir: String,
    pub lancedb_table: String,
    pub graph_db_path: String,
    pub debug_dir: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            tantivy_index_dir: "data/indexes/tantivy".to_string(),
            lancedb_dir: "data/indexes/lancedb".to_string(),
            lancedb_table: "documents".to_string(),
            graph_db_path: "data/graph.sqlite".to_string(),
            debug_dir: "debug_output".to_string(),
        }
    }
}

impl StorageSettings {
    pub fn tantivy_path(&self) -> PathBuf {
        expand_path(&self.tantivy_index_dir)
    }

    pub fn lancedb_path(&self) -> PathBuf {
        expand_path(&self.lancedb_dir)
    }

    pub fn graph_path(&self) -> PathBuf {
        expand_path(&self.graph_db_path)
    }

    pub fn debug_path(&self) -> PathBuf {
        expand_path(&self.debug_dir)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    Local,
    OpenAi,
    Hash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub dim: usize,
    pub endpoint: String,
    pub api_key_env: String,
    pub max_len: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::OpenAi,
            model: "text-embedding-ada-002".to_string(),
            dim: 1536,
            endpoint: "https://api.openai.com/v1/embeddings".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_len: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Hits requested from each index before merging.
    pub candidate_limit: usize,
    pub vector_weight: f32,
    pub min_score_threshold: f32,
    pub exact_phrase_weight: f32,
    pub single_term_weight: f32,
    pub proximity_distance: u32,
    pub max_proximity_terms: usize,
    pub max_clauses: usize,
    /// Queries longer than this many characters are truncated before
    /// clause extraction.
    pub max_query_length: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            candidate_limit: 20,
            vector_weight: 0.7,
            min_score_threshold: 0.15,
            exact_phrase_weight: 2.0,
            single_term_weight: 1.5,
            proximity_distance: 5,
            max_proximity_terms: 5,
            max_clauses: 50,
            max_query_length: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkingSettings {
    pub entity_limit: usize,
    pub relationship_limit: usize,
    pub min_token_len: usize,
}

impl Default for LinkingSettings {
    fn default() -> Self {
        Self { entity_limit: 10, relationship_limit: 20, min_token_len: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    pub max_chars_per_result: usize,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self { max_chars_per_result: 2000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key_env: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            model: "gpt-4o".to_string(),
            max_tokens: 1000,
            temperature: 0.3,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionSettings {
    pub enabled: bool,
    /// Overrides `llm.model` for expansion calls when set.
    pub model: Option<String>,
}

impl Default for ExpansionSettings {
    fn default() -> Self {
        Self { enabled: false, model: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub enabled: bool,
    pub system_prompt: String,
    /// Must contain `{query}` and `{context}`.
    pub prompt_template: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            system_prompt: "You are a knowledgeable assistant that provides accurate answers based on the given context. \
                            Make connections between entities and their relationships to provide comprehensive answers."
                .to_string(),
            prompt_template: "Query: {query}\n\nContext:\n{context}".to_string(),
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::providers::Serialized;

    #[test]
    fn defaults_match_documented_policy() {
        let settings = Settings::default();
        assert!((settings.search.vector_weight - 0.7).abs() < f32::EPSILON);
        assert!((settings.search.min_score_threshold - 0.15).abs() < f32::EPSILON);
        assert_eq!(settings.search.max_clauses, 50);
        assert_eq!(settings.linking.entity_limit, 10);
        assert_eq!(settings.embedding.dim, 1536);
        settings.validate().expect("defaults validate");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::string("[search]\nvector_weight = 0.4\n[embedding]\nprovider = \"hash\"\ndim = 32\n"));
        let settings = Config::from_figment(figment).settings().expect("settings");
        assert!((settings.search.vector_weight - 0.4).abs() < f32::EPSILON);
        assert_eq!(settings.search.candidate_limit, 20);
        assert_eq!(settings.embedding.provider, EmbeddingProvider::Hash);
        assert_eq!(settings.embedding.dim, 32);
    }

    #[test]
    fn rejects_threshold_outside_unit_interval() {
        let figment = Figment::new().merge(Toml::string("[search]\nmin_score_threshold = 1.5\n"));
        let err = Config::from_figment(figment).settings().expect_err("invalid threshold");
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn rejects_zero_dimension_and_zero_candidate_limit() {
        let mut settings = Settings::default();
        settings.embedding.dim = 0;
        let err = settings.validate().expect_err("zero dim");
        assert!(matches!(err, Error::InvalidConfig(ref m) if m.contains("embedding.dim")));

        let figment = Figment::new().merge(Toml::string("[search]\ncandidate_limit = 0\n"));
        let err = Config::from_figment(figment).settings().expect_err("zero candidate limit");
        assert!(matches!(err, Error::InvalidConfig(ref m) if m.contains("candidate_limit")));
    }

    #[test]
    fn env_overrides_nested_keys() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[linking]\nentity_limit = 4\n")?;
            jail.set_env("RUST_ENV", "test");
            jail.set_env("APP_LINKING__RELATIONSHIP_LIMIT", "7");
            let config = Config::load().map_err(|e| e.to_string())?;
            let settings = config.settings().map_err(|e| e.to_string())?;
            assert_eq!(settings.linking.entity_limit, 4);
            assert_eq!(settings.linking.relationship_limit, 7);
            Ok(())
        });
    }
}

//! Configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`__` separates nested keys, e.g. `APP_STORE__PERSIST_DIR`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_in(Path::new("."), &env_name)
    }

    /// Merge defaults, `config.toml`, `config.<env>.toml` (all under `base`) and `APP_*` variables.
    pub fn load_in(base: &Path, env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(base.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(base.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate_for_env(env_name)?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self { Self { figment } }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self.figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        let settings = self.settings()?;
        match env {
            "prod" | "production" if settings.embedding.use_fake => {
                anyhow::bail!("embedding.use_fake must not be enabled in production")
            }
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub embedding: EmbeddingSettings,
    pub retrieval: RetrievalSettings,
    pub context: ContextSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.store.table.trim().is_empty() { return Err(Error::InvalidConfig("store.table must not be empty".into())); }
        if self.retrieval.timeout_ms == 0 { return Err(Error::InvalidConfig("retrieval.timeout_ms must be positive".into())); }
        if self.retrieval.default_results == 0 { return Err(Error::InvalidConfig("retrieval.default_results must be at least 1".into())); }
        if self.embedding.max_len == 0 { return Err(Error::InvalidConfig("embedding.max_len must be positive".into())); }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub persist_dir: String,
    pub table: String,
}

impl StoreSettings {
    pub fn persist_path(&self) -> PathBuf { expand_path(&self.persist_dir) }
}

impl Default for StoreSettings {
    fn default() -> Self { Self { persist_dir: "./data/lancedb".into(), table: "oracle_knowledge_base".into() } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model_dir: String,
    pub use_fake: bool,
    pub max_len: usize,
}

impl EmbeddingSettings {
    pub fn model_path(&self) -> PathBuf { expand_path(&self.model_dir) }
}

impl Default for EmbeddingSettings {
    fn default() -> Self { Self { model_dir: "models/all-MiniLM-L6-v2".into(), use_fake: false, max_len: 256 } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Minimum Jaccard score a lexical hit must exceed.
    pub lexical_threshold: f32,
    pub timeout_ms: u64,
    pub default_results: usize,
}

impl RetrievalSettings {
    pub fn timeout(&self) -> std::time::Duration { std::time::Duration::from_millis(self.timeout_ms) }
}

impl Default for RetrievalSettings {
    fn default() -> Self { Self { lexical_threshold: 0.1, timeout_ms: 5_000, default_results: 5 } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    pub max_documents: usize,
    pub snippet_chars: usize,
}

impl Default for ContextSettings {
    fn default() -> Self { Self { max_documents: 3, snippet_chars: 500 } }
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

    #[test]
    fn persist_dir_expands_environment_variables() {
        std::env::set_var("ORACLE_RAG_TEST_HOME", "/srv/kb");
        let store = StoreSettings { persist_dir: "${ORACLE_RAG_TEST_HOME}/lancedb".into(), ..Default::default() };
        assert_eq!(store.persist_path(), PathBuf::from("/srv/kb/lancedb"));
    }

    #[test]
    fn defaults_match_documented_values() {
        let s = Settings::default();
        assert_eq!(s.store.table, "oracle_knowledge_base");
        assert!((s.retrieval.lexical_threshold - 0.1).abs() < f32::EPSILON);
        assert_eq!(s.context.max_documents, 3);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn toml_overrides_merge_over_defaults() {
        let figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::string("[retrieval]\nlexical_threshold = 0.25\n[store]\ntable = \"kb_test\"\n"));
        let s = Config::from_figment(figment).settings().unwrap();
        assert!((s.retrieval.lexical_threshold - 0.25).abs() < f32::EPSILON);
        assert_eq!(s.store.table, "kb_test");
        assert_eq!(s.retrieval.timeout_ms, 5_000);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::string("[retrieval]\ntimeout_ms = 0\n"));
        assert!(matches!(Config::from_figment(figment).settings(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn load_in_reads_config_files() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("config.toml"), "[context]\nsnippet_chars = 120\n").unwrap();
        std::fs::write(tmp.path().join("config.test.toml"), "[context]\nmax_documents = 5\n").unwrap();
        let config = Config::load_in(tmp.path(), "test").unwrap();
        let s = config.settings().unwrap();
        assert_eq!(s.context.snippet_chars, 120);
        assert_eq!(s.context.max_documents, 5);
        assert_eq!(config.get::<usize>("context.max_documents").unwrap(), 5);
    }
}

//! Configuration file (`cpg-sema.toml`)

use crate::language::{default_registry, Language, LanguageRegistry};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemaConfig {
    /// Language used when a command names none
    pub default_language: Option<String>,
    /// Synthesise declarations for unresolved calls
    #[serde(default = "default_true")]
    pub infer_declarations: bool,
    #[serde(default = "default_true")]
    pub use_default_arguments: bool,
    /// Extra or overriding capability tables
    #[serde(default)]
    pub languages: Vec<Language>,
}

impl Default for SemaConfig {
    fn default() -> Self {
        Self {
            default_language: Some("cpp".to_string()),
            infer_declarations: true,
            use_default_arguments: true,
            languages: Vec::new(),
        }
    }
}

impl SemaConfig {
    /// Read and validate a config file
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: SemaConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for language in &self.languages {
            if language.name.trim().is_empty() {
                return Err(Error::Config("language table without a name".to_string()));
            }
            if language.namespace_delimiter.is_empty() {
                return Err(Error::Config(format!(
                    "language {} has an empty namespace delimiter",
                    language.name
                )));
            }
        }
        Ok(())
    }

    /// Built-in languages with the configured tables registered on top
    pub fn language_registry(&self) -> LanguageRegistry {
        let mut registry = default_registry();
        for language in &self.languages {
            registry.register(language.clone());
        }
        registry
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("cpg-sema.toml")
}

/// Load the config, `None` if the file does not exist
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<SemaConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let config = SemaConfig::from_path(&path)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &SemaConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_is_none() {
        let dir = TempDir::new().unwrap();
        let loaded = load_config(Some(&dir.path().join("cpg-sema.toml"))).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_write_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cpg-sema.toml");
        let config = SemaConfig::default();

        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &config, true).unwrap();

        assert_eq!(load_config(Some(&path)).unwrap(), Some(config));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cpg-sema.toml");
        std::fs::write(
            &path,
            r#"
default_language = "java"
infer_declarations = false

[[languages]]
name = "kotlin"
namespace_delimiter = "."
primitive_types = ["Int", "Long"]
"#,
        )
        .unwrap();

        let config = SemaConfig::from_path(&path).unwrap();
        assert!(!config.infer_declarations);
        assert!(config.use_default_arguments);

        let registry = config.language_registry();
        let kotlin = registry.find("kotlin").unwrap();
        assert!(kotlin.is_primitive("Int"));
        assert!(registry.find("cpp").is_some());
    }

    #[test]
    fn test_invalid_language_table_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cpg-sema.toml");
        std::fs::write(&path, "[[languages]]\nname = \"\"\n").unwrap();

        assert!(matches!(SemaConfig::from_path(&path), Err(Error::Config(_))));
    }
}

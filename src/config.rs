use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_OUTPUT: &str = "json";
pub const DEFAULT_REGION: &str = "us-west-2";

/// Optional defaults read from `config.toml`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub profile: Option<String>,
    pub output: Option<String>,
    pub region: Option<String>,
}

impl FileConfig {
    /// Loads `path`, or the default location when no path is given.
    ///
    /// An explicit path must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                if !path.exists() {
                    bail!("Config file not found: {}", path.display());
                }
                Self::read(path)
            }
            None => match default_path() {
                Some(path) if path.exists() => Self::read(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn read(path: &Path) -> Result<Self> {
        debug!("Reading config from {}", path.display());
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("aws-cred-gen").join("config.toml"))
}

/// Settings captured once per run and handed to each stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationConfig {
    pub profile: Option<String>,
    pub output: String,
    pub region: String,
}

impl InvocationConfig {
    /// Command line values win over the file, the file wins over built-in defaults.
    pub fn new(
        profile: Option<String>,
        output: Option<String>,
        region: Option<String>,
        file: FileConfig,
    ) -> Self {
        Self {
            profile: profile.or(file.profile),
            output: output
                .or(file.output)
                .unwrap_or_else(|| DEFAULT_OUTPUT.to_string()),
            region: region
                .or(file.region)
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_without_anything() {
        let config = InvocationConfig::new(None, None, None, FileConfig::default());
        assert_eq!(
            config,
            InvocationConfig {
                profile: None,
                output: "json".to_string(),
                region: "us-west-2".to_string(),
            }
        );
    }

    #[test]
    fn command_line_overrides_file() {
        let file = FileConfig {
            profile: Some("base".to_string()),
            output: Some("text".to_string()),
            region: Some("eu-west-1".to_string()),
        };
        let config = InvocationConfig::new(
            Some("admin".to_string()),
            None,
            Some("ap-northeast-1".to_string()),
            file,
        );
        assert_eq!(config.profile.as_deref(), Some("admin"));
        assert_eq!(config.output, "text");
        assert_eq!(config.region, "ap-northeast-1");
    }

    #[test]
    fn reads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "profile = \"base\"\nregion = \"eu-central-1\"\n").unwrap();

        let file = FileConfig::load(Some(&path)).unwrap();

        assert_eq!(
            file,
            FileConfig {
                profile: Some("base".to_string()),
                output: None,
                region: Some("eu-central-1".to_string()),
            }
        );
    }

    #[test]
    fn rejects_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "regoin = \"eu-central-1\"\n").unwrap();

        assert!(FileConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileConfig::load(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }
}

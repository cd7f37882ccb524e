use aws_config::{BehaviorVersion, ConfigLoader, Region, SdkConfig};
use ini::Ini;
use std::collections::BTreeSet;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Profile names declared in the shared AWS config and credentials files.
#[derive(Debug, Default, Clone)]
pub struct ProfileCatalog {
    names: BTreeSet<String>,
}

impl ProfileCatalog {
    /// Reads the shared files from the locations the SDK would use.
    pub fn load() -> Self {
        let home = dirs::home_dir();
        let config = env::var_os("AWS_CONFIG_FILE")
            .map(PathBuf::from)
            .or_else(|| home.as_ref().map(|h| h.join(".aws").join("config")));
        let credentials = env::var_os("AWS_SHARED_CREDENTIALS_FILE")
            .map(PathBuf::from)
            .or_else(|| home.as_ref().map(|h| h.join(".aws").join("credentials")));
        Self::from_files(config.as_deref(), credentials.as_deref())
    }

    pub fn from_files(config: Option<&Path>, credentials: Option<&Path>) -> Self {
        let mut names = BTreeSet::new();

        if let Some(ini) = config.and_then(read_ini) {
            for section in ini.sections().flatten() {
                if section == "default" {
                    names.insert(section.to_string());
                } else if let Some(name) = section.strip_prefix("profile ") {
                    names.insert(name.trim().to_string());
                }
            }
        }
        if let Some(ini) = credentials.and_then(read_ini) {
            names.extend(ini.sections().flatten().map(str::to_string));
        }

        debug!("Known profiles: {:?}", names);
        Self { names }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

fn read_ini(path: &Path) -> Option<Ini> {
    if !path.exists() {
        return None;
    }
    match Ini::load_from_file(path) {
        Ok(ini) => Some(ini),
        Err(e) => {
            debug!("Ignoring unreadable profile file {}: {}", path.display(), e);
            None
        }
    }
}

/// The long-lived identity used to call STS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseIdentity {
    profile: Option<String>,
    requested: Option<String>,
}

impl BaseIdentity {
    /// Named profile handed to the SDK, `None` for the ambient default chain.
    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    pub fn requested(&self) -> Option<&str> {
        self.requested.as_deref()
    }

    pub fn is_fallback(&self) -> bool {
        self.requested.is_some() && self.profile.is_none()
    }

    /// Name used when reporting on this identity.
    pub fn display_name(&self) -> &str {
        self.requested().unwrap_or("default")
    }

    /// Builds the SDK configuration, using `fallback_region` when the identity has none.
    pub async fn load_config(&self, fallback_region: &str) -> SdkConfig {
        let loaded = self.loader().load().await;
        match loaded.region() {
            Some(region) => {
                info!("Using region: {}", region);
                loaded
            }
            None => {
                info!("No region configured, using {} for STS", fallback_region);
                self.loader()
                    .region(Region::new(fallback_region.to_string()))
                    .load()
                    .await
            }
        }
    }

    fn loader(&self) -> ConfigLoader {
        let loader = aws_config::defaults(BehaviorVersion::latest());
        match &self.profile {
            Some(profile) => loader.profile_name(profile),
            // Otherwise the SDK reads AWS_PROFILE again and fails on the unknown name.
            None if self.is_fallback() && env::var_os("AWS_PROFILE").is_some() => {
                loader.profile_name("default")
            }
            None => loader,
        }
    }
}

/// Picks the base identity for `requested`.
///
/// A profile that is not declared anywhere is not an error: the ambient default
/// chain (environment, web identity, container or instance credentials) is used
/// instead. Whether that chain yields credentials is only known once STS is called.
pub fn resolve(requested: Option<&str>, catalog: &ProfileCatalog) -> BaseIdentity {
    let requested = requested.filter(|name| !name.is_empty());
    match requested {
        Some(name) if catalog.contains(name) => {
            debug!("Using profile {}", name);
            BaseIdentity {
                profile: Some(name.to_string()),
                requested: Some(name.to_string()),
            }
        }
        Some(name) => {
            info!(
                "Profile {} not found, falling back to the default credential chain",
                name
            );
            BaseIdentity {
                profile: None,
                requested: Some(name.to_string()),
            }
        }
        None => {
            debug!("No profile requested, using the default credential chain");
            BaseIdentity {
                profile: None,
                requested: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tracing_test::traced_test;

    fn catalog_from(config: &str, credentials: &str) -> ProfileCatalog {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config");
        let credentials_path = dir.path().join("credentials");
        fs::write(&config_path, config).unwrap();
        fs::write(&credentials_path, credentials).unwrap();
        ProfileCatalog::from_files(Some(&config_path), Some(&credentials_path))
    }

    #[test]
    fn catalog_reads_both_files() {
        let catalog = catalog_from(
            "[default]\nregion = us-east-1\n\n[profile dev]\nregion = eu-west-1\n\n[sso-session corp]\nsso_region = us-east-1\n",
            "[ci]\naws_access_key_id = AKID\naws_secret_access_key = SECRET\n",
        );
        assert!(catalog.contains("default"));
        assert!(catalog.contains("dev"));
        assert!(catalog.contains("ci"));
        assert!(!catalog.contains("corp"));
        assert!(!catalog.contains("profile dev"));
    }

    #[test]
    fn catalog_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = ProfileCatalog::from_files(
            Some(&dir.path().join("nope")),
            Some(&dir.path().join("nothing")),
        );
        assert!(!catalog.contains("default"));
    }

    #[test]
    fn resolves_known_profile() {
        let catalog = catalog_from("[profile dev]\nregion = eu-west-1\n", "");
        let identity = resolve(Some("dev"), &catalog);
        assert_eq!(identity.profile(), Some("dev"));
        assert!(!identity.is_fallback());
    }

    #[traced_test]
    #[test]
    fn unknown_profile_falls_back_to_default_chain() {
        let catalog = catalog_from("[profile dev]\n", "[ci]\n");
        let identity = resolve(Some("missing"), &catalog);
        assert_eq!(identity.profile(), None);
        assert_eq!(identity.requested(), Some("missing"));
        assert!(identity.is_fallback());
        assert_eq!(identity.display_name(), "missing");
        assert!(logs_contain("falling back"));
    }

    #[test]
    fn no_profile_uses_default_chain() {
        let identity = resolve(None, &ProfileCatalog::default());
        assert_eq!(identity.profile(), None);
        assert!(!identity.is_fallback());
        assert_eq!(identity.display_name(), "default");
    }

    #[test]
    fn empty_profile_is_treated_as_absent() {
        let identity = resolve(Some(""), &ProfileCatalog::default());
        assert_eq!(identity, resolve(None, &ProfileCatalog::default()));
    }
}

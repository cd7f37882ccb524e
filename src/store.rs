use anyhow::{Context, Result};
use ini::{EscapePolicy, Ini, ParseOption, WriteOption};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::config::InvocationConfig;
use crate::credentials::CredentialBundle;

/// Keys this tool owns inside a profile section. Anything else is left alone.
pub const MANAGED_KEYS: [&str; 6] = [
    "output",
    "region",
    "aws_access_key_id",
    "aws_secret_access_key",
    "aws_session_token",
    "aws_expiration",
];

/// The shared AWS credentials file.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// `~/.aws/credentials`
    pub fn default_location() -> Result<Self> {
        let home = dirs::home_dir().context("Failed to determine home directory")?;
        Ok(Self::at(home.join(".aws").join("credentials")))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Merges `creds` into `profile` and rewrites the whole file.
    ///
    /// Other sections, and keys of `profile` outside [`MANAGED_KEYS`], are kept.
    /// Returns the path that was written.
    pub fn persist(
        &self,
        creds: &CredentialBundle,
        profile: &str,
        invocation: &InvocationConfig,
    ) -> Result<PathBuf> {
        let parent = self.parent();
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;

        let mut ini = self.load()?;

        ini.with_section(Some(profile))
            .set("output", invocation.output.as_str())
            .set("region", invocation.region.as_str())
            .set("aws_access_key_id", creds.aws_access_key_id.as_str())
            .set("aws_secret_access_key", creds.aws_secret_access_key.as_str())
            .set("aws_session_token", creds.aws_session_token.as_str())
            .set("aws_expiration", creds.expiration_rfc3339());

        self.write(&ini)?;

        info!("Credentials saved to profile: {}", profile);
        Ok(self.absolute_path())
    }

    /// The current contents of the store; a missing file is an empty store.
    ///
    /// Values are taken verbatim: no escape sequences or quotes are interpreted, so
    /// sections this tool does not manage are written back unchanged.
    pub fn load(&self) -> Result<Ini> {
        if !self.path.exists() {
            debug!("{} does not exist yet", self.path.display());
            return Ok(Ini::new());
        }
        Ini::load_from_file_opt(&self.path, raw_parse())
            .with_context(|| format!("Failed to read credentials file: {}", self.path.display()))
    }

    // Written next to the real file and renamed over it, so a failed write leaves the
    // old file in place. A symlinked store keeps its link and the target keeps its
    // mode; a new store gets NamedTempFile's 0600.
    fn write(&self, ini: &Ini) -> Result<()> {
        let target = self.target();
        let parent = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp_file =
            NamedTempFile::new_in(parent).context("Failed to create temp file")?;
        ini.write_to_opt(&mut temp_file, raw_write())
            .context("Failed to write credentials file")?;
        if let Ok(metadata) = fs::metadata(&target) {
            temp_file
                .as_file()
                .set_permissions(metadata.permissions())
                .context("Failed to copy credentials file permissions")?;
        }
        temp_file
            .persist(&target)
            .with_context(|| format!("Failed to replace {}", target.display()))?;
        Ok(())
    }

    fn target(&self) -> PathBuf {
        fs::canonicalize(&self.path).unwrap_or_else(|_| self.path.clone())
    }

    fn parent(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn absolute_path(&self) -> PathBuf {
        fs::canonicalize(&self.path).unwrap_or_else(|_| self.path.clone())
    }
}

fn raw_parse() -> ParseOption {
    ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        ..Default::default()
    }
}

fn raw_write() -> WriteOption {
    WriteOption {
        escape_policy: EscapePolicy::Nothing,
        ..Default::default()
    }
}

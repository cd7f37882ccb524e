use anyhow::{Context, Result};
use aws_sdk_sts::types::Credentials as StsCredentials;
use aws_smithy_types_convert::date_time::DateTimeExt;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fmt;

/// Temporary security credentials returned by STS.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct CredentialBundle {
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub aws_session_token: String,
    pub aws_expiration: DateTime<Utc>,
}

impl CredentialBundle {
    pub fn from_sts(credentials: &StsCredentials) -> Result<Self> {
        let expiration = credentials
            .expiration()
            .to_chrono_utc()
            .context("STS returned an expiration outside the supported range")?;
        Ok(Self {
            aws_access_key_id: credentials.access_key_id().to_string(),
            aws_secret_access_key: credentials.secret_access_key().to_string(),
            aws_session_token: credentials.session_token().to_string(),
            aws_expiration: expiration,
        })
    }

    pub fn expiration_rfc3339(&self) -> String {
        self.aws_expiration.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

// Keep secrets out of logs and panic messages.
impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("aws_access_key_id", &self.aws_access_key_id)
            .field("aws_secret_access_key", &"** redacted **")
            .field("aws_session_token", &"** redacted **")
            .field("aws_expiration", &self.aws_expiration)
            .finish()
    }
}

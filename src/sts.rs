use anyhow::{anyhow, Context, Result};
use aws_config::SdkConfig;
use aws_credential_types::provider::error::CredentialsError;
use aws_sdk_sts::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_sts::operation::assume_role::AssumeRoleError;
use aws_sdk_sts::Client as StsClient;
use std::error::Error as StdError;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use crate::credentials::CredentialBundle;
use crate::request::AssumptionRequest;
use crate::session::BaseIdentity;

/// Failures of the exchange that are reported to the operator with their own exit code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExchangeFailure {
    /// STS rejected the request.
    #[error("{}", authorization_message(.code, .message))]
    Authorization {
        code: Option<String>,
        message: String,
    },
    /// No base credentials could be found for the requested profile.
    #[error("Unable to locate credentials for profile {profile}")]
    MissingCredentials { profile: String },
}

fn authorization_message(code: &Option<String>, message: &str) -> String {
    match code {
        Some(code) => format!("{code}: {message}"),
        None => message.to_string(),
    }
}

/// Classified outcome of a single exchange.
pub type ExchangeResult = std::result::Result<CredentialBundle, ExchangeFailure>;

/// Something that trades a base identity for temporary role credentials.
///
/// The outer error is reserved for failures that have no classification.
#[allow(async_fn_in_trait)]
#[cfg_attr(test, automock)]
pub trait TokenExchange {
    async fn assume_role(&self, request: &AssumptionRequest) -> Result<ExchangeResult>;
}

pub struct StsExchange {
    client: StsClient,
    identity: BaseIdentity,
}

impl StsExchange {
    pub fn new(config: &SdkConfig, identity: BaseIdentity) -> Self {
        Self {
            client: StsClient::new(config),
            identity,
        }
    }
}

impl TokenExchange for StsExchange {
    async fn assume_role(&self, request: &AssumptionRequest) -> Result<ExchangeResult> {
        info!("Calling AWS STS AssumeRole");
        debug!("Role ARN: {}", request.role_arn);
        debug!("Session name: {}", request.session_name);
        debug!("External ID set: {}", request.external_id.is_some());

        let response = match self
            .client
            .assume_role()
            .role_arn(&request.role_arn)
            .role_session_name(&request.session_name)
            .set_external_id(request.external_id.clone())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return classify(e, self.identity.display_name()).map(Err),
        };

        let sts_creds = response
            .credentials()
            .context("AWS STS returned no credentials")?;
        let bundle = CredentialBundle::from_sts(sts_creds)?;

        info!("Successfully obtained AWS credentials");
        Ok(Ok(bundle))
    }
}

/// Sorts an STS error into a classified failure, or hands it back as a fatal error.
pub fn classify(err: SdkError<AssumeRoleError>, profile: &str) -> Result<ExchangeFailure> {
    if credentials_not_loaded(&err) {
        debug!("No base credentials available for profile {}", profile);
        return Ok(ExchangeFailure::MissingCredentials {
            profile: profile.to_string(),
        });
    }
    match err {
        SdkError::ServiceError(service) => {
            let err = service.into_err();
            debug!("AssumeRole rejected: {:?}", err.code());
            Ok(authorization_failure(&err))
        }
        other => Err(anyhow!("Failed to call AWS STS: {}", DisplayErrorContext(&other))),
    }
}

fn authorization_failure(err: &AssumeRoleError) -> ExchangeFailure {
    ExchangeFailure::Authorization {
        code: err.code().map(str::to_string),
        message: err
            .message()
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string()),
    }
}

fn credentials_not_loaded(err: &(dyn StdError + 'static)) -> bool {
    let mut source = Some(err);
    while let Some(e) = source {
        if let Some(CredentialsError::CredentialsNotLoaded(_)) =
            e.downcast_ref::<CredentialsError>()
        {
            return true;
        }
        source = e.source();
    }
    false
}

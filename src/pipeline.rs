use anyhow::Result;
use std::io::Write;
use tracing::debug;

use crate::config::InvocationConfig;
use crate::output::{ExitStatus, Router};
use crate::request::AssumptionRequest;
use crate::store::CredentialStore;
use crate::sts::TokenExchange;

/// Assume a role once and deliver the result, for either flavour of request.
pub struct Pipeline<'a, X> {
    exchange: X,
    store: &'a CredentialStore,
    invocation: &'a InvocationConfig,
}

impl<'a, X: TokenExchange> Pipeline<'a, X> {
    pub fn new(exchange: X, store: &'a CredentialStore, invocation: &'a InvocationConfig) -> Self {
        Self {
            exchange,
            store,
            invocation,
        }
    }

    pub async fn run<O: Write, E: Write>(
        &self,
        request: &AssumptionRequest,
        save_profile: &str,
        router: &mut Router<O, E>,
    ) -> Result<ExitStatus> {
        router.status(format!(
            "Assuming role: {} with session: {}",
            request.role_arn, request.session_name
        ))?;

        let creds = match self.exchange.assume_role(request).await? {
            Ok(creds) => creds,
            Err(failure) => return router.failure(&failure),
        };

        if router.machine_readable() {
            debug!("Writing credentials to stdout");
            router.credentials(&creds)?;
        } else {
            let path = self.store.persist(&creds, save_profile, self.invocation)?;
            router.status(format!(
                "Credentials saved to {} under profile {}",
                path.display(),
                save_profile
            ))?;
        }
        Ok(ExitStatus::Success)
    }
}

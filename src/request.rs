use std::env;
use tracing::debug;

/// Role assumed in member accounts created through AWS Organizations.
pub const ORGANIZATION_ROLE_NAME: &str = "OrganizationAccountAccessRole";

const FALLBACK_SESSION_NAME: &str = "aws-cred-gen";
const MAX_SESSION_NAME_LEN: usize = 64;

/// Everything STS needs to know to hand out temporary credentials for a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumptionRequest {
    pub role_arn: String,
    pub session_name: String,
    pub external_id: Option<String>,
}

impl AssumptionRequest {
    /// Request for an explicit role ARN. Both values are validated by the caller.
    pub fn direct(
        role_arn: impl Into<String>,
        session_name: impl Into<String>,
        external_id: Option<String>,
    ) -> Self {
        let request = Self {
            role_arn: role_arn.into(),
            session_name: session_name.into(),
            external_id: non_empty(external_id),
        };
        debug!("Built request for role {}", request.role_arn);
        request
    }

    /// Request for the organization access role of a member account.
    ///
    /// Without a session name the invoking user's login name is used.
    pub fn organization(
        account: &str,
        session_name: Option<String>,
        external_id: Option<String>,
    ) -> Self {
        let session_name = non_empty(session_name)
            .unwrap_or_else(|| session_name_for_user(invoking_user().as_deref()));
        let request = Self {
            role_arn: organization_role_arn(account),
            session_name,
            external_id: non_empty(external_id),
        };
        debug!(
            "Built organization request for account {} as {}",
            account, request.session_name
        );
        request
    }
}

pub fn organization_role_arn(account: &str) -> String {
    format!("arn:aws:iam::{account}:role/{ORGANIZATION_ROLE_NAME}")
}

/// Turns a login name into something STS accepts as a role session name.
pub fn session_name_for_user(user: Option<&str>) -> String {
    let Some(user) = user else {
        return FALLBACK_SESSION_NAME.to_string();
    };
    let name: String = user
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || "_+=,.@-".contains(c) {
                c
            } else {
                '-'
            }
        })
        .take(MAX_SESSION_NAME_LEN)
        .collect();
    if name.chars().count() < 2 {
        FALLBACK_SESSION_NAME.to_string()
    } else {
        name
    }
}

fn invoking_user() -> Option<String> {
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .ok()
        .filter(|user| !user.is_empty())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn organization_arn_from_account_number() {
        assert_eq!(
            organization_role_arn("123456789012"),
            "arn:aws:iam::123456789012:role/OrganizationAccountAccessRole"
        );
    }

    #[test]
    fn organization_request_uses_derived_arn() {
        let request = AssumptionRequest::organization("123456789012", Some("ops".to_string()), None);
        assert_eq!(
            request,
            AssumptionRequest {
                role_arn: "arn:aws:iam::123456789012:role/OrganizationAccountAccessRole".to_string(),
                session_name: "ops".to_string(),
                external_id: None,
            }
        );
    }

    #[rstest]
    #[case(None)]
    #[case(Some(""))]
    fn organization_request_derives_session_name(#[case] session: Option<&str>) {
        let request =
            AssumptionRequest::organization("123456789012", session.map(str::to_string), None);
        assert!(request.session_name.len() >= 2);
        assert!(request.session_name.len() <= MAX_SESSION_NAME_LEN);
    }

    #[test]
    fn empty_external_id_is_omitted() {
        let empty = AssumptionRequest::direct(
            "arn:aws:iam::123456789012:role/Deploy",
            "ci",
            Some(String::new()),
        );
        let absent = AssumptionRequest::direct("arn:aws:iam::123456789012:role/Deploy", "ci", None);
        assert_eq!(empty.external_id, None);
        assert_eq!(empty, absent);
    }

    #[test]
    fn external_id_is_forwarded() {
        let request = AssumptionRequest::organization(
            "123456789012",
            Some("ops".to_string()),
            Some("shared-secret".to_string()),
        );
        assert_eq!(request.external_id.as_deref(), Some("shared-secret"));
    }

    #[rstest]
    #[case(Some("alice"), "alice")]
    #[case(Some("first last"), "first-last")]
    #[case(Some("DOMAIN\\bob"), "DOMAIN-bob")]
    #[case(Some("x"), "aws-cred-gen")]
    #[case(Some(""), "aws-cred-gen")]
    #[case(None, "aws-cred-gen")]
    fn session_name_from_user(#[case] user: Option<&str>, #[case] expected: &str) {
        assert_eq!(session_name_for_user(user), expected);
    }

    #[test]
    fn long_user_name_is_truncated() {
        let user = "u".repeat(100);
        assert_eq!(session_name_for_user(Some(&user)).len(), MAX_SESSION_NAME_LEN);
    }
}

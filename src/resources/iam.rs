use aws_types::SdkConfig;
use tracing::info;

use super::{require_id, sdk_error, Error};
use crate::config::IamConfig;
use crate::outputs::OutputMap;

/// Creates every declared role and attaches its managed policies.
pub struct Iam {
    config: IamConfig,
    client: aws_sdk_iam::Client,
}

impl Iam {
    pub fn new(sdk_config: &SdkConfig, config: IamConfig) -> Self {
        let client = aws_sdk_iam::Client::new(sdk_config);

        return Self { config, client };
    }

    pub async fn provision(&self, outputs: &mut OutputMap) -> Result<(), Error> {
        let mut role_arns = Vec::with_capacity(self.config.roles.len());

        for role in &self.config.roles {
            let result = self
                .client
                .create_role()
                .role_name(&role.name)
                .assume_role_policy_document(&role.assume_role_policy)
                .send()
                .await
                .map_err(sdk_error)?;

            let role_arn = require_id(result.role().and_then(|role| role.arn()), "iam role")?;
            info!(role = %role.name, arn = %role_arn, "created role");

            for policy_arn in &role.policies {
                ensure_policy_arn(policy_arn)?;

                self.client
                    .attach_role_policy()
                    .role_name(&role.name)
                    .policy_arn(policy_arn)
                    .send()
                    .await
                    .map_err(sdk_error)?;
            }

            outputs.export(format!("{}_role_arn", role.name), &role_arn);
            role_arns.push(role_arn);
        }

        outputs.export_list("role_arns", role_arns);

        return Ok(());
    }
}

fn ensure_policy_arn(policy_arn: &str) -> Result<(), Error> {
    if !policy_arn.starts_with("arn:") {
        return Err(Error::InvalidPolicyReference(policy_arn.to_string()));
    }

    return Ok(());
}

#[cfg(test)]
mod tests {
    use super::ensure_policy_arn;
    use super::Error;

    #[test]
    fn accepts_policy_arns() {
        let result = ensure_policy_arn("arn:aws:iam::aws:policy/AmazonS3ReadOnlyAccess");
        assert_eq!(true, result.is_ok());
    }

    #[test]
    fn rejects_bare_policy_names() {
        let result = ensure_policy_arn("AmazonS3ReadOnlyAccess");
        match result.err().unwrap() {
            Error::InvalidPolicyReference(reference) => {
                assert_eq!("AmazonS3ReadOnlyAccess", reference)
            }
            _ => panic!("Expected `InvalidPolicyReference` error"),
        }
    }
}

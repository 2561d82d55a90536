use aws_types::SdkConfig;
use tracing::info;

use super::{require_id, sdk_error, Error};
use crate::config::KmsConfig;
use crate::outputs::OutputMap;

/// Creates every declared key with its policy and registers its alias.
pub struct Kms {
    config: KmsConfig,
    client: aws_sdk_kms::Client,
}

impl Kms {
    pub fn new(sdk_config: &SdkConfig, config: KmsConfig) -> Self {
        let client = aws_sdk_kms::Client::new(sdk_config);

        return Self { config, client };
    }

    pub async fn provision(&self, outputs: &mut OutputMap) -> Result<(), Error> {
        let mut key_ids = Vec::with_capacity(self.config.keys.len());
        let mut key_arns = Vec::with_capacity(self.config.keys.len());

        for key in &self.config.keys {
            let result = self
                .client
                .create_key()
                .description(&key.description)
                .policy(&key.policy)
                .send()
                .await
                .map_err(sdk_error)?;

            let metadata = match result.key_metadata() {
                Some(metadata) => metadata,
                None => return Err(Error::MissingIdentifier(String::from("kms key"))),
            };
            let key_id = require_id(metadata.key_id(), "kms key id")?;
            let key_arn = require_id(metadata.arn(), "kms key arn")?;
            info!(alias = %key.alias, id = %key_id, "created key");

            self.client
                .create_alias()
                .alias_name(&key.alias)
                .target_key_id(&key_id)
                .send()
                .await
                .map_err(sdk_error)?;

            key_ids.push(key_id);
            key_arns.push(key_arn);
        }

        outputs.export_list("key_ids", key_ids);
        outputs.export_list("key_arns", key_arns);

        return Ok(());
    }
}

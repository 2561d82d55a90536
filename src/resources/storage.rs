use aws_sdk_s3::model::{
    BucketLocationConstraint, BucketLoggingStatus, BucketVersioningStatus,
    CreateBucketConfiguration, LoggingEnabled, PublicAccessBlockConfiguration,
    ServerSideEncryption, ServerSideEncryptionByDefault, ServerSideEncryptionConfiguration,
    ServerSideEncryptionRule, VersioningConfiguration,
};
use aws_sdk_s3::Region;
use aws_types::SdkConfig;
use tracing::info;

use super::{sdk_error, Error};
use crate::config::{S3BucketConfig, StorageConfig};
use crate::outputs::OutputMap;

/// Creates every declared bucket along with its public access block,
/// versioning, access logging and default encryption settings.
pub struct Storage {
    config: StorageConfig,
    sdk_config: SdkConfig,
}

impl Storage {
    pub fn new(sdk_config: &SdkConfig, config: StorageConfig) -> Self {
        return Self {
            config,
            sdk_config: sdk_config.clone(),
        };
    }

    // Buckets can live in a different region than the rest of the stage.
    fn client_for(&self, region: Option<&String>) -> aws_sdk_s3::Client {
        match region {
            Some(region) => {
                let config = aws_sdk_s3::config::Builder::from(&self.sdk_config)
                    .region(Region::new(region.clone()))
                    .build();
                aws_sdk_s3::Client::from_conf(config)
            }
            None => aws_sdk_s3::Client::new(&self.sdk_config),
        }
    }

    pub async fn provision(&self, outputs: &mut OutputMap) -> Result<(), Error> {
        let mut bucket_names = Vec::with_capacity(self.config.s3_buckets.len());
        let mut bucket_arns = Vec::with_capacity(self.config.s3_buckets.len());

        for bucket in &self.config.s3_buckets {
            self.create_bucket(bucket).await?;
            info!(bucket = %bucket.name, "created bucket");

            bucket_arns.push(bucket_arn(&bucket.name));
            bucket_names.push(bucket.name.clone());
        }

        outputs.export_list("bucket_names", bucket_names);
        outputs.export_list("bucket_arns", bucket_arns);

        return Ok(());
    }

    async fn create_bucket(&self, bucket: &S3BucketConfig) -> Result<(), Error> {
        let client = self.client_for(bucket.region.as_ref());

        let mut request = client.create_bucket().bucket(&bucket.name);

        // us-east-1 rejects an explicit location constraint.
        if let Some(region) = bucket.region.as_deref().filter(|region| *region != "us-east-1") {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }

        request.send().await.map_err(sdk_error)?;

        if bucket.public_access_block {
            client
                .put_public_access_block()
                .bucket(&bucket.name)
                .public_access_block_configuration(
                    PublicAccessBlockConfiguration::builder()
                        .block_public_acls(true)
                        .block_public_policy(true)
                        .ignore_public_acls(true)
                        .restrict_public_buckets(true)
                        .build(),
                )
                .send()
                .await
                .map_err(sdk_error)?;
        }

        if bucket.versioning {
            client
                .put_bucket_versioning()
                .bucket(&bucket.name)
                .versioning_configuration(
                    VersioningConfiguration::builder()
                        .status(BucketVersioningStatus::Enabled)
                        .build(),
                )
                .send()
                .await
                .map_err(sdk_error)?;
        }

        if let Some(logging) = &bucket.logging {
            client
                .put_bucket_logging()
                .bucket(&bucket.name)
                .bucket_logging_status(
                    BucketLoggingStatus::builder()
                        .logging_enabled(
                            LoggingEnabled::builder()
                                .target_bucket(&logging.target_bucket)
                                .target_prefix(&logging.target_prefix)
                                .build(),
                        )
                        .build(),
                )
                .send()
                .await
                .map_err(sdk_error)?;
        }

        client
            .put_bucket_encryption()
            .bucket(&bucket.name)
            .server_side_encryption_configuration(
                ServerSideEncryptionConfiguration::builder()
                    .rules(
                        ServerSideEncryptionRule::builder()
                            .apply_server_side_encryption_by_default(
                                ServerSideEncryptionByDefault::builder()
                                    .sse_algorithm(ServerSideEncryption::from(
                                        bucket.server_side_encryption.as_str(),
                                    ))
                                    .build(),
                            )
                            .build(),
                    )
                    .build(),
            )
            .send()
            .await
            .map_err(sdk_error)?;

        return Ok(());
    }
}

// S3 bucket ARNs are derived, the create call only returns the location.
fn bucket_arn(name: &str) -> String {
    return format!("arn:aws:s3:::{}", name);
}

#[cfg(test)]
mod tests {
    use super::bucket_arn;

    #[test]
    fn derives_the_bucket_arn() {
        assert_eq!("arn:aws:s3:::myapp-dev-data", bucket_arn("myapp-dev-data"));
    }
}

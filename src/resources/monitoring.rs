use aws_types::SdkConfig;
use tracing::info;

use super::{require_id, sdk_error, Error};
use crate::config::MonitoringConfig;
use crate::outputs::OutputMap;

/// Creates the CloudTrail trail and the CloudWatch log group.
pub struct Monitoring {
    config: MonitoringConfig,
    trail_client: aws_sdk_cloudtrail::Client,
    logs_client: aws_sdk_cloudwatchlogs::Client,
}

impl Monitoring {
    pub fn new(sdk_config: &SdkConfig, config: MonitoringConfig) -> Self {
        let trail_client = aws_sdk_cloudtrail::Client::new(sdk_config);
        let logs_client = aws_sdk_cloudwatchlogs::Client::new(sdk_config);

        return Self {
            config,
            trail_client,
            logs_client,
        };
    }

    pub async fn provision(&self, outputs: &mut OutputMap) -> Result<(), Error> {
        let cloudtrail = &self.config.cloudtrail;

        let result = self
            .trail_client
            .create_trail()
            .name(&cloudtrail.name)
            .s3_bucket_name(&cloudtrail.s3_bucket_name)
            .include_global_service_events(cloudtrail.include_global_service_events)
            .is_multi_region_trail(cloudtrail.is_multi_region_trail)
            .enable_log_file_validation(cloudtrail.enable_log_file_validation)
            .send()
            .await
            .map_err(sdk_error)?;

        let trail_arn = require_id(result.trail_arn(), "cloudtrail trail")?;
        info!(trail = %cloudtrail.name, arn = %trail_arn, "created trail");

        // Trails are created stopped.
        self.trail_client
            .start_logging()
            .name(&cloudtrail.name)
            .send()
            .await
            .map_err(sdk_error)?;

        outputs.export("trail_arn", trail_arn);

        let cloudwatch = &self.config.cloudwatch;

        self.logs_client
            .create_log_group()
            .log_group_name(&cloudwatch.log_group_name)
            .send()
            .await
            .map_err(sdk_error)?;

        self.logs_client
            .put_retention_policy()
            .log_group_name(&cloudwatch.log_group_name)
            .retention_in_days(cloudwatch.retention_in_days)
            .send()
            .await
            .map_err(sdk_error)?;

        // CreateLogGroup returns nothing, the ARN has to be described.
        let described = self
            .logs_client
            .describe_log_groups()
            .log_group_name_prefix(&cloudwatch.log_group_name)
            .send()
            .await
            .map_err(sdk_error)?;

        let log_group_arn = require_id(
            described
                .log_groups()
                .and_then(|groups| groups.first())
                .and_then(|group| group.arn()),
            "log group",
        )?;
        info!(log_group = %cloudwatch.log_group_name, arn = %log_group_arn, "created log group");
        outputs.export("log_group_arn", log_group_arn);

        return Ok(());
    }
}

use aws_sdk_ec2::model::VpcEndpointType;
use aws_types::SdkConfig;
use tracing::info;

use super::{require_id, sdk_error, Error};
use crate::config::PrivateLinkConfig;
use crate::outputs::OutputMap;

/// Creates an interface VPC endpoint per declared PrivateLink service.
pub struct PrivateLink {
    config: PrivateLinkConfig,
    client: aws_sdk_ec2::Client,
}

impl PrivateLink {
    pub fn new(sdk_config: &SdkConfig, config: PrivateLinkConfig) -> Self {
        let client = aws_sdk_ec2::Client::new(sdk_config);

        return Self { config, client };
    }

    pub async fn provision(&self, outputs: &mut OutputMap) -> Result<(), Error> {
        let mut endpoint_ids = Vec::with_capacity(self.config.endpoints.len());

        for endpoint in &self.config.endpoints {
            let vpc_id = outputs.resolve(&endpoint.vpc_id)?;
            let subnet_ids = outputs.resolve_all(&endpoint.subnet_ids)?;
            let security_group_ids = outputs.resolve_all(&endpoint.security_group_ids)?;

            let mut request = self
                .client
                .create_vpc_endpoint()
                .vpc_id(&vpc_id)
                .service_name(&endpoint.service_name)
                .vpc_endpoint_type(VpcEndpointType::Interface);

            for subnet_id in &subnet_ids {
                request = request.subnet_ids(subnet_id);
            }
            for security_group_id in &security_group_ids {
                request = request.security_group_ids(security_group_id);
            }

            let result = request.send().await.map_err(sdk_error)?;

            let endpoint_id = require_id(
                result
                    .vpc_endpoint()
                    .and_then(|endpoint| endpoint.vpc_endpoint_id()),
                "vpc endpoint",
            )?;
            info!(service = %endpoint.service_name, id = %endpoint_id, "created endpoint");
            endpoint_ids.push(endpoint_id);
        }

        outputs.export_list("endpoint_ids", endpoint_ids);

        return Ok(());
    }
}

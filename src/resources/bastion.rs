use aws_sdk_ec2::model::{
    InstanceNetworkInterfaceSpecification, InstanceType, ResourceType, Tag, TagSpecification,
};
use aws_types::SdkConfig;
use tracing::info;

use super::{require_id, sdk_error, Error};
use crate::config::BastionConfig;
use crate::outputs::OutputMap;

/// Launches the bastion host into its public subnet.
pub struct Bastion {
    config: BastionConfig,
    client: aws_sdk_ec2::Client,
}

impl Bastion {
    pub fn new(sdk_config: &SdkConfig, config: BastionConfig) -> Self {
        let client = aws_sdk_ec2::Client::new(sdk_config);

        return Self { config, client };
    }

    pub async fn provision(&self, outputs: &mut OutputMap) -> Result<(), Error> {
        let instance = &self.config.instance;

        let subnet_id = outputs.resolve(&instance.subnet_id)?;
        let security_group_ids = outputs.resolve_all(&instance.vpc_security_group_ids)?;

        // Public IP association is a property of the primary network
        // interface, not of RunInstances itself.
        let mut interface = InstanceNetworkInterfaceSpecification::builder()
            .device_index(0)
            .subnet_id(&subnet_id)
            .associate_public_ip_address(instance.associate_public_ip_address);
        for security_group_id in &security_group_ids {
            interface = interface.groups(security_group_id);
        }

        let result = self
            .client
            .run_instances()
            .image_id(&instance.ami)
            .instance_type(InstanceType::from(instance.instance_type.as_str()))
            .key_name(&instance.key_name)
            .min_count(1)
            .max_count(1)
            .network_interfaces(interface.build())
            .tag_specifications(
                TagSpecification::builder()
                    .resource_type(ResourceType::Instance)
                    .tags(Tag::builder().key("Name").value(&instance.name).build())
                    .build(),
            )
            .send()
            .await
            .map_err(sdk_error)?;

        let instance_id = require_id(
            result
                .instances()
                .and_then(|instances| instances.first())
                .and_then(|instance| instance.instance_id()),
            "bastion instance",
        )?;
        info!(instance = %instance.name, id = %instance_id, "launched bastion host");
        outputs.export("instance_id", &instance_id);

        if instance.associate_public_ip_address {
            // The address shows up once the instance leaves `pending`; a
            // fresh instance may not carry one yet.
            let described = self
                .client
                .describe_instances()
                .instance_ids(&instance_id)
                .send()
                .await
                .map_err(sdk_error)?;

            let public_ip = described
                .reservations()
                .and_then(|reservations| reservations.first())
                .and_then(|reservation| reservation.instances())
                .and_then(|instances| instances.first())
                .and_then(|instance| instance.public_ip_address());

            if let Some(public_ip) = public_ip {
                outputs.export("public_ip", public_ip);
            }
        }

        return Ok(());
    }
}

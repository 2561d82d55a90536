use aws_sdk_ec2::model::{AttributeBooleanValue, DomainType};
use aws_types::SdkConfig;
use tracing::info;

use super::{require_id, sdk_error, Error};
use crate::config::VpcConfig;
use crate::outputs::OutputMap;

/// Creates the VPC itself, the optional internet gateway, every declared
/// subnet and the NAT gateways placed into them.
pub struct Vpc {
    config: VpcConfig,
    client: aws_sdk_ec2::Client,
}

impl Vpc {
    pub fn new(sdk_config: &SdkConfig, config: VpcConfig) -> Self {
        let client = aws_sdk_ec2::Client::new(sdk_config);

        return Self { config, client };
    }

    pub async fn provision(&self, outputs: &mut OutputMap) -> Result<(), Error> {
        let result = self
            .client
            .create_vpc()
            .cidr_block(&self.config.cidr_block)
            .send()
            .await
            .map_err(sdk_error)?;

        let vpc_id = require_id(result.vpc().and_then(|vpc| vpc.vpc_id()), "vpc")?;
        info!(vpc = %self.config.name, id = %vpc_id, "created vpc");
        outputs.export("vpc_id", &vpc_id);

        if self.config.internet_gateway {
            self.attach_internet_gateway(&vpc_id, outputs).await?;
        }

        let mut subnet_ids = Vec::with_capacity(self.config.subnets.len());
        for subnet in &self.config.subnets {
            let result = self
                .client
                .create_subnet()
                .vpc_id(&vpc_id)
                .cidr_block(&subnet.cidr_block)
                .availability_zone(&subnet.availability_zone)
                .send()
                .await
                .map_err(sdk_error)?;

            let subnet_id = require_id(result.subnet().and_then(|sn| sn.subnet_id()), "subnet")?;

            // MapPublicIpOnLaunch is not part of CreateSubnet.
            if subnet.map_public_ip_on_launch {
                self.client
                    .modify_subnet_attribute()
                    .subnet_id(&subnet_id)
                    .map_public_ip_on_launch(AttributeBooleanValue::builder().value(true).build())
                    .send()
                    .await
                    .map_err(sdk_error)?;
            }

            outputs.export(format!("{}_subnet_id", subnet.name), &subnet_id);
            subnet_ids.push(subnet_id);
        }
        outputs.export_list("subnet_ids", subnet_ids);

        if !self.config.nat_gateways.is_empty() {
            self.create_nat_gateways(outputs).await?;
        }

        return Ok(());
    }

    async fn attach_internet_gateway(
        &self,
        vpc_id: &str,
        outputs: &mut OutputMap,
    ) -> Result<(), Error> {
        let result = self
            .client
            .create_internet_gateway()
            .send()
            .await
            .map_err(sdk_error)?;

        let gateway_id = require_id(
            result
                .internet_gateway()
                .and_then(|gateway| gateway.internet_gateway_id()),
            "internet gateway",
        )?;

        self.client
            .attach_internet_gateway()
            .internet_gateway_id(&gateway_id)
            .vpc_id(vpc_id)
            .send()
            .await
            .map_err(sdk_error)?;

        outputs.export("internet_gateway_id", gateway_id);

        return Ok(());
    }

    async fn create_nat_gateways(&self, outputs: &mut OutputMap) -> Result<(), Error> {
        let mut nat_gateway_ids = Vec::with_capacity(self.config.nat_gateways.len());

        for nat_gateway in &self.config.nat_gateways {
            let subnet_id = outputs.resolve(&nat_gateway.subnet)?;

            let allocation = self
                .client
                .allocate_address()
                .domain(DomainType::Vpc)
                .send()
                .await
                .map_err(sdk_error)?;
            let allocation_id = require_id(allocation.allocation_id(), "elastic ip")?;

            let result = self
                .client
                .create_nat_gateway()
                .subnet_id(&subnet_id)
                .allocation_id(allocation_id)
                .send()
                .await
                .map_err(sdk_error)?;

            let nat_gateway_id = require_id(
                result
                    .nat_gateway()
                    .and_then(|gateway| gateway.nat_gateway_id()),
                "nat gateway",
            )?;
            info!(name = %nat_gateway.name, id = %nat_gateway_id, "created nat gateway");
            nat_gateway_ids.push(nat_gateway_id);
        }

        outputs.export_list("nat_gateway_ids", nat_gateway_ids);

        return Ok(());
    }
}

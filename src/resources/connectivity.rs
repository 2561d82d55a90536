use aws_sdk_ec2::model::{
    AutoAcceptSharedAttachmentsValue, DefaultRouteTableAssociationValue,
    DefaultRouteTablePropagationValue, TransitGatewayRequestOptions,
};
use aws_types::SdkConfig;
use tracing::info;

use super::{require_id, sdk_error, Error};
use crate::config::ConnectivityConfig;
use crate::outputs::OutputMap;

/// Creates VPC peering connections and transit gateways.
pub struct Connectivity {
    config: ConnectivityConfig,
    client: aws_sdk_ec2::Client,
}

impl Connectivity {
    pub fn new(sdk_config: &SdkConfig, config: ConnectivityConfig) -> Self {
        let client = aws_sdk_ec2::Client::new(sdk_config);

        return Self { config, client };
    }

    pub async fn provision(&self, outputs: &mut OutputMap) -> Result<(), Error> {
        let mut peering_connection_ids = Vec::with_capacity(self.config.vpc_peering.len());

        for peering in &self.config.vpc_peering {
            let source_vpc_id = outputs.resolve(&peering.source_vpc_id)?;
            let target_vpc_id = outputs.resolve(&peering.target_vpc_id)?;

            let result = self
                .client
                .create_vpc_peering_connection()
                .vpc_id(&source_vpc_id)
                .peer_vpc_id(&target_vpc_id)
                .send()
                .await
                .map_err(sdk_error)?;

            let peering_connection_id = require_id(
                result
                    .vpc_peering_connection()
                    .and_then(|connection| connection.vpc_peering_connection_id()),
                "vpc peering connection",
            )?;
            info!(peering = %peering.peering_name, id = %peering_connection_id, "created peering connection");

            // Same-account peering can be accepted right away.
            if peering.auto_accept {
                self.client
                    .accept_vpc_peering_connection()
                    .vpc_peering_connection_id(&peering_connection_id)
                    .send()
                    .await
                    .map_err(sdk_error)?;
            }

            peering_connection_ids.push(peering_connection_id);
        }

        if !self.config.vpc_peering.is_empty() {
            outputs.export_list("peering_connection_ids", peering_connection_ids);
        }

        let mut transit_gateway_ids = Vec::with_capacity(self.config.transit_gateway.len());

        for gateway in &self.config.transit_gateway {
            let result = self
                .client
                .create_transit_gateway()
                .description(&gateway.description)
                .options(
                    TransitGatewayRequestOptions::builder()
                        .auto_accept_shared_attachments(AutoAcceptSharedAttachmentsValue::from(
                            gateway.auto_accept_shared_attachments.as_str(),
                        ))
                        .default_route_table_association(DefaultRouteTableAssociationValue::from(
                            gateway.default_route_table_association.as_str(),
                        ))
                        .default_route_table_propagation(DefaultRouteTablePropagationValue::from(
                            gateway.default_route_table_propagation.as_str(),
                        ))
                        .build(),
                )
                .send()
                .await
                .map_err(sdk_error)?;

            let transit_gateway_id = require_id(
                result
                    .transit_gateway()
                    .and_then(|gateway| gateway.transit_gateway_id()),
                "transit gateway",
            )?;
            info!(gateway = %gateway.gateway_name, id = %transit_gateway_id, "created transit gateway");
            transit_gateway_ids.push(transit_gateway_id);
        }

        if !self.config.transit_gateway.is_empty() {
            outputs.export_list("transit_gateway_ids", transit_gateway_ids);
        }

        return Ok(());
    }
}

use aws_sdk_ec2::model::{IpPermission, IpRange, PortRange, RuleAction};
use aws_types::SdkConfig;
use tracing::info;

use super::{require_id, sdk_error, Error};
use crate::config::{NetworkAclRule, SecurityConfig, SecurityGroupRule};
use crate::outputs::OutputMap;

/// Creates security groups with their ingress/egress rules, and network
/// ACLs with their numbered entries.
pub struct Security {
    config: SecurityConfig,
    client: aws_sdk_ec2::Client,
}

impl Security {
    pub fn new(sdk_config: &SdkConfig, config: SecurityConfig) -> Self {
        let client = aws_sdk_ec2::Client::new(sdk_config);

        return Self { config, client };
    }

    pub async fn provision(&self, outputs: &mut OutputMap) -> Result<(), Error> {
        let mut group_ids = Vec::with_capacity(self.config.security_groups.len());

        for group in &self.config.security_groups {
            let vpc_id = outputs.resolve(&group.vpc_id)?;

            let result = self
                .client
                .create_security_group()
                .group_name(&group.name)
                .description(&group.description)
                .vpc_id(&vpc_id)
                .send()
                .await
                .map_err(sdk_error)?;

            let group_id = require_id(result.group_id(), "security group")?;
            info!(group = %group.name, id = %group_id, "created security group");

            for rule in &group.ingress {
                self.client
                    .authorize_security_group_ingress()
                    .group_id(&group_id)
                    .ip_permissions(ip_permission(rule))
                    .send()
                    .await
                    .map_err(sdk_error)?;
            }

            for rule in &group.egress {
                self.client
                    .authorize_security_group_egress()
                    .group_id(&group_id)
                    .ip_permissions(ip_permission(rule))
                    .send()
                    .await
                    .map_err(sdk_error)?;
            }

            outputs.export(format!("{}_sg_id", group.name), &group_id);
            group_ids.push(group_id);
        }

        outputs.export_list("security_group_ids", group_ids);

        let mut acl_ids = Vec::with_capacity(self.config.network_acls.len());

        for acl in &self.config.network_acls {
            let vpc_id = outputs.resolve(&acl.vpc_id)?;

            let result = self
                .client
                .create_network_acl()
                .vpc_id(&vpc_id)
                .send()
                .await
                .map_err(sdk_error)?;

            let acl_id = require_id(
                result.network_acl().and_then(|acl| acl.network_acl_id()),
                "network acl",
            )?;
            info!(acl = %acl.name, id = %acl_id, "created network acl");

            for rule in &acl.ingress {
                self.create_acl_entry(&acl_id, rule, false).await?;
            }
            for rule in &acl.egress {
                self.create_acl_entry(&acl_id, rule, true).await?;
            }

            acl_ids.push(acl_id);
        }

        if !self.config.network_acls.is_empty() {
            outputs.export_list("network_acl_ids", acl_ids);
        }

        return Ok(());
    }

    async fn create_acl_entry(
        &self,
        acl_id: &str,
        rule: &NetworkAclRule,
        egress: bool,
    ) -> Result<(), Error> {
        self.client
            .create_network_acl_entry()
            .network_acl_id(acl_id)
            .rule_number(rule.rule_number)
            .protocol(&rule.protocol)
            .rule_action(RuleAction::from(rule.rule_action.as_str()))
            .cidr_block(&rule.cidr_block)
            .port_range(
                PortRange::builder()
                    .from(rule.from_port)
                    .to(rule.to_port)
                    .build(),
            )
            .egress(egress)
            .send()
            .await
            .map_err(sdk_error)?;

        return Ok(());
    }
}

fn ip_permission(rule: &SecurityGroupRule) -> IpPermission {
    let mut builder = IpPermission::builder()
        .ip_protocol(&rule.protocol)
        .from_port(rule.from_port)
        .to_port(rule.to_port);

    for cidr in &rule.cidr_blocks {
        builder = builder.ip_ranges(IpRange::builder().cidr_ip(cidr).build());
    }

    return builder.build();
}

#[cfg(test)]
mod tests {
    use super::ip_permission;
    use crate::config::SecurityGroupRule;

    #[test]
    fn maps_rule_fields_onto_the_permission() {
        let rule = SecurityGroupRule {
            protocol: String::from("tcp"),
            from_port: 80,
            to_port: 80,
            cidr_blocks: vec![String::from("0.0.0.0/0"), String::from("10.0.0.0/16")],
        };

        let permission = ip_permission(&rule);

        assert_eq!(Some("tcp"), permission.ip_protocol());
        assert_eq!(Some(80), permission.from_port());
        assert_eq!(Some(80), permission.to_port());
        assert_eq!(2, permission.ip_ranges().unwrap().len());
        assert_eq!(
            Some("0.0.0.0/0"),
            permission.ip_ranges().unwrap()[0].cidr_ip()
        );
    }
}

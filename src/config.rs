use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, io, net::Ipv4Addr, path::Path};
use validator::{Validate, ValidationError};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("File {0} not found")]
    FileNotFound(String),

    #[error("Parsing error: {0}")]
    ParsingError(String),

    #[error("Stage {0} is not declared in the configuration file")]
    UnknownStage(String),

    #[error("Validation errors: {0}")]
    ValidationError(String),

    #[error("Unknown error occurred: {0}")]
    Unknown(String),
}

/// One deployment stage. Every resource section is optional so a stage only
/// provisions what it declares.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StageConfig {
    pub region: Option<String>,

    #[validate]
    pub iam: Option<IamConfig>,

    #[validate]
    pub vpc: Option<VpcConfig>,

    #[validate]
    pub security: Option<SecurityConfig>,

    #[validate]
    pub kms: Option<KmsConfig>,

    #[validate]
    pub storage: Option<StorageConfig>,

    #[validate]
    pub privatelink: Option<PrivateLinkConfig>,

    #[validate]
    pub connectivity: Option<ConnectivityConfig>,

    #[validate]
    pub bastion: Option<BastionConfig>,

    #[validate]
    pub monitoring: Option<MonitoringConfig>,

    #[validate]
    pub databricks: Option<DatabricksConfig>,

    #[validate]
    pub compliance: Option<ComplianceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct IamConfig {
    #[validate]
    pub roles: Vec<IamRoleConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct IamRoleConfig {
    #[validate(length(min = 1))]
    pub name: String,

    #[validate(custom = "validate_policy_document")]
    pub assume_role_policy: String,

    #[serde(default)]
    pub policies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VpcConfig {
    #[validate(length(min = 1))]
    pub name: String,

    #[validate(custom = "validate_cidr")]
    pub cidr_block: String,

    #[validate]
    pub subnets: Vec<SubnetConfig>,

    pub internet_gateway: bool,

    #[serde(default)]
    #[validate]
    pub nat_gateways: Vec<NatGatewayConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubnetConfig {
    #[validate(length(min = 1))]
    pub name: String,

    #[validate(custom = "validate_cidr")]
    pub cidr_block: String,

    #[validate(length(min = 1))]
    pub availability_zone: String,

    pub map_public_ip_on_launch: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NatGatewayConfig {
    #[validate(length(min = 1))]
    pub name: String,

    /// Subnet the gateway is placed into, either a literal subnet id or a
    /// `${...}` reference to a previously exported output.
    #[validate(length(min = 1))]
    pub subnet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SecurityConfig {
    #[validate]
    pub security_groups: Vec<SecurityGroupConfig>,

    #[serde(default)]
    #[validate]
    pub network_acls: Vec<NetworkAclConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SecurityGroupConfig {
    #[validate(length(min = 1))]
    pub name: String,

    pub description: String,

    #[validate(length(min = 1))]
    pub vpc_id: String,

    #[validate]
    pub ingress: Vec<SecurityGroupRule>,

    #[validate]
    pub egress: Vec<SecurityGroupRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SecurityGroupRule {
    pub protocol: String,

    #[validate(range(min = 0, max = 65535))]
    pub from_port: i32,

    #[validate(range(min = 0, max = 65535))]
    pub to_port: i32,

    #[validate(custom = "validate_cidrs")]
    pub cidr_blocks: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NetworkAclConfig {
    #[validate(length(min = 1))]
    pub name: String,

    #[validate(length(min = 1))]
    pub vpc_id: String,

    #[validate]
    pub ingress: Vec<NetworkAclRule>,

    #[validate]
    pub egress: Vec<NetworkAclRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NetworkAclRule {
    #[validate(range(min = 1, max = 32766))]
    pub rule_number: i32,

    pub protocol: String,

    #[validate(custom = "validate_rule_action")]
    pub rule_action: String,

    #[validate(custom = "validate_cidr")]
    pub cidr_block: String,

    #[validate(range(min = 0, max = 65535))]
    pub from_port: i32,

    #[validate(range(min = 0, max = 65535))]
    pub to_port: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StorageConfig {
    #[validate]
    pub s3_buckets: Vec<S3BucketConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct S3BucketConfig {
    #[validate(length(min = 3, max = 63))]
    pub name: String,

    pub region: Option<String>,

    pub public_access_block: bool,

    pub versioning: bool,

    #[validate]
    pub logging: Option<BucketLoggingConfig>,

    #[validate(custom = "validate_sse_algorithm")]
    pub server_side_encryption: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BucketLoggingConfig {
    #[validate(length(min = 3, max = 63))]
    pub target_bucket: String,

    pub target_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct KmsConfig {
    #[validate]
    pub keys: Vec<KmsKeyConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct KmsKeyConfig {
    #[validate(custom = "validate_kms_alias")]
    pub alias: String,

    pub description: String,

    #[validate(custom = "validate_policy_document")]
    pub policy: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PrivateLinkConfig {
    #[validate]
    pub endpoints: Vec<PrivateLinkEndpointConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PrivateLinkEndpointConfig {
    #[validate(length(min = 1))]
    pub service_name: String,

    #[validate(length(min = 1))]
    pub vpc_id: String,

    #[validate(length(min = 1))]
    pub subnet_ids: Vec<String>,

    #[serde(default)]
    pub security_group_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ConnectivityConfig {
    #[serde(default)]
    #[validate]
    pub vpc_peering: Vec<VpcPeeringConfig>,

    #[serde(default)]
    #[validate]
    pub transit_gateway: Vec<TransitGatewayConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VpcPeeringConfig {
    #[validate(length(min = 1))]
    pub peering_name: String,

    #[validate(length(min = 1))]
    pub source_vpc_id: String,

    #[validate(length(min = 1))]
    pub target_vpc_id: String,

    pub auto_accept: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TransitGatewayConfig {
    #[validate(length(min = 1))]
    pub gateway_name: String,

    pub description: String,

    #[validate(custom = "validate_feature_toggle")]
    pub default_route_table_association: String,

    #[validate(custom = "validate_feature_toggle")]
    pub default_route_table_propagation: String,

    #[validate(custom = "validate_feature_toggle")]
    pub auto_accept_shared_attachments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BastionConfig {
    #[validate]
    pub instance: BastionInstanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BastionInstanceConfig {
    #[validate(length(min = 1))]
    pub name: String,

    #[validate(custom = "validate_ami_id")]
    pub ami: String,

    #[validate(length(min = 1))]
    pub instance_type: String,

    #[validate(length(min = 1))]
    pub key_name: String,

    #[validate(length(min = 1))]
    pub vpc_security_group_ids: Vec<String>,

    #[validate(length(min = 1))]
    pub subnet_id: String,

    pub associate_public_ip_address: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MonitoringConfig {
    #[validate]
    pub cloudtrail: CloudTrailConfig,

    #[validate]
    pub cloudwatch: CloudWatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CloudTrailConfig {
    #[validate(length(min = 1))]
    pub name: String,

    #[validate(length(min = 3, max = 63))]
    pub s3_bucket_name: String,

    pub include_global_service_events: bool,

    pub is_multi_region_trail: bool,

    pub enable_log_file_validation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CloudWatchConfig {
    #[validate(length(min = 1))]
    pub log_group_name: String,

    // CloudWatch Logs only accepts a fixed set of retention values; the range
    // catches the obvious misconfigurations before any call is made.
    #[validate(range(min = 1, max = 3653))]
    pub retention_in_days: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabricksConfig {
    #[validate]
    pub workspace: DatabricksWorkspaceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabricksWorkspaceConfig {
    #[validate(length(min = 1))]
    pub name: String,

    #[validate(length(min = 1))]
    pub region: String,

    #[validate(length(min = 1))]
    pub sku: String,

    pub managed_resource_group_id: Option<String>,

    #[validate]
    pub network: DatabricksNetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabricksNetworkConfig {
    #[validate(length(min = 1))]
    pub vpc_id: String,

    #[validate(length(min = 1))]
    pub subnet_ids: Vec<String>,

    #[validate(length(min = 1))]
    pub security_group_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ComplianceConfig {
    #[validate]
    pub enforce_tagging: TaggingPolicy,

    #[validate]
    pub encryption_policies: EncryptionPolicy,

    #[validate]
    pub audit_settings: AuditSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TaggingPolicy {
    #[validate(length(min = 1))]
    pub required_tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EncryptionPolicy {
    pub enforce_on: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AuditSettings {
    #[validate(length(min = 1))]
    pub trail_name: String,

    #[validate(length(min = 3, max = 63))]
    pub log_bucket: String,
}

type Config = BTreeMap<String, StageConfig>;

pub fn parse(path: &Path, stage: &str) -> Result<StageConfig, Error> {
    let contents = match fs::read_to_string(path) {
        Ok(raw_contents) => Ok(raw_contents),
        Err(error) => match error.kind() {
            io::ErrorKind::NotFound => Err(Error::FileNotFound(path.display().to_string())),
            _ => Err(Error::Unknown(error.to_string())),
        },
    }?;

    let mut config: Config = match serde_yaml::from_str(&contents) {
        Ok(data) => Ok(data),
        Err(error) => Err(Error::ParsingError(error.to_string())),
    }?;

    let stage_config = match config.remove(stage) {
        Some(stage_config) => stage_config,
        None => return Err(Error::UnknownStage(stage.to_string())),
    };

    match stage_config.validate() {
        Ok(_) => (),
        Err(error) => return Err(Error::ValidationError(error.to_string())),
    }

    return Ok(stage_config);
}

fn validate_cidr(cidr: &str) -> Result<(), ValidationError> {
    let (address, prefix) = match cidr.split_once('/') {
        Some(parts) => parts,
        None => return Err(ValidationError::new("A CIDR block requires a /prefix")),
    };

    if address.parse::<Ipv4Addr>().is_err() {
        return Err(ValidationError::new(
            "The CIDR block does not start with a valid IPv4 address",
        ));
    }

    match prefix.parse::<u8>() {
        Ok(length) if length <= 32 => Ok(()),
        _ => Err(ValidationError::new(
            "The CIDR prefix length has to be between 0 and 32",
        )),
    }
}

fn validate_cidrs(cidrs: &[String]) -> Result<(), ValidationError> {
    for cidr in cidrs {
        validate_cidr(cidr)?;
    }

    return Ok(());
}

fn validate_policy_document(policy: &str) -> Result<(), ValidationError> {
    match serde_json::from_str::<serde_json::Value>(policy) {
        Ok(_) => Ok(()),
        Err(_) => Err(ValidationError::new(
            "The policy document has to be valid JSON",
        )),
    }
}

fn validate_rule_action(action: &str) -> Result<(), ValidationError> {
    match action {
        "allow" | "deny" => Ok(()),
        _ => Err(ValidationError::new(
            "A network ACL rule action has to be either `allow` or `deny`",
        )),
    }
}

fn validate_sse_algorithm(algorithm: &str) -> Result<(), ValidationError> {
    match algorithm {
        "AES256" | "aws:kms" => Ok(()),
        _ => Err(ValidationError::new(
            "Server side encryption has to be either `AES256` or `aws:kms`",
        )),
    }
}

fn validate_kms_alias(alias: &str) -> Result<(), ValidationError> {
    if !alias.starts_with("alias/") {
        return Err(ValidationError::new(
            "A KMS alias has to start with `alias/`",
        ));
    }

    return Ok(());
}

fn validate_ami_id(ami: &str) -> Result<(), ValidationError> {
    if !ami.starts_with("ami-") {
        return Err(ValidationError::new("An AMI id has to start with `ami-`"));
    }

    return Ok(());
}

fn validate_feature_toggle(value: &str) -> Result<(), ValidationError> {
    match value {
        "enable" | "disable" => Ok(()),
        _ => Err(ValidationError::new(
            "Transit gateway toggles have to be either `enable` or `disable`",
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::io::Write;

    use super::parse;
    use super::Error;
    use tempfile::tempdir;

    const DEV_STAGE: &str = r#"
dev:
  region: us-east-1
  vpc:
    name: data-platform
    cidr_block: 10.0.0.0/16
    internet_gateway: true
    subnets:
      - name: public-a
        cidr_block: 10.0.1.0/24
        availability_zone: us-east-1a
        map_public_ip_on_launch: true
      - name: private-a
        cidr_block: 10.0.2.0/24
        availability_zone: us-east-1a
        map_public_ip_on_launch: false
  storage:
    s3_buckets:
      - name: myapp-dev-data
        region: us-east-1
        public_access_block: true
        versioning: true
        logging:
          target_bucket: myapp-log-bucket
          target_prefix: logs/dev/
        server_side_encryption: AES256
"#;

    #[test]
    fn file_does_not_exist() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("config.yaml");

        let result = parse(&file_path, "dev");
        assert_eq!(true, result.is_err());
        match result.err().unwrap() {
            Error::FileNotFound(_) => {}
            _ => panic!("Expected `FileNotFound` error"),
        }
    }

    #[test]
    fn file_wrong_format() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("config.yaml");

        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "- this is\n- a sequence\n- not a stage mapping").unwrap();

        let result = parse(&file_path, "dev");
        assert_eq!(true, result.is_err());
        match result.err().unwrap() {
            Error::ParsingError(_) => {}
            _ => panic!("Expected `ParsingError` error"),
        }
    }

    #[test]
    fn stage_is_not_declared() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("config.yaml");

        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "{}", DEV_STAGE).unwrap();

        let result = parse(&file_path, "prod");
        assert_eq!(true, result.is_err());
        match result.err().unwrap() {
            Error::UnknownStage(stage) => assert_eq!("prod", stage),
            _ => panic!("Expected `UnknownStage` error"),
        }
    }

    #[test]
    fn invalid_cidr_fails_validation() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("config.yaml");

        let config = DEV_STAGE.replace("10.0.0.0/16", "10.0.0.0");

        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "{}", config).unwrap();

        let result = parse(&file_path, "dev");
        assert_eq!(true, result.is_err());
        match result.err().unwrap() {
            Error::ValidationError(_) => {}
            _ => panic!("Expected `ValidationError` error"),
        }
    }

    #[test]
    fn invalid_sse_algorithm_fails_validation() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("config.yaml");

        let config = DEV_STAGE.replace("AES256", "ROT13");

        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "{}", config).unwrap();

        let result = parse(&file_path, "dev");
        assert_eq!(true, result.is_err());
        match result.err().unwrap() {
            Error::ValidationError(_) => {}
            _ => panic!("Expected `ValidationError` error"),
        }
    }

    #[test]
    fn parses_the_config() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("config.yaml");

        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "{}", DEV_STAGE).unwrap();

        let result = parse(&file_path, "dev");
        assert_eq!(false, result.is_err());

        let stage = result.unwrap();
        assert_eq!(Some(String::from("us-east-1")), stage.region);
        assert_eq!(2, stage.vpc.unwrap().subnets.len());
        assert_eq!(true, stage.iam.is_none());
    }

    mod validators {
        use super::super::*;

        #[test]
        fn accepts_valid_cidr_blocks() {
            assert_eq!(true, validate_cidr("10.0.0.0/16").is_ok());
            assert_eq!(true, validate_cidr("0.0.0.0/0").is_ok());
        }

        #[test]
        fn rejects_malformed_cidr_blocks() {
            assert_eq!(true, validate_cidr("10.0.0.0").is_err());
            assert_eq!(true, validate_cidr("10.0.0/16").is_err());
            assert_eq!(true, validate_cidr("10.0.0.0/64").is_err());
        }

        #[test]
        fn rejects_non_json_policy_documents() {
            assert_eq!(
                true,
                validate_policy_document("{\"Version\": \"2012-10-17\"}").is_ok()
            );
            assert_eq!(true, validate_policy_document("not a policy").is_err());
        }

        #[test]
        fn rejects_unknown_rule_actions() {
            assert_eq!(true, validate_rule_action("allow").is_ok());
            assert_eq!(true, validate_rule_action("deny").is_ok());
            assert_eq!(true, validate_rule_action("permit").is_err());
        }

        #[test]
        fn rejects_unprefixed_kms_aliases() {
            assert_eq!(true, validate_kms_alias("alias/myapp-key").is_ok());
            assert_eq!(true, validate_kms_alias("myapp-key").is_err());
        }
    }
}

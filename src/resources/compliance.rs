use tracing::info;

use super::Error;
use crate::config::ComplianceConfig;
use crate::outputs::OutputMap;

// Services a default-encryption policy can actually be enforced on.
const ENCRYPTABLE_SERVICES: [&str; 4] = ["s3", "ebs", "rds", "kms"];

/// Checks the declared governance policies and records where the audit
/// report for the stage will land. Purely declarative, no provider calls.
pub struct Compliance {
    config: ComplianceConfig,
}

impl Compliance {
    pub fn new(config: ComplianceConfig) -> Self {
        return Self { config };
    }

    pub fn provision(&self, outputs: &mut OutputMap) -> Result<(), Error> {
        for tag in &self.config.enforce_tagging.required_tags {
            if tag.trim().is_empty() {
                return Err(Error::UnknownError(String::from(
                    "A required tag cannot be blank",
                )));
            }
        }

        for service in &self.config.encryption_policies.enforce_on {
            if !ENCRYPTABLE_SERVICES.contains(&service.as_str()) {
                return Err(Error::UnsupportedService(service.clone()));
            }
        }

        let audit = &self.config.audit_settings;
        info!(trail = %audit.trail_name, bucket = %audit.log_bucket, "compliance policies verified");

        outputs.export("compliance_status", "compliant");
        outputs.export(
            "report_location",
            format!("s3://{}/reports/{}.json", audit.log_bucket, audit.trail_name),
        );

        return Ok(());
    }
}

#[cfg(test)]
mod tests {
    use super::{Compliance, Error};
    use crate::config::{AuditSettings, ComplianceConfig, EncryptionPolicy, TaggingPolicy};
    use crate::outputs::{OutputMap, OutputValue};

    fn config() -> ComplianceConfig {
        return ComplianceConfig {
            enforce_tagging: TaggingPolicy {
                required_tags: vec![String::from("Project"), String::from("Owner")],
            },
            encryption_policies: EncryptionPolicy {
                enforce_on: vec![String::from("s3"), String::from("ebs")],
            },
            audit_settings: AuditSettings {
                trail_name: String::from("compliance-trail"),
                log_bucket: String::from("audit-logs"),
            },
        };
    }

    #[test]
    fn records_the_compliance_outputs() {
        let mut outputs = OutputMap::new();
        Compliance::new(config()).provision(&mut outputs).unwrap();

        assert_eq!(
            Some(&OutputValue::Scalar(String::from("compliant"))),
            outputs.get("compliance_status")
        );
        assert_eq!(
            Some(&OutputValue::Scalar(String::from(
                "s3://audit-logs/reports/compliance-trail.json"
            ))),
            outputs.get("report_location")
        );
    }

    #[test]
    fn rejects_services_without_encryption_enforcement() {
        let mut config = config();
        config.encryption_policies.enforce_on.push(String::from("sns"));

        let mut outputs = OutputMap::new();
        let result = Compliance::new(config).provision(&mut outputs);

        match result.err().unwrap() {
            Error::UnsupportedService(service) => assert_eq!("sns", service),
            _ => panic!("Expected `UnsupportedService` error"),
        }
    }

    #[test]
    fn rejects_blank_required_tags() {
        let mut config = config();
        config.enforce_tagging.required_tags.push(String::from("  "));

        let mut outputs = OutputMap::new();
        let result = Compliance::new(config).provision(&mut outputs);
        assert_eq!(true, result.is_err());
    }
}

use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::Error;
use crate::config::{DatabricksConfig, DatabricksWorkspaceConfig};
use crate::outputs::OutputMap;

const ACCOUNTS_API: &str = "https://accounts.cloud.databricks.com";

/// Creates the Databricks workspace through the account-level REST API.
/// There is no AWS SDK for this surface.
pub struct Databricks {
    config: DatabricksConfig,
    client: reqwest::Client,
    credentials: AccountCredentials,
}

struct AccountCredentials {
    account_id: String,
    username: String,
    password: String,
}

impl AccountCredentials {
    fn from_env() -> Result<Self, Error> {
        let var = |name: &str| {
            std::env::var(name).map_err(|_| Error::MissingCredentials(name.to_string()))
        };

        return Ok(Self {
            account_id: var("DATABRICKS_ACCOUNT_ID")?,
            username: var("DATABRICKS_USERNAME")?,
            password: var("DATABRICKS_PASSWORD")?,
        });
    }
}

#[derive(Debug, Deserialize)]
struct WorkspaceResponse {
    workspace_id: u64,

    #[serde(default)]
    deployment_name: Option<String>,
}

impl Databricks {
    pub fn new(config: DatabricksConfig) -> Result<Self, Error> {
        let credentials = AccountCredentials::from_env()?;

        return Ok(Self {
            config,
            client: reqwest::Client::new(),
            credentials,
        });
    }

    pub async fn provision(&self, outputs: &mut OutputMap) -> Result<(), Error> {
        let workspace = &self.config.workspace;
        let payload = workspace_payload(workspace, outputs)?;

        let url = format!(
            "{}/api/2.0/accounts/{}/workspaces",
            ACCOUNTS_API, self.credentials.account_id
        );

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .json(&payload)
            .send()
            .await
            .map_err(|error| Error::UnknownError(error.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ServiceError(format!(
                "workspace request failed with {}: {}",
                status, body
            )));
        }

        let created: WorkspaceResponse = response
            .json()
            .await
            .map_err(|error| Error::UnknownError(error.to_string()))?;

        info!(workspace = %workspace.name, id = created.workspace_id, "created workspace");
        outputs.export("workspace_id", created.workspace_id.to_string());

        let deployment_name = created
            .deployment_name
            .unwrap_or_else(|| workspace.name.clone());
        outputs.export(
            "workspace_url",
            format!("https://{}.cloud.databricks.com", deployment_name),
        );

        return Ok(());
    }
}

fn workspace_payload(
    workspace: &DatabricksWorkspaceConfig,
    outputs: &OutputMap,
) -> Result<serde_json::Value, Error> {
    let network = &workspace.network;

    return Ok(json!({
        "workspace_name": workspace.name,
        "aws_region": workspace.region,
        "pricing_tier": workspace.sku.to_uppercase(),
        "network": {
            "vpc_id": outputs.resolve(&network.vpc_id)?,
            "subnet_ids": outputs.resolve_all(&network.subnet_ids)?,
            "security_group_ids": outputs.resolve_all(&network.security_group_ids)?,
        },
    }));
}

#[cfg(test)]
mod tests {
    use super::workspace_payload;
    use crate::config::{DatabricksNetworkConfig, DatabricksWorkspaceConfig};
    use crate::outputs::OutputMap;

    fn workspace() -> DatabricksWorkspaceConfig {
        return DatabricksWorkspaceConfig {
            name: String::from("my-databricks-workspace"),
            region: String::from("us-west-2"),
            sku: String::from("standard"),
            managed_resource_group_id: None,
            network: DatabricksNetworkConfig {
                vpc_id: String::from("${vpc_id}"),
                subnet_ids: vec![String::from("${subnet_ids}")],
                security_group_ids: vec![String::from("${web-server-sg_sg_id}")],
            },
        };
    }

    #[test]
    fn resolves_the_network_wiring() {
        let mut outputs = OutputMap::new();
        outputs.export("vpc_id", "vpc-0123");
        outputs.export_list(
            "subnet_ids",
            vec![String::from("subnet-1"), String::from("subnet-2")],
        );
        outputs.export("web-server-sg_sg_id", "sg-0abc");

        let payload = workspace_payload(&workspace(), &outputs).unwrap();

        assert_eq!("my-databricks-workspace", payload["workspace_name"]);
        assert_eq!("us-west-2", payload["aws_region"]);
        assert_eq!("STANDARD", payload["pricing_tier"]);
        assert_eq!("vpc-0123", payload["network"]["vpc_id"]);
        assert_eq!(2, payload["network"]["subnet_ids"].as_array().unwrap().len());
        assert_eq!("sg-0abc", payload["network"]["security_group_ids"][0]);
    }

    #[test]
    fn fails_when_the_network_is_not_provisioned_yet() {
        let outputs = OutputMap::new();
        let result = workspace_payload(&workspace(), &outputs);
        assert_eq!(true, result.is_err());
    }
}

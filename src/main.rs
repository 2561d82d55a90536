use std::path::PathBuf;

use anyhow::Context;
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_ec2::Region;
use aws_types::SdkConfig;
use clap::Parser;
use tracing::info;

pub mod config;
pub mod outputs;
pub mod resources;

use config::StageConfig;
use outputs::OutputMap;

/// Provision the AWS data platform declared by a stage configuration file
#[derive(Parser)]
#[command(name = "platform-provisioner", version, about, long_about = None)]
struct Cli {
    /// Path to the stage configuration file
    #[arg(short, long, default_value = "./config.yaml")]
    config: PathBuf,

    /// Stage to provision (a top-level key in the configuration file)
    #[arg(short, long, default_value = "dev")]
    stage: String,

    /// File the recorded outputs are written to
    #[arg(short, long, default_value = "./outputs.json")]
    outputs: PathBuf,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let stage = config::parse(&cli.config, &cli.stage).with_context(|| {
        format!(
            "Failed to load stage {} from {}",
            cli.stage,
            cli.config.display()
        )
    })?;
    info!(stage = %cli.stage, config = %cli.config.display(), "loaded stage configuration");

    let sdk_config = load_sdk_config(stage.region.as_deref()).await;

    let mut outputs = OutputMap::new();
    provision(&sdk_config, stage, &mut outputs).await?;

    outputs::write(&cli.outputs, &outputs)?;
    info!(path = %cli.outputs.display(), "wrote outputs");

    return Ok(());
}

// Wrappers run strictly in hand-coded dependency order: the VPC before
// anything referencing its id, security groups before Databricks, the
// compliance summary last.
async fn provision(
    sdk_config: &SdkConfig,
    stage: StageConfig,
    outputs: &mut OutputMap,
) -> anyhow::Result<()> {
    if let Some(config) = stage.iam {
        resources::iam::Iam::new(sdk_config, config)
            .provision(outputs)
            .await
            .context("Failed to provision the IAM roles")?;
    }

    if let Some(config) = stage.vpc {
        resources::vpc::Vpc::new(sdk_config, config)
            .provision(outputs)
            .await
            .context("Failed to provision the VPC")?;
    }

    if let Some(config) = stage.security {
        resources::security::Security::new(sdk_config, config)
            .provision(outputs)
            .await
            .context("Failed to provision the security groups and network ACLs")?;
    }

    if let Some(config) = stage.kms {
        resources::kms::Kms::new(sdk_config, config)
            .provision(outputs)
            .await
            .context("Failed to provision the KMS keys")?;
    }

    if let Some(config) = stage.storage {
        resources::storage::Storage::new(sdk_config, config)
            .provision(outputs)
            .await
            .context("Failed to provision the S3 buckets")?;
    }

    if let Some(config) = stage.privatelink {
        resources::privatelink::PrivateLink::new(sdk_config, config)
            .provision(outputs)
            .await
            .context("Failed to provision the PrivateLink endpoints")?;
    }

    if let Some(config) = stage.connectivity {
        resources::connectivity::Connectivity::new(sdk_config, config)
            .provision(outputs)
            .await
            .context("Failed to provision the peering connections and transit gateways")?;
    }

    if let Some(config) = stage.bastion {
        resources::bastion::Bastion::new(sdk_config, config)
            .provision(outputs)
            .await
            .context("Failed to provision the bastion host")?;
    }

    if let Some(config) = stage.monitoring {
        resources::monitoring::Monitoring::new(sdk_config, config)
            .provision(outputs)
            .await
            .context("Failed to provision the CloudTrail trail and log group")?;
    }

    if let Some(config) = stage.databricks {
        resources::databricks::Databricks::new(config)
            .context("Failed to read the Databricks account credentials")?
            .provision(outputs)
            .await
            .context("Failed to provision the Databricks workspace")?;
    }

    if let Some(config) = stage.compliance {
        resources::compliance::Compliance::new(config)
            .provision(outputs)
            .context("Failed to verify the compliance policies")?;
    }

    return Ok(());
}

async fn load_sdk_config(region: Option<&str>) -> SdkConfig {
    let region = match region {
        Some(provided_region) => Some(Region::new(provided_region.to_string())),
        None => RegionProviderChain::default_provider().region().await,
    };

    let mut loader = aws_config::from_env();
    if let Some(region) = region {
        loader = loader.region(region);
    }

    return loader.load().await;
}

fn init_tracing(log_level: Option<&str>) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.unwrap_or("info")));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .init();
}

//! One place to build every wrapper from a single configuration.
//!
//! The three wrappers share one [`AwsClient`], so they share its connection
//! pool and credentials.

use crate::client::AwsClient;
use crate::config::SdkConfig;
use crate::database::RdsEndpoints;
use crate::error::{OpsError, OpsResult};
use crate::kms::{KmsClient, KmsDecrypter};
use crate::rds::RdsClient;
use crate::ssm::{ParameterStore, SsmClient};

#[derive(Debug, Clone)]
pub struct AwsServices {
    pub rds: RdsEndpoints<RdsClient>,
    pub kms: KmsDecrypter<KmsClient>,
    pub ssm: ParameterStore<SsmClient>,
}

impl AwsServices {
    pub fn from_config(config: &SdkConfig) -> OpsResult<Self> {
        let client = AwsClient::new(config).map_err(OpsError::Http)?;
        log::debug!(
            "aws services ready for {} via {}",
            client.region_name(),
            config.credentials.provider_name
        );
        Ok(Self {
            rds: RdsEndpoints::new(RdsClient::new(client.clone())),
            kms: KmsDecrypter::new(KmsClient::new(client.clone())),
            ssm: ParameterStore::new(SsmClient::new(client)),
        })
    }

    /// Resolve configuration from the environment and build the wrappers.
    pub fn from_env() -> OpsResult<Self> {
        Self::from_config(&SdkConfig::from_env()?)
    }
}

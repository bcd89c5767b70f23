//! RDS endpoint lookups.
//!
//! [`RdsEndpoints`] answers three questions about the account's Aurora
//! fleet, each as a JSON byte buffer:
//!
//! * which endpoint of a given role a cluster exposes ([`RdsEndpoints::describe_endpoint`]),
//! * the endpoint of that role behind every listed instance ([`RdsEndpoints::describe_all_endpoints`]),
//! * which instances exist and when they were created ([`RdsEndpoints::list_db_identifiers`]).
//!
//! Only the first `DescribeDBInstances` page is ever read and nothing is
//! retried. Calls are issued one at a time and the first failure ends the
//! operation.

use crate::config::SdkConfig;
use crate::error::{OpsError, OpsResult};
use crate::rds::{DBClusterEndpoint, DescribeDBClusterEndpointsInput, Filter, RdsApi, RdsClient};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Filter name selecting cluster endpoints by role.
pub const ENDPOINT_TYPE_FILTER: &str = "db-cluster-endpoint-type";

// ── Endpoint type ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EndpointType {
    #[default]
    Writer,
    Reader,
}

impl EndpointType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Writer => "writer",
            Self::Reader => "reader",
        }
    }

    /// The `db-cluster-endpoint-type` filter for this role.
    pub fn filter(&self) -> Filter {
        Filter::new(ENDPOINT_TYPE_FILTER, vec![self.as_str().to_string()])
    }
}

impl fmt::Display for EndpointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EndpointType {
    type Err = OpsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "writer" => Ok(Self::Writer),
            "reader" => Ok(Self::Reader),
            _ => Err(OpsError::InvalidEndpointType(s.to_string())),
        }
    }
}

// ── Output records ──────────────────────────────────────────────────────

/// One row of [`RdsEndpoints::list_db_identifiers`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceDescriptor {
    pub identifier: String,
    #[serde(rename = "createdAt", serialize_with = "rfc3339_nanos")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Rendered for instances that report no creation time.
const ZERO_INSTANT: &str = "0001-01-01T00:00:00Z";

/// RFC 3339 in UTC with trailing zeros dropped from the fraction.
fn rfc3339_nanos<S: Serializer>(
    value: &Option<DateTime<Utc>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(ts) => serializer.serialize_str(&format_rfc3339_nanos(ts)),
        None => serializer.serialize_str(ZERO_INSTANT),
    }
}

fn format_rfc3339_nanos(ts: &DateTime<Utc>) -> String {
    let full = ts.to_rfc3339_opts(SecondsFormat::Nanos, true);
    let stamp = full.trim_end_matches('Z');
    match stamp.split_once('.') {
        Some((seconds, fraction)) => {
            let fraction = fraction.trim_end_matches('0');
            if fraction.is_empty() {
                format!("{}Z", seconds)
            } else {
                format!("{}.{}Z", seconds, fraction)
            }
        }
        None => full,
    }
}

// ── Aggregator ──────────────────────────────────────────────────────────

/// Endpoint and instance lookups over an [`RdsApi`].
#[derive(Debug, Clone)]
pub struct RdsEndpoints<A: RdsApi = RdsClient> {
    api: A,
}

impl<A: RdsApi> RdsEndpoints<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// Endpoints of `endpoint_type` for one cluster, serialized as the full
    /// `DescribeDBClusterEndpoints` result.
    pub async fn describe_endpoint(
        &self,
        cluster_identifier: &str,
        endpoint_type: EndpointType,
    ) -> OpsResult<Vec<u8>> {
        if cluster_identifier.is_empty() {
            return Err(OpsError::Config(
                "cluster identifier must not be empty".to_string(),
            ));
        }
        let output = self
            .api
            .describe_db_cluster_endpoints(DescribeDBClusterEndpointsInput {
                db_cluster_identifier: Some(cluster_identifier.to_string()),
                filters: vec![endpoint_type.filter()],
            })
            .await
            .map_err(OpsError::remote("describe endpoint"))?;

        Ok(serde_json::to_vec(&output)?)
    }

    /// The first `endpoint_type` endpoint of each listed instance's cluster,
    /// in listing order.
    ///
    /// Instances without a cluster, and clusters with no endpoint of that
    /// role, contribute nothing.
    pub async fn describe_all_endpoints(&self, endpoint_type: EndpointType) -> OpsResult<Vec<u8>> {
        let listing = self
            .api
            .describe_db_instances()
            .await
            .map_err(OpsError::remote("list instances"))?;

        let mut endpoints: Vec<DBClusterEndpoint> = Vec::with_capacity(listing.db_instances.len());
        for instance in listing.db_instances {
            let Some(cluster) = instance.db_cluster_identifier else {
                log::debug!(
                    "instance {} is not part of a cluster, skipping",
                    instance.db_instance_identifier
                );
                continue;
            };

            let output = self
                .api
                .describe_db_cluster_endpoints(DescribeDBClusterEndpointsInput {
                    db_cluster_identifier: Some(cluster.clone()),
                    filters: vec![endpoint_type.filter()],
                })
                .await
                .map_err(OpsError::remote("describe endpoints"))?;

            match output.db_cluster_endpoints.into_iter().next() {
                Some(endpoint) => endpoints.push(endpoint),
                None => log::warn!(
                    "cluster {} (instance {}) has no {} endpoint, skipping",
                    cluster,
                    instance.db_instance_identifier,
                    endpoint_type
                ),
            }
        }

        log::debug!("collected {} {} endpoint(s)", endpoints.len(), endpoint_type);
        Ok(serde_json::to_vec(&endpoints)?)
    }

    /// `[{"identifier": …, "createdAt": …}]` for every listed instance.
    pub async fn list_db_identifiers(&self) -> OpsResult<Vec<u8>> {
        let listing = self
            .api
            .describe_db_instances()
            .await
            .map_err(OpsError::remote("list instances"))?;

        let instances: Vec<InstanceDescriptor> = listing
            .db_instances
            .into_iter()
            .map(|d| InstanceDescriptor {
                identifier: d.db_instance_identifier,
                created_at: d.instance_create_time,
            })
            .collect();

        Ok(serde_json::to_vec(&instances)?)
    }
}

impl RdsEndpoints<RdsClient> {
    pub fn from_config(config: &SdkConfig) -> OpsResult<Self> {
        let client = crate::client::AwsClient::new(config).map_err(OpsError::Http)?;
        Ok(Self::new(RdsClient::new(client)))
    }

    pub fn from_env() -> OpsResult<Self> {
        Self::from_config(&SdkConfig::from_env()?)
    }
}

/// Object-safe view of [`RdsEndpoints`], for callers that hold the
/// lookups behind a trait object.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait Rds: Send + Sync {
    async fn describe_endpoint(
        &self,
        cluster_identifier: String,
        endpoint_type: EndpointType,
    ) -> OpsResult<Vec<u8>>;

    async fn describe_all_endpoints(&self, endpoint_type: EndpointType) -> OpsResult<Vec<u8>>;

    async fn list_db_identifiers(&self) -> OpsResult<Vec<u8>>;
}

#[async_trait]
impl<A: RdsApi> Rds for RdsEndpoints<A> {
    async fn describe_endpoint(
        &self,
        cluster_identifier: String,
        endpoint_type: EndpointType,
    ) -> OpsResult<Vec<u8>> {
        RdsEndpoints::describe_endpoint(self, &cluster_identifier, endpoint_type).await
    }

    async fn describe_all_endpoints(&self, endpoint_type: EndpointType) -> OpsResult<Vec<u8>> {
        RdsEndpoints::describe_all_endpoints(self, endpoint_type).await
    }

    async fn list_db_identifiers(&self) -> OpsResult<Vec<u8>> {
        RdsEndpoints::list_db_identifiers(self).await
    }
}

//! AWS RDS gateway.
//!
//! RDS speaks the Query protocol with XML responses (API version
//! 2014-10-31). Only the two read operations the endpoint lookups need are
//! modelled. Records keep the AWS member names when serialized so they can
//! be handed to callers unmodified.
//!
//! Reference: <https://docs.aws.amazon.com/AmazonRDS/latest/APIReference/>

use crate::client::{self, AwsClient};
use crate::error::{AwsError, AwsResult};
use crate::xml;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const API_VERSION: &str = "2014-10-31";
const SERVICE: &str = "rds";

// ── Types ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DBInstance {
    #[serde(rename = "DBInstanceIdentifier")]
    pub db_instance_identifier: String,
    #[serde(rename = "DBClusterIdentifier", skip_serializing_if = "Option::is_none")]
    pub db_cluster_identifier: Option<String>,
    #[serde(rename = "DBInstanceClass", skip_serializing_if = "Option::is_none")]
    pub db_instance_class: Option<String>,
    #[serde(rename = "DBInstanceStatus", skip_serializing_if = "Option::is_none")]
    pub db_instance_status: Option<String>,
    #[serde(rename = "Engine", skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(rename = "EngineVersion", skip_serializing_if = "Option::is_none")]
    pub engine_version: Option<String>,
    #[serde(rename = "AvailabilityZone", skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    #[serde(rename = "Endpoint", skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Endpoint>,
    #[serde(rename = "InstanceCreateTime", skip_serializing_if = "Option::is_none")]
    pub instance_create_time: Option<DateTime<Utc>>,
}

/// Connection endpoint of a single instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(rename = "Address", skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(rename = "Port", skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(rename = "HostedZoneId", skip_serializing_if = "Option::is_none")]
    pub hosted_zone_id: Option<String>,
}

/// A writer, reader or custom endpoint of an Aurora cluster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DBClusterEndpoint {
    #[serde(rename = "DBClusterEndpointIdentifier", skip_serializing_if = "Option::is_none")]
    pub db_cluster_endpoint_identifier: Option<String>,
    #[serde(rename = "DBClusterIdentifier", skip_serializing_if = "Option::is_none")]
    pub db_cluster_identifier: Option<String>,
    #[serde(
        rename = "DBClusterEndpointResourceIdentifier",
        skip_serializing_if = "Option::is_none"
    )]
    pub db_cluster_endpoint_resource_identifier: Option<String>,
    #[serde(rename = "Endpoint", skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(rename = "Status", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "EndpointType", skip_serializing_if = "Option::is_none")]
    pub endpoint_type: Option<String>,
    #[serde(rename = "CustomEndpointType", skip_serializing_if = "Option::is_none")]
    pub custom_endpoint_type: Option<String>,
    #[serde(
        rename = "StaticMembers",
        default,
        deserialize_with = "xml::members",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub static_members: Vec<String>,
    #[serde(
        rename = "ExcludedMembers",
        default,
        deserialize_with = "xml::members",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub excluded_members: Vec<String>,
    #[serde(rename = "DBClusterEndpointArn", skip_serializing_if = "Option::is_none")]
    pub db_cluster_endpoint_arn: Option<String>,
}

/// Server-side filter, sent as `Filters.Filter.N.Name` / `Filters.Filter.N.Values.Value.M`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Values")]
    pub values: Vec<String>,
}

impl Filter {
    pub fn new(name: &str, values: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            values,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescribeDBClusterEndpointsInput {
    pub db_cluster_identifier: Option<String>,
    pub filters: Vec<Filter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescribeDBInstancesOutput {
    #[serde(rename = "DBInstances", default, deserialize_with = "xml::db_instances")]
    pub db_instances: Vec<DBInstance>,
    #[serde(rename = "Marker", skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescribeDBClusterEndpointsOutput {
    #[serde(
        rename = "DBClusterEndpoints",
        default,
        deserialize_with = "xml::db_cluster_endpoints"
    )]
    pub db_cluster_endpoints: Vec<DBClusterEndpoint>,
    #[serde(rename = "Marker", skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
}

// Response envelopes. The root element itself is not named here.

#[derive(Deserialize)]
struct DescribeDBInstancesResponse {
    #[serde(rename = "DescribeDBInstancesResult")]
    result: DescribeDBInstancesOutput,
}

#[derive(Deserialize)]
struct DescribeDBClusterEndpointsResponse {
    #[serde(rename = "DescribeDBClusterEndpointsResult")]
    result: DescribeDBClusterEndpointsOutput,
}

// ── Gateway ─────────────────────────────────────────────────────────────

/// The RDS calls the endpoint lookups depend on.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait RdsApi: Send + Sync {
    /// One unfiltered `DescribeDBInstances` page.
    async fn describe_db_instances(&self) -> AwsResult<DescribeDBInstancesOutput>;

    async fn describe_db_cluster_endpoints(
        &self,
        input: DescribeDBClusterEndpointsInput,
    ) -> AwsResult<DescribeDBClusterEndpointsOutput>;
}

// ── Client ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RdsClient {
    client: AwsClient,
}

impl RdsClient {
    pub fn new(client: AwsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RdsApi for RdsClient {
    async fn describe_db_instances(&self) -> AwsResult<DescribeDBInstancesOutput> {
        let params = client::build_query_params("DescribeDBInstances", API_VERSION);
        let response = self.client.query_request(SERVICE, &params).await?;
        let parsed: DescribeDBInstancesResponse = xml::from_str(&response.body)
            .map_err(|e| AwsError::unparseable(SERVICE, response.status, e))?;
        log::debug!(
            "DescribeDBInstances returned {} instance(s)",
            parsed.result.db_instances.len()
        );
        Ok(parsed.result)
    }

    async fn describe_db_cluster_endpoints(
        &self,
        input: DescribeDBClusterEndpointsInput,
    ) -> AwsResult<DescribeDBClusterEndpointsOutput> {
        let mut params = client::build_query_params("DescribeDBClusterEndpoints", API_VERSION);
        if let Some(id) = input.db_cluster_identifier {
            params.insert("DBClusterIdentifier".into(), id);
        }
        add_filters(&mut params, &input.filters);

        let response = self.client.query_request(SERVICE, &params).await?;
        let parsed: DescribeDBClusterEndpointsResponse = xml::from_str(&response.body)
            .map_err(|e| AwsError::unparseable(SERVICE, response.status, e))?;
        log::debug!(
            "DescribeDBClusterEndpoints returned {} endpoint(s)",
            parsed.result.db_cluster_endpoints.len()
        );
        Ok(parsed.result)
    }
}

/// RDS nests filter values one level deeper than EC2 does.
fn add_filters(params: &mut std::collections::BTreeMap<String, String>, filters: &[Filter]) {
    for (i, filter) in filters.iter().enumerate() {
        let n = i + 1;
        params.insert(format!("Filters.Filter.{}.Name", n), filter.name.clone());
        for (j, value) in filter.values.iter().enumerate() {
            params.insert(format!("Filters.Filter.{}.Values.Value.{}", n, j + 1), value.clone());
        }
    }
}

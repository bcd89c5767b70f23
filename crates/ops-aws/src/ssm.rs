//! AWS SSM Parameter Store lookups.
//!
//! SSM uses the JSON 1.1 protocol with target prefix `AmazonSSM`. Both calls
//! request a single page of at most [`MAX_RESULTS`] items; `NextToken` is
//! returned to the caller but never followed.
//!
//! Reference: <https://docs.aws.amazon.com/systems-manager/latest/APIReference/>

use crate::client::AwsClient;
use crate::config::SdkConfig;
use crate::error::{AwsError, AwsResult, OpsError, OpsResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const SERVICE: &str = "ssm";

/// Page size for every Parameter Store request.
pub const MAX_RESULTS: i32 = 10;

// ── Types ───────────────────────────────────────────────────────────────

/// `{"Key": "Name", "Option": "BeginsWith", "Values": ["/app/"]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterStringFilter {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Option", skip_serializing_if = "Option::is_none")]
    pub option: Option<String>,
    #[serde(rename = "Values", default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl ParameterStringFilter {
    pub fn new(key: &str, values: Vec<String>) -> Self {
        Self {
            key: key.to_string(),
            option: None,
            values,
        }
    }

    pub fn with_option(mut self, option: &str) -> Self {
        self.option = Some(option.to_string());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Type", skip_serializing_if = "Option::is_none")]
    pub parameter_type: Option<String>,
    #[serde(rename = "Value", skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(rename = "Version", skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(rename = "Selector", skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(rename = "SourceResult", skip_serializing_if = "Option::is_none")]
    pub source_result: Option<String>,
    /// Seconds since the epoch, as SSM sends it.
    #[serde(rename = "LastModifiedDate", skip_serializing_if = "Option::is_none")]
    pub last_modified_date: Option<f64>,
    #[serde(rename = "ARN", skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    #[serde(rename = "DataType", skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterMetadata {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "ARN", skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    #[serde(rename = "Type", skip_serializing_if = "Option::is_none")]
    pub parameter_type: Option<String>,
    #[serde(rename = "KeyId", skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(rename = "LastModifiedDate", skip_serializing_if = "Option::is_none")]
    pub last_modified_date: Option<f64>,
    #[serde(rename = "LastModifiedUser", skip_serializing_if = "Option::is_none")]
    pub last_modified_user: Option<String>,
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Version", skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(rename = "Tier", skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(rename = "DataType", skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DescribeParametersInput {
    #[serde(rename = "ParameterFilters", skip_serializing_if = "Vec::is_empty")]
    pub parameter_filters: Vec<ParameterStringFilter>,
    #[serde(rename = "MaxResults", skip_serializing_if = "Option::is_none")]
    pub max_results: Option<i32>,
    #[serde(rename = "NextToken", skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescribeParametersOutput {
    #[serde(rename = "Parameters", default)]
    pub parameters: Vec<ParameterMetadata>,
    #[serde(rename = "NextToken", skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GetParametersByPathInput {
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "Recursive", skip_serializing_if = "Option::is_none")]
    pub recursive: Option<bool>,
    #[serde(rename = "WithDecryption", skip_serializing_if = "Option::is_none")]
    pub with_decryption: Option<bool>,
    #[serde(rename = "ParameterFilters", skip_serializing_if = "Vec::is_empty")]
    pub parameter_filters: Vec<ParameterStringFilter>,
    #[serde(rename = "MaxResults", skip_serializing_if = "Option::is_none")]
    pub max_results: Option<i32>,
    #[serde(rename = "NextToken", skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetParametersByPathOutput {
    #[serde(rename = "Parameters", default)]
    pub parameters: Vec<Parameter>,
    #[serde(rename = "NextToken", skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

// ── Gateway ─────────────────────────────────────────────────────────────

#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait SsmApi: Send + Sync {
    async fn describe_parameters(
        &self,
        input: DescribeParametersInput,
    ) -> AwsResult<DescribeParametersOutput>;

    async fn get_parameters_by_path(
        &self,
        input: GetParametersByPathInput,
    ) -> AwsResult<GetParametersByPathOutput>;
}

#[derive(Debug, Clone)]
pub struct SsmClient {
    client: AwsClient,
}

impl SsmClient {
    pub fn new(client: AwsClient) -> Self {
        Self { client }
    }

    async fn call<I: Serialize + Sync, O: serde::de::DeserializeOwned>(
        &self,
        target: &str,
        input: &I,
    ) -> AwsResult<O> {
        let body = serde_json::to_string(input)
            .map_err(|e| AwsError::new(SERVICE, "SerializationError", &e.to_string(), 0))?;
        let response = self.client.json_request(SERVICE, target, &body).await?;
        serde_json::from_str(&response.body)
            .map_err(|e| AwsError::unparseable(SERVICE, response.status, e))
    }
}

#[async_trait]
impl SsmApi for SsmClient {
    async fn describe_parameters(
        &self,
        input: DescribeParametersInput,
    ) -> AwsResult<DescribeParametersOutput> {
        self.call("AmazonSSM.DescribeParameters", &input).await
    }

    async fn get_parameters_by_path(
        &self,
        input: GetParametersByPathInput,
    ) -> AwsResult<GetParametersByPathOutput> {
        self.call("AmazonSSM.GetParametersByPath", &input).await
    }
}

// ── Parameter store ─────────────────────────────────────────────────────

/// Parameter Store queries returning JSON bytes.
///
/// Filters added with [`with_parameter_filter`](Self::with_parameter_filter)
/// apply to every later [`describe_parameters`](Self::describe_parameters)
/// call on this value.
#[derive(Debug, Clone)]
pub struct ParameterStore<A: SsmApi = SsmClient> {
    api: A,
    filters: Vec<ParameterStringFilter>,
}

impl<A: SsmApi> ParameterStore<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            filters: Vec::new(),
        }
    }

    pub fn with_parameter_filter(mut self, key: &str, values: Vec<String>) -> Self {
        self.filters.push(ParameterStringFilter::new(key, values));
        self
    }

    pub fn filters(&self) -> &[ParameterStringFilter] {
        &self.filters
    }

    /// Describe parameters matching the bound filters.
    pub async fn describe_parameters(&self) -> OpsResult<Vec<u8>> {
        self.describe_parameters_with(self.filters.clone()).await
    }

    /// Describe parameters matching `filters`, ignoring the bound ones.
    pub async fn describe_parameters_with(
        &self,
        filters: Vec<ParameterStringFilter>,
    ) -> OpsResult<Vec<u8>> {
        let output = self
            .api
            .describe_parameters(DescribeParametersInput {
                parameter_filters: filters,
                max_results: Some(MAX_RESULTS),
                next_token: None,
            })
            .await
            .map_err(OpsError::remote("describe parameters"))?;

        log::debug!("described {} parameter(s)", output.parameters.len());
        Ok(serde_json::to_vec(&output)?)
    }

    /// Every parameter below `path` (recursively), or
    /// [`OpsError::NoResults`] when there are none.
    pub async fn get_parameter_by_path(&self, path: &str) -> OpsResult<Vec<u8>> {
        let output = self
            .api
            .get_parameters_by_path(GetParametersByPathInput {
                path: path.to_string(),
                recursive: Some(true),
                max_results: Some(MAX_RESULTS),
                ..Default::default()
            })
            .await
            .map_err(OpsError::remote("get parameters by path"))?;

        if output.parameters.is_empty() {
            return Err(OpsError::NoResults {
                path: path.to_string(),
            });
        }
        log::debug!("found {} parameter(s) under {}", output.parameters.len(), path);
        Ok(serde_json::to_vec(&output)?)
    }
}

impl ParameterStore<SsmClient> {
    pub fn from_config(config: &SdkConfig) -> OpsResult<Self> {
        let client = AwsClient::new(config).map_err(OpsError::Http)?;
        Ok(Self::new(SsmClient::new(client)))
    }

    pub fn from_env() -> OpsResult<Self> {
        Self::from_config(&SdkConfig::from_env()?)
    }
}

#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait ParameterLookup: Send + Sync {
    async fn describe_parameters_with(
        &self,
        filters: Vec<ParameterStringFilter>,
    ) -> OpsResult<Vec<u8>>;

    async fn get_parameter_by_path(&self, path: String) -> OpsResult<Vec<u8>>;
}

#[async_trait]
impl<A: SsmApi> ParameterLookup for ParameterStore<A> {
    async fn describe_parameters_with(
        &self,
        filters: Vec<ParameterStringFilter>,
    ) -> OpsResult<Vec<u8>> {
        ParameterStore::describe_parameters_with(self, filters).await
    }

    async fn get_parameter_by_path(&self, path: String) -> OpsResult<Vec<u8>> {
        ParameterStore::get_parameter_by_path(self, &path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parameter(name: &str, value: &str) -> Parameter {
        Parameter {
            name: name.to_string(),
            parameter_type: Some("String".into()),
            value: Some(value.to_string()),
            version: Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn describe_input_wire_shape() {
        let input = DescribeParametersInput {
            parameter_filters: vec![ParameterStringFilter::new("Name", vec!["/app/".into()])
                .with_option("BeginsWith")],
            max_results: Some(MAX_RESULTS),
            next_token: None,
        };
        assert_eq!(
            serde_json::to_string(&input).unwrap(),
            r#"{"ParameterFilters":[{"Key":"Name","Option":"BeginsWith","Values":["/app/"]}],"MaxResults":10}"#
        );
    }

    #[test]
    fn by_path_input_wire_shape() {
        let input = GetParametersByPathInput {
            path: "/app/db".into(),
            recursive: Some(true),
            max_results: Some(MAX_RESULTS),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_string(&input).unwrap(),
            r#"{"Path":"/app/db","Recursive":true,"MaxResults":10}"#
        );
    }

    #[test]
    fn builder_accumulates_filters() {
        let store = ParameterStore::new(MockSsmApi::new())
            .with_parameter_filter("Type", vec!["SecureString".into()])
            .with_parameter_filter("Path", vec!["/app".into(), "/shared".into()]);
        assert_eq!(
            store.filters(),
            [
                ParameterStringFilter::new("Type", vec!["SecureString".into()]),
                ParameterStringFilter::new("Path", vec!["/app".into(), "/shared".into()]),
            ]
        );
    }

    #[tokio::test]
    async fn describe_parameters_sends_bound_filters() {
        let mut api = MockSsmApi::new();
        api.expect_describe_parameters()
            .withf(|input| {
                input.max_results == Some(10)
                    && input.next_token.is_none()
                    && input.parameter_filters
                        == [ParameterStringFilter::new("Type", vec!["SecureString".into()])]
            })
            .times(1)
            .returning(|_| {
                Ok(DescribeParametersOutput {
                    parameters: vec![ParameterMetadata {
                        name: "/app/db/password".into(),
                        parameter_type: Some("SecureString".into()),
                        ..Default::default()
                    }],
                    next_token: Some("more".into()),
                })
            });

        let bytes = ParameterStore::new(api)
            .with_parameter_filter("Type", vec!["SecureString".into()])
            .describe_parameters()
            .await
            .unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"Parameters":[{"Name":"/app/db/password","Type":"SecureString"}],"NextToken":"more"}"#
        );
    }

    #[tokio::test]
    async fn describe_parameters_failure() {
        let mut api = MockSsmApi::new();
        api.expect_describe_parameters()
            .returning(|_| Err(AwsError::new("ssm", "AccessDeniedException", "denied", 400)));

        let err = ParameterStore::new(api).describe_parameters().await.unwrap_err();
        assert!(err.to_string().starts_with("unable to describe parameters, "));
    }

    #[tokio::test]
    async fn get_parameter_by_path_is_recursive() {
        let mut api = MockSsmApi::new();
        api.expect_get_parameters_by_path()
            .withf(|input| {
                input.path == "/app/db"
                    && input.recursive == Some(true)
                    && input.max_results == Some(10)
            })
            .times(1)
            .returning(|_| {
                Ok(GetParametersByPathOutput {
                    parameters: vec![
                        parameter("/app/db/host", "db.internal"),
                        parameter("/app/db/port", "5432"),
                    ],
                    next_token: None,
                })
            });

        let bytes = ParameterStore::new(api)
            .get_parameter_by_path("/app/db")
            .await
            .unwrap();
        let out: GetParametersByPathOutput = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(out.parameters.len(), 2);
        assert_eq!(out.parameters[1].value.as_deref(), Some("5432"));
    }

    #[tokio::test]
    async fn empty_path_is_no_results() {
        let mut api = MockSsmApi::new();
        api.expect_get_parameters_by_path()
            .returning(|_| Ok(GetParametersByPathOutput::default()));

        let err = ParameterStore::new(api)
            .get_parameter_by_path("/nothing/here")
            .await
            .unwrap_err();
        assert!(matches!(err, OpsError::NoResults { ref path } if path == "/nothing/here"));
        assert_eq!(err.to_string(), "no results found for path, /nothing/here");
    }

    #[tokio::test]
    async fn get_parameter_by_path_failure() {
        let mut api = MockSsmApi::new();
        api.expect_get_parameters_by_path()
            .returning(|_| Err(AwsError::new("ssm", "InvalidFilterKey", "bad", 400)));

        let err = ParameterStore::new(api)
            .get_parameter_by_path("/app")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OpsError::RemoteQueryFailed { operation: "get parameters by path", .. }
        ));
    }
}

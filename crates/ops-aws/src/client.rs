//! Signed HTTP transport shared by the service clients.
//!
//! Two wire styles are supported: the Query protocol (form-encoded POST,
//! XML response) used by RDS, and the JSON 1.1 protocol (`x-amz-target`
//! header, JSON body and response) used by KMS and SSM. Each call is a
//! single attempt; a non-2xx response becomes an [`AwsError`].

use crate::config::{AwsCredentials, AwsRegion, SdkConfig};
use crate::error::{AwsError, AwsResult};
use crate::signing::{form_encode, RequestSigner};
use chrono::Utc;
use reqwest::Client;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

const USER_AGENT: &str = concat!("ops-aws/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct AwsClient {
    http: Client,
    credentials: AwsCredentials,
    region: AwsRegion,
    endpoint_override: Option<String>,
    user_agent: String,
}

#[derive(Debug, Clone)]
pub struct AwsResponse {
    pub status: u16,
    pub body: String,
    pub request_id: Option<String>,
}

impl AwsClient {
    pub fn new(config: &SdkConfig) -> AwsResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_max_idle_per_host(10)
            .build()?;

        let user_agent = match config.app_name {
            Some(ref app) => format!("{} {}", USER_AGENT, app),
            None => USER_AGENT.to_string(),
        };

        Ok(Self {
            http,
            credentials: config.credentials.clone(),
            region: config.region.clone(),
            endpoint_override: config.endpoint_url.clone(),
            user_agent,
        })
    }

    /// Base URL for `service`, honouring the endpoint override.
    pub fn endpoint(&self, service: &str) -> String {
        match self.endpoint_override {
            Some(ref url) => url.clone(),
            None => self.region.endpoint(service),
        }
    }

    pub fn region_name(&self) -> &str {
        &self.region.name
    }

    /// Query protocol call. `params` must already hold `Action` and `Version`.
    pub async fn query_request(
        &self,
        service: &str,
        params: &BTreeMap<String, String>,
    ) -> AwsResult<AwsResponse> {
        let action = params.get("Action").map(String::as_str).unwrap_or("");
        let mut headers = BTreeMap::new();
        headers.insert(
            "content-type".to_string(),
            "application/x-www-form-urlencoded; charset=utf-8".to_string(),
        );
        self.send(service, action, headers, form_encode(params)).await
    }

    /// JSON 1.1 protocol call, e.g. `target = "TrentService.Decrypt"`.
    pub async fn json_request(
        &self,
        service: &str,
        target: &str,
        json_body: &str,
    ) -> AwsResult<AwsResponse> {
        let mut headers = BTreeMap::new();
        headers.insert(
            "content-type".to_string(),
            "application/x-amz-json-1.1".to_string(),
        );
        headers.insert("x-amz-target".to_string(), target.to_string());
        self.send(service, target, headers, json_body.to_string())
            .await
    }

    async fn send(
        &self,
        service: &str,
        action: &str,
        mut headers: BTreeMap<String, String>,
        body: String,
    ) -> AwsResult<AwsResponse> {
        let endpoint = self.endpoint(service);
        let url = Url::parse(&endpoint).map_err(|e| {
            AwsError::new(service, "InvalidEndpoint", &format!("{}: {}", endpoint, e), 0)
        })?;
        headers.insert("host".to_string(), host_header(&url));

        RequestSigner::new(self.credentials.clone(), &self.region.name, service).sign(
            "POST",
            &url,
            &mut headers,
            body.as_bytes(),
            Utc::now(),
        );

        log::debug!("POST {} {} ({} bytes)", url, action, body.len());

        let mut req = self.http.post(url).header("user-agent", &self.user_agent);
        for (key, value) in &headers {
            req = req.header(key.as_str(), value.as_str());
        }
        let resp = req
            .body(body)
            .send()
            .await
            .map_err(|e| AwsError::from(e).with_action(action))?;

        let status = resp.status().as_u16();
        let request_id = ["x-amzn-requestid", "x-amz-request-id"]
            .iter()
            .find_map(|name| resp.headers().get(*name)?.to_str().ok())
            .map(str::to_string);
        let resp_body = resp
            .text()
            .await
            .map_err(|e| AwsError::from(e).with_action(action))?;

        log::trace!("{} {} -> HTTP {}", service, action, status);

        if !(200..300).contains(&status) {
            let mut err = AwsError::from_response(service, status, &resp_body).with_action(action);
            if err.request_id.is_none() {
                err.request_id = request_id;
            }
            return Err(err);
        }

        Ok(AwsResponse {
            status,
            body: resp_body,
            request_id,
        })
    }
}

/// `host[:port]`, omitting the scheme's default port.
fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or("amazonaws.com");
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

/// Start a Query protocol parameter set.
pub fn build_query_params(action: &str, version: &str) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    params.insert("Action".to_string(), action.to_string());
    params.insert("Version".to_string(), version.to_string());
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SdkConfig {
        SdkConfig::new(
            AwsRegion::new("eu-central-1"),
            AwsCredentials::new("AKIDEXAMPLE", "secret", None),
        )
    }

    #[test]
    fn regional_endpoint() {
        let client = AwsClient::new(&config()).unwrap();
        assert_eq!(client.endpoint("ssm"), "https://ssm.eu-central-1.amazonaws.com");
        assert_eq!(client.region_name(), "eu-central-1");
    }

    #[test]
    fn endpoint_override_applies_to_every_service() {
        let client = AwsClient::new(&config().with_endpoint_url("http://localhost:4566")).unwrap();
        assert_eq!(client.endpoint("rds"), "http://localhost:4566");
        assert_eq!(client.endpoint("kms"), "http://localhost:4566");
    }

    #[test]
    fn host_header_keeps_non_default_port() {
        let url = Url::parse("http://127.0.0.1:4566").unwrap();
        assert_eq!(host_header(&url), "127.0.0.1:4566");
        let url = Url::parse("https://rds.us-east-1.amazonaws.com").unwrap();
        assert_eq!(host_header(&url), "rds.us-east-1.amazonaws.com");
    }

    #[test]
    fn query_params_carry_action_and_version() {
        let params = build_query_params("DescribeDBInstances", "2014-10-31");
        assert_eq!(params["Action"], "DescribeDBInstances");
        assert_eq!(params["Version"], "2014-10-31");
        assert_eq!(params.len(), 2);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_http_error() {
        // Port 9 (discard) on localhost is not expected to accept connections.
        let client = AwsClient::new(&config().with_endpoint_url("http://127.0.0.1:9")).unwrap();
        let err = client
            .json_request("kms", "TrentService.Decrypt", "{}")
            .await
            .unwrap_err();
        assert_eq!(err.service, "http");
        assert_eq!(err.status_code, 0);
        assert_eq!(err.action.as_deref(), Some("TrentService.Decrypt"));
    }
}

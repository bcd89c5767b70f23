//! Region, credential and client configuration.
//!
//! Resolution follows the AWS CLI conventions for the two providers this
//! crate supports: environment variables first, then the shared credentials
//! file. Nothing here panics; a missing or malformed source surfaces as an
//! [`OpsError`].

use crate::error::{OpsError, OpsResult};
use std::fmt;
use std::path::{Path, PathBuf};

/// Region used when neither `AWS_REGION` nor `AWS_DEFAULT_REGION` is set.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Profile used when `AWS_PROFILE` is not set.
pub const DEFAULT_PROFILE: &str = "default";

// ── Regions ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsRegion {
    pub name: String,
}

impl AwsRegion {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    /// Regional endpoint for a service, `https://{service}.{region}.amazonaws.com`.
    pub fn endpoint(&self, service: &str) -> String {
        if self.name.starts_with("cn-") {
            format!("https://{}.{}.amazonaws.com.cn", service, self.name)
        } else {
            format!("https://{}.{}.amazonaws.com", service, self.name)
        }
    }
}

impl Default for AwsRegion {
    fn default() -> Self {
        Self::new(DEFAULT_REGION)
    }
}

// ── Credentials ─────────────────────────────────────────────────────────

#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    /// Where these came from ("environment", "profile:<name>", "static").
    pub provider_name: String,
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &self.session_token.as_ref().map(|_| "** redacted **"))
            .field("provider_name", &self.provider_name)
            .finish()
    }
}

impl AwsCredentials {
    pub fn new(access_key_id: &str, secret_access_key: &str, session_token: Option<&str>) -> Self {
        Self {
            access_key_id: access_key_id.to_string(),
            secret_access_key: secret_access_key.to_string(),
            session_token: session_token.map(str::to_string),
            provider_name: "static".to_string(),
        }
    }

    /// `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN`.
    /// Returns `None` unless both keys are present and non-empty.
    pub fn from_env_vars(env: &dyn Fn(&str) -> Option<String>) -> Option<Self> {
        let access_key = env("AWS_ACCESS_KEY_ID").filter(|v| !v.is_empty())?;
        let secret_key = env("AWS_SECRET_ACCESS_KEY").filter(|v| !v.is_empty())?;
        Some(Self {
            access_key_id: access_key,
            secret_access_key: secret_key,
            session_token: env("AWS_SESSION_TOKEN").filter(|v| !v.is_empty()),
            provider_name: "environment".to_string(),
        })
    }

    /// Read one profile out of an AWS shared credentials file.
    pub fn from_profile_file(path: &Path, profile: &str) -> OpsResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            OpsError::Credentials(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_profile_str(&contents, profile).ok_or_else(|| {
            OpsError::Credentials(format!(
                "profile '{}' in {} has no aws_access_key_id/aws_secret_access_key",
                profile,
                path.display()
            ))
        })
    }

    fn from_profile_str(contents: &str, profile: &str) -> Option<Self> {
        let mut in_section = false;
        let mut access_key = None;
        let mut secret_key = None;
        let mut token = None;

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                in_section = section.trim() == profile;
                continue;
            }
            if !in_section {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let value = value.trim().to_string();
                match key.trim() {
                    "aws_access_key_id" => access_key = Some(value),
                    "aws_secret_access_key" => secret_key = Some(value),
                    "aws_session_token" => token = Some(value),
                    _ => {}
                }
            }
        }

        Some(Self {
            access_key_id: access_key.filter(|v| !v.is_empty())?,
            secret_access_key: secret_key.filter(|v| !v.is_empty())?,
            session_token: token.filter(|v| !v.is_empty()),
            provider_name: format!("profile:{}", profile),
        })
    }
}

// ── SDK Config ──────────────────────────────────────────────────────────

/// Everything needed to build an [`AwsClient`](crate::client::AwsClient).
#[derive(Debug, Clone)]
pub struct SdkConfig {
    pub region: AwsRegion,
    pub credentials: AwsCredentials,
    /// Overrides every service endpoint (LocalStack, VPC endpoints).
    pub endpoint_url: Option<String>,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Appended to the User-Agent header.
    pub app_name: Option<String>,
}

impl SdkConfig {
    pub fn new(region: AwsRegion, credentials: AwsCredentials) -> Self {
        Self {
            region,
            credentials,
            endpoint_url: None,
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            app_name: None,
        }
    }

    pub fn with_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }

    /// Resolve from the process environment and the shared credentials file.
    pub fn from_env() -> OpsResult<Self> {
        Self::resolve(&|key| std::env::var(key).ok())
    }

    /// Resolve using `env` as the variable source.
    pub fn resolve(env: &dyn Fn(&str) -> Option<String>) -> OpsResult<Self> {
        let region = env("AWS_REGION")
            .filter(|r| !r.is_empty())
            .or_else(|| env("AWS_DEFAULT_REGION").filter(|r| !r.is_empty()))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let credentials = match AwsCredentials::from_env_vars(env) {
            Some(creds) => creds,
            None => {
                let profile = env("AWS_PROFILE")
                    .filter(|p| !p.is_empty())
                    .unwrap_or_else(|| DEFAULT_PROFILE.to_string());
                let path = shared_credentials_path(env).ok_or_else(|| {
                    OpsError::Credentials(
                        "no credentials in the environment and no home directory to look for ~/.aws/credentials"
                            .to_string(),
                    )
                })?;
                AwsCredentials::from_profile_file(&path, &profile)?
            }
        };
        log::debug!(
            "resolved aws credentials from {} for region {}",
            credentials.provider_name,
            region
        );

        let mut config = Self::new(AwsRegion::new(&region), credentials);
        if let Some(url) = env("AWS_ENDPOINT_URL").filter(|u| !u.is_empty()) {
            url::Url::parse(&url)
                .map_err(|e| OpsError::Config(format!("AWS_ENDPOINT_URL '{}': {}", url, e)))?;
            config.endpoint_url = Some(url);
        }
        Ok(config)
    }
}

fn shared_credentials_path(env: &dyn Fn(&str) -> Option<String>) -> Option<PathBuf> {
    if let Some(path) = env("AWS_SHARED_CREDENTIALS_FILE").filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".aws").join("credentials"))
}

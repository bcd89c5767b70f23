//! Error types.
//!
//! Two layers: [`AwsError`] describes what went wrong on the wire (a service
//! fault, an HTTP failure, an unreadable body) and [`OpsError`] describes
//! which wrapper operation failed because of it.

use serde::Deserialize;
use std::fmt;

/// A failure reported by an AWS service or by the HTTP layer underneath it.
#[derive(Debug, Clone, PartialEq)]
pub struct AwsError {
    /// Service signing name ("rds", "kms", "ssm", or "http" for transport errors).
    pub service: String,
    /// AWS error code, e.g. `DBClusterNotFoundFault` or `AccessDeniedException`.
    pub code: String,
    pub message: String,
    /// HTTP status; 0 when no response was received.
    pub status_code: u16,
    pub request_id: Option<String>,
    /// The API action being invoked, when known.
    pub action: Option<String>,
}

impl fmt::Display for AwsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.status_code == 0 {
            write!(f, "{}: {}", self.service, self.message)?;
        } else {
            write!(
                f,
                "{} returned {} (HTTP {}): {}",
                self.service, self.code, self.status_code, self.message
            )?;
        }
        if let Some(ref id) = self.request_id {
            write!(f, " [request id {}]", id)?;
        }
        Ok(())
    }
}

impl std::error::Error for AwsError {}

#[derive(Deserialize)]
struct XmlErrorResponse {
    #[serde(rename = "Error")]
    error: XmlErrorDetail,
    #[serde(rename = "RequestId")]
    request_id: Option<String>,
}

#[derive(Deserialize)]
struct XmlErrorDetail {
    #[serde(rename = "Code")]
    code: Option<String>,
    #[serde(rename = "Message")]
    message: Option<String>,
}

impl AwsError {
    pub fn new(service: &str, code: &str, message: &str, status_code: u16) -> Self {
        Self {
            service: service.to_string(),
            code: code.to_string(),
            message: message.to_string(),
            status_code,
            request_id: None,
            action: None,
        }
    }

    /// A response that arrived with a success status but could not be decoded.
    pub fn unparseable(service: &str, status_code: u16, cause: impl fmt::Display) -> Self {
        Self::new(
            service,
            "ParseError",
            &format!("unable to parse response body: {}", cause),
            status_code,
        )
    }

    pub fn with_request_id(mut self, id: String) -> Self {
        self.request_id = Some(id);
        self
    }

    pub fn with_action(mut self, action: &str) -> Self {
        self.action = Some(action.to_string());
        self
    }

    /// Decode an error body, picking the XML (Query protocol) or JSON
    /// (JSON 1.1 protocol) shape by its first non-blank byte.
    pub fn from_response(service: &str, status_code: u16, body: &str) -> Self {
        if body.trim_start().starts_with('<') {
            Self::parse_xml_error(service, status_code, body)
        } else {
            Self::parse_json_error(service, status_code, body)
        }
    }

    /// ```xml
    /// <ErrorResponse>
    ///   <Error><Type>Sender</Type><Code>DBClusterNotFoundFault</Code><Message>…</Message></Error>
    ///   <RequestId>…</RequestId>
    /// </ErrorResponse>
    /// ```
    pub fn parse_xml_error(service: &str, status_code: u16, body: &str) -> Self {
        match quick_xml::de::from_str::<XmlErrorResponse>(body) {
            Ok(parsed) => {
                let code = parsed.error.code.unwrap_or_else(|| "UnknownError".to_string());
                let message = parsed
                    .error
                    .message
                    .unwrap_or_else(|| format!("HTTP {} from {}", status_code, service));
                let err = Self::new(service, &code, &message, status_code);
                match parsed.request_id {
                    Some(id) => err.with_request_id(id),
                    None => err,
                }
            }
            Err(_) => Self::new(service, "UnknownError", &truncate(body), status_code),
        }
    }

    /// ```json
    /// {"__type": "com.amazonaws.kms#NotFoundException", "message": "…"}
    /// ```
    pub fn parse_json_error(service: &str, status_code: u16, body: &str) -> Self {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
            return Self::new(service, "UnknownError", &truncate(body), status_code);
        };
        let code = value
            .get("__type")
            .or_else(|| value.get("code"))
            .and_then(|v| v.as_str())
            .map(|s| s.rsplit('#').next().unwrap_or(s).to_string())
            .unwrap_or_else(|| "UnknownError".to_string());
        let message = value
            .get("message")
            .or_else(|| value.get("Message"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {} from {}", status_code, service));
        Self::new(service, &code, &message, status_code)
    }
}

fn truncate(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty error response".to_string();
    }
    trimmed.chars().take(200).collect()
}

impl From<reqwest::Error> for AwsError {
    fn from(err: reqwest::Error) -> Self {
        Self {
            service: "http".to_string(),
            code: if err.is_timeout() { "Timeout" } else { "HttpError" }.to_string(),
            message: err.to_string(),
            status_code: err.status().map(|s| s.as_u16()).unwrap_or(0),
            request_id: None,
            action: None,
        }
    }
}

pub type AwsResult<T> = Result<T, AwsError>;

/// Failure of a wrapper operation. Every variant is terminal; no partial
/// result ever accompanies one.
#[derive(Debug, thiserror::Error)]
pub enum OpsError {
    /// A gateway call failed. `operation` names the step, e.g. "list instances".
    #[error("unable to {operation}, {source}")]
    RemoteQueryFailed {
        operation: &'static str,
        source: AwsError,
    },

    #[error("error marshalling json, {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("no results found for path, {path}")]
    NoResults { path: String },

    #[error("issue decoding, {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("invalid endpoint type '{0}', expected 'writer' or 'reader'")]
    InvalidEndpointType(String),

    #[error("unable to resolve credentials, {0}")]
    Credentials(String),

    #[error("invalid configuration, {0}")]
    Config(String),

    #[error("unable to build http client, {0}")]
    Http(AwsError),
}

impl OpsError {
    pub(crate) fn remote(operation: &'static str) -> impl FnOnce(AwsError) -> Self {
        move |source| {
            log::warn!("unable to {}: {}", operation, source);
            Self::RemoteQueryFailed { operation, source }
        }
    }
}

pub type OpsResult<T> = Result<T, OpsError>;

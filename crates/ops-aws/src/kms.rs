//! AWS KMS decryption.
//!
//! KMS uses the JSON 1.1 protocol with target prefix `TrentService`. Binary
//! members (`CiphertextBlob`, `Plaintext`) travel base64-encoded.

use crate::client::AwsClient;
use crate::config::SdkConfig;
use crate::error::{AwsError, AwsResult, OpsError, OpsResult};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const SERVICE: &str = "kms";

// ── Types ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecryptInput {
    #[serde(rename = "CiphertextBlob", with = "blob")]
    pub ciphertext_blob: Vec<u8>,
    #[serde(rename = "KeyId", skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(rename = "EncryptionContext", skip_serializing_if = "BTreeMap::is_empty")]
    pub encryption_context: BTreeMap<String, String>,
    #[serde(rename = "EncryptionAlgorithm", skip_serializing_if = "Option::is_none")]
    pub encryption_algorithm: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DecryptOutput {
    #[serde(rename = "KeyId")]
    pub key_id: Option<String>,
    #[serde(rename = "Plaintext", with = "blob", default)]
    pub plaintext: Vec<u8>,
    #[serde(rename = "EncryptionAlgorithm")]
    pub encryption_algorithm: Option<String>,
}

/// Standard-alphabet base64 for blob members.
mod blob {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

// ── Gateway ─────────────────────────────────────────────────────────────

#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait KmsApi: Send + Sync {
    async fn decrypt(&self, input: DecryptInput) -> AwsResult<DecryptOutput>;
}

#[derive(Debug, Clone)]
pub struct KmsClient {
    client: AwsClient,
}

impl KmsClient {
    pub fn new(client: AwsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KmsApi for KmsClient {
    async fn decrypt(&self, input: DecryptInput) -> AwsResult<DecryptOutput> {
        let body = serde_json::to_string(&input)
            .map_err(|e| AwsError::new(SERVICE, "SerializationError", &e.to_string(), 0))?;
        let response = self
            .client
            .json_request(SERVICE, "TrentService.Decrypt", &body)
            .await?;
        serde_json::from_str(&response.body)
            .map_err(|e| AwsError::unparseable(SERVICE, response.status, e))
    }
}

// ── Decrypter ───────────────────────────────────────────────────────────

/// Turns base64 ciphertext (as produced by `aws kms encrypt`) into plaintext.
#[derive(Debug, Clone)]
pub struct KmsDecrypter<A: KmsApi = KmsClient> {
    api: A,
}

impl<A: KmsApi> KmsDecrypter<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// Decode `data` and decrypt it. Malformed base64 fails before any
    /// request is made.
    pub async fn decode_data(&self, data: &str) -> OpsResult<Vec<u8>> {
        let blob = STANDARD.decode(data.trim()).map_err(|e| {
            log::error!("issue decoding, {}", e);
            OpsError::Decode(e)
        })?;

        let output = self
            .api
            .decrypt(DecryptInput {
                ciphertext_blob: blob,
                ..Default::default()
            })
            .await
            .map_err(OpsError::remote("decrypt blob"))?;

        if let Some(ref key) = output.key_id {
            log::debug!("decrypted {} byte(s) with {}", output.plaintext.len(), key);
        }
        Ok(output.plaintext)
    }
}

impl KmsDecrypter<KmsClient> {
    pub fn from_config(config: &SdkConfig) -> OpsResult<Self> {
        let client = AwsClient::new(config).map_err(OpsError::Http)?;
        Ok(Self::new(KmsClient::new(client)))
    }

    pub fn from_env() -> OpsResult<Self> {
        Self::from_config(&SdkConfig::from_env()?)
    }
}

#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait Decrypter: Send + Sync {
    async fn decode_data(&self, data: String) -> OpsResult<Vec<u8>>;
}

#[async_trait]
impl<A: KmsApi> Decrypter for KmsDecrypter<A> {
    async fn decode_data(&self, data: String) -> OpsResult<Vec<u8>> {
        KmsDecrypter::decode_data(self, &data).await
    }
}

//! AWS Signature Version 4.
//!
//! <https://docs.aws.amazon.com/IAM/latest/UserGuide/reference_aws-signing.html>
//!
//! [`RequestSigner::sign`] adds `x-amz-date`, `x-amz-security-token` (for
//! temporary credentials) and `authorization` to a header map. Every header
//! present in the map when `sign` is called is signed.

use crate::config::AwsCredentials;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// SHA-256 of the empty string.
pub const EMPTY_PAYLOAD_HASH: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// RFC 3986 unreserved characters stay literal, everything else is escaped.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, Clone)]
pub struct RequestSigner {
    credentials: AwsCredentials,
    region: String,
    service: String,
}

impl RequestSigner {
    pub fn new(credentials: AwsCredentials, region: &str, service: &str) -> Self {
        Self {
            credentials,
            region: region.to_string(),
            service: service.to_string(),
        }
    }

    pub fn sign(
        &self,
        method: &str,
        url: &Url,
        headers: &mut BTreeMap<String, String>,
        body: &[u8],
        at: DateTime<Utc>,
    ) {
        let amz_date = at.format("%Y%m%dT%H%M%SZ").to_string();
        let date = at.format("%Y%m%d").to_string();
        let payload_hash = hex_sha256(body);

        headers.insert("x-amz-date".into(), amz_date.clone());
        if let Some(ref token) = self.credentials.session_token {
            headers.insert("x-amz-security-token".into(), token.clone());
        }

        let (canonical, signed_headers) = canonical_request(method, url, headers, &payload_hash);
        let scope = format!("{}/{}/{}/aws4_request", date, self.region, self.service);
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            scope,
            hex_sha256(canonical.as_bytes())
        );
        let key = signing_key(
            &self.credentials.secret_access_key,
            &date,
            &self.region,
            &self.service,
        );
        let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

        headers.insert(
            "authorization".into(),
            format!(
                "{} Credential={}/{}, SignedHeaders={}, Signature={}",
                ALGORITHM, self.credentials.access_key_id, scope, signed_headers, signature
            ),
        );
    }
}

/// Returns the canonical request and its `SignedHeaders` list.
fn canonical_request(
    method: &str,
    url: &Url,
    headers: &BTreeMap<String, String>,
    payload_hash: &str,
) -> (String, String) {
    let path = match url.path() {
        "" => "/".to_string(),
        p => p.split('/').map(uri_encode).collect::<Vec<_>>().join("/"),
    };

    let mut query: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (uri_encode(&k), uri_encode(&v)))
        .collect();
    query.sort();
    let query = query
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    // Keys are expected lowercase already; normalise anyway so the BTreeMap
    // order matches the canonical order.
    let normalised: BTreeMap<String, String> = headers
        .iter()
        .map(|(k, v)| {
            let value = v.split_whitespace().collect::<Vec<_>>().join(" ");
            (k.to_ascii_lowercase(), value)
        })
        .collect();
    let mut canonical_headers = String::new();
    for (k, v) in &normalised {
        canonical_headers.push_str(k);
        canonical_headers.push(':');
        canonical_headers.push_str(v);
        canonical_headers.push('\n');
    }
    let signed_headers = normalised.keys().cloned().collect::<Vec<_>>().join(";");

    let canonical = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method, path, query, canonical_headers, signed_headers, payload_hash
    );
    (canonical, signed_headers)
}

fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    [region.as_bytes(), service.as_bytes(), &b"aws4_request"[..]]
        .iter()
        .fold(
            hmac_sha256(format!("AWS4{}", secret).as_bytes(), date.as_bytes()),
            |key, part| hmac_sha256(&key, part),
        )
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

pub fn hex_sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
pub fn uri_encode(input: &str) -> String {
    utf8_percent_encode(input, UNRESERVED).to_string()
}

/// `application/x-www-form-urlencoded` body for Query protocol calls.
pub fn form_encode(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", uri_encode(k), uri_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

    fn example_signer() -> RequestSigner {
        RequestSigner::new(
            AwsCredentials::new("AKIDEXAMPLE", SECRET, None),
            "us-east-1",
            "service",
        )
    }

    fn example_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap()
    }

    #[test]
    fn empty_payload_hash() {
        assert_eq!(hex_sha256(b""), EMPTY_PAYLOAD_HASH);
    }

    #[test]
    fn derives_documented_signing_key() {
        let key = signing_key(SECRET, "20150830", "us-east-1", "iam");
        assert_eq!(
            hex::encode(key),
            "c4afb1cc5771d871763a393e44b703571b55cc28424d1a5e86da6ed3c154a4b9"
        );
    }

    // "get-vanilla" from the SigV4 test suite.
    #[test]
    fn get_vanilla_signature() {
        let url = Url::parse("https://example.amazonaws.com/").unwrap();
        let mut headers = BTreeMap::new();
        headers.insert("host".to_string(), "example.amazonaws.com".to_string());

        example_signer().sign("GET", &url, &mut headers, b"", example_time());

        assert_eq!(headers["x-amz-date"], "20150830T123600Z");
        assert_eq!(
            headers["authorization"],
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
             SignedHeaders=host;x-amz-date, \
             Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
    }

    #[test]
    fn canonical_request_sorts_query_and_headers() {
        let url = Url::parse("https://example.amazonaws.com/?Version=1&Action=Describe%20All").unwrap();
        let mut headers = BTreeMap::new();
        headers.insert("x-amz-target".to_string(), "  AmazonSSM.GetParametersByPath ".to_string());
        headers.insert("host".to_string(), "example.amazonaws.com".to_string());

        let (canonical, signed) = canonical_request("POST", &url, &headers, EMPTY_PAYLOAD_HASH);
        let lines: Vec<&str> = canonical.lines().collect();
        assert_eq!(lines[0], "POST");
        assert_eq!(lines[1], "/");
        assert_eq!(lines[2], "Action=Describe%20All&Version=1");
        assert_eq!(lines[3], "host:example.amazonaws.com");
        assert_eq!(lines[4], "x-amz-target:AmazonSSM.GetParametersByPath");
        assert_eq!(signed, "host;x-amz-target");
    }

    #[test]
    fn session_token_is_signed() {
        let signer = RequestSigner::new(
            AwsCredentials::new("ASIAEXAMPLE", SECRET, Some("token-1")),
            "us-east-1",
            "kms",
        );
        let url = Url::parse("https://kms.us-east-1.amazonaws.com/").unwrap();
        let mut headers = BTreeMap::new();
        headers.insert("host".to_string(), "kms.us-east-1.amazonaws.com".to_string());

        signer.sign("POST", &url, &mut headers, b"{}", example_time());

        assert_eq!(headers["x-amz-security-token"], "token-1");
        assert!(headers["authorization"]
            .contains("SignedHeaders=host;x-amz-date;x-amz-security-token,"));
    }

    #[test]
    fn encoding_keeps_unreserved() {
        assert_eq!(uri_encode("abcXYZ019-_.~"), "abcXYZ019-_.~");
        assert_eq!(uri_encode("/app/db name"), "%2Fapp%2Fdb%20name");
        assert_eq!(uri_encode("a+b=c"), "a%2Bb%3Dc");
    }

    #[test]
    fn form_body_is_sorted_and_encoded() {
        let mut params = BTreeMap::new();
        params.insert("Version".to_string(), "2014-10-31".to_string());
        params.insert("Action".to_string(), "DescribeDBInstances".to_string());
        params.insert("Filters.Filter.1.Name".to_string(), "db-cluster-endpoint-type".to_string());
        assert_eq!(
            form_encode(&params),
            "Action=DescribeDBInstances&Filters.Filter.1.Name=db-cluster-endpoint-type&Version=2014-10-31"
        );
    }
}

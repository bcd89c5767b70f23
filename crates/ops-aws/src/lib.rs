//! # ops-aws
//!
//! Thin wrappers over RDS, KMS and SSM Parameter Store that return JSON
//! bytes, on top of a small SigV4-signed HTTP client.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │  AwsServices  (service.rs)                       │
//! │  ├── RdsEndpoints    (database.rs)               │
//! │  ├── KmsDecrypter    (kms.rs)                    │
//! │  └── ParameterStore  (ssm.rs)                    │
//! ├──────────────────────────────────────────────────┤
//! │  RdsApi · KmsApi · SsmApi   (gateway traits)     │
//! │  RdsClient · KmsClient · SsmClient               │
//! ├──────────────────────────────────────────────────┤
//! │  AwsClient  (client.rs)                          │
//! │  ├── query_request  (RDS, XML responses)         │
//! │  └── json_request   (KMS, SSM)                   │
//! ├──────────────────────────────────────────────────┤
//! │  RequestSigner  (signing.rs)                     │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! Each wrapper is generic over its gateway trait, so tests can hand it a
//! mock. With the `mock` feature enabled the generated `Mock*` types are
//! public for use by other crates.

// ── Sub-modules ─────────────────────────────────────────────────────────

pub mod error;
pub mod config;
pub mod signing;
pub mod client;
mod xml;

// Gateways
pub mod rds;
pub mod kms;
pub mod ssm;

// Wrappers
pub mod database;
pub mod service;

// ── Re-exports ──────────────────────────────────────────────────────────

pub use config::{AwsCredentials, AwsRegion, SdkConfig};
pub use database::{EndpointType, Rds, RdsEndpoints};
pub use error::{AwsError, AwsResult, OpsError, OpsResult};
pub use kms::{Decrypter, KmsDecrypter};
pub use service::AwsServices;
pub use ssm::{ParameterLookup, ParameterStore, ParameterStringFilter};

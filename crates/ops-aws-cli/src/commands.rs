//! Subcommand definitions and dispatch.
//!
//! Each subcommand maps onto exactly one library operation and yields the
//! JSON (or plaintext) bytes that operation returns.

use clap::Subcommand;
use ops_aws::{Decrypter, EndpointType, OpsResult, ParameterLookup, ParameterStringFilter, Rds};

#[derive(Debug, Subcommand)]
pub enum Command {
    /// RDS cluster endpoints and instances
    Rds {
        #[command(subcommand)]
        command: RdsCommand,
    },

    /// KMS decryption
    Kms {
        #[command(subcommand)]
        command: KmsCommand,
    },

    /// SSM Parameter Store lookups
    Ssm {
        #[command(subcommand)]
        command: SsmCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum RdsCommand {
    /// Describe the endpoints of one cluster
    Endpoint {
        /// Cluster identifier
        #[arg(long)]
        cluster: String,

        /// Endpoint role: writer or reader
        #[arg(long = "type", default_value = "writer")]
        endpoint_type: EndpointType,
    },

    /// First endpoint of the given role for every listed instance's cluster
    Endpoints {
        /// Endpoint role: writer or reader
        #[arg(long = "type", default_value = "writer")]
        endpoint_type: EndpointType,
    },

    /// Identifier and creation time of every instance
    List,
}

#[derive(Debug, Subcommand)]
pub enum KmsCommand {
    /// Decrypt a base64 ciphertext blob
    Decrypt {
        /// Base64-encoded ciphertext
        #[arg(long)]
        data: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum SsmCommand {
    /// Describe parameters (first page only)
    Describe {
        /// KEY=V1,V2 or KEY:OPTION=V1,V2 (repeatable)
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<ParameterStringFilter>,
    },

    /// All parameters below a path, recursively
    Path {
        /// Hierarchy to search, e.g. /app/db
        #[arg(long)]
        path: String,
    },
}

/// The lookups a command may need.
pub struct Handlers<'a> {
    pub rds: &'a dyn Rds,
    pub kms: &'a dyn Decrypter,
    pub ssm: &'a dyn ParameterLookup,
}

pub async fn execute(command: Command, handlers: &Handlers<'_>) -> OpsResult<Vec<u8>> {
    match command {
        Command::Rds { command } => match command {
            RdsCommand::Endpoint {
                cluster,
                endpoint_type,
            } => handlers.rds.describe_endpoint(cluster, endpoint_type).await,
            RdsCommand::Endpoints { endpoint_type } => {
                handlers.rds.describe_all_endpoints(endpoint_type).await
            }
            RdsCommand::List => handlers.rds.list_db_identifiers().await,
        },
        Command::Kms {
            command: KmsCommand::Decrypt { data },
        } => handlers.kms.decode_data(data).await,
        Command::Ssm { command } => match command {
            SsmCommand::Describe { filters } => {
                handlers.ssm.describe_parameters_with(filters).await
            }
            SsmCommand::Path { path } => handlers.ssm.get_parameter_by_path(path).await,
        },
    }
}

/// `Type=SecureString`, `Path=/app,/shared`, `Name:BeginsWith=/app/`.
pub fn parse_filter(raw: &str) -> Result<ParameterStringFilter, String> {
    let (key, values) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUES, got '{}'", raw))?;
    let (key, option) = match key.split_once(':') {
        Some((key, option)) => (key.trim(), Some(option.trim())),
        None => (key.trim(), None),
    };
    if key.is_empty() {
        return Err(format!("missing filter key in '{}'", raw));
    }
    let values: Vec<String> = values
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();

    let filter = ParameterStringFilter::new(key, values);
    Ok(match option {
        Some(option) if !option.is_empty() => filter.with_option(option),
        _ => filter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use ops_aws::database::MockRds;
    use ops_aws::kms::MockDecrypter;
    use ops_aws::ssm::MockParameterLookup;
    use ops_aws::{AwsError, OpsError};

    struct Mocks {
        rds: MockRds,
        kms: MockDecrypter,
        ssm: MockParameterLookup,
    }

    impl Mocks {
        fn new() -> Self {
            Self {
                rds: MockRds::new(),
                kms: MockDecrypter::new(),
                ssm: MockParameterLookup::new(),
            }
        }

        async fn run(&self, command: Command) -> OpsResult<Vec<u8>> {
            let handlers = Handlers {
                rds: &self.rds,
                kms: &self.kms,
                ssm: &self.ssm,
            };
            execute(command, &handlers).await
        }
    }

    #[test]
    fn parse_filter_forms() {
        assert_eq!(
            parse_filter("Type=SecureString").unwrap(),
            ParameterStringFilter::new("Type", vec!["SecureString".into()])
        );
        assert_eq!(
            parse_filter("Path=/app, /shared").unwrap(),
            ParameterStringFilter::new("Path", vec!["/app".into(), "/shared".into()])
        );
        assert_eq!(
            parse_filter("Name:BeginsWith=/app/").unwrap(),
            ParameterStringFilter::new("Name", vec!["/app/".into()]).with_option("BeginsWith")
        );
        assert!(parse_filter("no-equals").is_err());
        assert!(parse_filter("=value").is_err());
    }

    #[tokio::test]
    async fn rds_endpoint_dispatch() {
        let mut mocks = Mocks::new();
        mocks
            .rds
            .expect_describe_endpoint()
            .with(eq("mock-db".to_string()), eq(EndpointType::Reader))
            .times(1)
            .returning(|_, _| Ok(b"{}".to_vec()));

        let out = mocks
            .run(Command::Rds {
                command: RdsCommand::Endpoint {
                    cluster: "mock-db".into(),
                    endpoint_type: EndpointType::Reader,
                },
            })
            .await
            .unwrap();
        assert_eq!(out, b"{}");
    }

    #[tokio::test]
    async fn rds_endpoints_and_list_dispatch() {
        let mut mocks = Mocks::new();
        mocks
            .rds
            .expect_describe_all_endpoints()
            .with(eq(EndpointType::Writer))
            .times(1)
            .returning(|_| Ok(b"[1]".to_vec()));
        mocks
            .rds
            .expect_list_db_identifiers()
            .times(1)
            .returning(|| Ok(b"[2]".to_vec()));

        let endpoints = mocks
            .run(Command::Rds {
                command: RdsCommand::Endpoints {
                    endpoint_type: EndpointType::Writer,
                },
            })
            .await
            .unwrap();
        let listed = mocks
            .run(Command::Rds {
                command: RdsCommand::List,
            })
            .await
            .unwrap();
        assert_eq!(endpoints, b"[1]");
        assert_eq!(listed, b"[2]");
    }

    #[tokio::test]
    async fn kms_decrypt_dispatch() {
        let mut mocks = Mocks::new();
        mocks
            .kms
            .expect_decode_data()
            .with(eq("AQID".to_string()))
            .returning(|_| Ok(b"plain".to_vec()));

        let out = mocks
            .run(Command::Kms {
                command: KmsCommand::Decrypt {
                    data: "AQID".into(),
                },
            })
            .await
            .unwrap();
        assert_eq!(out, b"plain");
    }

    #[tokio::test]
    async fn ssm_dispatch_and_errors() {
        let mut mocks = Mocks::new();
        mocks
            .ssm
            .expect_describe_parameters_with()
            .withf(|filters| filters.len() == 1 && filters[0].key == "Type")
            .returning(|_| Ok(b"{\"Parameters\":[]}".to_vec()));
        mocks
            .ssm
            .expect_get_parameter_by_path()
            .with(eq("/missing".to_string()))
            .returning(|path| Err(OpsError::NoResults { path }));

        let described = mocks
            .run(Command::Ssm {
                command: SsmCommand::Describe {
                    filters: vec![parse_filter("Type=String").unwrap()],
                },
            })
            .await
            .unwrap();
        assert_eq!(described, b"{\"Parameters\":[]}");

        let err = mocks
            .run(Command::Ssm {
                command: SsmCommand::Path {
                    path: "/missing".into(),
                },
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "no results found for path, /missing");
    }

    #[tokio::test]
    async fn remote_errors_pass_through() {
        let mut mocks = Mocks::new();
        mocks.rds.expect_list_db_identifiers().returning(|| {
            Err(OpsError::RemoteQueryFailed {
                operation: "list instances",
                source: AwsError::new("rds", "AccessDenied", "not allowed", 403),
            })
        });

        let err = mocks
            .run(Command::Rds {
                command: RdsCommand::List,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("unable to list instances, "));
    }
}

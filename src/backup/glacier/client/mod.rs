pub mod aws_cli;
pub mod dry_run;
#[cfg(test)]
pub(crate) mod simulated;

use crate::backup::glacier::client::aws_cli::AwsCliConfig;
use crate::backup::glacier::client::dry_run::DryRunConfig;
use crate::backup::result_error::result::Result;
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::Path;
use std::result;
use std::sync::Arc;
use validator::{Validate, ValidationErrors};

/// Identifier handed out by the vault when a multipart upload is initiated.
#[derive(Clone, Debug, Display, From, PartialEq, Eq, Hash)]
pub struct UploadId(String);

impl UploadId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Inclusive byte range of one part, rendered the way the vault expects it.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[display("bytes {first}-{last}/*")]
pub struct ByteRange {
    first: u64,
    last: u64,
}

impl ByteRange {
    /// `size` must be non-zero.
    pub fn new(offset: u64, size: u64) -> Self {
        debug_assert!(size > 0);
        Self {
            first: offset,
            last: offset + size - 1,
        }
    }

    pub fn first(&self) -> u64 {
        self.first
    }

    pub fn len(&self) -> u64 {
        self.last - self.first + 1
    }
}

/// Payload of one part, either held in memory or spilled to a scratch file.
#[derive(Clone, Copy, Debug)]
pub enum PartBody<'a> {
    Memory(&'a [u8]),
    File(&'a Path),
}

impl<'a> PartBody<'a> {
    pub fn bytes(&self) -> std::io::Result<Cow<'a, [u8]>> {
        match self {
            PartBody::Memory(bytes) => Ok(Cow::Borrowed(*bytes)),
            PartBody::File(path) => std::fs::read(path).map(Cow::Owned),
        }
    }
}

/// The four multipart operations of the vault plus idempotent vault creation.
///
/// Every call is a single blocking request; retrying is the caller's business.
/// `upload_part` may be repeated for the same range, `complete` and `abort` must
/// each be issued at most once per upload.
pub trait VaultClient: Send + Sync {
    fn create_vault(&self, vault: &str) -> Result<()>;

    fn initiate(&self, vault: &str, description: &str, part_size: u64) -> Result<UploadId>;

    /// Returns the hex checksum the vault computed for the received part.
    fn upload_part(
        &self,
        upload_id: &UploadId,
        vault: &str,
        range: ByteRange,
        body: PartBody<'_>,
    ) -> Result<String>;

    fn complete(
        &self,
        upload_id: &UploadId,
        vault: &str,
        root_digest_hex: &str,
        total_size: u64,
    ) -> Result<()>;

    fn abort(&self, upload_id: &UploadId, vault: &str) -> Result<()>;
}

#[derive(Clone, From, Serialize, Deserialize, Debug)]
#[serde(tag = "client_type")]
#[serde(rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
pub enum VaultClientConfig {
    AwsCli(AwsCliConfig),
    DryRun(DryRunConfig),
}

impl Default for VaultClientConfig {
    fn default() -> Self {
        Self::AwsCli(AwsCliConfig::default())
    }
}

impl Validate for VaultClientConfig {
    fn validate(&self) -> result::Result<(), ValidationErrors> {
        match self {
            VaultClientConfig::AwsCli(inner) => inner.validate(),
            VaultClientConfig::DryRun(inner) => inner.validate(),
        }
    }
}

pub trait VaultClientBuilder {
    /// Checks that the client can be used at all before any vault call is made.
    fn verify(&self) -> Result<()>;

    fn build_client(&self) -> Arc<dyn VaultClient>;
}

impl VaultClientBuilder for VaultClientConfig {
    fn verify(&self) -> Result<()> {
        match self {
            VaultClientConfig::AwsCli(inner) => inner.verify(),
            VaultClientConfig::DryRun(_) => Ok(()),
        }
    }

    fn build_client(&self) -> Arc<dyn VaultClient> {
        match self {
            VaultClientConfig::AwsCli(inner) => {
                tracing::info!("Using aws command line client {:?}", inner.program());
                Arc::new(inner.clone())
            }
            VaultClientConfig::DryRun(inner) => {
                tracing::warn!("Dry run, nothing will be sent to the vault");
                Arc::new(inner.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_range_display() {
        assert_eq!(ByteRange::new(0, 1024).to_string(), "bytes 0-1023/*");
        assert_eq!(
            ByteRange::new(1_048_576, 10).to_string(),
            "bytes 1048576-1048585/*"
        );
        assert_eq!(ByteRange::new(5, 1).len(), 1);
    }

    #[test]
    fn test_part_body_bytes() {
        let data = [1u8, 2, 3];
        assert_eq!(PartBody::Memory(&data).bytes().unwrap().as_ref(), &data);

        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), data).unwrap();
        assert_eq!(PartBody::File(file.path()).bytes().unwrap().as_ref(), &data);
    }

    #[test]
    fn test_client_config_deserialization() {
        let config: VaultClientConfig =
            serde_yml::from_str("client_type: dry_run\nmax_delay: 0s\n").unwrap();
        assert!(matches!(config, VaultClientConfig::DryRun(_)));

        let config: VaultClientConfig =
            serde_yml::from_str("client_type: aws_cli\nprogram: /usr/local/bin/aws\n").unwrap();
        match config {
            VaultClientConfig::AwsCli(aws) => {
                assert_eq!(aws.program(), "/usr/local/bin/aws");
                assert_eq!(aws.account_id(), "-");
            }
            _ => panic!("Expected aws_cli client"),
        }
    }

    #[test]
    fn test_client_config_rejects_unknown_type() {
        let result = serde_yml::from_str::<VaultClientConfig>("client_type: carrier_pigeon\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_dry_run_client_verifies() {
        let config = VaultClientConfig::DryRun(DryRunConfig::default());
        assert!(config.verify().is_ok());
    }
}

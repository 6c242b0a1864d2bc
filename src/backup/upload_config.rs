use crate::backup::glacier::client::{VaultClient, VaultClientBuilder, VaultClientConfig};
use crate::backup::glacier::coordinator::DEFAULT_THREADS;
use crate::backup::glacier::job::RetryPolicy;
use crate::backup::glacier::scratch::ScratchConfig;
use crate::backup::glacier::uploader::ArchiveUploader;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddMsg;
use crate::backup::validate::{validate_scratch, validate_section, validate_vault_name};
use bon::Builder;
use getset::{CopyGetters, Getters};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

/// More workers than this rarely speeds up an upload.
static USEFUL_THREADS: usize = 16;
static DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Serialize, Deserialize, Debug, Validate, Builder, Getters, CopyGetters)]
#[serde(deny_unknown_fields)]
pub struct VaultUploadConfig {
    #[validate(custom(function = validate_vault_name))]
    #[builder(into)]
    #[getset(get = "pub")]
    vault: Arc<str>,
    #[serde(default = "default_threads")]
    #[builder(default = DEFAULT_THREADS)]
    #[validate(range(min = 1))]
    #[getset(get_copy = "pub")]
    threads: usize,
    /// Create the vault before uploading; a no-op when it already exists
    #[serde(default)]
    #[builder(default)]
    #[getset(get_copy = "pub")]
    create_vault: bool,
    #[serde(default)]
    #[builder(default)]
    #[validate(custom(function = validate_section))]
    #[getset(get = "pub")]
    retry: RetryPolicy,
    #[serde(default)]
    #[builder(default)]
    #[validate(custom(function = validate_scratch))]
    #[getset(get = "pub")]
    scratch: ScratchConfig,
    #[serde(default)]
    #[builder(default)]
    #[validate(custom(function = validate_section))]
    #[getset(get = "pub")]
    client: VaultClientConfig,
    #[serde(with = "humantime_serde", default = "default_progress_interval")]
    #[builder(default = DEFAULT_PROGRESS_INTERVAL)]
    #[getset(get_copy = "pub")]
    progress_interval: Duration,
    /// Describe archives by full path instead of file name
    #[serde(default)]
    #[builder(default)]
    #[getset(get_copy = "pub")]
    with_path: bool,
}

fn default_threads() -> usize {
    DEFAULT_THREADS
}

fn default_progress_interval() -> Duration {
    DEFAULT_PROGRESS_INTERVAL
}

impl VaultUploadConfig {
    pub fn uploader(&self, client: Arc<dyn VaultClient>) -> ArchiveUploader {
        if self.threads > USEFUL_THREADS {
            tracing::warn!(
                "{} upload threads configured, more than {} is unlikely to help",
                self.threads,
                USEFUL_THREADS
            );
        }
        ArchiveUploader::builder()
            .client(client)
            .vault(self.vault.clone())
            .threads(self.threads)
            .retry(self.retry.clone())
            .scratch(self.scratch.clone())
            .progress_interval(self.progress_interval)
            .with_path(self.with_path)
            .build()
    }

    /// Verifies the client, optionally creates the vault, then uploads the
    /// archives in order, stopping at the first failure.
    pub fn run<P: AsRef<Path>>(&self, archives: &[P]) -> Result<()> {
        self.client
            .verify()
            .add_msg("Vault client verification failed")?;
        self.upload_with(self.client.build_client(), archives)
    }

    /// Same as [`run`](Self::run) with an already built client.
    pub fn upload_with<P: AsRef<Path>>(
        &self,
        client: Arc<dyn VaultClient>,
        archives: &[P],
    ) -> Result<()> {
        if self.create_vault {
            client
                .create_vault(&self.vault)
                .add_msg(format!("Unable to create vault {:?}", self.vault))?;
        }
        self.uploader(client).upload_archives(archives)
    }
}

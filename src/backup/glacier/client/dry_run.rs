use crate::backup::glacier::client::{ByteRange, PartBody, UploadId, VaultClient};
use crate::backup::glacier::tree_hash::TreeHash;
use crate::backup::result_error::result::Result;
use bon::Builder;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

static DEFAULT_MAX_DELAY: Duration = Duration::from_secs(5);

/// Pretends to talk to a vault: every call sleeps for a random delay up to
/// `max_delay` and succeeds. Part checksums are computed from the body, so the
/// verification path runs exactly as it would against a real vault.
#[derive(Clone, Debug, Serialize, Deserialize, Validate, Builder)]
#[serde(deny_unknown_fields)]
pub struct DryRunConfig {
    #[serde(with = "humantime_serde", default = "default_max_delay")]
    #[builder(default = DEFAULT_MAX_DELAY)]
    max_delay: Duration,
}

fn default_max_delay() -> Duration {
    DEFAULT_MAX_DELAY
}

impl Default for DryRunConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl DryRunConfig {
    fn pause(&self) {
        if self.max_delay.is_zero() {
            return;
        }
        let millis = rand::thread_rng().gen_range(0..=self.max_delay.as_millis() as u64);
        std::thread::sleep(Duration::from_millis(millis));
    }
}

impl VaultClient for DryRunConfig {
    fn create_vault(&self, vault: &str) -> Result<()> {
        tracing::info!("[dry run] create vault {vault:?}");
        Ok(())
    }

    fn initiate(&self, vault: &str, description: &str, part_size: u64) -> Result<UploadId> {
        self.pause();
        let id = hex::encode(rand::thread_rng().gen::<[u8; 16]>());
        tracing::info!(
            "[dry run] initiate upload {id} of {description:?} to {vault:?}, part size {part_size}"
        );
        Ok(id.into())
    }

    fn upload_part(
        &self,
        upload_id: &UploadId,
        _vault: &str,
        range: ByteRange,
        body: PartBody<'_>,
    ) -> Result<String> {
        self.pause();
        let bytes = body.bytes()?;
        tracing::debug!("[dry run] {upload_id} received {range}");
        Ok(TreeHash::root_of(&bytes).to_hex())
    }

    fn complete(
        &self,
        upload_id: &UploadId,
        vault: &str,
        root_digest_hex: &str,
        total_size: u64,
    ) -> Result<()> {
        self.pause();
        tracing::info!(
            "[dry run] complete upload {upload_id} to {vault:?}: {total_size} bytes, tree hash {root_digest_hex}"
        );
        Ok(())
    }

    fn abort(&self, upload_id: &UploadId, vault: &str) -> Result<()> {
        tracing::info!("[dry run] abort upload {upload_id} to {vault:?}");
        Ok(())
    }
}

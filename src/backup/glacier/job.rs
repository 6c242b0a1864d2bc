use crate::backup::format::format_size;
use crate::backup::glacier::client::{ByteRange, UploadId, VaultClient};
use crate::backup::glacier::scratch::ScratchConfig;
use crate::backup::glacier::tree_hash::Digest;
use bon::Builder;
use derive_more::Display;
use getset::{CopyGetters, Getters};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

static DEFAULT_ATTEMPTS: u32 = 10;
static DEFAULT_BACKOFF_STEP: Duration = Duration::from_secs(30);

/// Attempts per part and the linear backoff between them.
///
/// After a failed attempt with `r` attempts left the job waits
/// `(attempts - r) * backoff_step`, so 30s, 60s, 90s... with the defaults.
#[derive(Clone, Debug, Serialize, Deserialize, Validate, Builder, CopyGetters, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
#[getset(get_copy = "pub")]
pub struct RetryPolicy {
    #[serde(default = "default_attempts")]
    #[builder(default = DEFAULT_ATTEMPTS)]
    #[validate(range(min = 1))]
    attempts: u32,
    #[serde(with = "humantime_serde", default = "default_backoff_step")]
    #[builder(default = DEFAULT_BACKOFF_STEP)]
    backoff_step: Duration,
}

fn default_attempts() -> u32 {
    DEFAULT_ATTEMPTS
}

fn default_backoff_step() -> Duration {
    DEFAULT_BACKOFF_STEP
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RetryPolicy {
    pub fn backoff_after(&self, retries_remaining: u32) -> Duration {
        self.backoff_step * self.attempts.saturating_sub(retries_remaining)
    }
}

/// Everything the jobs of one upload session share.
#[derive(Builder, Getters)]
#[getset(get = "pub")]
pub struct JobContext {
    client: Arc<dyn VaultClient>,
    #[builder(into)]
    vault: Arc<str>,
    upload_id: UploadId,
    #[builder(into)]
    archive: PathBuf,
    #[builder(default)]
    retry: RetryPolicy,
    #[builder(default)]
    scratch: ScratchConfig,
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Extracting,
    Uploading,
    Verifying,
    Done,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

/// Upload of a single part.
#[derive(Debug, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct UploadJob {
    index: u64,
    offset: u64,
    size: u64,
    expected_digest: Digest,
    retries_remaining: u32,
    status: JobStatus,
}

impl UploadJob {
    pub fn new(index: u64, offset: u64, size: u64, expected_digest: Digest, retry: &RetryPolicy) -> Self {
        Self {
            index,
            offset,
            size,
            expected_digest,
            retries_remaining: retry.attempts(),
            status: JobStatus::Pending,
        }
    }

    /// Drives the job to `Done` or `Failed`.
    ///
    /// A local extraction fault fails the job at once. Vault errors and checksum
    /// mismatches each use up one attempt and share the backoff schedule. The
    /// scratch copy is dropped before returning, whatever the outcome.
    pub fn run(&mut self, ctx: &JobContext) -> JobStatus {
        self.status = JobStatus::Extracting;
        let scratch = match ctx.scratch().extract(ctx.archive(), self.offset, self.size) {
            Ok(scratch) => scratch,
            Err(e) => {
                tracing::error!("Unable to extract part {} for upload: {e}", self.index);
                self.status = JobStatus::Failed;
                return self.status;
            }
        };

        let range = ByteRange::new(self.offset, self.size);
        while self.retries_remaining > 0 {
            self.status = JobStatus::Uploading;
            let result = ctx
                .client()
                .upload_part(ctx.upload_id(), ctx.vault(), range, scratch.body());

            self.status = JobStatus::Verifying;
            match result {
                Ok(checksum) if self.expected_digest.matches_hex(&checksum) => {
                    tracing::debug!("Part {} ({range}) verified", self.index);
                    self.status = JobStatus::Done;
                    break;
                }
                Ok(checksum) => tracing::error!(
                    "Hash does not match, expected {} got {}.",
                    self.expected_digest,
                    checksum
                ),
                Err(e) => tracing::debug!("Part {} ({range}) upload failed: {e}", self.index),
            }

            self.retries_remaining -= 1;
            if self.retries_remaining == 0 {
                break;
            }
            let backoff = ctx.retry().backoff_after(self.retries_remaining);
            tracing::warn!(
                "{} @ {} failed to upload, retrying in {}. {} tries left",
                format_size(self.size),
                self.offset,
                humantime::format_duration(backoff),
                self.retries_remaining
            );
            std::thread::sleep(backoff);
        }

        if self.status != JobStatus::Done {
            tracing::error!(
                "Unable to upload {} at offset {}",
                format_size(self.size),
                self.offset
            );
            self.status = JobStatus::Failed;
        }
        drop(scratch);
        self.status
    }
}

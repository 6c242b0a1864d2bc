use crate::backup::glacier::chunk_plan::ChunkPlan;
use crate::backup::glacier::client::{UploadId, VaultClient};
use crate::backup::glacier::tree_hash::Digest;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddMsg;
use chrono::{DateTime, Utc};
use getset::{CopyGetters, Getters};
use std::sync::Arc;

/// An open multipart upload.
///
/// [`complete`](Self::complete) and [`abort`](Self::abort) take the session by
/// value, so neither can be issued twice for the same upload id.
#[derive(Debug, Getters, CopyGetters)]
pub struct UploadSession {
    #[getset(get = "pub")]
    vault_id: Arc<str>,
    #[getset(get = "pub")]
    upload_id: UploadId,
    #[getset(get_copy = "pub")]
    plan: ChunkPlan,
    #[getset(get_copy = "pub")]
    created_at: DateTime<Utc>,
}

impl UploadSession {
    pub fn initiate(
        client: &dyn VaultClient,
        vault_id: Arc<str>,
        description: &str,
        plan: ChunkPlan,
    ) -> Result<Self> {
        let upload_id = client
            .initiate(&vault_id, description, plan.part_size_bytes())
            .add_msg(format!("Unable to initiate upload of {description:?}"))?;
        tracing::debug!("Initiated upload {upload_id} of {description:?} to {vault_id:?}");
        Ok(Self {
            vault_id,
            upload_id,
            plan,
            created_at: Utc::now(),
        })
    }

    pub fn complete(self, client: &dyn VaultClient, root: &Digest) -> Result<()> {
        client
            .complete(
                &self.upload_id,
                &self.vault_id,
                &root.to_hex(),
                self.plan.archive_size_bytes(),
            )
            .add_msg(format!("Unable to complete upload {}", self.upload_id))?;
        tracing::debug!(
            "Completed upload {} after {}",
            self.upload_id,
            Utc::now() - self.created_at
        );
        Ok(())
    }

    /// Best effort; a failing abort is only logged.
    pub fn abort(self, client: &dyn VaultClient) {
        tracing::warn!("Aborting upload {}", self.upload_id);
        if let Err(e) = client.abort(&self.upload_id, &self.vault_id) {
            tracing::error!("Abort of upload {} failed: {e}", self.upload_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::glacier::client::simulated::SimulatedVault;
    use crate::backup::glacier::tree_hash::TreeHash;

    #[test]
    fn test_initiate_and_complete() {
        let vault = SimulatedVault::agreeing();
        let plan = ChunkPlan::for_archive_size(10);
        let session = UploadSession::initiate(&vault, "v".into(), "a.tar", plan).unwrap();
        assert_eq!(session.upload_id().as_str(), "upload-0");
        assert_eq!(session.plan(), plan);

        let root = TreeHash::root_of(b"0123456789");
        session.complete(&vault, &root).unwrap();
        let completed = vault.completed();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].1, root.to_hex());
        assert_eq!(completed[0].2, 10);
        assert!(vault.aborted().is_empty());
    }

    #[test]
    fn test_upload_ids_not_reused() {
        let vault = SimulatedVault::agreeing();
        let plan = ChunkPlan::for_archive_size(10);
        let a = UploadSession::initiate(&vault, "v".into(), "a.tar", plan).unwrap();
        let b = UploadSession::initiate(&vault, "v".into(), "a.tar", plan).unwrap();
        assert_ne!(a.upload_id(), b.upload_id());
    }

    #[test]
    fn test_initiate_failure() {
        let vault = SimulatedVault::agreeing().failing_initiate();
        let result = UploadSession::initiate(&vault, "v".into(), "a.tar", ChunkPlan::for_archive_size(1));
        assert!(result.is_err());
    }

    #[test]
    fn test_abort() {
        let vault = SimulatedVault::agreeing();
        let session =
            UploadSession::initiate(&vault, "v".into(), "a.tar", ChunkPlan::for_archive_size(1)).unwrap();
        let id = session.upload_id().clone();
        session.abort(&vault);
        assert_eq!(vault.aborted(), vec![id]);
    }
}

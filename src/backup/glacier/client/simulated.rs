//! In-process vault for tests: scripted bad responses and call accounting.

use crate::backup::glacier::client::{ByteRange, PartBody, UploadId, VaultClient};
use crate::backup::glacier::tree_hash::TreeHash;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Clone, Copy, Debug)]
enum Fault {
    Mismatch,
    Timeout,
}

#[derive(Default)]
pub(crate) struct SimulatedVault {
    /// offset -> (fault, how many attempts get it before the vault behaves)
    scripted: HashMap<u64, (Fault, u32)>,
    fail_initiate: bool,
    fail_complete: bool,
    panic_on_upload: bool,
    next_id: AtomicU64,
    attempts: Mutex<HashMap<u64, u32>>,
    initiated: AtomicUsize,
    completed: Mutex<Vec<(UploadId, String, u64)>>,
    aborted: Mutex<Vec<UploadId>>,
    created_vaults: Mutex<Vec<String>>,
}

impl SimulatedVault {
    pub(crate) fn agreeing() -> Self {
        Self::default()
    }

    /// The part at `offset` gets a wrong checksum on its first `times` attempts.
    pub(crate) fn mismatch_at(mut self, offset: u64, times: u32) -> Self {
        self.scripted.insert(offset, (Fault::Mismatch, times));
        self
    }

    /// The part at `offset` times out on its first `times` attempts.
    pub(crate) fn timeout_at(mut self, offset: u64, times: u32) -> Self {
        self.scripted.insert(offset, (Fault::Timeout, times));
        self
    }

    pub(crate) fn failing_initiate(mut self) -> Self {
        self.fail_initiate = true;
        self
    }

    pub(crate) fn failing_complete(mut self) -> Self {
        self.fail_complete = true;
        self
    }

    /// Every part upload panics, as a buggy client would.
    pub(crate) fn panicking_upload(mut self) -> Self {
        self.panic_on_upload = true;
        self
    }

    pub(crate) fn attempts_at(&self, offset: u64) -> u32 {
        self.attempts
            .lock()
            .unwrap()
            .get(&offset)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn total_attempts(&self) -> u32 {
        self.attempts.lock().unwrap().values().sum()
    }

    pub(crate) fn initiated(&self) -> usize {
        self.initiated.load(Ordering::SeqCst)
    }

    pub(crate) fn completed(&self) -> Vec<(UploadId, String, u64)> {
        self.completed.lock().unwrap().clone()
    }

    pub(crate) fn aborted(&self) -> Vec<UploadId> {
        self.aborted.lock().unwrap().clone()
    }

    pub(crate) fn created_vaults(&self) -> Vec<String> {
        self.created_vaults.lock().unwrap().clone()
    }
}

impl VaultClient for SimulatedVault {
    fn create_vault(&self, vault: &str) -> Result<()> {
        self.created_vaults.lock().unwrap().push(vault.to_string());
        Ok(())
    }

    fn initiate(&self, _vault: &str, _description: &str, _part_size: u64) -> Result<UploadId> {
        self.initiated.fetch_add(1, Ordering::SeqCst);
        if self.fail_initiate {
            return Err(Error::vault_command(
                "initiate-multipart-upload",
                "exit status: 255",
                "AccessDeniedException",
            ));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(format!("upload-{id}").into())
    }

    fn upload_part(
        &self,
        _upload_id: &UploadId,
        _vault: &str,
        range: ByteRange,
        body: PartBody<'_>,
    ) -> Result<String> {
        if self.panic_on_upload {
            panic!("simulated client bug uploading {range}");
        }
        let bytes = body.bytes()?;
        assert_eq!(bytes.len() as u64, range.len(), "body does not match range");

        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let counter = attempts.entry(range.first()).or_insert(0);
            *counter += 1;
            *counter
        };

        match self.scripted.get(&range.first()) {
            Some((Fault::Mismatch, times)) if attempt <= *times => Ok("00".repeat(32)),
            Some((Fault::Timeout, times)) if attempt <= *times => Err(Error::vault_command(
                "upload-multipart-part",
                "exit status: 255",
                "RequestTimeoutException",
            )),
            _ => Ok(TreeHash::root_of(&bytes).to_hex()),
        }
    }

    fn complete(
        &self,
        upload_id: &UploadId,
        _vault: &str,
        root_digest_hex: &str,
        total_size: u64,
    ) -> Result<()> {
        self.completed.lock().unwrap().push((
            upload_id.clone(),
            root_digest_hex.to_string(),
            total_size,
        ));
        if self.fail_complete {
            return Err(Error::vault_command(
                "complete-multipart-upload",
                "exit status: 255",
                "InvalidParameterValueException",
            ));
        }
        Ok(())
    }

    fn abort(&self, upload_id: &UploadId, _vault: &str) -> Result<()> {
        self.aborted.lock().unwrap().push(upload_id.clone());
        Ok(())
    }
}

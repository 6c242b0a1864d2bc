use crate::backup::format::{format_size, format_speed};
use crate::backup::function_path;
use crate::backup::glacier::chunk_plan::ChunkPlan;
use crate::backup::glacier::client::VaultClient;
use crate::backup::glacier::coordinator::{UploadCoordinator, DEFAULT_THREADS};
use crate::backup::glacier::job::{JobContext, RetryPolicy, UploadJob};
use crate::backup::glacier::progress::ProgressReporter;
use crate::backup::glacier::scratch::ScratchConfig;
use crate::backup::glacier::session::UploadSession;
use crate::backup::glacier::tree_hash::TreeHash;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{AddFunctionName, AddMsg};
use bon::Builder;
use function_name::named;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Where one archive sits within a batch, for the progress line.
#[derive(Clone, Debug, Default)]
pub struct BatchPosition {
    pub prefix: String,
    pub bytes_done: u64,
    pub bytes_total: u64,
}

/// Uploads prepared archives into one vault.
#[derive(Builder)]
pub struct ArchiveUploader {
    client: Arc<dyn VaultClient>,
    #[builder(into)]
    vault: Arc<str>,
    #[builder(default = DEFAULT_THREADS)]
    threads: usize,
    #[builder(default)]
    retry: RetryPolicy,
    #[builder(default)]
    scratch: ScratchConfig,
    #[builder(default = Duration::from_secs(1))]
    progress_interval: Duration,
    /// Describe archives by their full path instead of the file name
    #[builder(default)]
    with_path: bool,
}

impl ArchiveUploader {
    /// Uploads every archive in order, stopping at the first one that fails.
    #[named]
    pub fn upload_archives<P: AsRef<Path>>(&self, files: &[P]) -> Result<()> {
        let sizes = files
            .iter()
            .map(|f| archive_size(f.as_ref()))
            .collect::<Result<Vec<_>>>()
            .add_fn_name(function_path!())?;
        let bytes_total = sizes.iter().sum::<u64>();
        tracing::info!(
            "Uploading {} files ({}) to vault {:?}, this may take a while",
            files.len(),
            format_size(bytes_total),
            self.vault
        );

        let mut bytes_done = 0;
        for (i, (file, size)) in files.iter().zip(sizes).enumerate() {
            let position = BatchPosition {
                prefix: format!("({} of {}) ", i + 1, files.len()),
                bytes_done,
                bytes_total,
            };
            self.upload_archive(file.as_ref(), &position)
                .add_fn_name(function_path!())?;
            bytes_done += size;
        }
        Ok(())
    }

    /// Uploads one archive as a single multipart session.
    ///
    /// Fails if the session cannot be opened or completed, or if any part runs
    /// out of attempts; in the last case the session is aborted first.
    #[named]
    pub fn upload_archive<P: AsRef<Path>>(&self, path: P, position: &BatchPosition) -> Result<()> {
        let path = path.as_ref();
        let size = archive_size(path)?;
        let name = self.description(path);

        let plan = ChunkPlan::for_archive_size(size);
        let tree = TreeHash::from_file(path, plan.part_size_bytes())?;
        let session = UploadSession::initiate(self.client.as_ref(), self.vault.clone(), &name, plan)
            .add_fn_name(function_path!())?;

        let ctx = JobContext::builder()
            .client(self.client.clone())
            .vault(self.vault.clone())
            .upload_id(session.upload_id().clone())
            .archive(path)
            .retry(self.retry.clone())
            .scratch(self.scratch.clone())
            .build();

        let mut coordinator = UploadCoordinator::new(self.threads);
        for (index, (offset, part_size)) in plan.parts().enumerate() {
            let job = UploadJob::new(index as u64, offset, part_size, tree.parts()[index], &self.retry);
            coordinator.add(job);
        }

        let began = Instant::now();
        if let Err(e) = coordinator.start(Arc::new(ctx)) {
            // Workers that did start stop at the abort flag; wait for them first.
            let error = with_worker_error(
                e.add_msg("Unable to start upload workers"),
                coordinator.finish(),
            );
            session.abort(self.client.as_ref());
            return Err(error.add_fn_name(function_path!()));
        }

        let mut reporter = ProgressReporter::stdout(
            position.prefix.clone(),
            name.clone(),
            size,
            position.bytes_done,
            position.bytes_total,
        );
        if reporter.is_active() {
            while !coordinator.is_done() {
                std::thread::sleep(self.progress_interval);
                reporter.update(coordinator.bytes_sent(), coordinator.elapsed());
            }
            reporter.finish();
        }

        match coordinator.finish() {
            Ok(true) => {}
            Ok(false) => {
                tracing::error!("Failed to upload {:?}, aborting", path);
                let upload_id = session.upload_id().to_string();
                session.abort(self.client.as_ref());
                return Err(Error::session_aborted(upload_id).add_fn_name(function_path!()));
            }
            Err(e) => {
                session.abort(self.client.as_ref());
                return Err(e.add_fn_name(function_path!()));
            }
        }

        session
            .complete(self.client.as_ref(), &tree.root())
            .add_msg(format!("Unable to complete upload of {:?}", path))
            .add_fn_name(function_path!())?;

        let secs = began.elapsed().as_secs_f64().max(1.0);
        tracing::info!(
            "Uploaded {} ({}) @ {}",
            name,
            format_size(size),
            format_speed(size as f64 / secs)
        );
        Ok(())
    }

    fn description(&self, path: &Path) -> String {
        if self.with_path {
            return path.to_string_lossy().into_owned();
        }
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned())
    }
}

/// Appends a worker failure surfaced while draining the pool to `error`.
fn with_worker_error(error: Error, finished: Result<bool>) -> Error {
    match finished {
        Err(worker_error) => error.chain(worker_error),
        Ok(_) => error,
    }
}

fn archive_size(path: &Path) -> Result<u64> {
    if !path.is_file() {
        tracing::error!("File {:?} does not exist", path);
        return Err(Error::file_not_found(PathBuf::from(path)));
    }
    Ok(std::fs::metadata(path)?.len())
}

//! Partition writer: stage a payload locally, then hand it to the privileged operator.

use crate::cancel::CancellationToken;
use crate::listener::{InstallListener, InstallationStep};
use crate::operator::PrivilegedOperator;
use crate::policy;
use crate::progress;
use crate::staging::StagingArea;
use dsu_shared::errors::{DsuError, DsuResult};
use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// Copy granularity, and therefore the worst-case cancellation latency.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// How a partition write ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Installed,
    /// Cancellation was observed mid-copy; the privileged write was skipped.
    Cancelled,
}

/// Streams one partition at a time into staging and installs it.
///
/// Staged files left behind by a cancelled copy or a failed privileged write are
/// remembered; the caller collects them with [`PartitionWriter::take_leftovers`].
pub struct PartitionWriter {
    operator: Arc<dyn PrivilegedOperator>,
    listener: Arc<dyn InstallListener>,
    staging: StagingArea,
    cancel: CancellationToken,
    leftovers: Vec<PathBuf>,
}

impl PartitionWriter {
    pub fn new(
        operator: Arc<dyn PrivilegedOperator>,
        listener: Arc<dyn InstallListener>,
        staging: StagingArea,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            operator,
            listener,
            staging,
            cancel,
            leftovers: Vec::new(),
        }
    }

    /// Stage `source` as `partition` and install it.
    ///
    /// `declared_size` drives progress reporting only; `0` means unknown.
    pub fn write(
        &mut self,
        partition: &str,
        source: &mut dyn Read,
        declared_size: u64,
    ) -> DsuResult<WriteOutcome> {
        policy::check_name(partition)?;
        self.listener.on_partition_created(partition);
        self.listener.on_step_changed(InstallationStep::InstallingPartition);

        let staged = self.staging.staged_path(partition);
        tracing::info!(
            partition = %partition,
            declared_size,
            staged = %staged.display(),
            "Staging partition payload"
        );

        self.leftovers.push(staged.clone());
        let copied = match self.copy_to_staging(partition, source, declared_size, &staged)? {
            Some(copied) => copied,
            None => {
                tracing::info!(partition = %partition, "Copy cancelled, skipping partition write");
                return Ok(WriteOutcome::Cancelled);
            }
        };

        tracing::debug!(partition = %partition, bytes = copied, "Payload staged");

        if let Err(e) = self.operator.install_partition_image(&staged, partition) {
            tracing::error!(partition = %partition, error = %e, "Privileged partition write failed");
            return Err(DsuError::PartitionCreation(partition.to_string()));
        }

        match std::fs::remove_file(&staged) {
            Ok(()) => {
                self.leftovers.retain(|p| p != &staged);
            }
            Err(e) => tracing::warn!(
                staged = %staged.display(),
                "Failed to remove staged payload: {}",
                e
            ),
        }

        tracing::info!(partition = %partition, bytes = copied, "Partition installed");
        Ok(WriteOutcome::Installed)
    }

    /// Staged files that were not removed by a successful write.
    pub fn take_leftovers(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.leftovers)
    }

    /// Copy in `CHUNK_SIZE` pieces. Returns `None` when cancelled mid-copy.
    fn copy_to_staging(
        &self,
        partition: &str,
        source: &mut dyn Read,
        declared_size: u64,
        staged: &std::path::Path,
    ) -> DsuResult<Option<u64>> {
        let mut file = File::create(staged)?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut total: u64 = 0;

        loop {
            let n = match source.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                // A cancelled upstream may fail or end early; that is not a stream error.
                Err(_) if self.cancel.is_cancelled() => return Ok(None),
                Err(e) => {
                    return Err(DsuError::Stream(format!(
                        "failed reading payload for {}: {}",
                        partition, e
                    )));
                }
            };

            file.write_all(&buf[..n])?;
            total += n as u64;
            self.listener
                .on_progress(progress::fraction(total, declared_size), partition);

            if self.cancel.is_cancelled() {
                return Ok(None);
            }
        }

        if self.cancel.is_cancelled() {
            return Ok(None);
        }

        file.sync_all()?;
        Ok(Some(total))
    }
}

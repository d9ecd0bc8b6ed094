//! Task: Install the source's partitions.
//!
//! Dispatches on the source kind:
//! - SingleImage: one image written as `system`
//! - MultipleImages: each supported image, in order
//! - Package / RemoteUrl: zip stream walked by the package extractor
//!
//! Cancellation observed at any point rolls back activation exactly once.

use super::{InstallCtx, blocking, log_task_error, rollback, task_start};
use crate::cancel::CancellationToken;
use crate::installer::types::InstallState;
use crate::listener::InstallationStep;
use crate::operator::{ByteStream, StreamProvider};
use crate::package::PackageStreamExtractor;
use crate::pipeline::PipelineTask;
use crate::policy;
use crate::source::{InstallationSource, SINGLE_IMAGE_PARTITION, is_gzip_locator};
use crate::writer::PartitionWriter;
use async_trait::async_trait;
use dsu_shared::errors::{DsuError, DsuResult};
use flate2::read::GzDecoder;
use std::sync::Arc;

pub struct InstallSourceTask;

#[async_trait]
impl PipelineTask<InstallCtx> for InstallSourceTask {
    async fn run(self: Box<Self>, ctx: InstallCtx) -> DsuResult<()> {
        let task_name = self.name();
        let run_id = task_start(&ctx, task_name).await;

        let (source, streams, staging, mut writer, cancel) = {
            let mut ctx = ctx.lock().await;
            ctx.set_state(InstallState::InstallingSource);
            ctx.enter_step(InstallationStep::InstallingPartition);
            let writer = PartitionWriter::new(
                ctx.collaborators.operator.clone(),
                ctx.collaborators.listener.clone(),
                ctx.staging.clone(),
                ctx.cancel.clone(),
            );
            (
                ctx.source.clone(),
                ctx.collaborators.streams.clone(),
                ctx.staging.clone(),
                writer,
                ctx.cancel.clone(),
            )
        };

        if cancel.is_cancelled() {
            rollback(&ctx).await;
            let err = DsuError::Cancelled;
            log_task_error(&run_id, task_name, &err);
            return Err(err);
        }

        tracing::info!(source = source.kind(), "Installing source");
        let blocking_cancel = cancel.clone();
        let (result, leftovers) = blocking(move || {
            let result = staging.prepare().and_then(|()| {
                install_source(&source, streams.as_ref(), &mut writer, &blocking_cancel)
            });
            Ok((result, writer.take_leftovers()))
        })
        .await?;

        ctx.lock().await.guard.register(leftovers);
        result.inspect_err(|e| log_task_error(&run_id, task_name, e))?;

        if cancel.is_cancelled() {
            rollback(&ctx).await;
            let err = DsuError::Cancelled;
            log_task_error(&run_id, task_name, &err);
            return Err(err);
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "install_source"
    }
}

/// Write every partition of `source`, stopping early on cancellation.
fn install_source(
    source: &InstallationSource,
    streams: &dyn StreamProvider,
    writer: &mut PartitionWriter,
    cancel: &CancellationToken,
) -> DsuResult<()> {
    match source {
        InstallationSource::SingleImage { locator, byte_size } => {
            let mut stream = open_image(streams, locator)?;
            writer.write(SINGLE_IMAGE_PARTITION, &mut stream, *byte_size)?;
        }
        InstallationSource::MultipleImages { images } => {
            for image in images {
                policy::check_name(&image.partition_name)?;
            }
            for image in images {
                if policy::is_supported(&image.partition_name) {
                    let mut stream = open_image(streams, &image.locator)?;
                    writer.write(&image.partition_name, &mut stream, image.byte_size)?;
                } else {
                    tracing::info!(partition = %image.partition_name, "Skipping unsupported partition");
                }

                if cancel.is_cancelled() {
                    tracing::info!(partition = %image.partition_name, "Cancelled, skipping remaining images");
                    break;
                }
            }
        }
        InstallationSource::Package { locator } | InstallationSource::RemoteUrl { locator } => {
            let mut stream = streams.open_stream(locator)?;
            PackageStreamExtractor::new(writer, cancel.clone()).extract(&mut stream)?;
        }
    }
    Ok(())
}

/// Open an image locator, decompressing `.gz` images on the fly.
fn open_image(streams: &dyn StreamProvider, locator: &str) -> DsuResult<ByteStream> {
    let stream = streams.open_stream(locator)?;
    if is_gzip_locator(locator) {
        tracing::debug!(locator = %locator, "Decompressing gzip image");
        return Ok(Box::new(GzDecoder::new(stream)));
    }
    Ok(stream)
}

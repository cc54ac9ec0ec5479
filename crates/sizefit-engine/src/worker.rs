// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Background worker — runs compression jobs off the caller's task and
// delivers each result over a oneshot channel.

use std::sync::Arc;

use sizefit_core::error::{Result, SizefitError};
use sizefit_core::{CompressionOutcome, JobId};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::backend::CompressionBackend;
use crate::orchestrator::{CompressionOrchestrator, CompressionRequest};

/// Handle to a submitted job.
#[derive(Debug)]
pub struct CompressionTicket {
    pub job_id: JobId,
    receiver: oneshot::Receiver<Result<CompressionOutcome>>,
}

impl CompressionTicket {
    /// Wait for the job to finish.
    pub async fn wait(self) -> Result<CompressionOutcome> {
        self.receiver.await.map_err(|_| {
            SizefitError::Worker(format!("job {} ended without a result", self.job_id))
        })?
    }
}

/// Runs orchestrator jobs on Tokio's blocking pool.
///
/// Partitioning and local recompression are CPU-bound, so each job gets a
/// blocking thread and drives its future there with the runtime handle.
pub struct CompressionWorker<B> {
    orchestrator: Arc<CompressionOrchestrator<B>>,
    runtime: Handle,
}

impl<B> CompressionWorker<B>
where
    B: CompressionBackend + 'static,
{
    /// Create a worker bound to the current Tokio runtime.
    ///
    /// Must be called from within a runtime context.
    pub fn new(orchestrator: CompressionOrchestrator<B>) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            runtime: Handle::current(),
        }
    }

    /// Queue a job and return immediately.
    pub fn submit(&self, request: CompressionRequest) -> CompressionTicket {
        let job_id = JobId::new();
        let (sender, receiver) = oneshot::channel();
        let orchestrator = Arc::clone(&self.orchestrator);
        let runtime = self.runtime.clone();

        info!(%job_id, source_bytes = request.source.len(), "Compression job submitted");
        self.runtime.spawn_blocking(move || {
            let result = runtime.block_on(orchestrator.compress_and_partition(&request));
            match &result {
                Ok(outcome) => {
                    info!(%job_id, artifacts = outcome.artifacts.len(), "Compression job finished")
                }
                Err(err) => warn!(%job_id, error = %err, "Compression job failed"),
            }
            if sender.send(result).is_err() {
                warn!(%job_id, "Job result dropped, ticket no longer held");
            }
        });

        CompressionTicket { job_id, receiver }
    }
}

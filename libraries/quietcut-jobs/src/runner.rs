/// Process runner seam
use crate::error::Result;
use crate::request::{RunOutput, RunRequest};
use async_trait::async_trait;
use std::sync::Arc;

/// Something that can run one supervised job to completion
///
/// `JobRegistry` is the real implementation; the strategy orchestrator and the
/// analysis passes only depend on this trait.
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Run a job and resolve once it reaches a terminal state
    async fn run(&self, request: RunRequest) -> Result<RunOutput>;
}

#[async_trait]
impl<R: JobRunner + ?Sized> JobRunner for Arc<R> {
    async fn run(&self, request: RunRequest) -> Result<RunOutput> {
        (**self).run(request).await
    }
}

#[async_trait]
impl<R: JobRunner + ?Sized> JobRunner for &R {
    async fn run(&self, request: RunRequest) -> Result<RunOutput> {
        (**self).run(request).await
    }
}

use crate::features::ExtractionFailure;
use crate::model::ArtifactError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error(transparent)]
    Extraction(#[from] ExtractionFailure),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error("scan cancelled before this URL was scored")]
    Cancelled,
    #[error("failed to start batch workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

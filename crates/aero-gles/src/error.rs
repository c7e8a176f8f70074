use thiserror::Error;

use crate::backend::BackendError;

/// Errors surfaced by GL calls that create native objects.
///
/// Everything GL would report through `glGetError` (bad handles, unsupported enums, incomplete
/// framebuffers) is logged and ignored instead; only failures of the target device reach the
/// caller.
#[derive(Debug, Error)]
pub enum GlesError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("staging capacity {capacity} cannot hold a single {stride}-byte vertex")]
    StagingTooSmall { capacity: usize, stride: usize },
}

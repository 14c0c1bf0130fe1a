// Error type surfaced by the public `Runner` API. Internal module errors
// (executor, shared memory) fold into this one rather than leaking their
// own types to callers.

use thiserror::Error;

use crate::executor::ExecutorError;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to isolate a test attempt: {0}")]
    Fork(#[from] ExecutorError),

    #[error("failed to allocate the cross-process rejection flag: {0}")]
    SharedMemory(#[source] nix::Error),

    #[error("failed to fill the input buffer with randomness: {0}")]
    Randomness(#[source] rand::Error),

    #[error(
        "only {valid} of {required} required valid examples were generated out of {attempts} attempts"
    )]
    TooFewValidExamples {
        valid: usize,
        required: usize,
        attempts: usize,
    },

    #[error(
        "the minimized failing example did not reproduce on an unsuppressed, non-isolated replay; the test appears to be flaky"
    )]
    Flaky,
}

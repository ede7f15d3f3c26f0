use crate::error::SynthesisError;

pub use tokio_util::sync::CancellationToken;

/// Early-exit helper for the synthesis path.
pub trait CancellationExt {
    fn check_cancelled(&self) -> Result<(), SynthesisError>;
}

impl CancellationExt for CancellationToken {
    fn check_cancelled(&self) -> Result<(), SynthesisError> {
        if self.is_cancelled() {
            return Err(SynthesisError::Cancelled);
        }
        Ok(())
    }
}

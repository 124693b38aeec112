use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation token for long traversals and initial builds.
///
/// Cloning shares the flag. Checks happen at node-expansion steps and between
/// files during an initial build; a cancelled operation returns
/// [`AtlasError::Cancelled`](crate::error::AtlasError::Cancelled) and performs
/// no partial mutation.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Err(Cancelled) when the token has been triggered.
    pub fn check(&self) -> crate::error::Result<()> {
        if self.is_cancelled() {
            Err(crate::error::AtlasError::Cancelled)
        } else {
            Ok(())
        }
    }
}

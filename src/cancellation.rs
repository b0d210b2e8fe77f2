// Cooperative cancellation (spec §5): every externally invoked operation
// accepts a token and aborts at the next store or compression boundary
// rather than polling continuously. Built on `tokio::sync::watch`, the same
// primitive the monitor uses for its own shutdown signal.

use tokio::sync::watch;

use crate::error::{ArgonError, Result};

/// Held by the operation; cheap to clone, safe to pass down call chains.
#[derive(Clone)]
pub struct CancellationToken {
    rx: watch::Receiver<bool>,
}

/// Held by whoever may need to cancel. Dropping it leaves outstanding
/// tokens permanently uncancelled, same as the `false` they started with.
pub struct CancellationSource {
    tx: watch::Sender<bool>,
}

impl CancellationSource {
    pub fn new() -> (Self, CancellationToken) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, CancellationToken { rx })
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl CancellationToken {
    /// A token that can never be cancelled, for callers that don't need one.
    pub fn none() -> Self {
        CancellationSource::new().1
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ArgonError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_not_cancelled() {
        let token = CancellationToken::none();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());
    }

    #[test]
    fn cancelling_the_source_is_observed_by_every_cloned_token() {
        let (source, token) = CancellationSource::new();
        let cloned = token.clone();
        source.cancel();
        assert!(token.is_cancelled());
        assert!(cloned.is_cancelled());
        assert!(matches!(token.check(), Err(ArgonError::Cancelled)));
    }
}

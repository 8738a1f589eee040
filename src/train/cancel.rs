use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cross-thread stop signal for a training run.
///
/// Clones share one flag. Raise it from a Ctrl-C handler, a UI thread, or a
/// callable; the trainer notices it at its next suspension point and consumes
/// it, so one `cancel()` interrupts exactly one `run`.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

/// Marker returned by a suspension point that observed a cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Consumes a pending cancellation, returning whether there was one.
    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }

    /// Suspension point: `Err(Cancelled)` if a cancellation was pending.
    pub fn checkpoint(&self) -> Result<(), Cancelled> {
        if self.take() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let handle = token.clone();
        handle.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn checkpoint_consumes_the_signal() {
        let token = CancelToken::new();
        assert_eq!(token.checkpoint(), Ok(()));
        token.cancel();
        assert_eq!(token.checkpoint(), Err(Cancelled));
        assert_eq!(token.checkpoint(), Ok(()));
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancel_from_another_thread() {
        let token = CancelToken::new();
        let remote = token.clone();
        std::thread::spawn(move || remote.cancel()).join().unwrap();
        assert!(token.take());
    }
}

//! Cooperative interrupt token.
//!
//! Replaces a process-wide "SIGINT seen" flag with a value that the process
//! driver owns and hands to whichever wait loop needs it. Nothing is ever
//! cancelled preemptively: loops check [`Interrupt::is_triggered`] between
//! poll iterations.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{info, warn};

/// Shared interrupt flag. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    triggered: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the interrupt as raised. Idempotent.
    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Trigger this token when the process receives Ctrl-C (SIGINT).
    ///
    /// Must be called from within a tokio runtime.
    pub fn trigger_on_ctrl_c(&self) {
        let token = self.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Ctrl-C received");
                    token.trigger();
                }
                Err(e) => warn!(error = %e, "failed to listen for Ctrl-C"),
            }
        });
    }

    /// Sleep in `poll` sized steps until the interrupt is triggered.
    pub async fn wait(&self, poll: Duration) {
        while !self.is_triggered() {
            tokio::time::sleep(poll).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let a = Interrupt::new();
        let b = a.clone();
        assert!(!b.is_triggered());
        a.trigger();
        assert!(b.is_triggered());
        a.trigger();
        assert!(b.is_triggered());
    }

    #[tokio::test]
    async fn test_wait_returns_after_trigger() {
        let interrupt = Interrupt::new();
        let trigger = interrupt.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            trigger.trigger();
        });

        tokio::time::timeout(
            Duration::from_secs(2),
            interrupt.wait(Duration::from_millis(5)),
        )
        .await
        .expect("wait should observe the trigger");
    }

    #[tokio::test]
    async fn test_wait_on_triggered_token_is_immediate() {
        let interrupt = Interrupt::new();
        interrupt.trigger();
        tokio::time::timeout(
            Duration::from_millis(50),
            interrupt.wait(Duration::from_secs(10)),
        )
        .await
        .unwrap();
    }
}

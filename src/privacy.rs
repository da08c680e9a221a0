use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

/// Private browsing state as reported by the browser.
#[async_trait]
pub trait PrivacyGate: Send + Sync {
    /// true while any private browsing window is open
    async fn private_browsing_active(&self) -> bool;

    /// true when the browser always starts in private browsing mode
    async fn permanent_private_browsing(&self) -> bool;
}

/// Flags pushed by the browser shim.
#[derive(Debug, Default)]
pub struct PrivacyFlags {
    private_window_open: AtomicBool,
    permanent: AtomicBool,
}

impl PrivacyFlags {
    pub fn new(permanent: bool) -> Self {
        Self {
            private_window_open: AtomicBool::new(false),
            permanent: AtomicBool::new(permanent),
        }
    }

    pub fn set_private_window_open(&self, open: bool) {
        self.private_window_open.store(open, Ordering::SeqCst);
    }

    pub fn set_permanent(&self, permanent: bool) {
        self.permanent.store(permanent, Ordering::SeqCst);
    }
}

#[async_trait]
impl PrivacyGate for PrivacyFlags {
    async fn private_browsing_active(&self) -> bool {
        self.permanent.load(Ordering::SeqCst) || self.private_window_open.load(Ordering::SeqCst)
    }

    async fn permanent_private_browsing(&self) -> bool {
        self.permanent.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn permanent_mode_implies_active() {
        let flags = PrivacyFlags::new(true);
        assert!(flags.private_browsing_active().await);
        assert!(flags.permanent_private_browsing().await);
    }

    #[tokio::test]
    async fn window_flag_toggles() {
        let flags = PrivacyFlags::default();
        assert!(!flags.private_browsing_active().await);
        flags.set_private_window_open(true);
        assert!(flags.private_browsing_active().await);
        assert!(!flags.permanent_private_browsing().await);
        flags.set_private_window_open(false);
        assert!(!flags.private_browsing_active().await);
    }
}

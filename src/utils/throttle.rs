use async_trait::async_trait;
use std::time::Duration;

/// Politeness policy applied between outbound requests.
#[async_trait]
pub trait Throttle: Send + Sync {
    /// Called after each search page has been scraped.
    async fn after_page(&self);

    /// Called after each card has been processed.
    async fn after_card(&self);
}

/// Fixed pauses, slept on the tokio timer.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay {
    pub page: Duration,
    pub card: Duration,
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self {
            page: Duration::from_secs(1),
            card: Duration::from_millis(500),
        }
    }
}

#[async_trait]
impl Throttle for FixedDelay {
    async fn after_page(&self) {
        if !self.page.is_zero() {
            tokio::time::sleep(self.page).await;
        }
    }

    async fn after_card(&self) {
        if !self.card.is_zero() {
            tokio::time::sleep(self.card).await;
        }
    }
}

/// No waiting at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

#[async_trait]
impl Throttle for NoDelay {
    async fn after_page(&self) {}

    async fn after_card(&self) {}
}

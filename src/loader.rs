//! Reference-counted busy indicator.
//!
//! Every `show` increments the count and schedules a matching `hide` after
//! the display duration, so the indicator stays up for at least that long
//! and until every overlapping operation has finished.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::LOADER_MIN_DISPLAY;

#[derive(Clone)]
pub struct LoaderService {
    count: Arc<AtomicUsize>,
    min_display: Duration,
}

impl Default for LoaderService {
    fn default() -> Self {
        Self::new()
    }
}

impl LoaderService {
    pub fn new() -> Self {
        Self::with_min_display(LOADER_MIN_DISPLAY)
    }

    pub fn with_min_display(min_display: Duration) -> Self {
        Self {
            count: Arc::new(AtomicUsize::new(0)),
            min_display,
        }
    }

    /// Show for the default minimum display time.
    pub fn show(&self) {
        self.show_for(self.min_display);
    }

    /// Show and schedule a hide after `duration`. Requires a tokio runtime.
    pub fn show_for(&self, duration: Duration) {
        self.count.fetch_add(1, Ordering::SeqCst);
        let loader = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            loader.hide();
        });
    }

    /// Decrement, never below zero.
    pub fn hide(&self) {
        let _ = self
            .count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| Some(c.saturating_sub(1)));
    }

    pub fn force_hide(&self) {
        self.count.store(0, Ordering::SeqCst);
    }

    pub fn is_loading(&self) -> bool {
        self.count.load(Ordering::SeqCst) > 0
    }

    pub fn active_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Show while `operation` runs; the minimum display time still applies.
    pub async fn wrap<F: Future>(&self, operation: F) -> F::Output {
        self.show();
        operation.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn show_hides_after_duration() {
        let loader = LoaderService::new();
        loader.show();
        assert!(loader.is_loading());
        tokio::time::sleep(Duration::from_millis(999)).await;
        assert!(loader.is_loading());
        tokio::time::sleep(Duration::from_millis(2)).await;
        tokio::task::yield_now().await;
        assert!(!loader.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_shows_keep_visible() {
        let loader = LoaderService::new();
        loader.show_for(Duration::from_millis(100));
        loader.show_for(Duration::from_millis(500));
        assert_eq!(loader.active_count(), 2);
        tokio::time::sleep(Duration::from_millis(200)).await;
        tokio::task::yield_now().await;
        assert!(loader.is_loading());
        tokio::time::sleep(Duration::from_millis(400)).await;
        tokio::task::yield_now().await;
        assert!(!loader.is_loading());
    }

    #[tokio::test]
    async fn hide_never_goes_negative() {
        let loader = LoaderService::new();
        loader.hide();
        loader.hide();
        assert_eq!(loader.active_count(), 0);
    }

    #[tokio::test]
    async fn force_hide_zeroes_count() {
        let loader = LoaderService::new();
        loader.show();
        loader.show();
        loader.force_hide();
        assert!(!loader.is_loading());
    }
}

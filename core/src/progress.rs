//! Per-page progress reporting for collection listings.

/// Notified after each page of a paginated listing has been fetched.
pub trait ProgressReporter: Send + Sync {
    /// `page` is 1-based; `total` is the page count known so far.
    fn on_page(&self, collection: &str, page: u32, total: u32);
}

/// Logs one `info` event per page.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressReporter for TracingProgress {
    fn on_page(&self, collection: &str, page: u32, total: u32) {
        tracing::info!(collection, page, total, "Getting bagel pages");
    }
}

impl<F> ProgressReporter for F
where
    F: Fn(&str, u32, u32) + Send + Sync,
{
    fn on_page(&self, collection: &str, page: u32, total: u32) {
        self(collection, page, total)
    }
}

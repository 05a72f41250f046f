//! Progress callbacks for long-running loads and expansions

/// Receives progress events from the executor and the expander.
///
/// Every method has a no-op default so implementors only override what
/// they display.
pub trait ProgressSink: Send + Sync {
    /// A unit of work with `total` steps has started
    fn start(&self, _label: &str, _total: u64) {}

    /// One step finished
    fn advance(&self, _message: &str) {}

    /// A step was skipped or failed
    fn warn(&self, _message: &str) {}

    /// The unit of work finished
    fn finish(&self, _message: &str) {}
}

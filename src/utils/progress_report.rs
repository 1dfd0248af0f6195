//! Progress reporting for long-running exports.
//!
//! A cache can hold tens of thousands of entries. The exporter calls a reporter at regular
//! intervals so callers can show progress or cancel.
//!
//! # Examples
//!
//! ```
//! use webcache::utils::progress_report::{ProgressState, ProgressReportFn};
//!
//! fn my_reporter(state: &mut ProgressState) -> bool {
//!     println!("Progress: {}/{}", state.current, state.total);
//!     false // Return true to cancel the operation
//! }
//!
//! let mut progress = ProgressState::new("export", 100, 10, Some(my_reporter));
//! for i in 0..100 {
//!     if progress.report(i) {
//!         break;
//!     }
//! }
//! ```

/// Function type for progress reporting callbacks.
///
/// Returns `true` to cancel the operation.
pub type ProgressReportFn = fn(&mut ProgressState) -> bool;

/// State information for progress reporting.
pub struct ProgressState {
    /// Identifier for this progress state (e.g., "export")
    pub state_id: String,
    /// Expected number of items, an estimate when walking lazily
    pub total: u64,
    /// Current item being processed
    pub current: u64,
    /// Last item at which progress was reported
    pub last: u64,
    /// Number of items between progress reports
    pub report_interval: u64,
    pub reporter: Option<ProgressReportFn>,
}

impl ProgressState {
    /// Creates a new progress state reporting every `report_interval_percent` of `total`.
    pub fn new(state_id: &str, total: u64, report_interval_percent: u64, reporter: Option<ProgressReportFn>) -> Self {
        Self {
            state_id: state_id.to_string(),
            total,
            current: 0,
            last: 0,
            report_interval: (total * report_interval_percent / 100).max(1),
            reporter,
        }
    }

    /// Reports progress for item `current`.
    ///
    /// Returns `true` if the operation should be cancelled.
    pub fn report(&mut self, current: u64) -> bool {
        let Some(reporter) = self.reporter else {
            return false;
        };
        let is_last = self.total > 0 && current + 1 == self.total;
        if current.saturating_sub(self.last) >= self.report_interval || is_last {
            self.current = current;
            let cancelled = reporter(self);
            self.last = current;
            return cancelled;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cancel_at_half(state: &mut ProgressState) -> bool {
        state.current * 2 >= state.total
    }

    #[test]
    fn test_report_cancels() {
        let mut progress = ProgressState::new("test", 100, 10, Some(cancel_at_half));
        let stopped_at = (0..100).find(|&i| progress.report(i));
        assert_eq!(stopped_at, Some(50));
    }

    #[test]
    fn test_zero_total_never_panics() {
        let mut progress = ProgressState::new("test", 0, 10, Some(cancel_at_half));
        assert!(!progress.report(0));
        assert!(progress.report(1));
        let mut silent = ProgressState::new("test", 0, 10, None);
        assert!(!silent.report(5));
    }
}

//! Copy progress reporting.

/// Progress of the copy phase, reported after each record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackProgress {
    /// Records copied so far.
    pub records_done: usize,
    /// Records to copy in total.
    pub records_total: usize,
    /// Node owning the record just copied.
    pub node_name: String,
    pub bytes_copied: u64,
    pub bytes_total: u64,
}

impl PackProgress {
    /// Completed fraction in percent.
    pub fn percent(&self) -> f64 {
        if self.bytes_total == 0 {
            return if self.records_total == 0 {
                100.0
            } else {
                self.records_done as f64 / self.records_total as f64 * 100.0
            };
        }
        self.bytes_copied as f64 / self.bytes_total as f64 * 100.0
    }
}

/// Receives copy progress.
pub trait ProgressCallback {
    /// Called after each copied record.
    ///
    /// # Returns
    /// - `true` to continue
    /// - `false` to stop before the next record
    fn on_progress(&self, progress: &PackProgress) -> bool;
}

impl<F> ProgressCallback for F
where
    F: Fn(&PackProgress) -> bool,
{
    fn on_progress(&self, progress: &PackProgress) -> bool {
        self(progress)
    }
}

/// A progress callback that always continues.
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_progress(&self, _progress: &PackProgress) -> bool {
        true
    }
}

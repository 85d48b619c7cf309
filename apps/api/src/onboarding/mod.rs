//! Onboarding documents for hired candidates.

use serde::Serialize;

use crate::models::onboarding::DocStatus;

pub mod handlers;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub total: usize,
    pub approved: usize,
    pub submitted: usize,
    pub pending: usize,
    pub rejected: usize,
    pub complete: bool,
}

pub fn summarize(statuses: impl IntoIterator<Item = DocStatus>) -> Progress {
    let mut progress = Progress::default();
    for status in statuses {
        progress.total += 1;
        match status {
            DocStatus::Approved => progress.approved += 1,
            DocStatus::Submitted => progress.submitted += 1,
            DocStatus::Pending => progress.pending += 1,
            DocStatus::Rejected => progress.rejected += 1,
        }
    }
    progress.complete = progress.total > 0 && progress.approved == progress.total;
    progress
}

/// Statuses from which the candidate may (re)upload.
pub fn accepts_upload(status: DocStatus) -> bool {
    matches!(status, DocStatus::Pending | DocStatus::Rejected)
}

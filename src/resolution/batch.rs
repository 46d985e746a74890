use super::dispatcher::Resolver;
use super::{NotificationMode, Notice, SolutionRequest, notice};
use crate::error::BatchError;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Totals of a batch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub success: usize,
    pub errors: usize,
    /// Resolved entries that stayed staged and need a reset
    pub still_staged: usize,
}

impl BatchSummary {
    /// Notices summarizing the run; nothing when nothing was staged
    pub fn notices(&self) -> Vec<Notice> {
        let mut notices = Vec::new();
        if self.success > 0 {
            notices.push(
                Notice::success(notice::MULTIPLE_SUGGESTIONS_RESOLVED).with_count(self.success),
            );
        }
        if self.errors > 0 {
            notices.push(
                Notice::error(notice::UNABLE_TO_RESOLVE_MULTIPLE_SOLUTIONS).with_count(self.errors),
            );
        }
        if self.still_staged > 0 {
            notices.push(
                Notice::error(notice::RESOLVED_SOLUTION_IS_STILL_STAGED)
                    .with_count(self.still_staged),
            );
        }
        notices
    }
}

impl Resolver {
    /// Resolve every entry staged for the project.
    ///
    /// Works on a snapshot taken up front; entries staged meanwhile wait for
    /// the next run. Individual failures are counted and never stop the run.
    pub async fn resolve_all(&self, cancel: &CancellationToken) -> Result<BatchSummary, BatchError> {
        let entries = self.staged()?;
        let mut summary = BatchSummary::default();

        for entry in entries {
            let outcome = self
                .resolve(SolutionRequest::from(entry), NotificationMode::Quiet, cancel)
                .await?;

            if outcome.success {
                summary.success += 1;
                if outcome.still_staged.is_some() {
                    summary.still_staged += 1;
                }
            } else {
                summary.errors += 1;
            }
        }

        info!(
            project = %self.project.id,
            resolved = summary.success,
            failed = summary.errors,
            still_staged = summary.still_staged,
            "Staged solutions resolved"
        );
        Ok(summary)
    }
}

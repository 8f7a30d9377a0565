use crate::model::{JobId, JobState, JobSummary, RepoStatus};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Narrow publish capability the engine emits through. Implementations
/// fan events out to whoever is watching the job; publishing must never
/// block the engine.
pub trait ProgressSink: Send + Sync {
    fn publish(&self, job_id: &JobId, event: ProgressEvent);
}

/// One progress event, scoped to a job id by the sink. `Finished` and
/// `Error` are mutually exclusive terminals; exactly one ends a job.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressEvent {
    Progress {
        repo: String,
        current: usize,
        total: usize,
        status: RepoStatus,
        message: String,
        timestamp: String,
    },
    Status {
        status: JobState,
        message: String,
        timestamp: String,
    },
    Summary {
        current: usize,
        total: usize,
        success: usize,
        failed: usize,
        skipped: usize,
        percentage: u8,
        timestamp: String,
    },
    Finished {
        total: usize,
        success: usize,
        failed: usize,
        skipped: usize,
        message: String,
    },
    Error {
        message: String,
        error: String,
    },
}

impl ProgressEvent {
    pub fn progress(
        repo: &str,
        current: usize,
        total: usize,
        status: RepoStatus,
        message: impl Into<String>,
    ) -> Self {
        ProgressEvent::Progress {
            repo: repo.to_string(),
            current,
            total,
            status,
            message: message.into(),
            timestamp: now_timestamp(),
        }
    }

    pub fn status(status: JobState, message: impl Into<String>) -> Self {
        ProgressEvent::Status {
            status,
            message: message.into(),
            timestamp: now_timestamp(),
        }
    }

    pub fn summary(summary: JobSummary) -> Self {
        ProgressEvent::Summary {
            current: summary.current,
            total: summary.total,
            success: summary.success,
            failed: summary.failed,
            skipped: summary.skipped,
            percentage: summary.percentage(),
            timestamp: now_timestamp(),
        }
    }

    pub fn finished(summary: JobSummary, message: impl Into<String>) -> Self {
        ProgressEvent::Finished {
            total: summary.total,
            success: summary.success,
            failed: summary.failed,
            skipped: summary.skipped,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>, error: impl ToString) -> Self {
        ProgressEvent::Error {
            message: message.into(),
            error: error.to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Finished { .. } | ProgressEvent::Error { .. }
        )
    }
}

pub(crate) fn now_timestamp() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RepoOutcome;

    #[test]
    fn summary_event_carries_percentage() {
        let mut summary = JobSummary::new(3);
        summary.record(RepoOutcome::Completed);
        let event = ProgressEvent::summary(summary);
        match event {
            ProgressEvent::Summary {
                current,
                total,
                percentage,
                ..
            } => {
                assert_eq!(current, 1);
                assert_eq!(total, 3);
                assert_eq!(percentage, 33);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn only_finished_and_error_are_terminal() {
        assert!(ProgressEvent::finished(JobSummary::new(0), "done").is_terminal());
        assert!(ProgressEvent::error("failed", "boom").is_terminal());
        assert!(!ProgressEvent::status(JobState::Started, "go").is_terminal());
        assert!(
            !ProgressEvent::progress("repo", 1, 2, RepoStatus::Cloning, "").is_terminal()
        );
    }

    #[test]
    fn events_serialize_with_kind_tag() {
        let event = ProgressEvent::progress("repo", 1, 3, RepoStatus::Pushing, "pushing to target");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["kind"], "progress");
        assert_eq!(value["repo"], "repo");
        assert_eq!(value["status"], "pushing");

        let status = ProgressEvent::status(JobState::Started, "synchronization started");
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["status"], "STARTED");
    }
}

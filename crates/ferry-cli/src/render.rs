use ferry_core::events::ProgressEvent;
use tokio::sync::broadcast;
use tracing::warn;

/// Print one job's progress stream until its terminal event. Returns
/// false when the job ended in an error.
pub async fn render_events(mut events: broadcast::Receiver<ProgressEvent>) -> bool {
    loop {
        match events.recv().await {
            Ok(event) => {
                println!("{}", format_event(&event));
                match event {
                    ProgressEvent::Finished { .. } => return true,
                    ProgressEvent::Error { .. } => return false,
                    _ => {}
                }
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "progress stream lagged");
            }
            Err(broadcast::error::RecvError::Closed) => {
                warn!("progress stream closed before the job finished");
                return false;
            }
        }
    }
}

fn format_event(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::Progress {
            repo,
            current,
            total,
            status,
            message,
            ..
        } => {
            if message.is_empty() {
                format!("[{current}/{total}] {repo}: {}", status.as_str())
            } else {
                format!("[{current}/{total}] {repo}: {} - {message}", status.as_str())
            }
        }
        ProgressEvent::Status {
            status, message, ..
        } => format!("== {} - {message}", status.as_str()),
        ProgressEvent::Summary {
            current,
            total,
            success,
            failed,
            skipped,
            percentage,
            ..
        } => format!(
            "-- {current}/{total} ({percentage}%) ok={success} failed={failed} skipped={skipped}"
        ),
        ProgressEvent::Finished {
            total,
            success,
            failed,
            skipped,
            ..
        } => format!("done: total={total} success={success} failed={failed} skipped={skipped}"),
        ProgressEvent::Error { message, error } => format!("error: {message} - {error}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::model::{JobState, JobSummary, RepoOutcome, RepoStatus};

    #[test]
    fn progress_lines_show_position_and_status() {
        let event = ProgressEvent::progress("repo", 2, 5, RepoStatus::Pushing, "pushing to target");
        assert_eq!(format_event(&event), "[2/5] repo: pushing - pushing to target");

        let bare = ProgressEvent::progress("repo", 5, 5, RepoStatus::Completed, "");
        assert_eq!(format_event(&bare), "[5/5] repo: completed");
    }

    #[test]
    fn summary_line_shows_percentage() {
        let mut summary = JobSummary::new(3);
        summary.record(RepoOutcome::Skipped);
        let event = ProgressEvent::summary(summary);
        assert_eq!(format_event(&event), "-- 1/3 (33%) ok=0 failed=0 skipped=1");
    }

    #[test]
    fn terminal_lines_are_distinct() {
        let finished = ProgressEvent::finished(JobSummary::new(0), "done");
        assert!(format_event(&finished).starts_with("done:"));
        let error = ProgressEvent::error("synchronization failed", "boom");
        assert_eq!(format_event(&error), "error: synchronization failed - boom");
        let status = ProgressEvent::status(JobState::Started, "synchronization started");
        assert_eq!(format_event(&status), "== STARTED - synchronization started");
    }
}

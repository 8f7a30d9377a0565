use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Opaque bearer token for a hosting account. The secret never appears in
/// Debug output, progress events, or log lines.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Immutable input to one synchronization job. A missing source credential
/// means anonymous access to public source repositories; the target always
/// needs a credential to create and push.
#[derive(Clone, Debug)]
pub struct SyncRequest {
    pub source_account: String,
    pub source_credential: Option<Credential>,
    pub target_account: String,
    pub target_credential: Credential,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize)]
pub struct JobId(String);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Started,
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Started => "STARTED",
            JobState::Running => "RUNNING",
            JobState::Completed => "COMPLETED",
            JobState::Failed => "FAILED",
        }
    }
}

/// What the engine decided to do with one repository.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyncAction {
    Skip,
    CreateAndPush,
    UpdateAndPush,
}

/// Per-repository status carried in progress events. A failed repository
/// keeps the status tag stable and carries its reason in the event message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoStatus {
    Processing,
    Cloning,
    Updating,
    Creating,
    Pushing,
    Skipped,
    Completed,
    Failed,
}

impl RepoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoStatus::Processing => "processing",
            RepoStatus::Cloning => "cloning",
            RepoStatus::Updating => "updating",
            RepoStatus::Creating => "creating",
            RepoStatus::Pushing => "pushing",
            RepoStatus::Skipped => "skipped",
            RepoStatus::Completed => "completed",
            RepoStatus::Failed => "failed",
        }
    }
}

/// Terminal outcome of processing one repository.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RepoOutcome {
    Completed,
    Skipped,
    Failed,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RepoVisibility {
    Private,
    Public,
}

impl RepoVisibility {
    pub fn is_private(&self) -> bool {
        matches!(self, RepoVisibility::Private)
    }
}

/// Running counters for one job. Every repository outcome goes through
/// `record`, so `current == success + failed + skipped` at all times.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct JobSummary {
    pub current: usize,
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl JobSummary {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: RepoOutcome) {
        self.current += 1;
        match outcome {
            RepoOutcome::Completed => self.success += 1,
            RepoOutcome::Failed => self.failed += 1,
            RepoOutcome::Skipped => self.skipped += 1,
        }
    }

    pub fn percentage(&self) -> u8 {
        if self.total == 0 {
            0
        } else {
            (self.current * 100 / self.total) as u8
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.current == self.success + self.failed + self.skipped && self.current <= self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_debug_redacts_secret() {
        let credential = Credential::new("ghp_supersecret");
        let formatted = format!("{credential:?}");
        assert!(!formatted.contains("supersecret"));
        assert!(formatted.contains("***"));
    }

    #[test]
    fn summary_record_keeps_invariant() {
        let mut summary = JobSummary::new(3);
        summary.record(RepoOutcome::Skipped);
        summary.record(RepoOutcome::Completed);
        summary.record(RepoOutcome::Failed);
        assert!(summary.is_consistent());
        assert_eq!(summary.current, 3);
        assert_eq!(summary.success, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
    }

    #[test]
    fn percentage_floors_and_handles_empty() {
        let mut summary = JobSummary::new(3);
        assert_eq!(summary.percentage(), 0);
        summary.record(RepoOutcome::Completed);
        assert_eq!(summary.percentage(), 33);

        let empty = JobSummary::new(0);
        assert_eq!(empty.percentage(), 0);
    }

    #[test]
    fn job_ids_are_unique() {
        assert_ne!(JobId::new(), JobId::new());
    }
}

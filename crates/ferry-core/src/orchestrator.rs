use crate::decision::decide_action;
use crate::events::{ProgressEvent, ProgressSink};
use crate::hosting::HostingClient;
use crate::joblog::JobLog;
use crate::model::{
    Credential, JobId, JobState, JobSummary, RepoOutcome, RepoStatus, RepoVisibility, SyncAction,
    SyncRequest,
};
use crate::paths::mirror_path;
use crate::transport::MirrorTransport;
use anyhow::Context;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};

/// Cooperative cancellation, checked at each repository boundary. A
/// cancelled job aborts with a single error event.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Drives one job at a time: list both accounts, then per source
/// repository decide skip/create/update, run the mirror work, and stream
/// progress events. Repositories are processed strictly sequentially so
/// network and disk load stay bounded.
pub struct JobOrchestrator {
    hosting: Arc<dyn HostingClient>,
    transport: Arc<dyn MirrorTransport>,
    sink: Arc<dyn ProgressSink>,
    log: JobLog,
    work_root: PathBuf,
    visibility: RepoVisibility,
}

impl JobOrchestrator {
    pub fn new(
        hosting: Arc<dyn HostingClient>,
        transport: Arc<dyn MirrorTransport>,
        sink: Arc<dyn ProgressSink>,
        log: JobLog,
        work_root: PathBuf,
        visibility: RepoVisibility,
    ) -> Self {
        Self {
            hosting,
            transport,
            sink,
            log,
            work_root,
            visibility,
        }
    }

    /// Run one job to completion. Fire-and-forget: there is no return
    /// value; success and failure are observed through the sink alone.
    pub async fn run(&self, job_id: JobId, request: SyncRequest) {
        self.run_with_cancel(job_id, request, CancelFlag::new())
            .await;
    }

    pub async fn run_with_cancel(
        &self,
        job_id: JobId,
        request: SyncRequest,
        cancel: CancelFlag,
    ) {
        info!(
            job = %job_id,
            source = %request.source_account,
            target = %request.target_account,
            "job started"
        );
        if let Err(err) = self.execute(&job_id, &request, &cancel).await {
            let reason = format!("{err:#}");
            self.log
                .append(&format!("CRITICAL: job {job_id} failed - {reason}"));
            error!(job = %job_id, error = %reason, "job failed");
            self.sink
                .publish(&job_id, ProgressEvent::error("synchronization failed", reason));
        }
    }

    async fn execute(
        &self,
        job_id: &JobId,
        request: &SyncRequest,
        cancel: &CancelFlag,
    ) -> anyhow::Result<()> {
        self.log.append("INFO: initializing mirror synchronization");
        fs::create_dir_all(&self.work_root).context("create working directory")?;
        self.sink.publish(
            job_id,
            ProgressEvent::status(JobState::Started, "synchronization started"),
        );

        self.log.append(&format!(
            "INFO: listing repositories for source account {}",
            request.source_account
        ));
        let source_repos = self
            .hosting
            .list_owned_repos(&request.source_account, request.source_credential.as_ref())
            .await
            .context("list source repositories")?;
        self.log.append(&format!(
            "INFO: found {} repositories in source account",
            source_repos.len()
        ));

        self.log.append(&format!(
            "INFO: listing repositories for target account {}",
            request.target_account
        ));
        let target_repos = self
            .hosting
            .list_owned_repos(&request.target_account, Some(&request.target_credential))
            .await
            .context("list target repositories")?;
        self.log.append(&format!(
            "INFO: found {} repositories in target account",
            target_repos.len()
        ));
        let target_names: HashSet<String> = target_repos.into_iter().collect();

        let mut summary = JobSummary::new(source_repos.len());
        info!(
            job = %job_id,
            total = summary.total,
            "processing repositories"
        );

        for (index, repo) in source_repos.iter().enumerate() {
            if cancel.is_cancelled() {
                anyhow::bail!("job cancelled");
            }
            let current = index + 1;
            self.sink.publish(
                job_id,
                ProgressEvent::progress(repo, current, summary.total, RepoStatus::Processing, ""),
            );
            let exists_in_target = target_names.contains(repo);
            match self
                .sync_repo(job_id, request, repo, current, summary.total, exists_in_target)
                .await
            {
                Ok(outcome) => summary.record(outcome),
                Err(err) => {
                    let reason = format!("{err:#}");
                    summary.record(RepoOutcome::Failed);
                    self.log.append(&format!("FAILED: {repo} - {reason}"));
                    warn!(job = %job_id, repo = %repo, error = %reason, "repository sync failed");
                    self.sink.publish(
                        job_id,
                        ProgressEvent::progress(
                            repo,
                            current,
                            summary.total,
                            RepoStatus::Failed,
                            reason,
                        ),
                    );
                }
            }
            self.sink.publish(job_id, ProgressEvent::summary(summary));
        }

        let message = format!(
            "synchronization finished - {} succeeded, {} failed, {} skipped",
            summary.success, summary.failed, summary.skipped
        );
        self.log.append(&format!(
            "INFO: job completed. total: {}, success: {}, failed: {}, skipped: {}",
            summary.total, summary.success, summary.failed, summary.skipped
        ));
        info!(
            job = %job_id,
            total = summary.total,
            success = summary.success,
            failed = summary.failed,
            skipped = summary.skipped,
            "job completed"
        );
        self.sink.publish(
            job_id,
            ProgressEvent::status(JobState::Completed, message.as_str()),
        );
        self.sink
            .publish(job_id, ProgressEvent::finished(summary, message));
        Ok(())
    }

    async fn sync_repo(
        &self,
        job_id: &JobId,
        request: &SyncRequest,
        repo: &str,
        current: usize,
        total: usize,
        exists_in_target: bool,
    ) -> anyhow::Result<RepoOutcome> {
        let action = self.plan(request, repo, exists_in_target).await;
        if action == SyncAction::Skip {
            self.log.append(&format!("SKIPPED: {repo} - already up to date"));
            info!(job = %job_id, repo = %repo, "repository already up to date");
            self.sink.publish(
                job_id,
                ProgressEvent::progress(
                    repo,
                    current,
                    total,
                    RepoStatus::Skipped,
                    "already up to date",
                ),
            );
            return Ok(RepoOutcome::Skipped);
        }

        let mirror = mirror_path(&self.work_root, repo);
        if self.transport.has_local_mirror(&mirror).await? {
            self.sink.publish(
                job_id,
                ProgressEvent::progress(
                    repo,
                    current,
                    total,
                    RepoStatus::Updating,
                    "updating local mirror",
                ),
            );
            self.log.append(&format!("DEBUG: updating local mirror for {repo}"));
            self.transport
                .update_mirror(&mirror, request.source_credential.as_ref())
                .await?;
        } else {
            self.sink.publish(
                job_id,
                ProgressEvent::progress(
                    repo,
                    current,
                    total,
                    RepoStatus::Cloning,
                    "cloning from source",
                ),
            );
            self.log.append(&format!("DEBUG: cloning {repo} from source"));
            let source_url = self.hosting.clone_url(&request.source_account, repo);
            self.transport
                .clone_mirror(&source_url, &mirror, request.source_credential.as_ref())
                .await?;
        }

        if action == SyncAction::CreateAndPush {
            self.sink.publish(
                job_id,
                ProgressEvent::progress(
                    repo,
                    current,
                    total,
                    RepoStatus::Creating,
                    "creating repository in target",
                ),
            );
            self.log
                .append(&format!("DEBUG: creating {repo} in target account"));
            self.hosting
                .create_repo(
                    &request.target_account,
                    repo,
                    &request.target_credential,
                    self.visibility,
                )
                .await?;
        }

        self.sink.publish(
            job_id,
            ProgressEvent::progress(repo, current, total, RepoStatus::Pushing, "pushing to target"),
        );
        self.log.append(&format!("DEBUG: pushing {repo} to target"));
        let target_url = self.hosting.clone_url(&request.target_account, repo);
        self.transport
            .push_mirror(&mirror, &target_url, &request.target_credential)
            .await?;

        self.log.append(&format!("SUCCESS: {repo}"));
        self.sink.publish(
            job_id,
            ProgressEvent::progress(repo, current, total, RepoStatus::Completed, ""),
        );
        Ok(RepoOutcome::Completed)
    }

    /// Decide the action for one repository. Commit lookups only happen
    /// when the repository already exists in the target, and any lookup
    /// failure degrades to absent, which routes to update-and-push.
    async fn plan(&self, request: &SyncRequest, repo: &str, exists_in_target: bool) -> SyncAction {
        if !exists_in_target {
            self.log.append(&format!("INFO: new repository {repo}"));
            return SyncAction::CreateAndPush;
        }
        let source_commit = self
            .latest_commit_or_absent(
                &request.source_account,
                repo,
                request.source_credential.as_ref(),
            )
            .await;
        let target_commit = self
            .latest_commit_or_absent(&request.target_account, repo, Some(&request.target_credential))
            .await;
        let action = decide_action(true, source_commit.as_deref(), target_commit.as_deref());
        if action == SyncAction::UpdateAndPush {
            self.log.append(&format!(
                "UPDATING: {repo} - source: {}, target: {}",
                short_commit(&source_commit),
                short_commit(&target_commit)
            ));
        }
        action
    }

    async fn latest_commit_or_absent(
        &self,
        account: &str,
        repo: &str,
        credential: Option<&Credential>,
    ) -> Option<String> {
        match self.hosting.latest_commit(account, repo, credential).await {
            Ok(commit) => commit,
            Err(err) => {
                warn!(account = %account, repo = %repo, error = %err, "latest commit unavailable");
                None
            }
        }
    }
}

fn short_commit(commit: &Option<String>) -> &str {
    commit
        .as_deref()
        .map(|id| &id[..id.len().min(7)])
        .unwrap_or("unknown")
}

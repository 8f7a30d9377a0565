use ferry_core::bus::ProgressBus;
use ferry_core::events::ProgressEvent;
use ferry_core::model::{JobId, SyncRequest};
use ferry_core::orchestrator::{CancelFlag, JobOrchestrator};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

pub struct StartedJob {
    pub job_id: JobId,
    pub events: broadcast::Receiver<ProgressEvent>,
    pub cancel: CancelFlag,
}

/// Fire-and-forget job intake: the caller gets back an id, an event
/// stream, and a cancel handle; the job itself runs detached on the
/// runtime and reports only through the bus.
pub struct JobRunner {
    orchestrator: Arc<JobOrchestrator>,
    bus: Arc<ProgressBus>,
}

impl JobRunner {
    pub fn new(orchestrator: Arc<JobOrchestrator>, bus: Arc<ProgressBus>) -> Self {
        Self { orchestrator, bus }
    }

    pub fn start(&self, request: SyncRequest) -> StartedJob {
        let job_id = JobId::new();
        // Subscribe before spawning so the first event cannot be missed.
        let events = self.bus.subscribe(&job_id);
        let cancel = CancelFlag::new();
        let orchestrator = Arc::clone(&self.orchestrator);
        let id = job_id.clone();
        let flag = cancel.clone();
        tokio::spawn(async move {
            orchestrator.run_with_cancel(id, request, flag).await;
        });
        info!(job = %job_id, "job submitted");
        StartedJob {
            job_id,
            events,
            cancel,
        }
    }
}

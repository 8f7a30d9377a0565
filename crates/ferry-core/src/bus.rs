use crate::events::{ProgressEvent, ProgressSink};
use crate::model::JobId;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out of progress events: one broadcast channel per job,
/// created on first subscribe or publish and dropped after the terminal
/// event. Slow subscribers lag; they never block the publisher.
pub struct ProgressBus {
    jobs: Mutex<HashMap<JobId, broadcast::Sender<ProgressEvent>>>,
    capacity: usize,
}

impl ProgressBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    pub fn subscribe(&self, job_id: &JobId) -> broadcast::Receiver<ProgressEvent> {
        let mut jobs = self.jobs.lock().unwrap();
        jobs.entry(job_id.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ProgressBus {
    fn publish(&self, job_id: &JobId, event: ProgressEvent) {
        let terminal = event.is_terminal();
        let mut jobs = self.jobs.lock().unwrap();
        let sender = jobs
            .entry(job_id.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        // Send fails only when nobody is subscribed, which is fine.
        let _ = sender.send(event);
        if terminal {
            jobs.remove(job_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{JobState, JobSummary};

    #[tokio::test]
    async fn delivers_to_every_subscriber() {
        let bus = ProgressBus::new();
        let job = JobId::new();
        let mut first = bus.subscribe(&job);
        let mut second = bus.subscribe(&job);

        bus.publish(&job, ProgressEvent::status(JobState::Started, "go"));

        for receiver in [&mut first, &mut second] {
            match receiver.recv().await.unwrap() {
                ProgressEvent::Status { status, .. } => assert_eq!(status, JobState::Started),
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn jobs_are_isolated() {
        let bus = ProgressBus::new();
        let job_a = JobId::new();
        let job_b = JobId::new();
        let mut watcher_b = bus.subscribe(&job_b);

        bus.publish(&job_a, ProgressEvent::status(JobState::Started, "go"));
        bus.publish(&job_b, ProgressEvent::finished(JobSummary::new(0), "done"));

        match watcher_b.recv().await.unwrap() {
            ProgressEvent::Finished { .. } => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn terminal_event_drops_channel() {
        let bus = ProgressBus::new();
        let job = JobId::new();
        let mut watcher = bus.subscribe(&job);

        bus.publish(&job, ProgressEvent::finished(JobSummary::new(0), "done"));
        assert!(bus.jobs.lock().unwrap().is_empty());

        // The subscriber still drains the terminal event, then sees Closed.
        assert!(matches!(
            watcher.recv().await,
            Ok(ProgressEvent::Finished { .. })
        ));
        assert!(watcher.recv().await.is_err());
    }
}

use std::collections::HashMap;
use tauri::async_runtime::JoinHandle;

/// In-flight favicon fetches, one per record id.
#[derive(Default)]
pub struct IconJobs {
    jobs: HashMap<String, JoinHandle<()>>,
}

impl IconJobs {
    pub fn track(&mut self, record_id: &str, handle: JoinHandle<()>) {
        if let Some(previous) = self.jobs.insert(record_id.to_string(), handle) {
            previous.abort();
        }
    }

    /// Called once a job has delivered its result.
    pub fn finish(&mut self, record_id: &str) {
        self.jobs.remove(record_id);
    }

    /// Aborts the job for a record that is going away. Returns whether one was
    /// still running.
    pub fn cancel(&mut self, record_id: &str) -> bool {
        match self.jobs.remove(record_id) {
            Some(handle) => {
                handle.abort();
                log::debug!("cancelled favicon fetch for record {}", record_id);
                true
            }
            None => false,
        }
    }

    pub fn is_tracking(&self, record_id: &str) -> bool {
        self.jobs.contains_key(record_id)
    }

    pub fn cancel_all(&mut self) {
        for (_, handle) in self.jobs.drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::{self, RecvTimeoutError};
    use std::time::Duration;

    fn pending_job() -> JoinHandle<()> {
        tauri::async_runtime::spawn(std::future::pending::<()>())
    }

    #[test]
    fn cancel_aborts_tracked_job() {
        let mut jobs = IconJobs::default();
        jobs.track("a", pending_job());
        assert!(jobs.is_tracking("a"));
        assert!(jobs.cancel("a"));
        assert!(!jobs.is_tracking("a"));
        assert!(!jobs.cancel("a"));
    }

    #[test]
    fn finish_forgets_without_aborting() {
        let mut jobs = IconJobs::default();
        let handle = tauri::async_runtime::spawn(async {});
        jobs.track("a", handle);
        jobs.finish("a");
        assert!(!jobs.is_tracking("a"));
    }

    #[test]
    fn cancel_all_clears_every_job() {
        let mut jobs = IconJobs::default();
        jobs.track("a", pending_job());
        jobs.track("b", pending_job());
        jobs.cancel_all();
        assert!(!jobs.is_tracking("a"));
        assert!(!jobs.is_tracking("b"));
    }

    #[test]
    fn retracking_drops_the_previous_job() {
        let (sender, receiver) = mpsc::channel::<()>();
        let mut jobs = IconJobs::default();
        jobs.track(
            "a",
            tauri::async_runtime::spawn(async move {
                std::future::pending::<()>().await;
                let _ = sender.send(());
            }),
        );
        jobs.track("a", pending_job());
        jobs.cancel("a");
        assert_eq!(
            receiver.recv_timeout(Duration::from_secs(5)),
            Err(RecvTimeoutError::Disconnected)
        );
    }
}

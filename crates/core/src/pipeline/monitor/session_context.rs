use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::pipeline::monitor::monitor_worker::WorkerReport;

/// Who a capture belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionIds {
    pub session_id: String,
    pub user_id: String,
}

/// Everything owned by one active monitoring session.
///
/// Built by `MonitorService::start`, consumed by `MonitorService::stop`.
pub struct SessionContext {
    pub ids: SessionIds,
    cancelled: Arc<AtomicBool>,
    worker: Option<JoinHandle<WorkerReport>>,
}

impl SessionContext {
    pub fn new(
        ids: SessionIds,
        cancelled: Arc<AtomicBool>,
        worker: JoinHandle<WorkerReport>,
    ) -> Self {
        Self {
            ids,
            cancelled,
            worker: Some(worker),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Whether the monitor loop has exited on its own (e.g. camera unplugged).
    pub fn worker_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, |w| w.is_finished())
    }

    /// Cancels the loop and waits for it. `None` if the worker panicked.
    pub fn shutdown(mut self) -> Option<WorkerReport> {
        self.cancel();
        let worker = self.worker.take()?;
        match worker.join() {
            Ok(report) => Some(report),
            Err(_) => {
                log::error!("Monitor worker for session {} panicked", self.ids.session_id);
                None
            }
        }
    }
}

impl Drop for SessionContext {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> SessionIds {
        SessionIds {
            session_id: "s1".into(),
            user_id: "u1".into(),
        }
    }

    #[test]
    fn test_shutdown_cancels_and_joins() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let worker = std::thread::spawn(move || {
            while !flag.load(Ordering::Relaxed) {
                std::thread::yield_now();
            }
            WorkerReport {
                frames: 3,
                ..Default::default()
            }
        });
        let context = SessionContext::new(ids(), cancelled.clone(), worker);
        let report = context.shutdown().unwrap();
        assert_eq!(report.frames, 3);
        assert!(cancelled.load(Ordering::Relaxed));
    }

    #[test]
    fn test_panicked_worker_reports_none() {
        let worker = std::thread::spawn(|| -> WorkerReport { panic!("boom") });
        let context = SessionContext::new(ids(), Arc::new(AtomicBool::new(false)), worker);
        assert!(context.shutdown().is_none());
    }

    #[test]
    fn test_drop_sets_cancel_flag() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let worker = std::thread::spawn(WorkerReport::default);
        drop(SessionContext::new(ids(), cancelled.clone(), worker));
        assert!(cancelled.load(Ordering::Relaxed));
    }
}

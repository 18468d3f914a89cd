use std::sync::Arc;

use tokio::sync::watch;

use headwatch_core::pipeline::detect_image_use_case::DetectImageUseCase;
use headwatch_core::pipeline::monitor::monitor_service::MonitorService;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<MonitorService>,
    pub detect: DetectImageUseCase,
    /// Inference device reported by `/health`.
    pub device: &'static str,
    /// Flips to `true` on server shutdown so open preview streams end.
    pub shutdown: watch::Receiver<bool>,
}

impl AppState {
    pub fn new(
        monitor: Arc<MonitorService>,
        device: &'static str,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let detect = DetectImageUseCase::new(monitor.codec(), monitor.analyzer());
        Self {
            monitor,
            detect,
            device,
            shutdown,
        }
    }
}

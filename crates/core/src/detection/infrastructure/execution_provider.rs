use std::path::Path;

use ort::execution_providers::ExecutionProviderDispatch;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;

#[cfg(target_os = "macos")]
const DEVICE: &str = "coreml";
#[cfg(target_os = "windows")]
const DEVICE: &str = "directml";
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const DEVICE: &str = "cpu";

/// Name of the inference device reported to clients.
pub fn device_name() -> &'static str {
    DEVICE
}

/// Platform accelerator, if any. ONNX Runtime falls back to CPU on its own
/// when the provider can't be registered.
fn accelerators() -> Vec<ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    return vec![ort::execution_providers::CoreMLExecutionProvider::default().build()];
    #[cfg(target_os = "windows")]
    return vec![ort::execution_providers::DirectMLExecutionProvider::default().build()];
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    Vec::new()
}

/// Opens an inference session on the platform accelerator, using every core.
pub fn build_session(model_path: &Path) -> Result<Session, Box<dyn std::error::Error>> {
    let threads = std::thread::available_parallelism().map_or(1, |n| n.get());
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(threads)?
        .with_execution_providers(accelerators())?
        .commit_from_file(model_path)?;
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_name_is_known() {
        assert!(["cpu", "coreml", "directml"].contains(&device_name()));
    }

    #[test]
    fn test_accelerators_match_device() {
        assert_eq!(accelerators().is_empty(), device_name() == "cpu");
    }
}

mod api_error;
mod app_state;
mod routes;

use std::path::PathBuf;
use std::process;
use std::sync::{Arc, Mutex};

use clap::{Parser, ValueEnum};
use tokio::sync::watch;

use headwatch_core::detection::infrastructure::execution_provider::device_name;
use headwatch_core::detection::infrastructure::onnx_pose_estimator::OnnxPoseEstimator;
use headwatch_core::detection::infrastructure::onnx_yolo_detector::OnnxYoloDetector;
use headwatch_core::orientation::domain::direction_classifier::DirectionClassifier;
use headwatch_core::pipeline::detect_image_use_case::SharedAnalyzer;
use headwatch_core::pipeline::frame_analyzer::FrameAnalyzer;
use headwatch_core::pipeline::monitor::monitor_service::{MonitorService, SourceFactory};
use headwatch_core::session::domain::session_store::SessionStore;
use headwatch_core::session::infrastructure::file_session_store::FileSessionStore;
use headwatch_core::session::infrastructure::supabase_session_store::{
    SupabaseConfig, SupabaseSessionStore,
};
use headwatch_core::shared::constants::{FACE_MODEL_NAME, POSE_MODEL_NAME};
use headwatch_core::shared::model_resolver::{self, ModelSource};
use headwatch_core::shared::monitor_config::MonitorConfig;
use headwatch_core::video::domain::frame_source::FrameSource;
use headwatch_core::video::infrastructure::ffmpeg_camera_source::FfmpegCameraSource;
use headwatch_core::video::infrastructure::image_crate_codec::ImageCrateCodec;

use crate::app_state::AppState;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    /// Session documents and PNG captures under --data-dir.
    File,
    /// Supabase project from SUPABASE_URL / SUPABASE_ANON_KEY.
    Supabase,
}

/// Head orientation monitoring service.
#[derive(Parser)]
#[command(name = "headwatch")]
struct Cli {
    /// JSON config file (default: per-user config dir, if present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:5000")]
    bind: String,

    /// Face detection model (.onnx).
    #[arg(long)]
    face_model: Option<PathBuf>,

    /// Pose estimation model (.onnx).
    #[arg(long)]
    pose_model: Option<PathBuf>,

    /// Download URL for the face model when it is not found locally.
    #[arg(long)]
    face_model_url: Option<String>,

    /// Download URL for the pose model when it is not found locally.
    #[arg(long)]
    pose_model_url: Option<String>,

    /// Directory searched for models shipped alongside the binary.
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Where sessions and captures are stored.
    #[arg(long, value_enum, default_value = "file")]
    store: StoreKind,

    /// Root directory for --store file.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Asymmetry ratio above which the head counts as turned (0.0-1.0).
    #[arg(long)]
    threshold: Option<f64>,

    /// Seconds a turn must last before a capture is taken.
    #[arg(long)]
    persistence: Option<f64>,

    /// Seconds before the same direction can be captured again.
    #[arg(long)]
    cooldown: Option<f64>,

    /// Analyse every detected face instead of the most confident one.
    #[arg(long)]
    multi_face: bool,

    /// Run pose estimation on face crops instead of the full frame.
    #[arg(long)]
    crop_faces: bool,

    /// Camera device, capture-device name or video URL.
    #[arg(long)]
    camera: Option<String>,

    /// ffmpeg input format for --camera (v4l2, avfoundation, dshow).
    #[arg(long)]
    camera_format: Option<String>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let analyzer = build_analyzer(&cli, &config)?;
    // The blocking HTTP client must be created outside the async runtime.
    let store = build_store(&cli)?;
    let camera = config.camera.clone();
    let source_factory: SourceFactory = Box::new(move || -> Box<dyn FrameSource> {
        Box::new(FfmpegCameraSource::new(camera.clone()))
    });

    let monitor = Arc::new(MonitorService::new(
        analyzer,
        Arc::new(ImageCrateCodec::new()),
        store,
        source_factory,
        config,
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = AppState::new(monitor.clone(), device_name(), shutdown_rx);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(&cli.bind, state, shutdown_tx))?;

    if let Some(session_id) = monitor.stop()? {
        log::info!("Stopped session {session_id} on shutdown");
    }
    Ok(())
}

async fn serve(
    bind: &str,
    state: AppState,
    shutdown_tx: watch::Sender<bool>,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    log::info!(
        "Listening on http://{} (device: {})",
        listener.local_addr()?,
        state.device
    );
    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {e}");
                std::future::pending::<()>().await;
            }
            log::info!("Shutting down");
            let _ = shutdown_tx.send(true);
        })
        .await?;
    Ok(())
}

fn load_config(cli: &Cli) -> Result<MonitorConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => MonitorConfig::load(path)?,
        None => MonitorConfig::load_default()?,
    };

    if let Some(threshold) = cli.threshold {
        config.trigger.threshold = threshold;
    }
    if let Some(persistence) = cli.persistence {
        config.trigger.persistence_secs = persistence;
    }
    if let Some(cooldown) = cli.cooldown {
        config.trigger.cooldown_secs = cooldown;
    }
    if cli.multi_face {
        config.analysis.multi_face = true;
    }
    if cli.crop_faces {
        config.analysis.crop_before_pose = true;
    }
    if let Some(device) = &cli.camera {
        config.camera.device = device.clone();
    }
    if let Some(format) = &cli.camera_format {
        config.camera.format = Some(format.clone());
    }

    config.validate()?;
    Ok(config)
}

fn build_analyzer(
    cli: &Cli,
    config: &MonitorConfig,
) -> Result<SharedAnalyzer, Box<dyn std::error::Error>> {
    let face_path = resolve_model(ModelSource {
        name: FACE_MODEL_NAME,
        explicit_path: cli.face_model.as_deref(),
        bundled_dir: cli.models_dir.as_deref(),
        url: cli.face_model_url.as_deref(),
    })?;
    let pose_path = resolve_model(ModelSource {
        name: POSE_MODEL_NAME,
        explicit_path: cli.pose_model.as_deref(),
        bundled_dir: cli.models_dir.as_deref(),
        url: cli.pose_model_url.as_deref(),
    })?;

    let detector = OnnxYoloDetector::new(&face_path, config.detector_confidence)?;
    let estimator = OnnxPoseEstimator::new(&pose_path, config.pose_confidence)?;
    let analyzer = FrameAnalyzer::new(
        Box::new(detector),
        Box::new(estimator),
        DirectionClassifier::new(config.trigger.threshold),
        config.analysis,
    );
    log::info!(
        "Models loaded on {} (multi_face: {}, crop_before_pose: {})",
        device_name(),
        config.analysis.multi_face,
        config.analysis.crop_before_pose
    );
    Ok(Arc::new(Mutex::new(analyzer)))
}

fn resolve_model(source: ModelSource<'_>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {}", source.name);
    let path = model_resolver::resolve(&source, Some(Box::new(download_progress)))?;
    eprintln!();
    log::info!("Using {}", path.display());
    Ok(path)
}

fn build_store(cli: &Cli) -> Result<Arc<dyn SessionStore>, Box<dyn std::error::Error>> {
    match cli.store {
        StoreKind::File => {
            let root = cli
                .data_dir
                .clone()
                .or_else(FileSessionStore::default_root)
                .ok_or("could not determine a data directory, pass --data-dir")?;
            log::info!("Storing sessions under {}", root.display());
            Ok(Arc::new(FileSessionStore::new(root)?))
        }
        StoreKind::Supabase => {
            let config = SupabaseConfig::from_env()?;
            log::info!("Storing sessions in Supabase project {}", config.url);
            Ok(Arc::new(SupabaseSessionStore::new(config)?))
        }
    }
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading model... {pct}%");
    } else {
        eprint!("\rDownloading model... {downloaded} bytes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("headwatch").chain(args.iter().copied()))
    }

    fn config_file(dir: &tempfile::TempDir, json: &str) -> String {
        let path = dir.path().join("config.json");
        std::fs::write(&path, json).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        assert_eq!(cli.bind, "0.0.0.0:5000");
        assert_eq!(cli.store, StoreKind::File);
        assert!(!cli.multi_face);
        assert!(cli.threshold.is_none());
    }

    #[test]
    fn test_overrides_are_applied_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file(&dir, r#"{ "trigger": { "cooldown_secs": 8.0 } }"#);
        let cli = parse(&[
            "--config",
            path.as_str(),
            "--threshold",
            "0.2",
            "--persistence",
            "2",
            "--multi-face",
            "--crop-faces",
            "--camera",
            "0",
            "--camera-format",
            "avfoundation",
            "--store",
            "supabase",
        ]);
        assert_eq!(cli.store, StoreKind::Supabase);

        let config = load_config(&cli).unwrap();
        assert_eq!(config.trigger.threshold, 0.2);
        assert_eq!(config.trigger.persistence_secs, 2.0);
        assert_eq!(config.trigger.cooldown_secs, 8.0);
        assert!(config.analysis.multi_face);
        assert!(config.analysis.crop_before_pose);
        assert_eq!(config.camera.device, "0");
        assert_eq!(config.camera.format.as_deref(), Some("avfoundation"));
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file(&dir, "{}");
        let cli = parse(&["--config", path.as_str(), "--threshold", "1.5"]);
        assert!(load_config(&cli).is_err());
    }

    #[test]
    fn test_file_store_uses_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        let cli = parse(&["--data-dir", data.to_str().unwrap()]);
        build_store(&cli).unwrap();
        assert!(data.join("sessions").is_dir());
    }
}

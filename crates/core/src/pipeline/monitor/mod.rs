pub mod capture_worker;
pub mod latest_frame;
pub mod monitor_service;
pub mod monitor_worker;
pub mod session_context;

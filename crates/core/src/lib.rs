//! Head orientation monitoring: face/pose analysis, direction classification,
//! sustained-turn capture triggering and session persistence.

pub mod detection;
pub mod orientation;
pub mod pipeline;
pub mod session;
pub mod shared;
pub mod video;

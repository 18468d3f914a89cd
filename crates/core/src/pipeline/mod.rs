pub mod detect_image_use_case;
pub mod frame_analysis;
pub mod frame_analyzer;
pub mod monitor;
pub mod pipeline_logger;

#[cfg(test)]
pub(crate) mod test_stubs;

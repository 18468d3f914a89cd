pub mod ffmpeg_camera_source;
pub mod image_crate_codec;

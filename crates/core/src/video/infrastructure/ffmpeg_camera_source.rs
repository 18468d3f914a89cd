use crate::shared::frame::Frame;
use crate::shared::monitor_config::CameraConfig;
use crate::video::domain::frame_source::{FrameSource, SourceMetadata};

/// Captures frames from a camera device (or any ffmpeg-readable input)
/// via ffmpeg-next, converting each one to RGB24.
pub struct FfmpegCameraSource {
    config: CameraConfig,
    input: Option<OpenInput>,
}

struct OpenInput {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    stream_index: usize,
    frame_index: usize,
    flushing: bool,
    done: bool,
}

// Safety: FfmpegCameraSource is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegCameraSource {}

impl FfmpegCameraSource {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            input: None,
        }
    }

    fn open_input(&self) -> Result<ffmpeg_next::format::context::Input, Box<dyn std::error::Error>> {
        let mut options = ffmpeg_next::Dictionary::new();
        options.set(
            "video_size",
            &format!("{}x{}", self.config.width, self.config.height),
        );

        let Some(format_name) = self.config.format.as_deref() else {
            return Ok(ffmpeg_next::format::input_with_dictionary(
                &self.config.device,
                options,
            )?);
        };

        ffmpeg_next::device::register_all();
        options.set("framerate", "30");
        let format = ffmpeg_next::device::input::video()
            .find(|f| f.name() == format_name)
            .ok_or_else(|| format!("capture format {format_name} is not available"))?;
        let ctx = ffmpeg_next::format::open_with(&self.config.device, &format, options)?;
        Ok(ctx.input())
    }
}

impl FrameSource for FfmpegCameraSource {
    fn open(&mut self) -> Result<SourceMetadata, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        self.close();

        let ictx = self.open_input().map_err(|e| {
            format!("cannot open camera {}: {e}", self.config.device)
        })?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;
        let stream_index = stream.index();
        let rate = stream.avg_frame_rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;
        let width = decoder.width();
        let height = decoder.height();

        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        let metadata = SourceMetadata {
            width,
            height,
            fps,
            description: self.config.device.clone(),
        };
        log::info!(
            "Opened camera {} at {width}x{height} ({fps:.1} fps)",
            self.config.device
        );

        self.input = Some(OpenInput {
            ictx,
            decoder,
            scaler,
            width,
            height,
            stream_index,
            frame_index: 0,
            flushing: false,
            done: false,
        });
        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        match self.input.as_mut() {
            Some(input) => Box::new(CameraFrameIter { input }),
            None => Box::new(std::iter::once(Err("FfmpegCameraSource: not opened".into()))),
        }
    }

    fn close(&mut self) {
        if self.input.take().is_some() {
            log::info!("Released camera {}", self.config.device);
        }
    }
}

/// Lazy iterator that decodes one frame per call; ends when the input does.
struct CameraFrameIter<'a> {
    input: &'a mut OpenInput,
}

impl CameraFrameIter<'_> {
    fn try_receive(&mut self) -> Option<Result<Frame, Box<dyn std::error::Error>>> {
        let input = &mut *self.input;
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if input.decoder.receive_frame(&mut decoded).is_err() {
            return None;
        }

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        if let Err(e) = input.scaler.run(&decoded, &mut rgb_frame) {
            return Some(Err(Box::new(e)));
        }

        let pixels = extract_rgb_pixels(&rgb_frame, input.width, input.height);
        let frame = Frame::new(pixels, input.width, input.height, 3, input.frame_index);
        input.frame_index += 1;
        Some(Ok(frame))
    }
}

impl Iterator for CameraFrameIter<'_> {
    type Item = Result<Frame, Box<dyn std::error::Error>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.input.done {
            return None;
        }

        if let Some(result) = self.try_receive() {
            return Some(result);
        }

        if self.input.flushing {
            self.input.done = true;
            return None;
        }

        loop {
            let input = &mut *self.input;
            let mut packet = ffmpeg_next::Packet::empty();
            match classify_read(packet.read(&mut input.ictx)) {
                ReadStep::Packet => {}
                ReadStep::End => {
                    let _ = input.decoder.send_eof();
                    input.flushing = true;
                    if let Some(result) = self.try_receive() {
                        return Some(result);
                    }
                    self.input.done = true;
                    return None;
                }
                ReadStep::Failed(e) => return Some(Err(Box::new(e))),
            }

            if packet.stream() != input.stream_index {
                continue;
            }

            if input.decoder.send_packet(&packet).is_err() {
                continue;
            }

            if let Some(result) = self.try_receive() {
                return Some(result);
            }
        }
    }
}

/// Outcome of one `av_read_frame` call.
#[derive(Debug, PartialEq)]
enum ReadStep {
    Packet,
    End,
    Failed(ffmpeg_next::Error),
}

/// Only EOF ends the input. Any other read error (an unplugged device
/// reports EIO or ENODEV) goes back to the caller, which decides when to give up.
fn classify_read(result: Result<(), ffmpeg_next::Error>) -> ReadStep {
    match result {
        Ok(()) => ReadStep::Packet,
        Err(ffmpeg_next::Error::Eof) => ReadStep::End,
        Err(e) => ReadStep::Failed(e),
    }
}

/// Copies an ffmpeg RGB24 frame into a tightly-packed buffer, dropping row padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_len = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in 0..height as usize {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + row_len]);
    }
    pixels
}

use ndarray::ArrayView3;

/// A single camera/image frame: contiguous RGB bytes in row-major order.
///
/// Format conversion happens at I/O boundaries only; the domain layer
/// treats pixel data as opaque.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Position of the frame in its source stream (0 for single images).
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Copies the pixel rectangle `[x1, x2) × [y1, y2)` into a new frame.
    ///
    /// Coordinates are clamped to the frame. Returns `None` when the clamped
    /// rectangle is empty.
    pub fn crop(&self, x1: i32, y1: i32, x2: i32, y2: i32) -> Option<Frame> {
        let fw = self.width as i32;
        let fh = self.height as i32;
        let x1 = x1.clamp(0, fw) as usize;
        let y1 = y1.clamp(0, fh) as usize;
        let x2 = x2.clamp(0, fw) as usize;
        let y2 = y2.clamp(0, fh) as usize;
        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        let channels = self.channels as usize;
        let stride = self.width as usize * channels;
        let row_len = (x2 - x1) * channels;
        let mut data = Vec::with_capacity(row_len * (y2 - y1));
        for row in y1..y2 {
            let start = row * stride + x1 * channels;
            data.extend_from_slice(&self.data[start..start + row_len]);
        }

        Some(Frame::new(
            data,
            (x2 - x1) as u32,
            (y2 - y1) as u32,
            self.channels,
            self.index,
        ))
    }

    /// Draws an axis-aligned rectangle outline, clipped to the frame.
    pub fn draw_rect(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, color: [u8; 3], thickness: i32) {
        if self.channels < 3 {
            return;
        }
        let fw = self.width as i32;
        let fh = self.height as i32;
        let t = thickness.max(1);

        for y in y1..y2 {
            for x in x1..x2 {
                let on_edge = x < x1 + t || x >= x2 - t || y < y1 + t || y >= y2 - t;
                if !on_edge || x < 0 || y < 0 || x >= fw || y >= fh {
                    continue;
                }
                let offset = (y as usize * self.width as usize + x as usize) * self.channels as usize;
                self.data[offset..offset + 3].copy_from_slice(&color);
            }
        }
    }

    /// Draws a straight line (Bresenham) with a square brush, clipped to the frame.
    pub fn draw_line(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, color: [u8; 3], thickness: i32) {
        if self.channels < 3 {
            return;
        }
        let half = (thickness.max(1) - 1) / 2;
        let extra = (thickness.max(1) - 1) - half;

        let dx = (x2 - x1).abs();
        let dy = -(y2 - y1).abs();
        let sx = if x1 < x2 { 1 } else { -1 };
        let sy = if y1 < y2 { 1 } else { -1 };
        let mut err = dx + dy;
        let (mut x, mut y) = (x1, y1);
        loop {
            for by in y - half..=y + extra {
                for bx in x - half..=x + extra {
                    self.paint(bx, by, color);
                }
            }
            if x == x2 && y == y2 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Draws a line ending in an arrow head at `(x2, y2)`.
    ///
    /// The two head strokes are a quarter of the shaft long, at 45 degrees.
    pub fn draw_arrow(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, color: [u8; 3], thickness: i32) {
        self.draw_line(x1, y1, x2, y2, color, thickness);

        let angle = f64::from(y1 - y2).atan2(f64::from(x1 - x2));
        let length = f64::from(x2 - x1).hypot(f64::from(y2 - y1)) * 0.25;
        for side in [-1.0, 1.0] {
            let a = angle + side * std::f64::consts::FRAC_PI_4;
            let hx = x2 + (length * a.cos()).round() as i32;
            let hy = y2 + (length * a.sin()).round() as i32;
            self.draw_line(x2, y2, hx, hy, color, thickness);
        }
    }

    fn paint(&mut self, x: i32, y: i32, color: [u8; 3]) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let offset = (y as usize * self.width as usize + x as usize) * self.channels as usize;
        self.data[offset..offset + 3].copy_from_slice(&color);
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 4x3 RGB frame where every pixel's R channel holds `row * 10 + col`.
    fn indexed_frame() -> Frame {
        let (w, h) = (4u32, 3u32);
        let mut data = Vec::new();
        for row in 0..h {
            for col in 0..w {
                data.extend_from_slice(&[(row * 10 + col) as u8, 0, 0]);
            }
        }
        Frame::new(data, w, h, 3, 7)
    }

    #[test]
    fn test_construction_and_accessors() {
        let data = vec![0u8; 12]; // 2x2x3
        let frame = Frame::new(data.clone(), 2, 2, 3, 5);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.index(), 5);
        assert_eq!(frame.data(), &data[..]);
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * channels")]
    fn test_mismatched_data_length_panics_in_debug() {
        let data = vec![0u8; 10]; // wrong size for 2x2x3
        Frame::new(data, 2, 2, 3, 0);
    }

    #[test]
    fn test_as_ndarray_shape() {
        let data = vec![0u8; 24]; // 2x4x3
        let frame = Frame::new(data, 4, 2, 3, 0);
        assert_eq!(frame.as_ndarray().shape(), &[2, 4, 3]); // (height, width, channels)
    }

    #[test]
    fn test_crop_copies_expected_pixels() {
        let frame = indexed_frame();
        let crop = frame.crop(1, 1, 3, 3).unwrap();
        assert_eq!(crop.width(), 2);
        assert_eq!(crop.height(), 2);
        assert_eq!(crop.index(), 7);
        let reds: Vec<u8> = crop.data().chunks(3).map(|px| px[0]).collect();
        assert_eq!(reds, vec![11, 12, 21, 22]);
    }

    #[test]
    fn test_crop_clamps_to_frame() {
        let frame = indexed_frame();
        let crop = frame.crop(-5, -5, 100, 100).unwrap();
        assert_eq!(crop.width(), 4);
        assert_eq!(crop.height(), 3);
        assert_eq!(crop.data(), frame.data());
    }

    #[test]
    fn test_crop_empty_rectangle_returns_none() {
        let frame = indexed_frame();
        assert!(frame.crop(2, 0, 2, 3).is_none());
        assert!(frame.crop(10, 10, 20, 20).is_none());
    }

    #[test]
    fn test_draw_rect_paints_outline_only() {
        let mut frame = Frame::new(vec![0u8; 5 * 5 * 3], 5, 5, 3, 0);
        frame.draw_rect(0, 0, 5, 5, [0, 255, 0], 1);
        let arr = frame.as_ndarray();
        assert_eq!(arr[[0, 0, 1]], 255);
        assert_eq!(arr[[4, 2, 1]], 255);
        assert_eq!(arr[[2, 2, 1]], 0); // interior untouched
    }

    #[test]
    fn test_draw_rect_clips_outside_frame() {
        let mut frame = Frame::new(vec![0u8; 4 * 4 * 3], 4, 4, 3, 0);
        frame.draw_rect(-2, -2, 10, 10, [255, 0, 0], 3);
        // Only the part of the 3px band inside the frame is painted.
        assert_eq!(frame.as_ndarray()[[0, 0, 0]], 255);
        assert_eq!(frame.as_ndarray()[[3, 3, 0]], 0);
    }

    #[test]
    fn test_draw_line_horizontal_and_diagonal() {
        let mut frame = Frame::new(vec![0u8; 6 * 6 * 3], 6, 6, 3, 0);
        frame.draw_line(0, 1, 5, 1, [255, 0, 0], 1);
        frame.draw_line(0, 2, 3, 5, [0, 0, 255], 1);
        let arr = frame.as_ndarray();
        for x in 0..6 {
            assert_eq!(arr[[1, x, 0]], 255);
        }
        assert_eq!(arr[[0, 0, 0]], 0);
        for i in 0..4 {
            assert_eq!(arr[[2 + i, i, 2]], 255);
        }
        assert_eq!(arr[[5, 0, 2]], 0);
    }

    #[test]
    fn test_draw_line_thickness_and_clipping() {
        let mut frame = Frame::new(vec![0u8; 5 * 5 * 3], 5, 5, 3, 0);
        frame.draw_line(-3, 2, 9, 2, [0, 255, 0], 3);
        let arr = frame.as_ndarray();
        assert_eq!(arr[[1, 0, 1]], 255);
        assert_eq!(arr[[3, 4, 1]], 255);
        assert_eq!(arr[[0, 2, 1]], 0);
        assert_eq!(arr[[4, 2, 1]], 0);
    }

    #[test]
    fn test_draw_arrow_head_points_back_from_tip() {
        let mut frame = Frame::new(vec![0u8; 21 * 21 * 3], 21, 21, 3, 0);
        frame.draw_arrow(18, 10, 2, 10, [255, 0, 0], 1);
        let arr = frame.as_ndarray();
        assert_eq!(arr[[10, 10, 0]], 255); // shaft
        // Head strokes end 3px back from the tip, above and below the shaft.
        assert_eq!(arr[[7, 5, 0]], 255);
        assert_eq!(arr[[13, 5, 0]], 255);
        assert_eq!(arr[[7, 1, 0]], 0);
    }
}

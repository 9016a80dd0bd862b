use rayon::prelude::*;

use crate::error::{EngineError, Result};
use crate::layout::Rect;

/// Byte length of a `width` x `height` RGBA buffer.
fn rgba_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

// =============================================================================
// FrameBuffer
// =============================================================================

/// An owned RGBA pixel buffer. 4 bytes per pixel, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl FrameBuffer {
    /// Create a new transparent black buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; rgba_len(width, height)],
        }
    }

    /// Create a buffer filled with one color.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut buf = Self::new(width, height);
        buf.fill(rgba);
        buf
    }

    /// Create from existing RGBA data. Panics if data length doesn't match dimensions.
    pub fn from_rgba_vec(width: u32, height: u32, data: Vec<u8>) -> Self {
        assert_eq!(
            data.len(),
            rgba_len(width, height),
            "RGBA data length {} doesn't match {}x{}x4={}",
            data.len(),
            width,
            height,
            rgba_len(width, height)
        );
        Self {
            width,
            height,
            data,
        }
    }

    /// Get pixel RGBA at (x, y). Panics if out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        &self.data[idx..idx + 4]
    }

    pub fn fill(&mut self, rgba: [u8; 4]) {
        if self.data.is_empty() {
            return;
        }
        let row_bytes = self.width as usize * 4;
        self.data.par_chunks_exact_mut(row_bytes).for_each(|row| {
            for pixel in row.chunks_exact_mut(4) {
                pixel.copy_from_slice(&rgba);
            }
        });
    }

    /// Nearest-neighbor scale `src` into `dest`, clipped to this buffer.
    pub fn blit_scaled(&mut self, src: &FrameBuffer, dest: Rect) {
        if src.width == 0 || src.height == 0 || self.width == 0 || self.height == 0 {
            return;
        }
        if !(dest.width > 0.0 && dest.height > 0.0) {
            return;
        }

        let x0 = dest.x.max(0.0).floor() as u32;
        let y0 = dest.y.max(0.0).floor() as u32;
        let x1 = (dest.x + dest.width).min(self.width as f64).ceil().max(0.0) as u32;
        let y1 = (dest.y + dest.height).min(self.height as f64).ceil().max(0.0) as u32;
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        let src_stride = src.width as usize * 4;
        let row_bytes = self.width as usize * 4;
        let sx_scale = src.width as f64 / dest.width;
        let sy_scale = src.height as f64 / dest.height;

        // Row-based parallelism to avoid rayon micro-task overhead
        self.data
            .par_chunks_exact_mut(row_bytes)
            .enumerate()
            .filter(|(y, _)| (*y as u32) >= y0 && (*y as u32) < y1)
            .for_each(|(y, row)| {
                let sy = (((y as f64 + 0.5 - dest.y) * sy_scale) as i64)
                    .clamp(0, src.height as i64 - 1) as usize;
                let src_row = &src.data[sy * src_stride..(sy + 1) * src_stride];
                for x in x0..x1 {
                    let sx = (((x as f64 + 0.5 - dest.x) * sx_scale) as i64)
                        .clamp(0, src.width as i64 - 1) as usize;
                    let di = x as usize * 4;
                    row[di..di + 4].copy_from_slice(&src_row[sx * 4..sx * 4 + 4]);
                }
            });
    }
}

// =============================================================================
// RenderSurface
// =============================================================================

/// The output the compositor draws onto each frame.
pub trait RenderSurface {
    fn size(&self) -> (u32, u32);

    fn clear(&mut self, rgba: [u8; 4]);

    fn draw(&mut self, frame: &FrameBuffer, dest: Rect) -> Result<()>;
}

impl RenderSurface for FrameBuffer {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self, rgba: [u8; 4]) {
        self.fill(rgba);
    }

    fn draw(&mut self, frame: &FrameBuffer, dest: Rect) -> Result<()> {
        if frame.data.len() != rgba_len(frame.width, frame.height) {
            return Err(EngineError::Surface(format!(
                "frame data length {} doesn't match {}x{}",
                frame.data.len(),
                frame.width,
                frame.height
            )));
        }
        self.blit_scaled(frame, dest);
        Ok(())
    }
}

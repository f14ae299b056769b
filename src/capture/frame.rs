use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Owned, mutable frame. Moves through the pipeline by value; the renderer
/// draws into `data` in place right before display.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Tightly packed rows, `width * channels` bytes each
    pub data: Vec<u8>,

    /// Frame metadata
    pub meta: FrameMetadata,

    /// Capture timestamp for latency tracking
    pub timestamp: Instant,
}

/// Frame metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameMetadata {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// Decoded pixel layouts a frame buffer can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Rgb24,
    Bgr24,
    Rgba32,
    Gray8,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => 3,
            PixelFormat::Rgba32 => 4,
            PixelFormat::Gray8 => 1,
        }
    }
}

impl Frame {
    pub fn new(sequence: u64, width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            data,
            meta: FrameMetadata {
                sequence,
                width,
                height,
                format,
            },
            timestamp: Instant::now(),
        }
    }

    /// Solid-color RGB frame
    pub fn filled(sequence: u64, width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self::new(sequence, width, height, PixelFormat::Rgb24, data)
    }

    pub fn width(&self) -> u32 {
        self.meta.width
    }

    pub fn height(&self) -> u32 {
        self.meta.height
    }

    pub fn sequence(&self) -> u64 {
        self.meta.sequence
    }

    pub fn channels(&self) -> usize {
        self.meta.format.channels()
    }

    /// Byte length the metadata implies
    pub fn expected_len(&self) -> usize {
        self.meta.width as usize * self.meta.height as usize * self.channels()
    }

    pub fn is_empty(&self) -> bool {
        self.meta.width == 0 || self.meta.height == 0 || self.data.is_empty()
    }

    /// Write one pixel given in RGB order; out-of-bounds writes are ignored.
    pub fn put_pixel(&mut self, x: i32, y: i32, rgb: [u8; 3]) {
        if x < 0 || y < 0 || x >= self.meta.width as i32 || y >= self.meta.height as i32 {
            return;
        }
        let channels = self.channels();
        let offset = (y as usize * self.meta.width as usize + x as usize) * channels;
        let Some(px) = self.data.get_mut(offset..offset + channels) else {
            return;
        };
        match self.meta.format {
            PixelFormat::Rgb24 => px.copy_from_slice(&rgb),
            PixelFormat::Bgr24 => px.copy_from_slice(&[rgb[2], rgb[1], rgb[0]]),
            PixelFormat::Rgba32 => px.copy_from_slice(&[rgb[0], rgb[1], rgb[2], 255]),
            PixelFormat::Gray8 => {
                let luma = (rgb[0] as u32 * 77 + rgb[1] as u32 * 150 + rgb[2] as u32 * 29) >> 8;
                px[0] = luma as u8;
            }
        }
    }

    /// Read one pixel back in RGB order
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.meta.width || y >= self.meta.height {
            return None;
        }
        let channels = self.channels();
        let offset = (y as usize * self.meta.width as usize + x as usize) * channels;
        let px = self.data.get(offset..offset + channels)?;
        Some(match self.meta.format {
            PixelFormat::Rgb24 | PixelFormat::Rgba32 => [px[0], px[1], px[2]],
            PixelFormat::Bgr24 => [px[2], px[1], px[0]],
            PixelFormat::Gray8 => [px[0], px[0], px[0]],
        })
    }

    /// Tightly packed RGB24 copy of the pixel data
    pub fn to_rgb(&self) -> Vec<u8> {
        match self.meta.format {
            PixelFormat::Rgb24 => self.data.clone(),
            PixelFormat::Bgr24 => self
                .data
                .chunks_exact(3)
                .flat_map(|c| [c[2], c[1], c[0]])
                .collect(),
            PixelFormat::Rgba32 => self
                .data
                .chunks_exact(4)
                .flat_map(|c| [c[0], c[1], c[2]])
                .collect(),
            PixelFormat::Gray8 => self.data.iter().flat_map(|&v| [v, v, v]).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_pixel_respects_format_and_bounds() {
        let mut frame = Frame::new(1, 2, 2, PixelFormat::Bgr24, vec![0; 12]);
        frame.put_pixel(1, 0, [10, 20, 30]);
        assert_eq!(&frame.data[3..6], &[30, 20, 10]);
        assert_eq!(frame.pixel(1, 0), Some([10, 20, 30]));

        // ignored, no panic
        frame.put_pixel(-1, 0, [1, 1, 1]);
        frame.put_pixel(2, 5, [1, 1, 1]);
        assert_eq!(frame.pixel(2, 0), None);
    }

    #[test]
    fn test_to_rgb_conversions() {
        let bgr = Frame::new(0, 1, 1, PixelFormat::Bgr24, vec![1, 2, 3]);
        assert_eq!(bgr.to_rgb(), vec![3, 2, 1]);

        let rgba = Frame::new(0, 1, 1, PixelFormat::Rgba32, vec![1, 2, 3, 4]);
        assert_eq!(rgba.to_rgb(), vec![1, 2, 3]);

        let gray = Frame::new(0, 1, 1, PixelFormat::Gray8, vec![9]);
        assert_eq!(gray.to_rgb(), vec![9, 9, 9]);
    }

    #[test]
    fn test_filled_frame_layout() {
        let frame = Frame::filled(3, 4, 2, [5, 6, 7]);
        assert_eq!(frame.data.len(), frame.expected_len());
        assert_eq!(frame.pixel(3, 1), Some([5, 6, 7]));
        assert_eq!(frame.sequence(), 3);
        assert!(!frame.is_empty());
    }
}

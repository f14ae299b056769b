use zune_jpeg::JpegDecoder;

use crate::capture::frame::PixelFormat;
use crate::error::SourceError;

/// Raw layouts delivered by capture hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawFormat {
    Mjpeg,
    Yuyv,
    Rgb24,
}

/// Decode a raw capture buffer into a packed frame buffer
pub fn decode_frame(
    data: &[u8],
    format: RawFormat,
    width: u32,
    height: u32,
) -> Result<(Vec<u8>, PixelFormat), SourceError> {
    match format {
        RawFormat::Mjpeg => {
            let mut decoder = JpegDecoder::new(data);
            let pixels = decoder
                .decode()
                .map_err(|e| SourceError::Read(format!("MJPEG decode failed: {:?}", e)))?;
            Ok((pixels, PixelFormat::Rgb24))
        }
        RawFormat::Rgb24 => Ok((data.to_vec(), PixelFormat::Rgb24)),
        RawFormat::Yuyv => Ok((yuyv_to_rgb(data, width, height)?, PixelFormat::Rgb24)),
    }
}

/// YUYV 4:2:2 to RGB24, integer BT.601 limited-range coefficients
pub fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>, SourceError> {
    let pixels = width as usize * height as usize;
    if data.len() < pixels * 2 {
        return Err(SourceError::Read(format!(
            "YUYV buffer too short: {} bytes for {}x{}",
            data.len(),
            width,
            height
        )));
    }

    let mut rgb = Vec::with_capacity(pixels * 3);
    for chunk in data[..pixels * 2].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        rgb.extend_from_slice(&yuv_to_rgb(y0, u, v));
        rgb.extend_from_slice(&yuv_to_rgb(y1, u, v));
    }
    Ok(rgb)
}

fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let clamp = |x: i32| ((x + 128) >> 8).clamp(0, 255) as u8;
    [
        clamp(298 * c + 409 * e),
        clamp(298 * c - 100 * d - 208 * e),
        clamp(298 * c + 516 * d),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_gray_levels() {
        // black and white pixel pair with neutral chroma
        let rgb = yuyv_to_rgb(&[16, 128, 235, 128], 2, 1).unwrap();
        assert_eq!(rgb, vec![0, 0, 0, 255, 255, 255]);
    }

    #[test]
    fn test_yuyv_short_buffer() {
        assert!(yuyv_to_rgb(&[16, 128], 2, 2).is_err());
    }

    #[test]
    fn test_mjpeg_roundtrip_dimensions() {
        let img = image::RgbImage::from_pixel(8, 8, image::Rgb([120, 60, 30]));
        let mut jpeg = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, 90)
            .encode_image(&img)
            .unwrap();

        let (pixels, format) = decode_frame(&jpeg, RawFormat::Mjpeg, 8, 8).unwrap();
        assert_eq!(format, PixelFormat::Rgb24);
        assert_eq!(pixels.len(), 8 * 8 * 3);
    }
}

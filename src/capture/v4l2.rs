//! V4L2 camera capture with memory-mapped buffers

use std::io;
use std::path::Path;
use std::time::Duration;

use tracing::{info, instrument, warn};
use v4l::buffer::Type;
use v4l::capability::Flags as CapFlags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::capture::decoder::{decode_frame, RawFormat};
use crate::capture::frame::Frame;
use crate::capture::source::FrameSource;
use crate::error::SourceError;
use crate::utils::auto_detect_device;

const BUFFER_COUNT: u32 = 4;

/// Longest wait for a dequeued buffer before the capture loop gets control back
const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Camera source producing RGB frames
pub struct V4l2Source {
    path: String,
    stream: Option<MmapStream<'static>>,
    format: RawFormat,
    width: u32,
    height: u32,
    sequence: u64,
}

impl V4l2Source {
    /// Open a capture device, falling back to auto-detection when the
    /// requested node does not exist
    #[instrument]
    pub fn open(path: &str) -> Result<Self, SourceError> {
        let path = if Path::new(path).exists() {
            path.to_string()
        } else {
            warn!("{} not present, auto-detecting", path);
            auto_detect_device().ok_or_else(|| SourceError::Open {
                identifier: path.to_string(),
                reason: "no suitable capture device found".into(),
            })?
        };
        let open_err = |reason: String| SourceError::Open {
            identifier: path.clone(),
            reason,
        };

        let device = Device::with_path(&path).map_err(|e| open_err(e.to_string()))?;

        let caps = device.query_caps().map_err(|e| open_err(e.to_string()))?;
        info!("Device: {} ({})", caps.card, caps.driver);

        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            return Err(open_err("device doesn't support video capture".into()));
        }

        // Prefer MJPEG, fall back to YUYV
        let mut fmt = device.format().map_err(|e| open_err(e.to_string()))?;
        fmt.fourcc = FourCC::new(b"MJPG");
        let mut fmt = device.set_format(&fmt).map_err(|e| open_err(e.to_string()))?;
        if fmt.fourcc != FourCC::new(b"MJPG") {
            fmt.fourcc = FourCC::new(b"YUYV");
            fmt = device.set_format(&fmt).map_err(|e| open_err(e.to_string()))?;
        }
        let format = match &fmt.fourcc.repr {
            b"MJPG" => RawFormat::Mjpeg,
            b"YUYV" => RawFormat::Yuyv,
            other => {
                return Err(open_err(format!(
                    "unsupported pixel format {}",
                    String::from_utf8_lossy(other)
                )))
            }
        };

        let mut stream = MmapStream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT)
            .map_err(|e| open_err(e.to_string()))?;
        stream.set_timeout(READ_TIMEOUT);
        info!(
            "Capture stream started: {}x{} {:?} with {} buffers",
            fmt.width, fmt.height, format, BUFFER_COUNT
        );

        Ok(Self {
            path,
            stream: Some(stream),
            format,
            width: fmt.width,
            height: fmt.height,
            sequence: 0,
        })
    }
}

impl FrameSource for V4l2Source {
    fn read_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };

        let (buf, meta) = stream.next().map_err(|e| match e.kind() {
            io::ErrorKind::TimedOut => SourceError::Stalled(READ_TIMEOUT),
            _ => SourceError::Io(e),
        })?;
        let used = (meta.bytesused as usize).min(buf.len());
        let (data, pixel_format) = decode_frame(&buf[..used], self.format, self.width, self.height)?;

        self.sequence += 1;
        Ok(Some(Frame::new(
            self.sequence,
            self.width,
            self.height,
            pixel_format,
            data,
        )))
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            info!("Capture device {} released", self.path);
        }
    }

    fn describe(&self) -> String {
        format!("V4L2 device {}", self.path)
    }
}

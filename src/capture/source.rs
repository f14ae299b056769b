//! Frame source abstraction and identifier-based opening

use tracing::info;

use crate::capture::frame::Frame;
use crate::capture::images::ImageDirSource;
use crate::error::SourceError;
use crate::utils::SourceSpec;

/// A device or file that yields frames. Owned exclusively by the capture stage.
pub trait FrameSource: Send {
    /// Next frame, or `Ok(None)` once the source is exhausted.
    fn read_frame(&mut self) -> Result<Option<Frame>, SourceError>;

    /// Release the underlying device or file. Must be safe to call twice.
    fn close(&mut self);

    fn describe(&self) -> String {
        "frame source".into()
    }
}

impl FrameSource for Box<dyn FrameSource> {
    fn read_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        (**self).read_frame()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Open the source an identifier names: a device index, a device path, an
/// image, a directory of images or (with GStreamer) a video file.
pub fn open_source(identifier: &str) -> Result<Box<dyn FrameSource>, SourceError> {
    let spec = SourceSpec::parse(identifier);
    info!("Opening video source {:?} as {:?}", identifier, spec);

    match spec {
        SourceSpec::ImageDir(path) | SourceSpec::ImageFile(path) => {
            Ok(Box::new(ImageDirSource::open(&path)?))
        }
        #[cfg(feature = "v4l2-capture")]
        SourceSpec::Device(path) => Ok(Box::new(crate::capture::v4l2::V4l2Source::open(&path)?)),
        #[cfg(not(feature = "v4l2-capture"))]
        SourceSpec::Device(path) => Err(SourceError::Open {
            identifier: path,
            reason: "camera capture requires the `v4l2-capture` feature".into(),
        }),
        #[cfg(feature = "gstreamer-pipeline")]
        SourceSpec::VideoFile(path) => Ok(Box::new(
            crate::capture::gst_capture::GstSource::open(&path)?,
        )),
        #[cfg(not(feature = "gstreamer-pipeline"))]
        SourceSpec::VideoFile(path) => Err(SourceError::Open {
            identifier: path.display().to_string(),
            reason: "video files require the `gstreamer-pipeline` feature".into(),
        }),
    }
}

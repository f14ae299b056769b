pub mod decoder;
pub mod frame;
pub mod images;
pub mod source;

#[cfg(feature = "gstreamer-pipeline")]
pub mod gst_capture;
#[cfg(feature = "v4l2-capture")]
pub mod v4l2;

pub use frame::{Frame, FrameMetadata, PixelFormat};
pub use images::ImageDirSource;
pub use source::{open_source, FrameSource};

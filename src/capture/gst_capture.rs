//! GStreamer-backed video file source

use std::path::Path;

use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use tracing::{debug, info, instrument};

use crate::capture::frame::{Frame, PixelFormat};
use crate::capture::source::FrameSource;
use crate::error::SourceError;

/// Decodes a video file to RGB frames through an appsink
pub struct GstSource {
    pipeline: gst::Pipeline,
    appsink: gst_app::AppSink,
    location: String,
    sequence: u64,
    stopped: bool,
}

impl GstSource {
    #[instrument]
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let location = path.display().to_string();
        let open_err = |reason: String| SourceError::Open {
            identifier: location.clone(),
            reason,
        };

        if !path.is_file() {
            return Err(open_err("no such file".into()));
        }

        gst::init().map_err(|e| open_err(format!("failed to initialize GStreamer: {}", e)))?;

        let pipeline_str = Self::build_pipeline_string(path);
        info!("Pipeline: {}", pipeline_str);

        let pipeline = gst::parse::launch(&pipeline_str)
            .map_err(|e| open_err(e.to_string()))?
            .downcast::<gst::Pipeline>()
            .map_err(|_| open_err("failed to create pipeline".into()))?;

        let appsink = pipeline
            .by_name("appsink")
            .ok_or_else(|| open_err("failed to find appsink element".into()))?
            .downcast::<gst_app::AppSink>()
            .map_err(|_| open_err("failed to cast to AppSink".into()))?;

        // Block upstream instead of dropping: backlog is handled by the frame queue
        appsink.set_property("emit-signals", false);
        appsink.set_property("max-buffers", 2u32);
        appsink.set_property("drop", false);
        appsink.set_property("sync", false);

        pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| open_err(format!("failed to start pipeline: {:?}", e)))?;

        let (state_change, _, _) = pipeline.state(Some(gst::ClockTime::from_seconds(5)));
        if state_change.is_err() {
            let _ = pipeline.set_state(gst::State::Null);
            return Err(open_err("pipeline failed to preroll".into()));
        }

        Ok(Self {
            pipeline,
            appsink,
            location,
            sequence: 0,
            stopped: false,
        })
    }

    fn build_pipeline_string(path: &Path) -> String {
        format!(
            "filesrc location=\"{}\" ! decodebin ! \
             videoconvert ! \
             video/x-raw,format=RGB ! \
             appsink name=appsink",
            path.display()
        )
    }
}

impl FrameSource for GstSource {
    fn read_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        if self.stopped {
            return Ok(None);
        }

        let sample = match self.appsink.pull_sample() {
            Ok(sample) => sample,
            Err(_) if self.appsink.is_eos() => {
                debug!("End of stream after {} frames", self.sequence);
                return Ok(None);
            }
            Err(_) => return Err(SourceError::Read("failed to pull sample from pipeline".into())),
        };

        let buffer = sample
            .buffer()
            .ok_or_else(|| SourceError::Read("sample contains no buffer".into()))?;
        let caps = sample
            .caps()
            .ok_or_else(|| SourceError::Read("sample has no caps".into()))?;
        let video_info = gst_video::VideoInfo::from_caps(caps)
            .map_err(|_| SourceError::Read("failed to parse video info from caps".into()))?;
        let map = buffer
            .map_readable()
            .map_err(|_| SourceError::Read("failed to map buffer".into()))?;

        // Strip row padding: videoconvert aligns RGB rows to 4 bytes
        let width = video_info.width();
        let height = video_info.height();
        let stride = video_info.stride()[0] as usize;
        let row_len = width as usize * 3;
        let src = map.as_slice();
        let mut data = Vec::with_capacity(row_len * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            let line = src
                .get(start..start + row_len)
                .ok_or_else(|| SourceError::Read("truncated video buffer".into()))?;
            data.extend_from_slice(line);
        }

        self.sequence += 1;
        Ok(Some(Frame::new(
            self.sequence,
            width,
            height,
            PixelFormat::Rgb24,
            data,
        )))
    }

    fn close(&mut self) {
        if !self.stopped {
            self.stopped = true;
            let _ = self.pipeline.set_state(gst::State::Null);
            info!("GStreamer pipeline for {} stopped", self.location);
        }
    }

    fn describe(&self) -> String {
        format!("video file {}", self.location)
    }
}

impl Drop for GstSource {
    fn drop(&mut self) {
        self.close();
    }
}

use tracing::{debug, info};

use crate::capture::Frame;
use crate::error::DisplayError;

/// Where annotated frames end up. Lives on the thread that created it; the
/// display stage never moves it.
pub trait DisplaySurface {
    fn show(&mut self, frame: &Frame) -> Result<(), DisplayError>;

    /// Non-blocking check for a user-requested exit
    fn poll_quit(&mut self) -> bool;

    fn shutdown(&mut self);
}

/// Surface without a window: logs each frame and never asks to quit
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    shown: u64,
    closed: bool,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown(&self) -> u64 {
        self.shown
    }
}

impl DisplaySurface for HeadlessSurface {
    fn show(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        if self.closed {
            return Err(DisplayError::Render("surface already shut down".into()));
        }
        self.shown += 1;
        info!(
            "Frame {} {}x{} displayed ({:.1} ms since capture)",
            frame.sequence(),
            frame.width(),
            frame.height(),
            frame.timestamp.elapsed().as_secs_f64() * 1000.0
        );
        Ok(())
    }

    fn poll_quit(&mut self) -> bool {
        false
    }

    fn shutdown(&mut self) {
        if !self.closed {
            self.closed = true;
            debug!("Headless surface shut down after {} frames", self.shown);
        }
    }
}

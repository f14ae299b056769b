pub mod queue;
pub mod stages;
pub mod stop;

pub use queue::{bounded, Pop, PushOutcome, QueueConsumer, QueueProducer, QueueSnapshot};
pub use stages::{capture_stage, display_stage, transceive_stage, TransceiveSettings};
pub use stop::{StopReason, StopSignal};

use crate::capture::Frame;
use crate::codec::Detection;

/// Detections paired with the frame they were computed on. Consumed once by
/// the display stage.
#[derive(Debug)]
pub struct ResultBatch {
    pub frame: Frame,
    pub detections: Vec<Detection>,
}

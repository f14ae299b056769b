//! Capture, transceive and display stage loops

use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::capture::{Frame, FrameSource};
use crate::codec::{decode_detections, encode, frame_message_with_limit, ResponseMode};
use crate::display::fps::FpsMeter;
use crate::display::render::Renderer;
use crate::display::DisplaySurface;
use crate::error::{CodecError, SourceError};
use crate::net::Connection;
use crate::pipeline::queue::{Pop, PushOutcome, QueueConsumer, QueueProducer};
use crate::pipeline::stop::{StopReason, StopSignal};
use crate::pipeline::ResultBatch;

#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureStats {
    pub captured: u64,
    pub dropped: u64,
    pub stalls: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TransceiveStats {
    pub sent: u64,
    pub encode_errors: u64,
    pub oversized: u64,
    pub parse_warnings: u64,
    pub dropped: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayStats {
    pub displayed: u64,
    pub last_fps: f64,
}

/// Per-frame codec settings for the transceive stage
#[derive(Debug, Clone, Copy)]
pub struct TransceiveSettings {
    pub jpeg_quality: u8,
    pub response_mode: ResponseMode,
    pub max_payload_bytes: usize,
    pub dequeue_timeout: Duration,
    pub enqueue_timeout: Duration,
}

/// Pull frames until the source ends, fails or the session stops. Full queue
/// drops the new frame so capture never waits on the network.
pub fn capture_stage<S: FrameSource>(
    mut source: S,
    frames: QueueProducer<Frame>,
    stop: StopSignal,
    enqueue_timeout: Duration,
) -> (S, CaptureStats) {
    let mut stats = CaptureStats::default();
    info!("Capture stage started on {}", source.describe());

    while !stop.is_set() {
        match source.read_frame() {
            Ok(Some(frame)) => {
                stats.captured += 1;
                metrics::counter!("frames_captured_total").increment(1);
                let seq = frame.sequence();
                match frames.push_timeout(frame, enqueue_timeout) {
                    PushOutcome::Enqueued => {}
                    PushOutcome::Dropped => {
                        stats.dropped += 1;
                        debug!("Frame {} dropped: frame queue full", seq);
                    }
                    PushOutcome::Closed => break,
                }
            }
            Ok(None) => {
                info!("Source exhausted after {} frames", stats.captured);
                stop.trigger(StopReason::SourceExhausted);
                break;
            }
            Err(SourceError::Stalled(waited)) => {
                stats.stalls += 1;
                debug!("No frame within {:?}, rechecking stop flag", waited);
            }
            Err(e) => {
                error!("Capture error: {}", e);
                stop.trigger(StopReason::SourceFailed);
                break;
            }
        }
    }

    debug!("Capture stage exiting: {:?}", stats);
    (source, stats)
}

/// Encode, send and decode one frame at a time over the owned connection.
/// Per-frame codec errors skip the frame; a lost connection stops the session.
pub async fn transceive_stage(
    mut connection: Connection,
    frames: QueueConsumer<Frame>,
    results: QueueProducer<ResultBatch>,
    settings: TransceiveSettings,
    stop: StopSignal,
) -> (Connection, TransceiveStats) {
    let mut stats = TransceiveStats::default();
    info!("Transceive stage started against {}", connection.peer());

    while !stop.should_abort() {
        let frame = match frames.pop_timeout_async(settings.dequeue_timeout).await {
            Pop::Item(frame) => frame,
            Pop::Empty => continue,
            Pop::Closed => break,
        };
        let seq = frame.sequence();

        let message = match encode(&frame, settings.jpeg_quality)
            .and_then(|payload| frame_message_with_limit(&payload, settings.max_payload_bytes))
        {
            Ok(message) => message,
            Err(e @ CodecError::PayloadTooLarge { .. }) => {
                stats.oversized += 1;
                warn!("Frame {} skipped: {}", seq, e);
                continue;
            }
            Err(e) => {
                stats.encode_errors += 1;
                metrics::counter!("encode_errors_total").increment(1);
                warn!("Frame {} skipped: {}", seq, e);
                continue;
            }
        };

        let started = Instant::now();
        let raw = match connection.exchange(&message).await {
            Ok(raw) => raw,
            Err(e) => {
                error!("Stopping stream: {}", e);
                stop.trigger(StopReason::ConnectionLost);
                break;
            }
        };
        stats.sent += 1;
        metrics::counter!("frames_sent_total").increment(1);
        metrics::histogram!("round_trip_ms").record(started.elapsed().as_secs_f64() * 1000.0);

        let detections = decode_detections(&raw, settings.response_mode).unwrap_or_else(|w| {
            stats.parse_warnings += 1;
            metrics::counter!("parse_warnings_total").increment(1);
            warn!("Frame {}: {}", seq, w);
            Vec::new()
        });
        debug!("Frame {}: {} detection(s)", seq, detections.len());

        let batch = ResultBatch { frame, detections };
        match results.push_timeout_async(batch, settings.enqueue_timeout).await {
            PushOutcome::Enqueued => {}
            PushOutcome::Dropped => {
                stats.dropped += 1;
                debug!("Result {} dropped: result queue full", seq);
            }
            PushOutcome::Closed => break,
        }
    }

    debug!("Transceive stage exiting: {:?}", stats);
    (connection, stats)
}

/// Runs on the thread that owns the display surface. Polls for a user quit
/// every iteration and waits at most `poll_interval` for the next result.
pub fn display_stage<D: DisplaySurface + ?Sized>(
    surface: &mut D,
    results: QueueConsumer<ResultBatch>,
    renderer: &Renderer,
    stop: &StopSignal,
    poll_interval: Duration,
) -> DisplayStats {
    let mut stats = DisplayStats::default();
    let mut fps = FpsMeter::new();

    loop {
        if surface.poll_quit() {
            info!("Quit requested");
            stop.trigger(StopReason::UserQuit);
            break;
        }
        if stop.should_abort() {
            break;
        }

        let ResultBatch {
            mut frame,
            detections,
        } = match results.pop_timeout(poll_interval) {
            Pop::Item(batch) => batch,
            Pop::Empty => continue,
            Pop::Closed => break,
        };

        stats.last_fps = fps.tick(Instant::now());
        renderer.annotate(&mut frame, &detections, Some(stats.last_fps));
        metrics::histogram!("frame_latency_ms")
            .record(frame.timestamp.elapsed().as_secs_f64() * 1000.0);

        if let Err(e) = surface.show(&frame) {
            error!("Display error: {}", e);
            stop.trigger(StopReason::DisplayFailed);
            break;
        }
        stats.displayed += 1;
    }

    debug!("Display stage exiting: {:?}", stats);
    stats
}

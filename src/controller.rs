//! Stream controller: startup, coordinated shutdown and teardown

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};
use tracing::{debug, error, info, warn};

use crate::capture::FrameSource;
use crate::display::{DisplaySurface, Renderer};
use crate::error::{SourceError, StreamError};
use crate::net::Connection;
use crate::pipeline::stages::{CaptureStats, DisplayStats, TransceiveStats};
use crate::pipeline::{
    bounded, capture_stage, display_stage, transceive_stage, StopReason, StopSignal,
    TransceiveSettings,
};
use crate::Config;

/// Controller lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StreamState {
    Init,
    Running,
    Stopping,
    Stopped,
}

impl StreamState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => StreamState::Init,
            1 => StreamState::Running,
            2 => StreamState::Stopping,
            _ => StreamState::Stopped,
        }
    }
}

/// Read-only view of a controller's state, usable from other threads while
/// `run` is in progress
#[derive(Debug, Clone, Default)]
pub struct StateHandle(Arc<AtomicU8>);

impl StateHandle {
    pub fn get(&self) -> StreamState {
        StreamState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: StreamState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Outcome of one session
#[derive(Debug, Clone, Copy)]
pub struct SessionReport {
    pub reason: StopReason,
    pub captured: u64,
    pub frames_dropped: u64,
    pub sent: u64,
    pub encode_errors: u64,
    pub oversized: u64,
    pub parse_warnings: u64,
    pub results_dropped: u64,
    pub displayed: u64,
}

/// Owns the stop signal and drives one session through
/// `Init -> Running -> Stopping -> Stopped`.
pub struct StreamController {
    config: Config,
    stop: StopSignal,
    state: StateHandle,
}

impl StreamController {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            stop: StopSignal::new(),
            state: StateHandle::default(),
        }
    }

    pub fn state(&self) -> StreamState {
        self.state.get()
    }

    pub fn state_handle(&self) -> StateHandle {
        self.state.clone()
    }

    /// Handle for requesting a stop from outside the pipeline
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Run one session to completion. Capture and transceive run on a private
    /// runtime; the display stage runs on the calling thread, which must not
    /// be inside a tokio runtime.
    pub fn run<F, S, D>(&mut self, open_source: F, surface: &mut D) -> Result<SessionReport, StreamError>
    where
        F: FnOnce(&str) -> Result<S, SourceError>,
        S: FrameSource + 'static,
        D: DisplaySurface + ?Sized,
    {
        if self.state() != StreamState::Init {
            return Err(StreamError::Startup(format!(
                "controller already used (state {:?})",
                self.state()
            )));
        }

        let runtime = match Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("framelink-worker")
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => return Err(self.fail_startup(format!("runtime: {}", e))),
        };

        let client = &self.config.client;
        let mut source = match open_source(&client.video_source) {
            Ok(source) => source,
            Err(e) => return Err(self.fail_startup(e.to_string())),
        };

        let connection = runtime.block_on(Connection::open(
            &client.server_host,
            client.server_port,
            self.config.response_framing(),
            self.config.pipeline.io_timeout(),
        ));
        let connection = match connection {
            Ok(connection) => connection,
            Err(e) => {
                source.close();
                return Err(self.fail_startup(e.to_string()));
            }
        };

        self.transition(StreamState::Running);
        let (capture, transceive, display) = self.run_stages(&runtime, source, connection, surface);
        Ok(self.teardown(runtime, capture, transceive, display, surface))
    }

    fn run_stages<S, D>(
        &mut self,
        runtime: &Runtime,
        source: S,
        connection: Connection,
        surface: &mut D,
    ) -> (
        Option<(S, CaptureStats)>,
        Option<(Connection, TransceiveStats)>,
        DisplayStats,
    )
    where
        S: FrameSource + 'static,
        D: DisplaySurface + ?Sized,
    {
        let pipeline = &self.config.pipeline;
        let (frame_tx, frame_rx) = bounded("frames", pipeline.queue_capacity);
        let (result_tx, result_rx) = bounded("results", pipeline.queue_capacity);
        let queue_stats = [frame_tx.stats(), result_tx.stats()];

        let settings = TransceiveSettings {
            jpeg_quality: self.config.codec.jpeg_quality,
            response_mode: self.config.codec.response_mode,
            max_payload_bytes: self.config.codec.max_payload_bytes as usize,
            dequeue_timeout: pipeline.dequeue_timeout(),
            enqueue_timeout: pipeline.enqueue_timeout(),
        };

        let capture = runtime.spawn_blocking({
            let stop = self.stop.clone();
            let timeout = pipeline.enqueue_timeout();
            move || capture_stage(source, frame_tx, stop, timeout)
        });
        let transceive = runtime.spawn(transceive_stage(
            connection,
            frame_rx,
            result_tx,
            settings,
            self.stop.clone(),
        ));

        if pipeline.handle_ctrl_c {
            let stop = self.stop.clone();
            runtime.spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Ctrl-C received");
                    stop.trigger(StopReason::UserQuit);
                }
            });
        }

        info!("Streaming started");
        let renderer = Renderer::new(self.config.display.class_names.clone());
        let display = display_stage(
            surface,
            result_rx,
            &renderer,
            &self.stop,
            pipeline.display_poll(),
        );

        // Stages may still be finishing; stopping starts here
        match self.stop.reason() {
            Some(reason) => info!("Stop observed: {}", reason),
            None => info!("Display stage ended"),
        }
        self.transition(StreamState::Stopping);

        // Display is gone; nothing left to drain for
        self.stop.halt();

        let (capture, transceive) = runtime.block_on(async { tokio::join!(capture, transceive) });
        let capture = capture
            .map_err(|e| error!("Capture stage panicked: {}", e))
            .ok();
        let transceive = transceive
            .map_err(|e| error!("Transceive stage panicked: {}", e))
            .ok();

        for (name, stats) in ["frames", "results"].iter().zip(&queue_stats) {
            debug!("{} queue: {:?}", name, stats.snapshot());
        }
        (capture, transceive, display)
    }

    fn teardown<S, D>(
        &mut self,
        runtime: Runtime,
        capture: Option<(S, CaptureStats)>,
        transceive: Option<(Connection, TransceiveStats)>,
        display: DisplayStats,
        surface: &mut D,
    ) -> SessionReport
    where
        S: FrameSource,
        D: DisplaySurface + ?Sized,
    {
        let capture_stats = match capture {
            Some((mut source, stats)) => {
                source.close();
                stats
            }
            None => CaptureStats::default(),
        };
        let transceive_stats = match transceive {
            Some((mut connection, stats)) => {
                runtime.block_on(connection.close());
                stats
            }
            None => TransceiveStats::default(),
        };
        surface.shutdown();
        runtime.shutdown_timeout(Duration::from_millis(500));

        self.transition(StreamState::Stopped);

        let reason = self.stop.reason().unwrap_or(StopReason::UserQuit);
        let report = SessionReport {
            reason,
            captured: capture_stats.captured,
            frames_dropped: capture_stats.dropped,
            sent: transceive_stats.sent,
            encode_errors: transceive_stats.encode_errors,
            oversized: transceive_stats.oversized,
            parse_warnings: transceive_stats.parse_warnings,
            results_dropped: transceive_stats.dropped,
            displayed: display.displayed,
        };
        info!(
            "Session ended ({}): captured={} sent={} displayed={} dropped={}",
            reason,
            report.captured,
            report.sent,
            report.displayed,
            report.frames_dropped + report.results_dropped
        );
        report
    }

    fn fail_startup(&mut self, message: String) -> StreamError {
        error!("Startup failed: {}", message);
        self.transition(StreamState::Stopped);
        StreamError::Startup(message)
    }

    fn transition(&mut self, next: StreamState) {
        let current = self.state.get();
        if current == next {
            warn!("Ignoring repeated transition to {:?}", next);
            return;
        }
        debug!("Stream state {:?} -> {:?}", current, next);
        self.state.set(next);
    }
}

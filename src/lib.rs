pub mod capture;
pub mod codec;
pub mod controller;
pub mod display;
pub mod error;
pub mod net;
pub mod pipeline;
pub mod utils;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use capture::{Frame, FrameSource, PixelFormat};
pub use codec::{Detection, ResponseFraming, ResponseMode};
pub use controller::{SessionReport, StateHandle, StreamController, StreamState};
pub use display::DisplaySurface;
pub use error::{CodecError, ConnectionError, DisplayError, ParseWarning, SourceError, StreamError};
pub use pipeline::{StopReason, StopSignal};

/// Environment variable prefix, e.g. `FRAMELINK__CLIENT__SERVER_PORT=9000`
pub const ENV_PREFIX: &str = "FRAMELINK";

/// Client configuration, loaded once at startup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub client: ClientConfig,
    pub codec: CodecConfig,
    pub pipeline: PipelineConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Also read from the legacy `client.server_ip` key
    pub server_host: String,
    pub server_port: u16,
    /// Device index ("0") or path to an image, image directory or video file
    pub video_source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub jpeg_quality: u8,
    pub response_mode: ResponseMode,
    /// Overrides the framing implied by `response_mode`
    pub response_framing: Option<ResponseFraming>,
    pub max_payload_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub queue_capacity: usize,
    pub enqueue_timeout_ms: u64,
    pub dequeue_timeout_ms: u64,
    pub display_poll_ms: u64,
    pub io_timeout_ms: u64,
    /// Stop on Ctrl-C (treated as a user quit)
    pub handle_ctrl_c: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub title: String,
    pub headless: bool,
    /// Label table indexed by class id; ids past the end are drawn numerically
    pub class_names: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".into(),
            server_port: 9888,
            video_source: "0".into(),
        }
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 80,
            response_mode: ResponseMode::TextSemicolon,
            response_framing: None,
            max_payload_bytes: u32::MAX as u64,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 10,
            enqueue_timeout_ms: 200,
            dequeue_timeout_ms: 200,
            display_poll_ms: 10,
            io_timeout_ms: 5000,
            handle_ctrl_c: false,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            title: "framelink (q to quit)".into(),
            headless: false,
            class_names: display::render::COCO_CLASSES
                .iter()
                .map(|name| name.to_string())
                .collect(),
        }
    }
}

impl Config {
    /// Layer defaults, an optional TOML/JSON file and `FRAMELINK__*` environment
    /// variables, then validate the result.
    pub fn load(path: Option<&Path>) -> Result<Self, StreamError> {
        let mut builder =
            ::config::Config::builder().add_source(::config::Config::try_from(&Config::default())?);

        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder.build()?;
        let mut config: Config = settings.clone().try_deserialize()?;
        if let Ok(ip) = settings.get_string("client.server_ip") {
            config.client.server_host = ip;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        let invalid = |msg: &str| Err(StreamError::Config(msg.to_string()));

        if self.client.server_host.trim().is_empty() {
            return invalid("client.server_host must not be empty");
        }
        if self.codec.jpeg_quality > 100 {
            return invalid("codec.jpeg_quality must be within 0..=100");
        }
        if self.codec.max_payload_bytes == 0 || self.codec.max_payload_bytes > u32::MAX as u64 {
            return invalid("codec.max_payload_bytes must be within 1..=u32::MAX");
        }
        if self.pipeline.queue_capacity == 0 {
            return invalid("pipeline.queue_capacity must be at least 1");
        }
        if self.pipeline.enqueue_timeout_ms == 0
            || self.pipeline.dequeue_timeout_ms == 0
            || self.pipeline.display_poll_ms == 0
            || self.pipeline.io_timeout_ms == 0
        {
            return invalid("pipeline timeouts and poll intervals must be non-zero");
        }
        Ok(())
    }

    /// Framing used to delimit one response on the wire
    pub fn response_framing(&self) -> ResponseFraming {
        self.codec
            .response_framing
            .unwrap_or_else(|| self.codec.response_mode.default_framing())
    }
}

impl PipelineConfig {
    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_timeout_ms)
    }

    pub fn dequeue_timeout(&self) -> Duration {
        Duration::from_millis(self.dequeue_timeout_ms)
    }

    pub fn display_poll(&self) -> Duration {
        Duration::from_millis(self.display_poll_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

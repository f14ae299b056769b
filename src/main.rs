//! framelink: stream frames to a remote detection server and show the results

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use framelink::capture;
use framelink::display::{DisplaySurface, HeadlessSurface};
use framelink::{Config, ResponseMode, StreamController, StreamError};

#[derive(Parser, Debug)]
#[command(name = "framelink", version, about)]
struct Args {
    /// Detection server host
    #[arg(long)]
    host: Option<String>,

    /// Detection server port
    #[arg(long)]
    port: Option<u16>,

    /// Camera index or path to an image, image directory or video file
    #[arg(long)]
    source: Option<String>,

    /// TOML or JSON configuration file
    #[arg(long, env = "FRAMELINK_CONFIG")]
    config: Option<PathBuf>,

    /// JPEG quality, 0-100
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    quality: Option<u8>,

    /// Response dialect spoken by the server
    #[arg(long, value_enum)]
    mode: Option<ResponseMode>,

    /// Capacity of each pipeline queue
    #[arg(long)]
    queue: Option<usize>,

    /// Log frames instead of opening a window
    #[arg(long)]
    headless: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.client.server_host = host.clone();
        }
        if let Some(port) = self.port {
            config.client.server_port = port;
        }
        if let Some(source) = &self.source {
            config.client.video_source = source.clone();
        }
        if let Some(quality) = self.quality {
            config.codec.jpeg_quality = quality;
        }
        if let Some(mode) = self.mode {
            config.codec.response_mode = mode;
        }
        if let Some(queue) = self.queue {
            config.pipeline.queue_capacity = queue;
        }
        if self.headless {
            config.display.headless = true;
        }
        config.pipeline.handle_ctrl_c = true;
    }
}

fn main() -> Result<ExitCode> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("framelink=info")),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    let args = Args::parse();
    info!("framelink launching...");

    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    info!(
        "Server {}:{}, source {:?}, {:?} responses",
        config.client.server_host,
        config.client.server_port,
        config.client.video_source,
        config.codec.response_mode
    );

    let mut surface = open_surface(&config)?;
    let mut controller = StreamController::new(config);

    match controller.run(capture::open_source, surface.as_mut()) {
        Ok(report) if report.reason.is_fatal() => {
            warn!("Stream ended: {}", report.reason);
            Ok(ExitCode::from(2))
        }
        Ok(_) => {
            info!("framelink shutting down");
            Ok(ExitCode::SUCCESS)
        }
        Err(StreamError::Startup(message)) => Err(eyre!("startup failed: {}", message)),
        Err(e) => Err(e.into()),
    }
}

fn open_surface(config: &Config) -> Result<Box<dyn DisplaySurface>> {
    if config.display.headless {
        return Ok(Box::new(HeadlessSurface::new()));
    }
    window_surface(config)
}

#[cfg(feature = "sdl-display")]
fn window_surface(config: &Config) -> Result<Box<dyn DisplaySurface>> {
    let surface = framelink::display::Sdl2Display::new(&config.display.title, 800, 600)?;
    Ok(Box::new(surface))
}

#[cfg(not(feature = "sdl-display"))]
fn window_surface(_config: &Config) -> Result<Box<dyn DisplaySurface>> {
    warn!("Built without `sdl-display`; falling back to headless output");
    Ok(Box::new(HeadlessSurface::new()))
}

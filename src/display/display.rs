//! SDL2 Window Display Module
//! Shows annotated frames in an SDL2 window and reports quit requests.
//! Uses the sdl2 crate for window management and rendering.

use sdl2::event::Event;
use sdl2::keyboard::Scancode;
use sdl2::pixels::PixelFormatEnum;
use sdl2::render::{Canvas, TextureCreator};
use sdl2::video::{Window, WindowContext};
use sdl2::EventPump;
use tracing::{info, instrument};

use crate::capture::{Frame, PixelFormat};
use crate::display::DisplaySurface;
use crate::error::DisplayError;

/// SDL2 Window Display
/// Handles window creation, event polling, and frame rendering.
/// The texture follows the size of each incoming frame.
pub struct Sdl2Display {
    _sdl_context: sdl2::Sdl,
    canvas: Canvas<Window>,
    texture_creator: TextureCreator<WindowContext>,
    event_pump: EventPump,
    closed: bool,
}

impl Sdl2Display {
    #[instrument]
    pub fn new(title: &str, width: u32, height: u32) -> Result<Self, DisplayError> {
        let sdl_context = sdl2::init().map_err(DisplayError::Init)?;
        let video_subsystem = sdl_context.video().map_err(DisplayError::Init)?;

        let window = video_subsystem
            .window(title, width, height)
            .position_centered()
            .resizable()
            .build()
            .map_err(|e| DisplayError::Init(e.to_string()))?;

        let canvas = window
            .into_canvas()
            .present_vsync()
            .build()
            .map_err(|e| DisplayError::Init(e.to_string()))?;
        let texture_creator = canvas.texture_creator();
        let event_pump = sdl_context.event_pump().map_err(DisplayError::Init)?;

        info!("SDL2 window {}x{} ready", width, height);

        Ok(Self {
            _sdl_context: sdl_context,
            canvas,
            texture_creator,
            event_pump,
            closed: false,
        })
    }
}

impl DisplaySurface for Sdl2Display {
    fn show(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        let render_err = |e: String| DisplayError::Render(e);

        let (format, pixels, pitch) = match frame.meta.format {
            PixelFormat::Rgb24 => (PixelFormatEnum::RGB24, None, frame.width() as usize * 3),
            PixelFormat::Bgr24 => (PixelFormatEnum::BGR24, None, frame.width() as usize * 3),
            PixelFormat::Rgba32 | PixelFormat::Gray8 => (
                PixelFormatEnum::RGB24,
                Some(frame.to_rgb()),
                frame.width() as usize * 3,
            ),
        };
        let data = pixels.as_deref().unwrap_or(&frame.data);

        let mut texture = self
            .texture_creator
            .create_texture_streaming(format, frame.width(), frame.height())
            .map_err(|e| render_err(e.to_string()))?;

        texture
            .update(None, data, pitch)
            .map_err(|e| render_err(e.to_string()))?;

        self.canvas.clear();
        self.canvas.copy(&texture, None, None).map_err(render_err)?;

        self.canvas.present();
        Ok(())
    }

    fn poll_quit(&mut self) -> bool {
        let mut quit = false;
        for event in self.event_pump.poll_iter() {
            match event {
                Event::Quit { .. } => {
                    info!("Quit event received");
                    quit = true;
                }
                Event::KeyDown {
                    scancode: Some(Scancode::Q | Scancode::Escape),
                    ..
                } => {
                    info!("Quit key pressed");
                    quit = true;
                }
                _ => {}
            }
        }
        quit
    }

    fn shutdown(&mut self) {
        if !self.closed {
            self.closed = true;
            self.canvas.window_mut().hide();
            info!("SDL2 window closed");
        }
    }
}

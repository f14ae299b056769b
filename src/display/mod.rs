pub mod fps;
pub mod render;
pub mod surface;

#[cfg(feature = "sdl-display")]
pub mod display;

#[cfg(feature = "sdl-display")]
pub use display::Sdl2Display;
pub use render::Renderer;
pub use surface::{DisplaySurface, HeadlessSurface};

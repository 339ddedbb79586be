// Card composition: background decoding and the layered compositor.
// Rendering is CPU-bound; async callers go through tokio::task::spawn_blocking.

pub mod background;
pub mod compositor;

pub use background::{BackgroundSpec, Rgb};
pub use compositor::{Compositor, RenderOptions};

// Live preview: debounced, fire-and-forget renders of the whole document.
// Runs beside persistence and never waits on it.

pub mod bridge;
pub mod surface;

pub use bridge::PreviewBridge;
pub use surface::{HttpPreviewSurface, PreviewRequest, PreviewSurface};

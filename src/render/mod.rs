/// Frame production: backgrounds, text, widgets and the compositor.
pub mod compositor;
pub mod effects;
pub mod pipeline;
pub mod sources;
pub mod surface;
pub mod text;
pub mod widgets;

pub use pipeline::{FrameSource, Pipeline};

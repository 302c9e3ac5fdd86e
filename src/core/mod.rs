pub mod runtime;

pub use runtime::{Runtime, ThemePipelineBuilder};

//! CLI command implementations.

pub(crate) mod features;
pub(crate) mod render;

pub(crate) use features::FeaturesArgs;
pub(crate) use render::RenderArgs;

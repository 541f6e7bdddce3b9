//! Raster transform modules

pub mod colormap;
pub mod index;
pub mod mask;

// Re-export main types
pub use colormap::{apply_colormap, apply_ramp, linear_ramp};
pub use index::{ndvi, normalized_difference};
pub use mask::PolygonMask;

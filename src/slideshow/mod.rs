//! Ken Burns slideshow synchronized to a narration track

pub mod clip;
pub mod params;
pub mod timeline;
pub mod timing;

pub use params::SlideshowParams;
pub use timeline::Timeline;

//! The wsi module drives frames: acquiring a surface image, recording the scheduled passes, compositing and presenting.

pub mod frame;
pub mod overlay;

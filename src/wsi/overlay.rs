//! Hand-off point for renderers that draw on top of the composited frame, such as an editor GUI.

use anyhow::Result;

use crate::backend::SurfaceImage;
use crate::command::CommandContext;

/// Draws onto the surface image after the composite blit. The image is in `COLOR_ATTACHMENT_OPTIMAL` layout when
/// [`OverlayRenderer::draw`] is called, and must be left in that layout.
pub trait OverlayRenderer {
    /// Record overlay commands for this frame.
    fn draw(&mut self, cmd: &mut dyn CommandContext, target: &SurfaceImage) -> Result<()>;
}

impl<F> OverlayRenderer for F
where
    F: FnMut(&mut dyn CommandContext, &SurfaceImage) -> Result<()>,
{
    fn draw(&mut self, cmd: &mut dyn CommandContext, target: &SurfaceImage) -> Result<()> {
        self(cmd, target)
    }
}

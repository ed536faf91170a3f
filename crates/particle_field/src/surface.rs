//! The drawing surface that particles are rendered onto. It's provided by whatever is hosting the
//! engine.

use crate::colour::Colour;

/// A 2D drawing context over a pixel buffer. Only the handful of operations that the engine
/// actually uses.
pub trait Surface {
    /// The surface's pixel width.
    fn width(&self) -> u32;

    /// The surface's pixel height.
    fn height(&self) -> u32;

    /// Set the pixel dimensions. This always resets the pixel buffer, even when the dimensions
    /// don't change.
    fn set_size(&mut self, width: u32, height: u32);

    /// The size of whatever the surface is displayed in, in pixels.
    fn container_size(&self) -> (u32, u32);

    /// Start a new path, forgetting any shapes from the previous one.
    fn begin_path(&mut self);

    /// Close the current path.
    fn close_path(&mut self);

    /// The colour used by the next `fill()`.
    fn set_fill_colour(&mut self, colour: Colour);

    /// The opacity, between 0 and 1, applied to everything drawn by the next `fill()`.
    fn set_global_alpha(&mut self, alpha: f32);

    /// Add a circle to the current path.
    fn circle(&mut self, centre: glam::Vec2, radius: f32);

    /// Fill the shapes in the current path.
    fn fill(&mut self);
}

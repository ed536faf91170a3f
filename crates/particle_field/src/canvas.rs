//! A software drawing surface, for hosts that don't have one of their own. Particles are
//! rasterised into an RGBA pixel buffer which can then be displayed however the host likes, or
//! saved as a PNG.

use glam::Vec2;
use snafu::ResultExt as _;

use crate::colour::{Colour, TRANSPARENT};
use crate::errors::{ImageSnafu, ParticleFieldError};
use crate::surface::Surface;

/// `PixelCanvas`
#[derive(Debug, Clone)]
pub struct PixelCanvas {
    /// The pixels, in straight (not premultiplied) alpha.
    image: image::RgbaImage,
    /// The size of whatever is displaying the canvas.
    container: (u32, u32),
    /// The colour used by the next fill.
    fill_colour: Colour,
    /// Opacity applied on top of the fill colour's own alpha.
    global_alpha: f32,
    /// The circles in the current path, as centre and radius.
    path: Vec<(Vec2, f32)>,
}

impl PixelCanvas {
    /// Instantiate a transparent canvas. Its container starts out the same size as itself.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: image::RgbaImage::new(width, height),
            container: (width, height),
            fill_colour: crate::colour::WHITE,
            global_alpha: 1.0,
            path: Vec::new(),
        }
    }

    /// Change the size of whatever is displaying the canvas, eg when a terminal is resized.
    pub const fn set_container_size(&mut self, width: u32, height: u32) {
        self.container = (width, height);
    }

    /// The colour of a single pixel. `None` when the coordinates are outside the canvas.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Colour> {
        self.image.get_pixel_checked(x, y).map(|pixel| {
            let [red, green, blue, alpha] = pixel.0;
            (
                channel_to_float(red),
                channel_to_float(green),
                channel_to_float(blue),
                channel_to_float(alpha),
            )
        })
    }

    /// The underlying pixel buffer.
    #[must_use]
    pub const fn image(&self) -> &image::RgbaImage {
        &self.image
    }

    /// Write the canvas to disk as a PNG.
    ///
    /// # Errors
    /// When the file can't be written.
    pub fn save_png(&self, path: &std::path::Path) -> Result<(), ParticleFieldError> {
        self.image
            .save_with_format(path, image::ImageFormat::Png)
            .context(ImageSnafu { path })?;
        tracing::debug!("Saved canvas to {}", path.display());
        Ok(())
    }

    /// Is the centre of the given pixel inside any of the circles in the current path?
    fn is_covered(&self, x: u32, y: u32) -> bool {
        let centre = pixel_centre(x, y);
        self.path
            .iter()
            .any(|(circle, radius)| centre.distance_squared(*circle) <= radius * radius)
    }

    /// Composite a colour over a single pixel using the "source over" rule.
    fn composite(&mut self, x: u32, y: u32, source: Colour) {
        let Some(pixel) = self.image.get_pixel_mut_checked(x, y) else {
            return;
        };

        let [red, green, blue, alpha] = pixel.0;
        let destination = (
            channel_to_float(red),
            channel_to_float(green),
            channel_to_float(blue),
            channel_to_float(alpha),
        );

        let source_alpha = source.3;
        let remaining = destination.3 * (1.0 - source_alpha);
        let out_alpha = source_alpha + remaining;
        let blended = if out_alpha <= 0.0 {
            TRANSPARENT
        } else {
            (
                source.0.mul_add(source_alpha, destination.0 * remaining) / out_alpha,
                source.1.mul_add(source_alpha, destination.1 * remaining) / out_alpha,
                source.2.mul_add(source_alpha, destination.2 * remaining) / out_alpha,
                out_alpha,
            )
        };

        pixel.0 = [
            float_to_channel(blended.0),
            float_to_channel(blended.1),
            float_to_channel(blended.2),
            float_to_channel(blended.3),
        ];
    }

    /// The range of pixel indices, along one axis, that a span of floating point coordinates
    /// touches, clipped to the canvas.
    #[expect(
        clippy::as_conversions,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "The values are clamped to the canvas before casting"
    )]
    fn pixel_span(from: f32, to: f32, extent: u32) -> std::ops::Range<u32> {
        #[expect(
            clippy::cast_precision_loss,
            reason = "Canvases are never anywhere near 2^24 pixels wide"
        )]
        let limit = extent as f32;
        let start = from.floor().clamp(0.0, limit) as u32;
        let end = to.ceil().clamp(0.0, limit) as u32;
        start..end
    }
}

impl Surface for PixelCanvas {
    fn width(&self) -> u32 {
        self.image.width()
    }

    fn height(&self) -> u32 {
        self.image.height()
    }

    fn set_size(&mut self, width: u32, height: u32) {
        self.image = image::RgbaImage::new(width, height);
    }

    fn container_size(&self) -> (u32, u32) {
        self.container
    }

    fn begin_path(&mut self) {
        self.path.clear();
    }

    fn close_path(&mut self) {}

    fn set_fill_colour(&mut self, colour: Colour) {
        self.fill_colour = colour;
    }

    fn set_global_alpha(&mut self, alpha: f32) {
        // Like a browser canvas, out of range values are ignored.
        if (0.0..=1.0).contains(&alpha) {
            self.global_alpha = alpha;
        }
    }

    fn circle(&mut self, centre: Vec2, radius: f32) {
        if radius.is_finite() && radius >= 0.0 && centre.is_finite() {
            self.path.push((centre, radius));
        }
    }

    fn fill(&mut self) {
        let Some(first) = self.path.first() else {
            return;
        };

        let mut min = first.0 - first.1;
        let mut max = first.0 + first.1;
        for (centre, radius) in &self.path {
            min = min.min(*centre - *radius);
            max = max.max(*centre + *radius);
        }

        let (red, green, blue, alpha) = self.fill_colour;
        let source = (red, green, blue, alpha * self.global_alpha);

        for y in Self::pixel_span(min.y, max.y, self.height()) {
            for x in Self::pixel_span(min.x, max.x, self.width()) {
                if self.is_covered(x, y) {
                    self.composite(x, y, source);
                }
            }
        }
    }
}

/// The centre of a pixel in canvas coordinates.
#[expect(
    clippy::as_conversions,
    clippy::cast_precision_loss,
    reason = "Canvases are never anywhere near 2^24 pixels wide"
)]
fn pixel_centre(x: u32, y: u32) -> Vec2 {
    Vec2::new(x as f32 + 0.5, y as f32 + 0.5)
}

/// Convert an 8-bit colour channel to the `0.0..=1.0` range.
fn channel_to_float(channel: u8) -> f32 {
    f32::from(channel) / 255.0
}

/// Convert a `0.0..=1.0` colour channel to 8 bits.
#[expect(
    clippy::as_conversions,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "The value is clamped to the range of a u8 first"
)]
fn float_to_channel(channel: f32) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    clippy::float_cmp,
    reason = "Tests aren't so strict"
)]
mod test {
    use super::*;

    const RED: Colour = (1.0, 0.0, 0.0, 1.0);
    const BLUE: Colour = (0.0, 0.0, 1.0, 1.0);

    fn draw_circle(canvas: &mut PixelCanvas, centre: Vec2, radius: f32, colour: Colour, alpha: f32) {
        canvas.begin_path();
        canvas.set_fill_colour(colour);
        canvas.set_global_alpha(alpha);
        canvas.circle(centre, radius);
        canvas.close_path();
        canvas.fill();
    }

    #[test]
    fn starts_transparent() {
        let canvas = PixelCanvas::new(4, 3);
        assert_eq!((canvas.width(), canvas.height()), (4, 3));
        assert_eq!(canvas.container_size(), (4, 3));
        assert_eq!(canvas.pixel(3, 2), Some(TRANSPARENT));
        assert_eq!(canvas.pixel(4, 0), None);
    }

    #[test]
    fn fills_pixels_whose_centres_are_inside() {
        let mut canvas = PixelCanvas::new(10, 10);
        draw_circle(&mut canvas, Vec2::new(5.0, 5.0), 2.0, RED, 1.0);

        assert_eq!(canvas.pixel(5, 5), Some(RED));
        assert_eq!(canvas.pixel(4, 4), Some(RED));
        assert_eq!(canvas.pixel(6, 4), Some(RED));
        // Centre (7.5, 5.5) is 2.55 away.
        assert_eq!(canvas.pixel(7, 5), Some(TRANSPARENT));
        assert_eq!(canvas.pixel(0, 0), Some(TRANSPARENT));
    }

    #[test]
    fn circles_off_the_edge_are_clipped() {
        let mut canvas = PixelCanvas::new(4, 4);
        draw_circle(&mut canvas, Vec2::new(-1.0, -1.0), 3.0, RED, 1.0);
        assert_eq!(canvas.pixel(0, 0), Some(RED));
        draw_circle(&mut canvas, Vec2::new(100.0, 100.0), 3.0, BLUE, 1.0);
        assert_eq!(canvas.pixel(3, 3), Some(TRANSPARENT));
    }

    #[test]
    fn global_alpha_is_composited_source_over() {
        let mut canvas = PixelCanvas::new(3, 3);
        draw_circle(&mut canvas, Vec2::new(1.5, 1.5), 1.0, RED, 1.0);
        draw_circle(&mut canvas, Vec2::new(1.5, 1.5), 1.0, BLUE, 0.5);

        let (red, green, blue, alpha) = canvas.pixel(1, 1).unwrap();
        assert!((red - 0.5).abs() < 0.01);
        assert_eq!(green, 0.0);
        assert!((blue - 0.5).abs() < 0.01);
        assert_eq!(alpha, 1.0);
    }

    #[test]
    fn translucent_over_transparent_keeps_its_colour() {
        let mut canvas = PixelCanvas::new(3, 3);
        draw_circle(&mut canvas, Vec2::new(1.5, 1.5), 1.0, BLUE, 0.25);
        let (red, _, blue, alpha) = canvas.pixel(1, 1).unwrap();
        assert_eq!(red, 0.0);
        assert_eq!(blue, 1.0);
        assert!((alpha - 0.25).abs() < 0.01);
    }

    #[test]
    fn out_of_range_global_alpha_is_ignored() {
        let mut canvas = PixelCanvas::new(3, 3);
        canvas.set_global_alpha(0.5);
        canvas.set_global_alpha(2.0);
        canvas.set_global_alpha(f32::NAN);
        assert_eq!(canvas.global_alpha, 0.5);
    }

    #[test]
    fn setting_the_size_clears() {
        let mut canvas = PixelCanvas::new(3, 3);
        draw_circle(&mut canvas, Vec2::new(1.5, 1.5), 1.0, RED, 1.0);
        canvas.set_size(3, 3);
        assert_eq!(canvas.pixel(1, 1), Some(TRANSPARENT));
        canvas.set_size(5, 2);
        assert_eq!((canvas.width(), canvas.height()), (5, 2));
    }

    #[test]
    fn begin_path_forgets_earlier_circles() {
        let mut canvas = PixelCanvas::new(10, 10);
        canvas.begin_path();
        canvas.circle(Vec2::new(2.0, 2.0), 1.0);
        canvas.begin_path();
        canvas.set_fill_colour(RED);
        canvas.circle(Vec2::new(7.0, 7.0), 1.0);
        canvas.fill();
        assert_eq!(canvas.pixel(1, 1), Some(TRANSPARENT));
        assert_eq!(canvas.pixel(6, 6), Some(RED));
    }

    #[test]
    fn saves_png() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("canvas.png");
        let mut canvas = PixelCanvas::new(8, 8);
        draw_circle(&mut canvas, Vec2::new(4.0, 4.0), 2.0, RED, 1.0);
        canvas.save_png(&path).unwrap();

        let saved = image::open(&path).unwrap().to_rgba8();
        assert_eq!(saved.dimensions(), (8, 8));
        assert_eq!(saved.get_pixel(4, 4).0, [255, 0, 0, 255]);
    }

    #[test]
    fn saving_to_a_missing_directory_fails() {
        let canvas = PixelCanvas::new(1, 1);
        let result = canvas.save_png(std::path::Path::new("/nonexistent/drift/canvas.png"));
        assert!(matches!(result, Err(ParticleFieldError::Image { .. })));
    }
}

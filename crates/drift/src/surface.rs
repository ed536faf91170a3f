//! Turn the particle canvas into terminal cells.
//!
//! Every character cell holds two "pixels", one above the other, drawn with the half block
//! characters "▀" and "▄". Each of these terminal pixels is the average of a square block of
//! canvas pixels, `resolution` pixels wide.

use particle_field::canvas::PixelCanvas;
use particle_field::colour::Colour;
use particle_field::surface::Surface as _;
use termwiz::surface::Change as TermwizChange;
use termwiz::surface::Position as TermwizPosition;

/// Terminal pixels fainter than this are left as the terminal's default background.
const VISIBILITY_THRESHOLD: f32 = 1.0 / 255.0;

/// A frame of terminal cells, built from a canvas.
pub(crate) struct Surface {
    /// A surface of terminal cells
    pub surface: termwiz::surface::Surface,
}

impl Surface {
    /// Build a frame of the given size from the canvas.
    pub fn from_canvas(canvas: &PixelCanvas, width: usize, height: usize, resolution: u32) -> Self {
        let mut frame = Self {
            surface: termwiz::surface::Surface::new(width, height),
        };

        for row in 0..height {
            for col in 0..width {
                let upper = Self::terminal_pixel(canvas, col, row * 2, resolution);
                let lower = Self::terminal_pixel(canvas, col, row * 2 + 1, resolution);
                frame.add_cell(col, row, upper, lower);
            }
        }

        frame
    }

    /// Average the block of canvas pixels that make up a single terminal pixel. The result is
    /// composited over black, which is what most terminal themes' backgrounds are close to.
    #[expect(
        clippy::as_conversions,
        clippy::cast_precision_loss,
        reason = "Blocks are never anywhere near 2^24 pixels"
    )]
    fn terminal_pixel(canvas: &PixelCanvas, x: usize, y: usize, resolution: u32) -> Option<Colour> {
        let resolution = resolution.max(1);
        let block_x = u32::try_from(x).ok()?.checked_mul(resolution)?;
        let block_y = u32::try_from(y).ok()?.checked_mul(resolution)?;
        if block_x >= canvas.width() || block_y >= canvas.height() {
            return None;
        }

        let mut sum = (0.0_f32, 0.0_f32, 0.0_f32, 0.0_f32);
        for canvas_y in block_y..block_y.saturating_add(resolution) {
            for canvas_x in block_x..block_x.saturating_add(resolution) {
                let Some((red, green, blue, alpha)) = canvas.pixel(canvas_x, canvas_y) else {
                    continue;
                };
                sum.0 = red.mul_add(alpha, sum.0);
                sum.1 = green.mul_add(alpha, sum.1);
                sum.2 = blue.mul_add(alpha, sum.2);
                sum.3 += alpha;
            }
        }

        let count = (resolution * resolution) as f32;
        if sum.3 / count < VISIBILITY_THRESHOLD {
            return None;
        }

        Some((sum.0 / count, sum.1 / count, sum.2 / count, 1.0))
    }

    /// Add a single cell made of 2 terminal pixels.
    ///
    /// The rule is that we default to rendering any pair of colours using the upper half block.
    /// Therefore the upper "pixel" is rendered with the cell's foreground and the lower "pixel"
    /// is rendered with the cell's background colour. The exception is when only the lower pixel
    /// has a colour. Then it's drawn with the lower half block so that the upper half keeps the
    /// terminal's default background colour.
    fn add_cell(&mut self, col: usize, row: usize, upper: Option<Colour>, lower: Option<Colour>) {
        let (character, foreground, background) = match (upper, lower) {
            (None, None) => return,
            (Some(upper_colour), None) => ("▀", upper_colour, None),
            (None, Some(lower_colour)) => ("▄", lower_colour, None),
            (Some(upper_colour), Some(lower_colour)) => ("▀", upper_colour, Some(lower_colour)),
        };

        let background_attribute = match background {
            Some(colour) => Self::make_colour_attribute(colour),
            None => termwiz::color::ColorAttribute::Default,
        };

        self.surface.add_changes(vec![
            TermwizChange::CursorPosition {
                x: TermwizPosition::Absolute(col),
                y: TermwizPosition::Absolute(row),
            },
            TermwizChange::Attribute(termwiz::cell::AttributeChange::Foreground(
                Self::make_colour_attribute(foreground),
            )),
            TermwizChange::Attribute(termwiz::cell::AttributeChange::Background(
                background_attribute,
            )),
        ]);
        self.surface.add_change(character);
    }

    /// Convert a colour into a true colour cell attribute.
    pub const fn make_colour_attribute(colour: Colour) -> termwiz::color::ColorAttribute {
        termwiz::color::ColorAttribute::TrueColorWithDefaultFallback(termwiz::color::SrgbaTuple(
            colour.0, colour.1, colour.2, 1.0,
        ))
    }
}

#[cfg(test)]
#[expect(
    clippy::indexing_slicing,
    clippy::unwrap_used,
    reason = "Tests aren't so strict"
)]
mod test {
    use glam::Vec2;
    use particle_field::surface::Surface as _;

    use super::*;

    const RED: Colour = (1.0, 0.0, 0.0, 1.0);

    fn fill_circle(canvas: &mut PixelCanvas, centre: Vec2, radius: f32, alpha: f32) {
        canvas.begin_path();
        canvas.set_fill_colour(RED);
        canvas.set_global_alpha(alpha);
        canvas.circle(centre, radius);
        canvas.close_path();
        canvas.fill();
    }

    #[test]
    fn empty_canvas_makes_an_empty_frame() {
        let canvas = PixelCanvas::new(8, 8);
        let mut frame = Surface::from_canvas(&canvas, 4, 2, 2);
        for line in frame.surface.screen_cells() {
            for cell in line.iter() {
                assert_eq!(cell.str(), " ");
            }
        }
    }

    #[test]
    fn upper_pixels_use_the_upper_half_block() {
        let mut canvas = PixelCanvas::new(8, 8);
        fill_circle(&mut canvas, Vec2::new(1.0, 1.0), 1.0, 1.0);

        let mut frame = Surface::from_canvas(&canvas, 4, 2, 2);
        let cells = frame.surface.screen_cells();
        let cell = &cells[0][0];
        assert_eq!(cell.str(), "▀");
        assert_eq!(
            cell.attrs().foreground(),
            Surface::make_colour_attribute(RED)
        );
        assert_eq!(
            cell.attrs().background(),
            termwiz::color::ColorAttribute::Default
        );
        assert_eq!(cells[0][1].str(), " ");
        assert_eq!(cells[1][0].str(), " ");
    }

    #[test]
    fn lone_lower_pixels_use_the_lower_half_block() {
        let mut canvas = PixelCanvas::new(8, 8);
        fill_circle(&mut canvas, Vec2::new(3.0, 3.0), 1.0, 1.0);

        let mut frame = Surface::from_canvas(&canvas, 4, 2, 2);
        let cells = frame.surface.screen_cells();
        let cell = &cells[0][1];
        assert_eq!(cell.str(), "▄");
        assert_eq!(
            cell.attrs().foreground(),
            Surface::make_colour_attribute(RED)
        );
    }

    #[test]
    fn both_pixels_share_a_cell() {
        let mut canvas = PixelCanvas::new(8, 8);
        fill_circle(&mut canvas, Vec2::new(1.0, 1.0), 1.0, 1.0);
        fill_circle(&mut canvas, Vec2::new(1.0, 3.0), 1.0, 1.0);

        let mut frame = Surface::from_canvas(&canvas, 4, 2, 2);
        let cells = frame.surface.screen_cells();
        let cell = &cells[0][0];
        assert_eq!(cell.str(), "▀");
        assert_eq!(
            cell.attrs().background(),
            Surface::make_colour_attribute(RED)
        );
    }

    #[test]
    fn blocks_are_averaged() {
        let mut canvas = PixelCanvas::new(2, 2);
        // Only covers the centre of the top-left pixel.
        fill_circle(&mut canvas, Vec2::new(0.5, 0.5), 0.1, 1.0);

        let colour = Surface::terminal_pixel(&canvas, 0, 0, 2).unwrap();
        assert!((colour.0 - 0.25).abs() < 0.01);
        assert!(colour.1.abs() < f32::EPSILON);
    }

    #[test]
    fn pixels_beyond_the_canvas_are_empty() {
        let mut canvas = PixelCanvas::new(2, 2);
        fill_circle(&mut canvas, Vec2::new(1.0, 1.0), 2.0, 1.0);
        assert!(Surface::terminal_pixel(&canvas, 0, 0, 2).is_some());
        assert!(Surface::terminal_pixel(&canvas, 1, 0, 2).is_none());
        assert!(Surface::terminal_pixel(&canvas, 0, 1, 2).is_none());
    }
}

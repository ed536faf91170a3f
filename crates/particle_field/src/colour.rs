//! Parse the fill colour strings that users put in their settings.

use std::str::FromStr as _;

use snafu::OptionExt as _;

use crate::errors::{ColourSnafu, ParticleFieldError};

/// An RGBA colour, each channel in the range `0.0..=1.0`.
pub type Colour = (f32, f32, f32, f32);

/// A default pure white.
pub const WHITE: Colour = (1.0, 1.0, 1.0, 1.0);

/// A fully transparent colour. What an empty canvas is filled with.
pub const TRANSPARENT: Colour = (0.0, 0.0, 0.0, 0.0);

/// Parse a colour in any of the supported encodings:
///   * Hex: `#rgb`, `#rrggbb` (the `#` is optional)
///   * CSS named colours: `tomato`, `rebeccapurple`
///   * CSS functions: `rgb(148, 236, 190)`, `rgba(148, 236, 190, 0.5)`
///
/// # Errors
/// When the string isn't in any of the encodings above.
pub fn parse(value: &str) -> Result<Colour, ParticleFieldError> {
    let trimmed = value.trim();

    if let Ok(rgb) = palette::Srgb::<u8>::from_str(trimmed) {
        return Ok(from_srgb(rgb, 1.0));
    }

    let lowercased = trimmed.to_lowercase();
    if let Some(rgb) = palette::named::from_str(&lowercased) {
        return Ok(from_srgb(rgb, 1.0));
    }

    parse_css_function(&lowercased).context(ColourSnafu { value })
}

/// An opaque colour from 8-bit channels.
#[must_use]
pub fn from_rgb8(red: u8, green: u8, blue: u8) -> Colour {
    from_srgb(palette::Srgb::new(red, green, blue), 1.0)
}

/// Convert an 8-bit `palette` colour into our floating point tuple.
fn from_srgb(rgb: palette::Srgb<u8>, alpha: f32) -> Colour {
    let rgb_f32: palette::Srgb<f32> = rgb.into_format();
    (rgb_f32.red, rgb_f32.green, rgb_f32.blue, alpha)
}

/// Parse `rgb(r, g, b)` and `rgba(r, g, b, a)`. The RGB channels are 0-255, alpha is 0-1.
fn parse_css_function(value: &str) -> Option<Colour> {
    let arguments = value
        .strip_prefix("rgba(")
        .or_else(|| value.strip_prefix("rgb("))?
        .strip_suffix(')')?;

    let channels = arguments
        .split(',')
        .map(|channel| channel.trim().parse::<f32>().ok())
        .collect::<Option<Vec<f32>>>()?;

    let (red, green, blue, alpha) = match channels.as_slice() {
        [red, green, blue] => (*red, *green, *blue, 1.0),
        [red, green, blue, alpha] => (*red, *green, *blue, *alpha),
        _ => return None,
    };

    let is_valid = [red, green, blue]
        .iter()
        .all(|channel| (0.0..=255.0).contains(channel))
        && (0.0..=1.0).contains(&alpha);
    if !is_valid {
        return None;
    }

    Some((red / 255.0, green / 255.0, blue / 255.0, alpha))
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    clippy::float_cmp,
    reason = "Tests aren't so strict"
)]
mod test {
    use super::*;

    #[test]
    fn parses_hex() {
        let colour = parse("#94ecbe").unwrap();
        assert_eq!(colour, from_rgb8(148, 236, 190));
        assert!((colour.1 - 236.0 / 255.0).abs() < f32::EPSILON);

        assert_eq!(parse("ffffff").unwrap(), WHITE);
        assert_eq!(parse("#fff").unwrap(), WHITE);
    }

    #[test]
    fn parses_named_colours() {
        assert_eq!(parse("White").unwrap(), WHITE);
        let tomato = parse("tomato").unwrap();
        assert_eq!(tomato.0, 1.0);
        assert_eq!(tomato.3, 1.0);
    }

    #[test]
    fn parses_css_functions() {
        assert_eq!(parse("rgb(255, 255, 255)").unwrap(), WHITE);
        let translucent = parse("rgba(0, 0, 255, 0.5)").unwrap();
        assert_eq!(translucent, (0.0, 0.0, 1.0, 0.5));
    }

    #[test]
    fn rejects_garbage() {
        let error = parse("not-a-colour").unwrap_err();
        assert_eq!(format!("{error}"), "Unrecognised colour: 'not-a-colour'");
        assert!(parse("rgb(300, 0, 0)").is_err());
        assert!(parse("rgb(1, 2)").is_err());
    }
}

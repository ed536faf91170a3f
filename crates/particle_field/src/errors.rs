//! Errors for this library
//!
//! The simulation itself can't fail. Only parsing user-supplied colours and writing a canvas to
//! disk can.

/// All the known errors returned by this crate.
#[derive(Debug, snafu::Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum ParticleFieldError {
    #[snafu(display("Unrecognised colour: '{value}'"))]
    /// A fill colour that isn't in any of the supported encodings.
    Colour {
        /// The colour string as it was given.
        value: String,
    },

    #[snafu(display("Couldn't save canvas to {}", path.display()))]
    /// Writing the pixel buffer out as an image failed.
    Image {
        /// Where the image was going to be saved.
        path: std::path::PathBuf,
        /// The parent error type
        source: image::ImageError,
    },
}

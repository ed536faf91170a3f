//! All the variables that can be configured for the particle field.
//!
//! There are two flavours of every settings group. The `Partial*` structs are what users send in,
//! every field is optional. The full structs are a complete, bound-checked snapshot that the
//! engine reads from. A new snapshot is made for every merge, they're never mutated in place.

use crate::colour::Colour;

/// The refresh interval that opacity transition rates are calculated against, regardless of how
/// often frames are actually requested.
pub const REFERENCE_FRAME_INTERVAL_MS: f32 = 1000.0 / 60.0;

/// The colour particles are filled with when none, or an unparseable one, is given.
pub const DEFAULT_COLOUR: &str = "#94ecbe";

/// `DEFAULT_COLOUR` already parsed. Built the same way that parsing builds it, so that default
/// snapshots compare equal to merged ones.
#[must_use]
pub fn default_fill() -> Colour {
    crate::colour::from_rgb8(0x94, 0xec, 0xbe)
}

/// Used when the configured transition time isn't positive.
const FALLBACK_TRANSITION_TIME_MS: f32 = 1000.0;

/// A complete snapshot of the settings.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct Settings {
    /// The drawing surface.
    pub canvas: Canvas,
    /// How particles look and how many there are.
    pub particle: Particle,
    /// How particles move.
    pub velocity: Velocity,
    /// How particles fade in and out.
    pub opacity: Opacity,
}

/// Settings for the drawing surface.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Canvas {
    /// Size the surface to whatever contains it, on every frame.
    pub fill_to_container: bool,
    /// The surface's pixel width when not filling the container.
    pub width: u32,
    /// The surface's pixel height when not filling the container.
    pub height: u32,
    /// Reflect particles off the edges rather than wrapping them around to the opposite edge.
    pub bounce_off_walls: bool,
}

/// Settings for the particles themselves.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct Particle {
    /// The size of the population.
    pub count: usize,
    /// The fill colour, as the user wrote it.
    pub colour: String,
    /// The fill colour, parsed.
    pub fill: Colour,
    /// The smallest radius, in pixels.
    pub min_size: Option<f32>,
    /// The largest radius, in pixels.
    pub max_size: f32,
}

/// Settings for particle movement.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct Velocity {
    /// The general heading of all particles. 0° is up, 90° is right. When not set, particles head
    /// off in any direction.
    pub direction_angle_degrees: Option<f32>,
    /// How far either side of the heading a particle may stray.
    pub direction_angle_variance_degrees: Option<f32>,
    /// The slowest speed, in pixels per frame.
    pub min_speed: Option<f32>,
    /// The fastest speed, in pixels per frame.
    pub max_speed: f32,
}

/// Settings for particle opacity.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct Opacity {
    /// The most transparent a particle gets.
    pub min_opacity: Option<f32>,
    /// The most opaque a particle gets.
    pub max_opacity: Option<f32>,
    /// How long it takes to fade from one bound to the other.
    pub transition_time_ms: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            canvas: Canvas {
                fill_to_container: true,
                width: 200,
                height: 200,
                bounce_off_walls: false,
            },
            particle: Particle {
                count: 50,
                colour: DEFAULT_COLOUR.to_owned(),
                fill: default_fill(),
                min_size: None,
                max_size: 5.0,
            },
            velocity: Velocity {
                direction_angle_degrees: None,
                direction_angle_variance_degrees: None,
                min_speed: None,
                max_speed: 1.0,
            },
            opacity: Opacity {
                min_opacity: None,
                max_opacity: Some(1.0),
                transition_time_ms: 3000.0,
            },
        }
    }
}

/// Partial settings, as sent by users. Any field that is set overrides the current snapshot.
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct PartialSettings {
    /// The drawing surface.
    pub canvas: PartialCanvas,
    /// How particles look and how many there are.
    pub particle: PartialParticle,
    /// How particles move.
    pub velocity: PartialVelocity,
    /// How particles fade in and out.
    pub opacity: PartialOpacity,
}

/// See [`Canvas`].
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct PartialCanvas {
    /// See [`Canvas::fill_to_container`].
    #[serde(alias = "fillToContainer", skip_serializing_if = "Option::is_none")]
    pub fill_to_container: Option<bool>,
    /// See [`Canvas::width`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// See [`Canvas::height`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// See [`Canvas::bounce_off_walls`].
    #[serde(alias = "bounceOffWalls", skip_serializing_if = "Option::is_none")]
    pub bounce_off_walls: Option<bool>,
}

/// See [`Particle`].
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct PartialParticle {
    /// See [`Particle::count`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    /// See [`Particle::colour`].
    #[serde(rename = "color", alias = "colour", skip_serializing_if = "Option::is_none")]
    pub colour: Option<String>,
    /// See [`Particle::min_size`].
    #[serde(alias = "minSize", skip_serializing_if = "Option::is_none")]
    pub min_size: Option<f32>,
    /// See [`Particle::max_size`].
    #[serde(alias = "maxSize", skip_serializing_if = "Option::is_none")]
    pub max_size: Option<f32>,
}

/// See [`Velocity`].
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct PartialVelocity {
    /// See [`Velocity::direction_angle_degrees`].
    #[serde(alias = "directionAngleDegrees", skip_serializing_if = "Option::is_none")]
    pub direction_angle_degrees: Option<f32>,
    /// See [`Velocity::direction_angle_variance_degrees`].
    #[serde(
        alias = "directionAngleVarianceDegrees",
        skip_serializing_if = "Option::is_none"
    )]
    pub direction_angle_variance_degrees: Option<f32>,
    /// See [`Velocity::min_speed`].
    #[serde(alias = "minSpeed", skip_serializing_if = "Option::is_none")]
    pub min_speed: Option<f32>,
    /// See [`Velocity::max_speed`].
    #[serde(alias = "maxSpeed", skip_serializing_if = "Option::is_none")]
    pub max_speed: Option<f32>,
}

/// See [`Opacity`].
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct PartialOpacity {
    /// See [`Opacity::min_opacity`].
    #[serde(alias = "minOpacity", skip_serializing_if = "Option::is_none")]
    pub min_opacity: Option<f32>,
    /// See [`Opacity::max_opacity`].
    #[serde(alias = "maxOpacity", skip_serializing_if = "Option::is_none")]
    pub max_opacity: Option<f32>,
    /// See [`Opacity::transition_time_ms`].
    #[serde(alias = "transitionTimeMs", skip_serializing_if = "Option::is_none")]
    pub transition_time_ms: Option<f32>,
}

/// A value that is either fixed or drawn uniformly from a range.
#[derive(Debug, Clone, Copy, PartialEq)]
#[non_exhaustive]
pub enum Spread {
    /// Always the same value.
    Fixed(f32),
    /// Anywhere between `min` and `max`, inclusive.
    Range {
        /// Lower bound
        min: f32,
        /// Upper bound
        max: f32,
    },
}

impl Spread {
    /// Build from an optional lower bound and a required upper bound. Bounds given the wrong
    /// way round are swapped.
    #[must_use]
    pub fn from_bounds(maybe_min: Option<f32>, max: f32) -> Self {
        match maybe_min {
            Some(min) => Self::Range {
                min: min.min(max),
                max: min.max(max),
            },
            None => Self::Fixed(max),
        }
    }

    /// Pick a value.
    pub fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        match *self {
            Self::Fixed(value) => value,
            Self::Range { min, max } => uniform(rng, min, max),
        }
    }
}

/// How a particle's opacity behaves.
#[derive(Debug, Clone, Copy, PartialEq)]
#[non_exhaustive]
pub enum OpacityMode {
    /// No opacity at all, particles are drawn fully opaque.
    Opaque,
    /// A constant opacity.
    Fixed(f32),
    /// A triangle wave between the two bounds.
    Oscillating {
        /// Lower bound
        min: f32,
        /// Upper bound
        max: f32,
    },
}

/// Draw a float uniformly from between two values. They don't need to be in order.
pub(crate) fn uniform<R: rand::Rng + ?Sized>(rng: &mut R, from: f32, to: f32) -> f32 {
    rng.gen::<f32>().mul_add(to - from, from)
}

impl Settings {
    /// Build a snapshot from the defaults and the given partial settings.
    #[must_use]
    pub fn from_partial(partial: &PartialSettings) -> Self {
        Self::default().merge(partial)
    }

    /// Deep-merge partial settings over this snapshot to make a new, bound-checked, snapshot.
    /// Any field set in `partial` wins, anything not set is kept from `self`.
    #[must_use]
    pub fn merge(&self, partial: &PartialSettings) -> Self {
        let mut merged = Self {
            canvas: self.canvas.merge(&partial.canvas),
            particle: self.particle.merge(&partial.particle),
            velocity: self.velocity.merge(&partial.velocity),
            opacity: self.opacity.merge(&partial.opacity),
        };
        merged.bound_check();
        merged
    }

    /// Silently correct any values that would break the simulation.
    fn bound_check(&mut self) {
        let opacity = &mut self.opacity;
        if let Some(max_opacity) = opacity.max_opacity {
            if !(0.0..=1.0).contains(&max_opacity) {
                tracing::warn!("`max_opacity` of {max_opacity} is out of range, using 1");
                opacity.max_opacity = Some(1.0);
            }
        }
        if let Some(min_opacity) = opacity.min_opacity {
            if !(0.0..=1.0).contains(&min_opacity) {
                tracing::warn!("`min_opacity` of {min_opacity} is out of range, using 0");
                opacity.min_opacity = Some(0.0);
            }
        }
        if opacity.transition_time_ms.is_nan() || opacity.transition_time_ms <= 0.0 {
            tracing::warn!(
                "`transition_time_ms` of {} isn't positive, using {FALLBACK_TRANSITION_TIME_MS}",
                opacity.transition_time_ms
            );
            opacity.transition_time_ms = FALLBACK_TRANSITION_TIME_MS;
        }

        match crate::colour::parse(&self.particle.colour) {
            Ok(fill) => self.particle.fill = fill,
            Err(error) => {
                tracing::warn!("{error}, using {DEFAULT_COLOUR}");
                DEFAULT_COLOUR.clone_into(&mut self.particle.colour);
                self.particle.fill = default_fill();
            }
        }
    }
}

impl Canvas {
    /// Merge partial canvas settings over these ones.
    fn merge(&self, partial: &PartialCanvas) -> Self {
        Self {
            fill_to_container: partial.fill_to_container.unwrap_or(self.fill_to_container),
            width: partial.width.unwrap_or(self.width),
            height: partial.height.unwrap_or(self.height),
            bounce_off_walls: partial.bounce_off_walls.unwrap_or(self.bounce_off_walls),
        }
    }
}

impl Particle {
    /// Merge partial particle settings over these ones.
    fn merge(&self, partial: &PartialParticle) -> Self {
        Self {
            count: partial.count.unwrap_or(self.count),
            colour: partial
                .colour
                .clone()
                .unwrap_or_else(|| self.colour.clone()),
            fill: self.fill,
            min_size: partial.min_size.or(self.min_size),
            max_size: partial.max_size.unwrap_or(self.max_size),
        }
    }

    /// How big new particles are.
    #[must_use]
    pub fn size(&self) -> Spread {
        Spread::from_bounds(self.min_size, self.max_size)
    }
}

impl Velocity {
    /// Merge partial velocity settings over these ones.
    fn merge(&self, partial: &PartialVelocity) -> Self {
        Self {
            direction_angle_degrees: partial
                .direction_angle_degrees
                .or(self.direction_angle_degrees),
            direction_angle_variance_degrees: partial
                .direction_angle_variance_degrees
                .or(self.direction_angle_variance_degrees),
            min_speed: partial.min_speed.or(self.min_speed),
            max_speed: partial.max_speed.unwrap_or(self.max_speed),
        }
    }

    /// How fast new particles move.
    #[must_use]
    pub fn speed(&self) -> Spread {
        Spread::from_bounds(self.min_speed, self.max_speed)
    }

    /// The range of headings, in degrees, that new particles can have.
    #[must_use]
    pub fn heading(&self) -> Spread {
        match self.direction_angle_degrees {
            Some(angle) => {
                let variance = self.direction_angle_variance_degrees.unwrap_or(0.0);
                Spread::Range {
                    min: angle - variance,
                    max: angle + variance,
                }
            }
            None => Spread::Range {
                min: 0.0,
                max: 360.0,
            },
        }
    }
}

impl Opacity {
    /// Merge partial opacity settings over these ones.
    fn merge(&self, partial: &PartialOpacity) -> Self {
        Self {
            min_opacity: partial.min_opacity.or(self.min_opacity),
            max_opacity: partial.max_opacity.or(self.max_opacity),
            transition_time_ms: partial
                .transition_time_ms
                .unwrap_or(self.transition_time_ms),
        }
    }

    /// How the opacity of particles behaves.
    #[must_use]
    pub fn mode(&self) -> OpacityMode {
        match (self.min_opacity, self.max_opacity) {
            (Some(min), Some(max)) => OpacityMode::Oscillating {
                min: min.min(max),
                max: min.max(max),
            },
            (Some(value), None) | (None, Some(value)) => OpacityMode::Fixed(value),
            (None, None) => OpacityMode::Opaque,
        }
    }

    /// How much an oscillating opacity changes in a single frame.
    #[must_use]
    pub fn rate_per_frame(&self) -> f32 {
        (REFERENCE_FRAME_INTERVAL_MS / self.transition_time_ms) * 2.0
    }
}

impl PartialSettings {
    /// Layer another set of partial settings on top of these ones. Fields set in `top` win.
    #[must_use]
    pub fn overlay(&self, top: &Self) -> Self {
        Self {
            canvas: PartialCanvas {
                fill_to_container: top.canvas.fill_to_container.or(self.canvas.fill_to_container),
                width: top.canvas.width.or(self.canvas.width),
                height: top.canvas.height.or(self.canvas.height),
                bounce_off_walls: top.canvas.bounce_off_walls.or(self.canvas.bounce_off_walls),
            },
            particle: PartialParticle {
                count: top.particle.count.or(self.particle.count),
                colour: top
                    .particle
                    .colour
                    .clone()
                    .or_else(|| self.particle.colour.clone()),
                min_size: top.particle.min_size.or(self.particle.min_size),
                max_size: top.particle.max_size.or(self.particle.max_size),
            },
            velocity: PartialVelocity {
                direction_angle_degrees: top
                    .velocity
                    .direction_angle_degrees
                    .or(self.velocity.direction_angle_degrees),
                direction_angle_variance_degrees: top
                    .velocity
                    .direction_angle_variance_degrees
                    .or(self.velocity.direction_angle_variance_degrees),
                min_speed: top.velocity.min_speed.or(self.velocity.min_speed),
                max_speed: top.velocity.max_speed.or(self.velocity.max_speed),
            },
            opacity: PartialOpacity {
                min_opacity: top.opacity.min_opacity.or(self.opacity.min_opacity),
                max_opacity: top.opacity.max_opacity.or(self.opacity.max_opacity),
                transition_time_ms: top
                    .opacity
                    .transition_time_ms
                    .or(self.opacity.transition_time_ms),
            },
        }
    }
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    clippy::float_cmp,
    clippy::default_numeric_fallback,
    reason = "Tests aren't so strict"
)]
mod test {
    use super::*;

    fn opacity_partial(min: Option<f32>, max: Option<f32>, time: Option<f32>) -> PartialSettings {
        PartialSettings {
            opacity: PartialOpacity {
                min_opacity: min,
                max_opacity: max,
                transition_time_ms: time,
            },
            ..PartialSettings::default()
        }
    }

    #[test]
    fn defaults() {
        let settings = Settings::default();
        assert!(settings.canvas.fill_to_container);
        assert_eq!(settings.canvas.width, 200);
        assert_eq!(settings.particle.count, 50);
        assert_eq!(settings.particle.colour, "#94ecbe");
        assert_eq!(settings.velocity.max_speed, 1.0);
        assert_eq!(settings.opacity.transition_time_ms, 3000.0);
        assert_eq!(settings.opacity.mode(), OpacityMode::Fixed(1.0));
        assert_eq!(crate::colour::parse(DEFAULT_COLOUR).unwrap(), default_fill());
    }

    #[test]
    fn defaults_match_an_empty_merge() {
        assert_eq!(
            Settings::from_partial(&PartialSettings::default()),
            Settings::default()
        );
    }

    #[test]
    fn merge_is_right_biased_per_leaf() {
        let current = Settings::default().merge(&opacity_partial(Some(0.1), Some(0.5), None));
        let merged = current.merge(&opacity_partial(None, Some(0.9), None));

        assert_eq!(merged.opacity.min_opacity, Some(0.1));
        assert_eq!(merged.opacity.max_opacity, Some(0.9));
        assert_eq!(merged.opacity.transition_time_ms, 3000.0);
        assert_eq!(merged.canvas, current.canvas);
        assert_eq!(merged.particle, current.particle);
    }

    #[test]
    fn merge_does_not_mutate_the_current_snapshot() {
        let current = Settings::default();
        let partial = PartialSettings {
            particle: PartialParticle {
                count: Some(3),
                ..PartialParticle::default()
            },
            ..PartialSettings::default()
        };
        let merged = current.merge(&partial);
        assert_eq!(merged.particle.count, 3);
        assert_eq!(current.particle.count, 50);
    }

    #[test]
    fn bound_check_always_holds() {
        let values = [-10.0, -0.1, 0.0, 0.5, 1.0, 1.1, 99.0, f32::NAN];
        for min in values {
            for max in values {
                for time in values {
                    let settings = Settings::from_partial(&opacity_partial(
                        Some(min),
                        Some(max),
                        Some(time),
                    ));
                    let opacity = settings.opacity;
                    assert!((0.0..=1.0).contains(&opacity.min_opacity.unwrap()));
                    assert!((0.0..=1.0).contains(&opacity.max_opacity.unwrap()));
                    assert!(opacity.transition_time_ms > 0.0);
                }
            }
        }
    }

    #[test]
    fn out_of_range_opacities_are_reset_not_clamped() {
        let settings = Settings::from_partial(&opacity_partial(Some(1.5), Some(-1.0), Some(-5.0)));
        assert_eq!(settings.opacity.min_opacity, Some(0.0));
        assert_eq!(settings.opacity.max_opacity, Some(1.0));
        assert_eq!(settings.opacity.transition_time_ms, 1000.0);
    }

    #[test]
    fn bad_colours_fall_back_to_the_default() {
        let partial: PartialSettings =
            serde_json::from_str(r#"{ "particle": { "color": "nonsense" } }"#).unwrap();
        let settings = Settings::from_partial(&partial);
        assert_eq!(settings.particle.colour, DEFAULT_COLOUR);
        assert_eq!(settings.particle.fill, default_fill());

        let partial: PartialSettings =
            serde_json::from_str(r#"{ "particle": { "color": "white" } }"#).unwrap();
        let settings = Settings::from_partial(&partial);
        assert_eq!(settings.particle.fill, crate::colour::WHITE);
    }

    #[test]
    fn deserialises_camel_case_props() {
        let json = r#"{
            "canvas": { "fillToContainer": false, "width": 320, "bounceOffWalls": true },
            "particle": { "count": 10, "minSize": 1, "maxSize": 3 },
            "velocity": { "directionAngleDegrees": 90, "minSpeed": 0.5, "maxSpeed": 2 },
            "opacity": { "minOpacity": 0.2, "transitionTimeMs": 500 }
        }"#;
        let partial: PartialSettings = serde_json::from_str(json).unwrap();
        let settings = Settings::from_partial(&partial);

        assert!(!settings.canvas.fill_to_container);
        assert!(settings.canvas.bounce_off_walls);
        assert_eq!(settings.canvas.width, 320);
        assert_eq!(settings.canvas.height, 200);
        assert_eq!(settings.particle.size(), Spread::Range { min: 1.0, max: 3.0 });
        assert_eq!(settings.velocity.speed(), Spread::Range { min: 0.5, max: 2.0 });
        assert_eq!(
            settings.velocity.heading(),
            Spread::Range {
                min: 90.0,
                max: 90.0
            }
        );
        assert_eq!(
            settings.opacity.mode(),
            OpacityMode::Oscillating { min: 0.2, max: 1.0 }
        );
    }

    #[test]
    fn reversed_ranges_are_normalised() {
        assert_eq!(
            Spread::from_bounds(Some(4.0), 2.0),
            Spread::Range { min: 2.0, max: 4.0 }
        );
        let opacity = Opacity {
            min_opacity: Some(0.8),
            max_opacity: Some(0.3),
            transition_time_ms: 1000.0,
        };
        assert_eq!(opacity.mode(), OpacityMode::Oscillating { min: 0.3, max: 0.8 });
    }

    #[test]
    fn a_single_opacity_bound_is_fixed() {
        let only_min = Opacity {
            min_opacity: Some(0.4),
            max_opacity: None,
            transition_time_ms: 1000.0,
        };
        assert_eq!(only_min.mode(), OpacityMode::Fixed(0.4));

        let only_max = Opacity {
            min_opacity: None,
            max_opacity: Some(0.7),
            transition_time_ms: 1000.0,
        };
        assert_eq!(only_max.mode(), OpacityMode::Fixed(0.7));
    }

    #[test]
    fn uniform_draws_stay_in_range() {
        let mut rng = <rand::rngs::StdRng as rand::SeedableRng>::seed_from_u64(1);
        for _ in 0..1000 {
            let value = Spread::Range { min: 2.0, max: 4.0 }.sample(&mut rng);
            assert!((2.0..=4.0).contains(&value));
            let reversed = uniform(&mut rng, 4.0, 2.0);
            assert!((2.0..=4.0).contains(&reversed));
        }
    }

    #[test]
    fn opacity_rate_is_relative_to_60_fps() {
        let opacity = Opacity {
            min_opacity: None,
            max_opacity: None,
            transition_time_ms: 1000.0,
        };
        let rate = opacity.rate_per_frame();
        assert!((rate - (2.0 / 60.0)).abs() < f32::EPSILON);
    }

    #[test]
    fn overlay_prefers_the_top_layer() {
        let bottom: PartialSettings =
            serde_json::from_str(r#"{ "particle": { "count": 5, "color": "red" } }"#).unwrap();
        let top: PartialSettings =
            serde_json::from_str(r#"{ "particle": { "count": 9 } }"#).unwrap();
        let layered = bottom.overlay(&top);
        assert_eq!(layered.particle.count, Some(9));
        assert_eq!(layered.particle.colour.as_deref(), Some("red"));
    }
}

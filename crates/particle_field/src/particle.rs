//! A single drifting particle.

use glam::Vec2;

use crate::settings::{OpacityMode, Settings};

/// Which way an oscillating opacity is currently heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Phase {
    /// Getting more opaque, towards `max_opacity`.
    Rising,
    /// Getting more transparent, towards `min_opacity`.
    Falling,
}

impl Phase {
    /// The opposite direction.
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Rising => Self::Falling,
            Self::Falling => Self::Rising,
        }
    }
}

/// The state of one particle. It has no behaviour of its own, the engine moves, fades and draws
/// it.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct Particle {
    /// Position in the population. Only stable until the population shrinks past it.
    pub index: usize,
    /// Centre of the particle, in surface pixels.
    pub position: Vec2,
    /// Pixels moved every frame.
    pub velocity: Vec2,
    /// Radius, in pixels.
    pub size: f32,
    /// `None` means the particle is drawn fully opaque.
    pub opacity: Option<f32>,
    /// The direction of the opacity oscillation.
    pub phase: Phase,
}

impl Particle {
    /// Make a particle with randomised state, drawn from the given settings. It is placed so that
    /// all of it fits on a surface of the given dimensions.
    pub fn new<R: rand::Rng + ?Sized>(
        index: usize,
        settings: &Settings,
        surface_width: f32,
        surface_height: f32,
        rng: &mut R,
    ) -> Self {
        let heading = settings.velocity.heading().sample(rng);
        let speed = settings.velocity.speed().sample(rng);
        let velocity = Self::unit_vector(heading) * speed;

        let size = settings.particle.size().sample(rng);

        let opacity = match settings.opacity.mode() {
            OpacityMode::Oscillating { min, max } => {
                Some(crate::settings::uniform(rng, min, max))
            }
            OpacityMode::Fixed(value) => Some(value),
            OpacityMode::Opaque => None,
        };
        let phase = if rng.gen::<bool>() {
            Phase::Rising
        } else {
            Phase::Falling
        };

        let position = Vec2::new(
            crate::settings::uniform(rng, size, surface_width - size),
            crate::settings::uniform(rng, size, surface_height - size),
        );

        Self {
            index,
            position,
            velocity,
            size,
            opacity,
            phase,
        }
    }

    /// Convert a heading in degrees into a unit vector in screen coordinates, where 0° is up.
    #[must_use]
    pub fn unit_vector(heading_degrees: f32) -> Vec2 {
        let radians = (heading_degrees - 90.0).to_radians();
        Vec2::new(
            round_to_4_places(radians.cos()),
            round_to_4_places(radians.sin()),
        )
    }
}

/// Rounding trig results stops tiny floating point errors accumulating frame after frame.
fn round_to_4_places(value: f32) -> f32 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    clippy::float_cmp,
    clippy::default_numeric_fallback,
    reason = "Tests aren't so strict"
)]
mod test {
    use rand::SeedableRng as _;

    use super::*;
    use crate::settings::PartialSettings;

    fn settings_from_json(json: &str) -> Settings {
        let partial: PartialSettings = serde_json::from_str(json).unwrap();
        Settings::from_partial(&partial)
    }

    fn rng() -> rand::rngs::StdRng {
        rand::rngs::StdRng::seed_from_u64(42)
    }

    #[test]
    fn zero_degrees_points_up() {
        assert_eq!(Particle::unit_vector(0.0), Vec2::new(0.0, -1.0));
        assert_eq!(Particle::unit_vector(90.0), Vec2::new(1.0, 0.0));
        assert_eq!(Particle::unit_vector(180.0), Vec2::new(0.0, 1.0));
        assert_eq!(Particle::unit_vector(270.0), Vec2::new(-1.0, 0.0));
    }

    #[test]
    fn unit_vectors_are_rounded() {
        let vector = Particle::unit_vector(135.0);
        assert_eq!(vector.x, 0.7071);
        assert_eq!(vector.y, 0.7071);
    }

    #[test]
    fn defaults() {
        let settings = Settings::default();
        let mut rng = rng();
        for index in 0..200 {
            let particle = Particle::new(index, &settings, 100.0, 50.0, &mut rng);
            assert_eq!(particle.index, index);
            assert_eq!(particle.size, 5.0);
            assert!((particle.velocity.length() - 1.0).abs() < 0.001);
            assert_eq!(particle.opacity, Some(1.0));
            assert!((5.0..=95.0).contains(&particle.position.x));
            assert!((5.0..=45.0).contains(&particle.position.y));
        }
    }

    #[test]
    fn ranges_are_respected() {
        let settings = settings_from_json(
            r#"{
                "particle": { "minSize": 1, "maxSize": 3 },
                "velocity": {
                    "directionAngleDegrees": 90,
                    "directionAngleVarianceDegrees": 10,
                    "minSpeed": 2,
                    "maxSpeed": 4
                },
                "opacity": { "minOpacity": 0.2, "maxOpacity": 0.6 }
            }"#,
        );
        let mut rng = rng();
        for index in 0..200 {
            let particle = Particle::new(index, &settings, 100.0, 100.0, &mut rng);
            assert!((1.0..=3.0).contains(&particle.size));
            let speed = particle.velocity.length();
            assert!((1.99..=4.01).contains(&speed));
            // Heading is between 80° and 100°, so always rightwards.
            assert!(particle.velocity.x > 0.0);
            let opacity = particle.opacity.unwrap();
            assert!((0.2..=0.6).contains(&opacity));
        }
    }

    #[test]
    fn fixed_direction_without_variance() {
        let settings = settings_from_json(
            r#"{ "velocity": { "directionAngleDegrees": 180, "maxSpeed": 2 } }"#,
        );
        let particle = Particle::new(0, &settings, 100.0, 100.0, &mut rng());
        assert_eq!(particle.velocity, Vec2::new(0.0, 2.0));
    }

    #[test]
    fn one_opacity_bound_is_fixed() {
        let settings = settings_from_json(r#"{ "opacity": { "maxOpacity": 0.4 } }"#);
        let particle = Particle::new(0, &settings, 100.0, 100.0, &mut rng());
        assert_eq!(particle.opacity, Some(0.4));

        let mut only_min = Settings::default();
        only_min.opacity.min_opacity = Some(0.25);
        only_min.opacity.max_opacity = None;
        let particle = Particle::new(0, &only_min, 100.0, 100.0, &mut rng());
        assert_eq!(particle.opacity, Some(0.25));
    }

    #[test]
    fn seeded_construction_is_reproducible() {
        let settings = Settings::default();
        let first = Particle::new(0, &settings, 100.0, 100.0, &mut rng());
        let second = Particle::new(0, &settings, 100.0, 100.0, &mut rng());
        assert_eq!(first, second);
    }
}

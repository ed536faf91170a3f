//! The simulation and render loop. Owns the particles and the current settings snapshot, and
//! moves, fades and draws every particle once per frame.

use std::sync::Arc;

use glam::Vec2;
use rand::SeedableRng as _;

use crate::colour::Colour;
use crate::particle::{Particle, Phase};
use crate::scheduler::{FrameRequest, Scheduler};
use crate::settings::{OpacityMode, PartialSettings, Settings};
use crate::surface::Surface;

/// `Engine`
pub struct Engine<S: Scheduler> {
    /// The settings snapshot in effect. Replaced wholesale, never mutated.
    settings: Arc<Settings>,
    /// The particle population, in creation order.
    particles: Vec<Particle>,
    /// Whatever calls us back for frames.
    scheduler: S,
    /// The frame we're waiting on. `None` when unmounted.
    pending_frame: Option<FrameRequest>,
    /// Source of randomness for new particles and for unsticking bounced ones.
    rng: rand::rngs::StdRng,
}

impl<S: Scheduler> Engine<S> {
    /// Instantiate. Nothing happens until the engine is mounted.
    #[must_use]
    pub fn new(settings: Settings, scheduler: S) -> Self {
        Self::with_rng(settings, scheduler, rand::rngs::StdRng::from_entropy())
    }

    /// Instantiate with a specific random number generator, eg a seeded one.
    #[must_use]
    pub fn with_rng(settings: Settings, scheduler: S, rng: rand::rngs::StdRng) -> Self {
        Self {
            settings: Arc::new(settings),
            particles: Vec::new(),
            scheduler,
            pending_frame: None,
            rng,
        }
    }

    /// The current settings snapshot.
    #[must_use]
    pub fn settings(&self) -> Arc<Settings> {
        Arc::clone(&self.settings)
    }

    /// The particle population.
    #[must_use]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Mutable access to the particle population.
    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    /// The frame scheduler.
    pub const fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Mutable access to the frame scheduler.
    pub const fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// The frame that the engine is waiting to be called back for.
    #[must_use]
    pub const fn pending_frame(&self) -> Option<FrameRequest> {
        self.pending_frame
    }

    /// Is the frame loop running?
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.pending_frame.is_some()
    }

    /// Size the surface, generate the whole population from scratch and start the frame loop.
    pub fn mount<T: Surface + ?Sized>(&mut self, surface: &mut T) {
        self.cancel_pending_frame();

        let canvas = &self.settings.canvas;
        if canvas.fill_to_container {
            let (width, height) = surface.container_size();
            surface.set_size(width, height);
        } else {
            surface.set_size(canvas.width, canvas.height);
        }

        self.particles.clear();
        self.add_particles(self.settings.particle.count, surface);
        tracing::debug!(
            "Mounted with {} particles on a {}x{} surface",
            self.particles.len(),
            surface.width(),
            surface.height()
        );

        self.request_next_frame();
    }

    /// Merge new partial settings into a new snapshot, then grow or shrink the population to
    /// match. Surviving particles aren't touched.
    pub fn update_settings<T: Surface + ?Sized>(
        &mut self,
        partial: &PartialSettings,
        surface: &mut T,
    ) {
        let merged = self.settings.merge(partial);
        self.settings = Arc::new(merged);
        tracing::debug!("Settings updated: {:?}", self.settings);

        let canvas = &self.settings.canvas;
        let is_fixed_size_changed =
            surface.width() != canvas.width || surface.height() != canvas.height;
        if !canvas.fill_to_container && is_fixed_size_changed {
            surface.set_size(canvas.width, canvas.height);
        }

        self.resize_population(surface);
    }

    /// Handle a frame callback from the scheduler. Returns whether a step was actually run, which
    /// it won't be for stale or cancelled requests.
    pub fn on_frame<T: Surface + ?Sized>(&mut self, request: FrameRequest, surface: &mut T) -> bool {
        if self.pending_frame != Some(request) {
            tracing::trace!("Ignoring frame for stale request {request:?}");
            return false;
        }
        self.pending_frame = None;

        self.step(surface);
        self.request_next_frame();
        true
    }

    /// Stop the frame loop. Particles are kept, but nothing more is drawn until the next mount.
    pub fn unmount(&mut self) {
        self.cancel_pending_frame();
        tracing::debug!("Unmounted");
    }

    /// Simulate and draw a single frame.
    pub fn step<T: Surface + ?Sized>(&mut self, surface: &mut T) {
        let settings = Arc::clone(&self.settings);

        if settings.canvas.fill_to_container {
            let (width, height) = surface.container_size();
            surface.set_size(width, height);
        }

        let bounds = Self::dimensions(surface);
        let is_bouncing = settings.canvas.bounce_off_walls;
        let opacity = settings.opacity.mode();
        let rate = settings.opacity.rate_per_frame();

        for particle in &mut self.particles {
            if is_bouncing {
                bounce(particle, bounds, &mut self.rng);
            } else {
                wrap(particle, bounds);
            }

            particle.position += particle.velocity;

            if let OpacityMode::Oscillating { min, max } = opacity {
                oscillate(particle, min, max, rate);
            }

            draw(surface, particle, settings.particle.fill);
        }

        tracing::trace!("Stepped {} particles", self.particles.len());
    }

    /// Make the population size match the settings. Particles are added to, and removed from,
    /// the end.
    fn resize_population<T: Surface + ?Sized>(&mut self, surface: &T) {
        let target = self.settings.particle.count;
        let current = self.particles.len();
        match target.cmp(&current) {
            std::cmp::Ordering::Equal => (),
            std::cmp::Ordering::Greater => {
                self.add_particles(target - current, surface);
                tracing::debug!("Added {} particles", target - current);
            }
            std::cmp::Ordering::Less => {
                self.particles.truncate(target);
                tracing::debug!("Removed {} particles", current - target);
            }
        }
    }

    /// Append freshly randomised particles, built from the current snapshot.
    fn add_particles<T: Surface + ?Sized>(&mut self, amount: usize, surface: &T) {
        let bounds = Self::dimensions(surface);
        let start = self.particles.len();
        self.particles.reserve(amount);
        for index in start..start + amount {
            let particle = Particle::new(index, &self.settings, bounds.x, bounds.y, &mut self.rng);
            self.particles.push(particle);
        }
    }

    /// Ask the scheduler for the next frame.
    fn request_next_frame(&mut self) {
        self.pending_frame = Some(self.scheduler.request_frame());
    }

    /// Cancel the frame we're waiting on, if any.
    fn cancel_pending_frame(&mut self) {
        if let Some(request) = self.pending_frame.take() {
            self.scheduler.cancel_frame(request);
        }
    }

    /// The surface's dimensions as floats.
    #[expect(
        clippy::as_conversions,
        clippy::cast_precision_loss,
        reason = "Surfaces are never anywhere near 2^24 pixels wide"
    )]
    fn dimensions<T: Surface + ?Sized>(surface: &T) -> Vec2 {
        Vec2::new(surface.width() as f32, surface.height() as f32)
    }
}

/// Teleport particles that have completely left the surface to the opposite edge, just out of
/// sight, so they drift back in.
fn wrap(particle: &mut Particle, bounds: Vec2) {
    let size = particle.size;
    wrap_axis(&mut particle.position.x, particle.velocity.x, size, bounds.x);
    wrap_axis(&mut particle.position.y, particle.velocity.y, size, bounds.y);
}

/// Wrap a single axis.
fn wrap_axis(position: &mut f32, velocity: f32, size: f32, extent: f32) {
    if velocity > 0.0 && *position - size > extent {
        *position = -size;
    } else if velocity < 0.0 && *position + size < 0.0 {
        *position = extent + size;
    }
}

/// Reflect particles whose edge has crossed an edge of the surface.
fn bounce<R: rand::Rng + ?Sized>(particle: &mut Particle, bounds: Vec2, rng: &mut R) {
    let size = particle.size;
    bounce_axis(
        &mut particle.position.x,
        &mut particle.velocity.x,
        size,
        bounds.x,
        rng,
    );
    bounce_axis(
        &mut particle.position.y,
        &mut particle.velocity.y,
        size,
        bounds.y,
        rng,
    );
}

/// Bounce a single axis. A particle that is still heading out after its velocity is reversed was
/// already on its way back in, but stuck straddling the edge. So it gets moved somewhere else.
fn bounce_axis<R: rand::Rng + ?Sized>(
    position: &mut f32,
    velocity: &mut f32,
    size: f32,
    extent: f32,
    rng: &mut R,
) {
    let is_past_far_edge = *position + size > extent;
    let is_past_near_edge = *position - size < 0.0;
    if !is_past_far_edge && !is_past_near_edge {
        return;
    }

    *velocity = -*velocity;

    let is_heading_out =
        (is_past_far_edge && *velocity > 0.0) || (is_past_near_edge && *velocity < 0.0);
    if is_heading_out {
        *position = crate::settings::uniform(rng, size, extent - size);
    }
}

/// Move the opacity one frame along its triangle wave, reversing at the bounds.
fn oscillate(particle: &mut Particle, min: f32, max: f32, rate: f32) {
    let (current, phase) = match particle.opacity {
        Some(opacity) => (opacity, particle.phase),
        None => (min, Phase::Rising),
    };

    let next = match phase {
        Phase::Rising => current + rate,
        Phase::Falling => current - rate,
    };

    if next > max {
        particle.opacity = Some(max);
        particle.phase = Phase::Falling;
    } else if next < min {
        particle.opacity = Some(min);
        particle.phase = Phase::Rising;
    } else {
        particle.opacity = Some(next);
        particle.phase = phase;
    }
}

/// Draw a particle as a filled circle.
fn draw<T: Surface + ?Sized>(surface: &mut T, particle: &Particle, fill: Colour) {
    surface.begin_path();
    surface.set_fill_colour(fill);
    surface.set_global_alpha(particle.opacity.unwrap_or(1.0));
    surface.circle(particle.position, particle.size);
    surface.close_path();
    surface.fill();
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    clippy::float_cmp,
    clippy::default_numeric_fallback,
    clippy::indexing_slicing,
    reason = "Tests aren't so strict"
)]
mod test {
    use rand::SeedableRng as _;

    use super::*;
    use crate::scheduler::ManualScheduler;

    /// Every call made to a surface.
    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        SetSize(u32, u32),
        BeginPath,
        ClosePath,
        FillColour(Colour),
        GlobalAlpha(f32),
        Circle(Vec2, f32),
        Fill,
    }

    /// A surface that just records what was done to it.
    struct RecordingSurface {
        width: u32,
        height: u32,
        container: (u32, u32),
        calls: Vec<Call>,
    }

    impl RecordingSurface {
        fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                container: (width, height),
                calls: Vec::new(),
            }
        }

        fn circles(&self) -> usize {
            self.calls
                .iter()
                .filter(|call| matches!(call, Call::Circle(..)))
                .count()
        }
    }

    impl Surface for RecordingSurface {
        fn width(&self) -> u32 {
            self.width
        }
        fn height(&self) -> u32 {
            self.height
        }
        fn set_size(&mut self, width: u32, height: u32) {
            self.width = width;
            self.height = height;
            self.calls.push(Call::SetSize(width, height));
        }
        fn container_size(&self) -> (u32, u32) {
            self.container
        }
        fn begin_path(&mut self) {
            self.calls.push(Call::BeginPath);
        }
        fn close_path(&mut self) {
            self.calls.push(Call::ClosePath);
        }
        fn set_fill_colour(&mut self, colour: Colour) {
            self.calls.push(Call::FillColour(colour));
        }
        fn set_global_alpha(&mut self, alpha: f32) {
            self.calls.push(Call::GlobalAlpha(alpha));
        }
        fn circle(&mut self, centre: Vec2, radius: f32) {
            self.calls.push(Call::Circle(centre, radius));
        }
        fn fill(&mut self) {
            self.calls.push(Call::Fill);
        }
    }

    fn settings_from_json(json: &str) -> Settings {
        let partial: PartialSettings = serde_json::from_str(json).unwrap();
        Settings::from_partial(&partial)
    }

    fn partial_from_json(json: &str) -> PartialSettings {
        serde_json::from_str(json).unwrap()
    }

    fn engine(settings: Settings) -> Engine<ManualScheduler> {
        Engine::with_rng(
            settings,
            ManualScheduler::new(),
            rand::rngs::StdRng::seed_from_u64(7),
        )
    }

    fn single_particle(engine: &mut Engine<ManualScheduler>, position: Vec2, velocity: Vec2) {
        let particle = &mut engine.particles_mut()[0];
        particle.position = position;
        particle.velocity = velocity;
        particle.size = 2.0;
    }

    #[test]
    fn empty_population_still_reschedules() {
        let mut engine = engine(settings_from_json(r#"{ "particle": { "count": 0 } }"#));
        let mut surface = RecordingSurface::new(100, 100);
        engine.mount(&mut surface);
        assert!(engine.particles().is_empty());

        let request = engine.scheduler_mut().take_due().unwrap();
        surface.calls.clear();
        assert!(engine.on_frame(request, &mut surface));

        assert_eq!(surface.circles(), 0);
        assert_eq!(surface.calls, vec![Call::SetSize(100, 100)]);
        assert_eq!(engine.scheduler().pending().len(), 1);
        assert_eq!(engine.scheduler().requested, 2);
    }

    #[test]
    fn fill_to_container_follows_the_container() {
        let mut engine = engine(Settings::default());
        let mut surface = RecordingSurface::new(10, 10);
        surface.container = (300, 150);
        engine.mount(&mut surface);
        assert_eq!((surface.width, surface.height), (300, 150));

        surface.container = (80, 40);
        engine.step(&mut surface);
        assert_eq!((surface.width, surface.height), (80, 40));
    }

    #[test]
    fn fixed_size_surfaces_are_not_resized_by_steps() {
        let mut engine = engine(settings_from_json(
            r#"{ "canvas": { "fillToContainer": false, "width": 64, "height": 32 } }"#,
        ));
        let mut surface = RecordingSurface::new(64, 32);
        surface.container = (999, 999);
        engine.mount(&mut surface);
        surface.calls.clear();

        for _ in 0..10 {
            engine.step(&mut surface);
        }
        assert_eq!((surface.width, surface.height), (64, 32));
        assert!(!surface
            .calls
            .iter()
            .any(|call| matches!(call, Call::SetSize(..))));
    }

    #[test]
    fn draws_each_particle_as_a_filled_circle() {
        let mut engine = engine(settings_from_json(
            r#"{ "particle": { "count": 2, "color": "white" }, "opacity": { "maxOpacity": 0.5 } }"#,
        ));
        let mut surface = RecordingSurface::new(100, 100);
        engine.mount(&mut surface);
        surface.calls.clear();
        engine.step(&mut surface);

        let particle = engine.particles()[0].clone();
        assert_eq!(
            surface.calls[1..7],
            [
                Call::BeginPath,
                Call::FillColour(crate::colour::WHITE),
                Call::GlobalAlpha(0.5),
                Call::Circle(particle.position, particle.size),
                Call::ClosePath,
                Call::Fill,
            ]
        );
        assert_eq!(surface.circles(), 2);
    }

    #[test]
    fn particles_without_opacity_are_drawn_opaque() {
        let mut engine = engine(Settings::default());
        let mut surface = RecordingSurface::new(100, 100);
        engine.mount(&mut surface);
        for particle in engine.particles_mut() {
            particle.opacity = None;
        }
        surface.calls.clear();
        engine.step(&mut surface);
        assert!(surface
            .calls
            .iter()
            .filter(|call| matches!(call, Call::GlobalAlpha(..)))
            .all(|call| *call == Call::GlobalAlpha(1.0)));
    }

    #[test]
    fn shrinking_keeps_the_survivors_and_growing_appends() {
        let mut engine = engine(Settings::default());
        let mut surface = RecordingSurface::new(200, 200);
        engine.mount(&mut surface);
        let original = engine.particles().to_vec();
        assert_eq!(original.len(), 50);

        engine.update_settings(
            &partial_from_json(r#"{ "particle": { "count": 30 } }"#),
            &mut surface,
        );
        assert_eq!(engine.particles(), &original[..30]);

        engine.update_settings(
            &partial_from_json(r#"{ "particle": { "count": 50 } }"#),
            &mut surface,
        );
        assert_eq!(engine.particles().len(), 50);
        assert_eq!(&engine.particles()[..30], &original[..30]);
        for (index, particle) in engine.particles().iter().enumerate() {
            assert_eq!(particle.index, index);
        }
        assert_ne!(&engine.particles()[30..], &original[30..]);
    }

    #[test]
    fn unchanged_count_leaves_population_alone() {
        let mut engine = engine(Settings::default());
        let mut surface = RecordingSurface::new(200, 200);
        engine.mount(&mut surface);
        let original = engine.particles().to_vec();
        engine.update_settings(
            &partial_from_json(r#"{ "particle": { "maxSize": 9 } }"#),
            &mut surface,
        );
        assert_eq!(engine.particles(), original.as_slice());
        assert_eq!(engine.settings().particle.max_size, 9.0);
    }

    #[test]
    fn new_particles_use_the_merged_settings() {
        let mut engine = engine(settings_from_json(r#"{ "particle": { "count": 1 } }"#));
        let mut surface = RecordingSurface::new(200, 200);
        engine.mount(&mut surface);
        engine.update_settings(
            &partial_from_json(r#"{ "particle": { "count": 3, "maxSize": 7 } }"#),
            &mut surface,
        );
        assert_eq!(engine.particles()[0].size, 5.0);
        assert_eq!(engine.particles()[1].size, 7.0);
        assert_eq!(engine.particles()[2].size, 7.0);
    }

    #[test]
    fn settings_updates_resize_fixed_size_surfaces() {
        let mut engine = engine(settings_from_json(
            r#"{ "canvas": { "fillToContainer": false } }"#,
        ));
        let mut surface = RecordingSurface::new(200, 200);
        engine.mount(&mut surface);
        engine.update_settings(
            &partial_from_json(r#"{ "canvas": { "width": 50 } }"#),
            &mut surface,
        );
        assert_eq!((surface.width, surface.height), (50, 200));
    }

    #[test]
    fn wraps_to_the_opposite_edge() {
        let mut engine = engine(settings_from_json(r#"{ "particle": { "count": 1 } }"#));
        let mut surface = RecordingSurface::new(100, 100);
        engine.mount(&mut surface);

        single_particle(&mut engine, Vec2::new(101.9, 50.0), Vec2::new(1.0, 0.0));
        engine.step(&mut surface);
        assert!((engine.particles()[0].position.x - 102.9).abs() < 0.001);

        engine.step(&mut surface);
        let position = engine.particles()[0].position;
        assert!((position.x - -1.0).abs() < 0.001, "{position:?}");

        single_particle(&mut engine, Vec2::new(50.0, -2.5), Vec2::new(0.0, -1.0));
        engine.step(&mut surface);
        assert!((engine.particles()[0].position.y - 101.0).abs() < 0.001);
    }

    #[test]
    fn stationary_particles_are_not_wrapped() {
        let mut engine = engine(settings_from_json(r#"{ "particle": { "count": 1 } }"#));
        let mut surface = RecordingSurface::new(100, 100);
        engine.mount(&mut surface);
        single_particle(&mut engine, Vec2::new(200.0, 50.0), Vec2::ZERO);
        engine.step(&mut surface);
        assert_eq!(engine.particles()[0].position.x, 200.0);
    }

    #[test]
    fn bounces_off_walls() {
        let mut engine = engine(settings_from_json(
            r#"{ "particle": { "count": 1 }, "canvas": { "bounceOffWalls": true } }"#,
        ));
        let mut surface = RecordingSurface::new(100, 100);
        engine.mount(&mut surface);

        single_particle(&mut engine, Vec2::new(98.5, 50.0), Vec2::new(1.0, 0.0));
        engine.step(&mut surface);
        let particle = &engine.particles()[0];
        assert_eq!(particle.velocity.x, -1.0);
        assert!((particle.position.x - 97.5).abs() < 0.001);

        single_particle(&mut engine, Vec2::new(50.0, 1.0), Vec2::new(0.0, -0.5));
        engine.step(&mut surface);
        assert_eq!(engine.particles()[0].velocity.y, 0.5);
    }

    #[test]
    fn stuck_particles_are_moved_back_in_bounds() {
        let mut engine = engine(settings_from_json(
            r#"{ "particle": { "count": 1 }, "canvas": { "bounceOffWalls": true } }"#,
        ));
        let mut surface = RecordingSurface::new(100, 100);
        engine.mount(&mut surface);

        // Straddling the right edge, but already heading back in.
        single_particle(&mut engine, Vec2::new(99.5, 50.0), Vec2::new(-0.1, 0.0));
        engine.step(&mut surface);
        let particle = &engine.particles()[0];
        assert_eq!(particle.velocity.x, 0.1);
        assert!((2.0..=98.2).contains(&particle.position.x));
    }

    #[test]
    fn bouncing_particles_never_stay_outside() {
        let mut engine = engine(settings_from_json(
            r#"{
                "particle": { "count": 40, "minSize": 1, "maxSize": 4 },
                "velocity": { "minSpeed": 0.1, "maxSpeed": 6 },
                "canvas": { "bounceOffWalls": true }
            }"#,
        ));
        let mut surface = RecordingSurface::new(60, 40);
        engine.mount(&mut surface);

        // Fast particles can overshoot an edge for a single frame, but must be back on the next.
        let mut steps_outside = vec![[0; 2]; engine.particles().len()];
        for _ in 0..2000 {
            engine.step(&mut surface);
            surface.calls.clear();
            for (particle, counts) in engine.particles().iter().zip(&mut steps_outside) {
                let size = particle.size;
                let position = particle.position;
                let axes = [
                    position.x < -size || position.x > 60.0 + size,
                    position.y < -size || position.y > 40.0 + size,
                ];
                for (is_outside, count) in axes.into_iter().zip(counts.iter_mut()) {
                    if is_outside {
                        *count += 1;
                        assert!(*count <= 1, "Particle lodged outside: {particle:?}");
                    } else {
                        *count = 0;
                    }
                }
            }
        }
    }

    #[test]
    fn opacity_oscillates_between_the_bounds() {
        let mut engine = engine(settings_from_json(
            r#"{
                "particle": { "count": 10 },
                "opacity": { "minOpacity": 0.2, "maxOpacity": 0.8, "transitionTimeMs": 500 }
            }"#,
        ));
        let mut surface = RecordingSurface::new(100, 100);
        engine.mount(&mut surface);

        let OpacityMode::Oscillating { min, max } = engine.settings().opacity.mode() else {
            panic!("Opacity should oscillate");
        };

        let mut visits = vec![(0, 0); 10];
        for _ in 0..1000 {
            engine.step(&mut surface);
            surface.calls.clear();
            for (particle, visit) in engine.particles().iter().zip(&mut visits) {
                let opacity = particle.opacity.unwrap();
                assert!((min..=max).contains(&opacity), "{opacity}");
                if opacity == min {
                    visit.0 += 1;
                }
                if opacity == max {
                    visit.1 += 1;
                }
            }
        }

        // 500ms at 60fps is about 9 frames per half-wave, so over 50 round trips.
        for (minimums, maximums) in visits {
            assert!(minimums > 20);
            assert!(maximums > 20);
        }
    }

    #[test]
    fn oscillation_reverses_at_the_bounds() {
        let mut particle = Particle::new(
            0,
            &Settings::default(),
            10.0,
            10.0,
            &mut rand::rngs::StdRng::seed_from_u64(1),
        );
        particle.opacity = Some(0.95);
        particle.phase = Phase::Rising;
        oscillate(&mut particle, 0.0, 1.0, 0.1);
        assert_eq!(particle.opacity, Some(1.0));
        assert_eq!(particle.phase, Phase::Falling);
        oscillate(&mut particle, 0.0, 1.0, 0.1);
        assert_eq!(particle.opacity, Some(0.9));
        assert_eq!(particle.phase, Phase::Falling);

        particle.opacity = Some(0.05);
        oscillate(&mut particle, 0.0, 1.0, 0.1);
        assert_eq!(particle.opacity, Some(0.0));
        assert_eq!(particle.phase, Phase::Rising);
    }

    #[test]
    fn particles_without_opacity_start_oscillating_from_the_minimum() {
        let mut engine = engine(settings_from_json(r#"{ "particle": { "count": 3 } }"#));
        let mut surface = RecordingSurface::new(100, 100);
        engine.mount(&mut surface);
        for particle in engine.particles_mut() {
            particle.opacity = None;
        }

        engine.update_settings(
            &partial_from_json(r#"{ "opacity": { "minOpacity": 0.1, "maxOpacity": 0.9 } }"#),
            &mut surface,
        );
        engine.step(&mut surface);
        let rate = engine.settings().opacity.rate_per_frame();
        for particle in engine.particles() {
            assert!((particle.opacity.unwrap() - (0.1 + rate)).abs() < 0.0001);
            assert_eq!(particle.phase, Phase::Rising);
        }
    }

    #[test]
    fn clamped_settings_are_in_effect_before_new_particles_are_made() {
        let mut engine = engine(settings_from_json(r#"{ "particle": { "count": 0 } }"#));
        let mut surface = RecordingSurface::new(100, 100);
        engine.mount(&mut surface);
        engine.update_settings(
            &partial_from_json(
                r#"{ "particle": { "count": 20 }, "opacity": { "minOpacity": -3, "maxOpacity": 7 } }"#,
            ),
            &mut surface,
        );
        for particle in engine.particles() {
            assert!((0.0..=1.0).contains(&particle.opacity.unwrap()));
        }
    }

    #[test]
    fn stale_and_cancelled_frames_are_ignored() {
        let mut engine = engine(Settings::default());
        let mut surface = RecordingSurface::new(100, 100);
        engine.mount(&mut surface);
        let first = engine.scheduler_mut().take_due().unwrap();
        assert_eq!(engine.pending_frame(), Some(first));
        assert!(engine.on_frame(first, &mut surface));
        assert!(!engine.on_frame(first, &mut surface));

        let second = engine.pending_frame().unwrap();
        engine.unmount();
        assert!(!engine.is_running());
        assert_eq!(engine.scheduler().cancelled, 1);
        assert!(engine.scheduler().pending().is_empty());
        assert!(!engine.on_frame(second, &mut surface));
    }

    #[test]
    fn remounting_regenerates_everything() {
        let mut engine = engine(Settings::default());
        let mut surface = RecordingSurface::new(100, 100);
        engine.mount(&mut surface);
        let original = engine.particles().to_vec();
        engine.mount(&mut surface);
        assert_eq!(engine.particles().len(), 50);
        assert_ne!(engine.particles(), original.as_slice());
        assert_eq!(engine.scheduler().pending().len(), 1);
    }
}

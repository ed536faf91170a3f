//! # Particle Field
//! A small simulation and render loop for animated particle backgrounds.
//!
//! A population of circular particles drifts across a 2D drawing surface, either wrapping around
//! or bouncing off its edges, whilst their opacity oscillates between configurable bounds. All
//! the behaviour is driven by [`settings::Settings`], which can be changed on the fly without
//! resetting the particles that already exist.
//!
//! The [`engine::Engine`] doesn't own a display or a clock. It draws onto anything implementing
//! [`surface::Surface`] and asks a [`scheduler::Scheduler`] for frames. [`canvas::PixelCanvas`]
//! is a software surface for hosts that don't already have one.

pub mod canvas;
pub mod colour;
pub mod engine;
pub mod errors;
pub mod particle;
pub mod scheduler;
pub mod settings;
pub mod surface;

// brickbot_core/src/lib.rs

//! Simulation core for a differential-drive EV3-style robot.
//!
//! Everything in this crate is engine-agnostic: the physics and render engines
//! are consumed through the [`backend::PhysicsBackend`] and
//! [`backend::RenderBackend`] traits, and the host owns the frame loop, calling
//! [`world::World::step`] once per frame.

pub mod backend;
pub mod config;
pub mod console;
pub mod controllers;
pub mod entity;
pub mod error;
pub mod feedback;
pub mod geometry;
pub mod physics_object;
pub mod prelude;
pub mod program;
pub mod time;
pub mod types;
pub mod utils;
pub mod world;

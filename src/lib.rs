//! camsim - camera fleet simulator
//!
//! Produces timestamped video segments per simulated camera according to a
//! recording pattern, cutting and looping a finite source video through an
//! external encoder. This library crate exposes the simulator for the CLI
//! and for integration testing.

pub mod clock;
pub mod config;
pub mod cursor;
pub mod naming;
pub mod orchestrator;
pub mod pattern;
pub mod retention;
pub mod status;
pub mod synth;
pub mod worker;

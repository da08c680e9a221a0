//! Federated tuning of awesome bar frecency weights.
//!
//! Awesome bar sessions are recorded as raw events, classified into one
//! training example each, and turned into a finite-difference gradient over
//! the frecency parameters. Gradients are reported upstream while a published
//! model is pulled back in on a wall-clock schedule.

pub mod core;
pub mod interaction;
pub mod optimization;
pub mod places;
pub mod privacy;
pub mod server;
pub mod state;
pub mod study;
pub mod sync;

//! Event-driven particle dynamics core.
//!
//! Instead of fixed time steps, the engine advances a particle population
//! by discrete events: it predicts, in closed form, when each particle's
//! next collision or boundary crossing occurs, keeps one pending prediction
//! per particle in a minimum-time calendar, and repeatedly executes the
//! globally earliest event — streaming only the involved state forward,
//! applying the physical response, and recomputing exactly the predictions
//! the event invalidated.
//!
//! ```
//! use edmd::core::{Domain, Particle, Simulation, StepOutcome};
//!
//! # fn main() -> edmd::error::Result<()> {
//! let particles = vec![
//!     Particle::new(0, [0.0, 0.0, 0.0], [0.5, 0.0, 0.0], 1.0, 1.0)?,
//!     Particle::new(1, [4.0, 0.0, 0.0], [-0.5, 0.0, 0.0], 1.0, 1.0)?,
//! ];
//! let mut sim = Simulation::hard_spheres(particles, Domain::Open)?;
//! while let StepOutcome::Event(summary) = sim.advance_to_next_event()? {
//!     println!("t = {}: {:?}", summary.time, summary.kind);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Spatial indexing, physical response laws, and boundary-condition
//! transforms are collaborator seams ([`core::NeighborSource`],
//! [`core::ResponseModel`], [`core::Domain`]); the crate ships all-pairs,
//! elastic-hard-contact, and open/periodic/walled defaults.

pub mod core;
pub mod error;
pub mod math;

pub use crate::core::{Domain, EventKind, EventSummary, Particle, Simulation, StepOutcome};
pub use crate::error::{Error, Result};

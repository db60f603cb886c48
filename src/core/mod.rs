//! The event-driven engine: particles, event prediction, the calendar, and
//! the driver loop that executes events in causal order.

pub mod calendar;
pub mod driver;
pub mod event;
pub mod motion;
pub mod particle;
pub mod predict;

pub use calendar::{Calendar, RecordState};
pub use driver::{DriverReport, ElasticResponse, ResponseModel, Simulation, StepOutcome};
pub use event::{EventKind, EventRecord, EventSummary};
pub use motion::{Approach, Domain, HardSphere, InteractionGeometry};
pub use particle::{Particle, ParticleId, DIM};
pub use predict::{AllPairs, NeighborSource, Predictor};

use crate::error::{Error, Result};

/// Fixed spatial dimension (3D).
pub const DIM: usize = 3;

/// Stable particle identifier, used as a dense index everywhere.
pub type ParticleId = u32;

/// Small numeric tolerance for time comparisons.
pub(crate) const EPS_TIME: f64 = 1e-12;

/// A ballistic particle owned by the simulation.
///
/// Fields:
/// - `id`: stable identifier
/// - `r`: position, valid only at `last_update`
/// - `v`: velocity (constant between events)
/// - `radius`, `mass`: hard-sphere properties
/// - `last_update`: absolute time the stored position refers to
/// - `generation`: bumped whenever an event or external mutation changes
///   this particle's state; event records snapshot it for invalidation
#[derive(Debug, Clone)]
pub struct Particle {
    /// Stable particle identifier.
    pub id: ParticleId,
    /// Position (x, y, z) as of `last_update`.
    pub r: [f64; DIM],
    /// Velocity (vx, vy, vz).
    pub v: [f64; DIM],
    /// Hard-sphere radius (> 0).
    pub radius: f64,
    /// Mass (> 0).
    pub mass: f64,
    /// Absolute time the stored position is valid at.
    pub last_update: f64,
    /// State-change counter for event invalidation.
    pub generation: u64,
}

impl Particle {
    /// Create a new particle at time zero after validating invariants.
    pub fn new(
        id: ParticleId,
        r: [f64; DIM],
        v: [f64; DIM],
        radius: f64,
        mass: f64,
    ) -> Result<Self> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(Error::InvalidParam("radius must be finite and > 0".into()));
        }
        if !mass.is_finite() || mass <= 0.0 {
            return Err(Error::InvalidParam("mass must be finite and > 0".into()));
        }
        if !r.iter().all(|x| x.is_finite()) {
            return Err(Error::InvalidParam("position must be finite".into()));
        }
        if !v.iter().all(|x| x.is_finite()) {
            return Err(Error::InvalidParam("velocity must be finite".into()));
        }
        Ok(Self {
            id,
            r,
            v,
            radius,
            mass,
            last_update: 0.0,
            generation: 0,
        })
    }

    /// Position extrapolated ballistically to absolute time `t`, without
    /// mutating the particle. Used to co-time participants for prediction.
    #[inline]
    pub fn position_at(&self, t: f64) -> [f64; DIM] {
        let dt = t - self.last_update;
        let mut r = self.r;
        for (rk, vk) in r.iter_mut().zip(&self.v) {
            *rk += vk * dt;
        }
        r
    }

    /// Stream the particle forward to absolute time `t`: position advances
    /// by `v * dt`, velocity is unchanged, `last_update` moves to `t`.
    pub fn stream_to(&mut self, t: f64) -> Result<()> {
        if t < self.last_update - EPS_TIME {
            return Err(Error::InvariantViolation(format!(
                "particle {} streamed backwards: {} -> {}",
                self.id, self.last_update, t
            )));
        }
        let dt = t - self.last_update;
        if dt.abs() > 0.0 {
            for (rk, vk) in self.r.iter_mut().zip(&self.v) {
                *rk += vk * dt;
            }
        }
        self.last_update = t;
        Ok(())
    }

    /// Increment the generation counter (invalidates dependent records).
    #[inline]
    pub fn bump_generation(&mut self) {
        self.generation = self.generation.saturating_add(1);
    }

    /// Returns the particle's kinetic energy: 1/2 m |v|^2.
    #[inline]
    pub fn kinetic_energy(&self) -> f64 {
        let vsq: f64 = self.v.iter().map(|&c| c * c).sum();
        0.5 * self.mass * vsq
    }

    /// True when every position and velocity component is finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.r.iter().chain(self.v.iter()).all(|x| x.is_finite())
    }
}

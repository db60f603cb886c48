use crate::core::event::{EventKind, EventRecord};
use crate::core::motion::{earliest_admissible_root, earliest_wall_crossing, Domain, InteractionGeometry};
use crate::core::particle::{Particle, ParticleId};
use crate::error::{Error, Result};

/// Spatial-index capability consumed by the predictor: which particles are
/// geometrically relevant partners for `id`. The engine never builds the
/// index itself.
pub trait NeighborSource {
    fn neighbors_of(&self, id: ParticleId) -> Vec<ParticleId>;
}

impl<F> NeighborSource for F
where
    F: Fn(ParticleId) -> Vec<ParticleId>,
{
    fn neighbors_of(&self, id: ParticleId) -> Vec<ParticleId> {
        self(id)
    }
}

/// Fallback neighbor source: every other particle is a candidate partner.
/// Quadratic in the particle count, but exact; a cell list or similar
/// spatial index substitutes through the same trait.
#[derive(Debug, Clone, Copy)]
pub struct AllPairs {
    n: usize,
}

impl AllPairs {
    pub fn new(n: usize) -> Self {
        Self { n }
    }
}

impl NeighborSource for AllPairs {
    fn neighbors_of(&self, id: ParticleId) -> Vec<ParticleId> {
        (0..self.n as ParticleId).filter(|&j| j != id).collect()
    }
}

/// Reduces all event candidates for one particle to its single earliest
/// future event.
///
/// Candidates are pairwise interactions against each neighbor (via the
/// interaction geometry) and, in a walled domain, the earliest wall
/// crossing. All candidate times are computed from state co-timed to `now`
/// with [`Particle::position_at`]; nothing is streamed here.
#[derive(Debug)]
pub struct Predictor<G: InteractionGeometry> {
    pub geometry: G,
    pub domain: Domain,
}

impl<G: InteractionGeometry> Predictor<G> {
    pub fn new(geometry: G, domain: Domain) -> Self {
        Self { geometry, domain }
    }

    /// Predict the earliest event for `id` at reference time `now`.
    ///
    /// Returns the idle sentinel (infinite time) when no candidate exists —
    /// a normal outcome, never an error. Ties between candidates resolve by
    /// the record ordering (time, then lowest participant id, then kind),
    /// so identical state always reproduces the identical prediction.
    pub fn predict(
        &self,
        id: ParticleId,
        particles: &[Particle],
        neighbors: &dyn NeighborSource,
        now: f64,
    ) -> Result<EventRecord> {
        let p = particles.get(id as usize).ok_or_else(|| {
            Error::InvariantViolation(format!("prediction requested for unknown particle {id}"))
        })?;
        let ri = p.position_at(now);

        let mut best: Option<EventRecord> = None;

        for j in neighbors.neighbors_of(id) {
            if j == id {
                continue;
            }
            let q = particles.get(j as usize).ok_or_else(|| {
                Error::InvariantViolation(format!("neighbor list names unknown particle {j}"))
            })?;
            let rj = q.position_at(now);
            let poly = self
                .geometry
                .event_polynomial(&ri, &p.v, &rj, &q.v, &self.domain);
            if let Some(t_rel) = earliest_admissible_root(&poly, self.geometry.approach())? {
                let rec = EventRecord::new(
                    now + t_rel,
                    EventKind::Pair { i: id, j },
                    p.generation,
                    Some(q.generation),
                )?;
                if best.as_ref().is_none_or(|b| rec < *b) {
                    best = Some(rec);
                }
            }
        }

        if let Domain::Walled { size } = &self.domain {
            if let Some((t_rel, wall)) = earliest_wall_crossing(&ri, &p.v, p.radius, size) {
                let rec = EventRecord::new(
                    now + t_rel,
                    EventKind::Boundary { i: id, wall },
                    p.generation,
                    None,
                )?;
                if best.as_ref().is_none_or(|b| rec < *b) {
                    best = Some(rec);
                }
            }
        }

        Ok(best.unwrap_or_else(|| EventRecord::idle(id, p.generation)))
    }
}

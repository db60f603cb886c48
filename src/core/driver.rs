use crate::core::calendar::Calendar;
use crate::core::event::{EventKind, EventRecord, EventSummary};
use crate::core::motion::{dot, wall_axis_side, Domain, HardSphere, InteractionGeometry};
use crate::core::particle::{Particle, ParticleId, DIM, EPS_TIME};
use crate::core::predict::{AllPairs, NeighborSource, Predictor};
use crate::error::{Error, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Physical response collaborator: mutates participant velocities (and
/// nothing else) when an event fires. Participants arrive streamed to the
/// event time.
pub trait ResponseModel {
    fn apply(
        &self,
        kind: &EventKind,
        domain: &Domain,
        participants: &mut [&mut Particle],
    ) -> Result<()>;
}

/// Conservation-law response for hard contacts: mass-weighted exchange of
/// the normal velocity component for pair collisions, specular reflection
/// for wall events. System events carry no physical effect.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElasticResponse;

impl ResponseModel for ElasticResponse {
    fn apply(
        &self,
        kind: &EventKind,
        domain: &Domain,
        participants: &mut [&mut Particle],
    ) -> Result<()> {
        match kind {
            EventKind::Pair { i, j } => {
                let [pi, pj] = participants else {
                    return Err(Error::InvariantViolation(format!(
                        "pair event ({i},{j}) delivered {} participants",
                        participants.len()
                    )));
                };
                // Unit contact normal from i to j, under the boundary
                // transform so seam-crossing contacts get the true normal.
                let mut n = [0.0_f64; DIM];
                for k in 0..DIM {
                    n[k] = pj.r[k] - pi.r[k];
                }
                let n = domain.minimum_image(n);
                let dist = dot(&n, &n).sqrt();
                if dist <= EPS_TIME {
                    return Err(Error::InvariantViolation(format!(
                        "degenerate contact normal between particles {i} and {j}"
                    )));
                }

                let mut u = [0.0_f64; DIM];
                for k in 0..DIM {
                    u[k] = pj.v[k] - pi.v[k];
                }
                let u_n = dot(&u, &n) / dist;

                // Only the normal component changes.
                let fi = (2.0 * pj.mass / (pi.mass + pj.mass)) * u_n;
                let fj = (2.0 * pi.mass / (pi.mass + pj.mass)) * u_n;
                for k in 0..DIM {
                    let nk = n[k] / dist;
                    pi.v[k] += fi * nk;
                    pj.v[k] -= fj * nk;
                }
                Ok(())
            }
            EventKind::Boundary { i, wall } => {
                let [p] = participants else {
                    return Err(Error::InvariantViolation(format!(
                        "boundary event for {i} delivered {} participants",
                        participants.len()
                    )));
                };
                let (axis, _is_max) = wall_axis_side(*wall);
                p.v[axis] = -p.v[axis];
                Ok(())
            }
            EventKind::System { .. } | EventKind::Idle { .. } => Ok(()),
        }
    }
}

/// Result of one driver step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// An event fired; the summary feeds logging/statistics collaborators.
    Event(EventSummary),
    /// No further event before the horizon (or at all). Normal completion.
    Terminated,
}

/// Summary of a [`Simulation::run`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverReport {
    pub events: u64,
    pub final_time: f64,
}

/// A pending system event (pseudo-participant in the calendar).
#[derive(Debug, Clone, Copy)]
struct SystemTick {
    id: u32,
    time: f64,
    period: Option<f64>,
}

/// The event-driven simulation: owns the particles, the calendar, and the
/// collaborator seams, and advances the system one event at a time.
///
/// Strictly sequential: each event's effect may depend on the exact state
/// produced by all prior events, so the loop body is the only mutator of
/// the calendar, and streaming plus effect application for one event form
/// an atomic unit as far as scheduling is concerned.
pub struct Simulation {
    particles: Vec<Particle>,
    domain: Domain,
    predictor: Predictor<Box<dyn InteractionGeometry>>,
    neighbors: Box<dyn NeighborSource>,
    response: Box<dyn ResponseModel>,
    calendar: Calendar,
    time: f64,
    event_count: u64,
    horizon: Option<f64>,
    ticks: Vec<SystemTick>,
    next_tick_id: u32,
}

impl Simulation {
    /// Build a simulation with explicit collaborators and perform the
    /// initial full scheduling pass.
    ///
    /// Particle ids must be dense and in order (`particles[i].id == i`);
    /// everything downstream indexes by id.
    pub fn with_collaborators(
        particles: Vec<Particle>,
        domain: Domain,
        geometry: Box<dyn InteractionGeometry>,
        neighbors: Box<dyn NeighborSource>,
        response: Box<dyn ResponseModel>,
    ) -> Result<Self> {
        for (i, p) in particles.iter().enumerate() {
            if p.id as usize != i {
                return Err(Error::InvalidParam(format!(
                    "particle ids must be dense: index {i} holds id {}",
                    p.id
                )));
            }
        }
        let n = particles.len();
        let mut sim = Self {
            particles,
            domain: domain.clone(),
            predictor: Predictor::new(geometry, domain),
            neighbors,
            response,
            calendar: Calendar::new(n),
            time: 0.0,
            event_count: 0,
            horizon: None,
            ticks: Vec::new(),
            next_tick_id: 0,
        };
        sim.schedule_all()?;
        Ok(sim)
    }

    /// Build with the default collaborators: all-pairs neighbor sweep and
    /// elastic response.
    pub fn new(
        particles: Vec<Particle>,
        domain: Domain,
        geometry: Box<dyn InteractionGeometry>,
    ) -> Result<Self> {
        let n = particles.len();
        Self::with_collaborators(
            particles,
            domain,
            geometry,
            Box::new(AllPairs::new(n)),
            Box::new(ElasticResponse),
        )
    }

    /// Uniform hard spheres: contact at the shared diameter `2 * radius`.
    pub fn hard_spheres(particles: Vec<Particle>, domain: Domain) -> Result<Self> {
        let radius = particles
            .first()
            .map(|p| p.radius)
            .ok_or_else(|| Error::InvalidParam("at least one particle required".into()))?;
        if particles.iter().any(|p| p.radius != radius) {
            return Err(Error::InvalidParam(
                "hard_spheres requires a uniform radius; supply a geometry instead".into(),
            ));
        }
        Self::new(
            particles,
            domain,
            Box::new(HardSphere {
                diameter: 2.0 * radius,
            }),
        )
    }

    /// Seeded, rejection-sampled setup: `n` non-overlapping uniform spheres
    /// with velocity components uniform in [-1, 1]. The domain must be
    /// sized (walled or periodic).
    pub fn with_random_placement(
        n: usize,
        domain: Domain,
        radius: f64,
        mass: f64,
        seed: Option<u64>,
    ) -> Result<Self> {
        if n == 0 {
            return Err(Error::InvalidParam("n must be > 0".into()));
        }
        if !radius.is_finite() || radius <= 0.0 {
            return Err(Error::InvalidParam("radius must be finite and > 0".into()));
        }
        let Some(size) = domain.size().copied() else {
            return Err(Error::InvalidParam(
                "random placement needs a sized domain".into(),
            ));
        };
        for &l in &size {
            if l < 2.0 * radius {
                return Err(Error::InvalidParam(
                    "domain must be at least 2 * radius along every axis".into(),
                ));
            }
        }

        let mut rng: StdRng = match seed {
            Some(s) => SeedableRng::seed_from_u64(s),
            None => SeedableRng::seed_from_u64(rand::rng().random()),
        };

        let walled = matches!(domain, Domain::Walled { .. });
        let mut particles: Vec<Particle> = Vec::with_capacity(n);
        let max_attempts = 1_000_000usize;
        for id in 0..(n as ParticleId) {
            let mut attempts = 0usize;
            let r = loop {
                if attempts >= max_attempts {
                    return Err(Error::InvalidParam(format!(
                        "failed to place particle {id} without overlap; lower the density"
                    )));
                }
                attempts += 1;
                let mut r = [0.0_f64; DIM];
                for (k, rk) in r.iter_mut().enumerate() {
                    *rk = if walled {
                        rng.random_range(radius..=(size[k] - radius))
                    } else {
                        rng.random_range(0.0..size[k])
                    };
                }
                if !overlaps_existing(&particles, &r, radius, &domain) {
                    break r;
                }
            };
            let mut v = [0.0_f64; DIM];
            v.iter_mut().for_each(|x| *x = rng.random_range(-1.0..=1.0));
            particles.push(Particle::new(id, r, v, radius, mass)?);
        }

        Self::hard_spheres(particles, domain)
    }

    /// Stop advancing once the next event lies beyond `t` (None removes the
    /// horizon).
    pub fn set_horizon(&mut self, t: Option<f64>) {
        self.horizon = t;
    }

    /// Current simulation time.
    #[inline]
    pub fn current_time(&self) -> f64 {
        self.time
    }

    /// Number of events executed so far.
    #[inline]
    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    /// Read access to the particle population.
    #[inline]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// The boundary-condition transform in use.
    #[inline]
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Total kinetic energy (diagnostic).
    pub fn kinetic_energy(&self) -> f64 {
        self.particles.iter().map(|p| p.kinetic_energy()).sum()
    }

    /// The calendar, for invariant checks by external observers and tests.
    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    /// Recompute and install the prediction for one particle.
    pub fn schedule(&mut self, id: ParticleId) -> Result<()> {
        let rec = self
            .predictor
            .predict(id, &self.particles, self.neighbors.as_ref(), self.time)?;
        self.calendar.install(id as usize, rec)
    }

    /// Mark the given particles' records stale and eagerly recompute them.
    /// Lazy staleness is not an option here: a stale record with an
    /// understated time would corrupt the minimum-time invariant.
    pub fn invalidate(&mut self, ids: &[ParticleId]) -> Result<()> {
        for &id in ids {
            self.calendar.mark_stale(id as usize)?;
            self.schedule(id)?;
        }
        Ok(())
    }

    /// Overwrite a particle's state from outside (e.g. an initialization
    /// routine), then eagerly refresh every prediction that depended on it.
    pub fn set_state(&mut self, id: ParticleId, r: [f64; DIM], v: [f64; DIM]) -> Result<()> {
        if !r.iter().chain(v.iter()).all(|x| x.is_finite()) {
            return Err(Error::InvalidParam("state must be finite".into()));
        }
        let time = self.time;
        {
            let p = self
                .particles
                .get_mut(id as usize)
                .ok_or_else(|| Error::InvalidParam(format!("unknown particle {id}")))?;
            p.r = r;
            p.v = v;
            p.last_update = time;
            p.bump_generation();
        }
        let mut slots: Vec<usize> = vec![id as usize];
        slots.extend_from_slice(self.calendar.dependents_of(id));
        slots.sort_unstable();
        slots.dedup();
        for slot in slots {
            self.schedule(slot as ParticleId)?;
        }
        Ok(())
    }

    /// Schedule a system event `delay` from now; `period` re-arms it after
    /// each firing. Returns the tick id.
    pub fn schedule_system_tick(&mut self, delay: f64, period: Option<f64>) -> Result<u32> {
        if !delay.is_finite() || delay < 0.0 {
            return Err(Error::InvalidParam(
                "tick delay must be finite and >= 0".into(),
            ));
        }
        if let Some(p) = period {
            if !p.is_finite() || p <= 0.0 {
                return Err(Error::InvalidParam(
                    "tick period must be finite and > 0".into(),
                ));
            }
        }
        let id = self.next_tick_id;
        self.next_tick_id += 1;
        self.ticks.push(SystemTick {
            id,
            time: self.time + delay,
            period,
        });
        self.install_system_record()?;
        Ok(id)
    }

    /// Execute the globally earliest event.
    ///
    /// Pops the minimum record, streams the named participants to its time,
    /// applies the physical response, and eagerly recomputes every
    /// prediction that depended on the changed state. Returns `Terminated`
    /// (a normal outcome) when the earliest record is the infinite sentinel
    /// or lies beyond the horizon; the calendar is left untouched in that
    /// case.
    pub fn advance_to_next_event(&mut self) -> Result<StepOutcome> {
        let (slot, rec) = self
            .calendar
            .peek_min()?
            .ok_or_else(|| Error::InvariantViolation("calendar has no records".into()))?;

        let t_raw = rec.time_f64();
        if !t_raw.is_finite() {
            return Ok(StepOutcome::Terminated);
        }
        if let Some(h) = self.horizon {
            if t_raw > h {
                return Ok(StepOutcome::Terminated);
            }
        }
        if t_raw < self.time - EPS_TIME {
            return Err(Error::InvariantViolation(format!(
                "event at t={t_raw} precedes current time {}",
                self.time
            )));
        }
        // Clamp sub-tolerance regressions so the clock never moves backwards.
        let t = t_raw.max(self.time);

        self.verify_current(&rec)?;
        self.calendar.fire(slot)?;

        let participants = rec.kind.participants();
        let domain = self.domain.clone();
        for &id in &participants {
            let p = self
                .particles
                .get_mut(id as usize)
                .ok_or_else(|| record_names_unknown(id))?;
            p.stream_to(t)?;
            p.r = domain.wrap_position(p.r);
        }

        match rec.kind {
            EventKind::Pair { i, j } => {
                let (pi, pj) = pair_mut(&mut self.particles, i as usize, j as usize)?;
                self.response.apply(&rec.kind, &domain, &mut [pi, pj])?;
            }
            EventKind::Boundary { i, .. } => {
                let p = self
                    .particles
                    .get_mut(i as usize)
                    .ok_or_else(|| record_names_unknown(i))?;
                self.response.apply(&rec.kind, &domain, &mut [p])?;
            }
            EventKind::System { tick } => self.fire_tick(tick, t)?,
            EventKind::Idle { .. } => {
                // Idle records are infinite-timed and returned above.
                return Err(Error::InvariantViolation(
                    "idle sentinel fired with finite time".into(),
                ));
            }
        }

        for &id in &participants {
            if !self.particles[id as usize].is_finite() {
                return Err(Error::NonFiniteState {
                    time: t,
                    kind: format!("{:?}", rec.kind),
                    participants: participants.to_vec(),
                });
            }
        }

        for &id in &participants {
            self.particles[id as usize].bump_generation();
        }
        self.time = t;
        self.event_count += 1;

        // Eager reprediction: the participants themselves plus every slot
        // whose record snapshotted them as a partner.
        let mut slots: Vec<usize> = participants.iter().map(|&id| id as usize).collect();
        for &id in &participants {
            slots.extend_from_slice(self.calendar.dependents_of(id));
        }
        if matches!(rec.kind, EventKind::System { .. }) {
            slots.push(self.calendar.system_slot());
        }
        slots.sort_unstable();
        slots.dedup();
        for s in slots {
            if s == self.calendar.system_slot() {
                self.install_system_record()?;
            } else {
                self.schedule(s as ParticleId)?;
            }
        }

        Ok(StepOutcome::Event(EventSummary {
            time: t,
            kind: rec.kind,
            participants,
        }))
    }

    /// Process every event up to `target`, then stream the whole population
    /// there. Used by periodic-output collaborators that need a snapshot at
    /// a fixed time.
    pub fn advance_to(&mut self, target: f64) -> Result<()> {
        if !target.is_finite() {
            return Err(Error::InvalidParam("target time must be finite".into()));
        }
        if target < self.time - EPS_TIME {
            return Err(Error::InvalidParam(
                "target time cannot precede current time".into(),
            ));
        }
        loop {
            let Some((_, rec)) = self.calendar.peek_min()? else {
                break;
            };
            let t = rec.time_f64();
            if !t.is_finite() || t > target {
                break;
            }
            match self.advance_to_next_event()? {
                StepOutcome::Event(_) => {}
                StepOutcome::Terminated => break,
            }
        }
        let domain = self.domain.clone();
        for p in &mut self.particles {
            p.stream_to(target)?;
            p.r = domain.wrap_position(p.r);
        }
        self.time = target;
        Ok(())
    }

    /// Drive until termination or until `max_events` have fired.
    pub fn run(&mut self, max_events: u64) -> Result<DriverReport> {
        let mut events = 0;
        while events < max_events {
            match self.advance_to_next_event()? {
                StepOutcome::Event(_) => events += 1,
                StepOutcome::Terminated => break,
            }
        }
        Ok(DriverReport {
            events,
            final_time: self.time,
        })
    }

    fn schedule_all(&mut self) -> Result<()> {
        for id in 0..self.particles.len() as ParticleId {
            self.schedule(id)?;
        }
        self.install_system_record()
    }

    /// Install the earliest pending tick (or the sentinel) in the system
    /// pseudo-slot.
    fn install_system_record(&mut self) -> Result<()> {
        let slot = self.calendar.system_slot();
        let rec = match self
            .ticks
            .iter()
            .min_by(|a, b| a.time.total_cmp(&b.time).then(a.id.cmp(&b.id)))
        {
            Some(tick) => EventRecord::new(tick.time, EventKind::System { tick: tick.id }, 0, None)?,
            None => EventRecord::idle(slot as ParticleId, 0),
        };
        self.calendar.install(slot, rec)
    }

    fn fire_tick(&mut self, tick: u32, now: f64) -> Result<()> {
        let pos = self
            .ticks
            .iter()
            .position(|t| t.id == tick)
            .ok_or_else(|| {
                Error::InvariantViolation(format!("fired system tick {tick} is not pending"))
            })?;
        let fired = self.ticks.swap_remove(pos);
        if let Some(period) = fired.period {
            self.ticks.push(SystemTick {
                id: fired.id,
                time: now + period,
                period: Some(period),
            });
        }
        Ok(())
    }

    /// A record reaching the head of the calendar must be current; the
    /// eager policy re-predicts on every dependency change, so a stale head
    /// means the bookkeeping is corrupt.
    fn verify_current(&self, rec: &EventRecord) -> Result<()> {
        let live = |id: ParticleId| -> Result<u64> {
            self.particles
                .get(id as usize)
                .map(|p| p.generation)
                .ok_or_else(|| record_names_unknown(id))
        };
        let current = match rec.kind {
            EventKind::Pair { i, j } => rec.is_current(live(i)?, Some(live(j)?)),
            EventKind::Boundary { i, .. } | EventKind::Idle { i } => rec.is_current(live(i)?, None),
            EventKind::System { .. } => true,
        };
        if !current {
            return Err(Error::InvariantViolation(format!(
                "stale record reached execution: {:?}",
                rec.kind
            )));
        }
        Ok(())
    }
}

fn record_names_unknown(id: ParticleId) -> Error {
    Error::InvariantViolation(format!("record references unknown particle {id}"))
}

/// Disjoint mutable access to two particles.
fn pair_mut(
    particles: &mut [Particle],
    i: usize,
    j: usize,
) -> Result<(&mut Particle, &mut Particle)> {
    if i == j || i >= particles.len() || j >= particles.len() {
        return Err(Error::InvariantViolation(format!(
            "invalid pair indices ({i},{j})"
        )));
    }
    if i < j {
        let (a, b) = particles.split_at_mut(j);
        Ok((&mut a[i], &mut b[0]))
    } else {
        let (a, b) = particles.split_at_mut(i);
        Ok((&mut b[0], &mut a[j]))
    }
}

fn overlaps_existing(existing: &[Particle], r: &[f64; DIM], radius: f64, domain: &Domain) -> bool {
    let min_sq = (2.0 * radius) * (2.0 * radius);
    for p in existing {
        let mut d = [0.0_f64; DIM];
        for k in 0..DIM {
            d[k] = r[k] - p.r[k];
        }
        let d = domain.minimum_image(d);
        if dot(&d, &d) < min_sq {
            return true;
        }
    }
    false
}

use crate::core::particle::ParticleId;
use crate::error::{Error, Result};
use ordered_float::NotNan;
use smallvec::SmallVec;
use std::cmp::Ordering;

/// Participant ids named by an event (at most two).
pub type Participants = SmallVec<[ParticleId; 2]>;

/// Kinds of events the engine schedules, as a closed tagged variant.
///
/// Tie-breaking for deterministic execution order prefers, at equal times,
/// the lowest participant id and then `Pair` < `Boundary` < `System`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Binary collision between particles `i` and `j`.
    Pair { i: ParticleId, j: ParticleId },
    /// Particle `i` crossing/reflecting at global boundary `wall`.
    Boundary { i: ParticleId, wall: u32 },
    /// Scheduled system event (pseudo-participant), identified by tick id.
    System { tick: u32 },
    /// No admissible event for particle `i`; only valid with infinite time.
    Idle { i: ParticleId },
}

impl EventKind {
    /// Kind priority for tie-breaking: collision < global < system.
    #[inline]
    pub fn priority(&self) -> u8 {
        match self {
            EventKind::Pair { .. } => 0,
            EventKind::Boundary { .. } => 1,
            EventKind::System { .. } => 2,
            EventKind::Idle { .. } => 3,
        }
    }

    /// Ids of the particles whose state this event reads or mutates.
    /// System events name no particle.
    pub fn participants(&self) -> Participants {
        match *self {
            EventKind::Pair { i, j } => SmallVec::from_slice(&[i, j]),
            EventKind::Boundary { i, .. } | EventKind::Idle { i } => SmallVec::from_slice(&[i]),
            EventKind::System { .. } => SmallVec::new(),
        }
    }

    #[inline]
    fn order_key(&self) -> (ParticleId, u8, u32) {
        match *self {
            EventKind::Pair { i, j } => (i.min(j), 0, i.max(j)),
            EventKind::Boundary { i, wall } => (i, 1, wall),
            EventKind::System { tick } => (ParticleId::MAX, 2, tick),
            EventKind::Idle { i } => (i, 3, 0),
        }
    }
}

/// One event prediction: the time it is expected to fire, its kind, and
/// generation snapshots of every participant it depends on.
///
/// A record is stale the instant any snapshot disagrees with the live
/// particle's generation; staleness is detected by comparison, never by
/// recomputing the prediction. Records are replaced when recomputed, never
/// mutated. Time may be `+inf` (the no-event sentinel) but never NaN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRecord {
    pub time: NotNan<f64>,
    pub kind: EventKind,
    pub gen_i: u64,
    pub gen_j: Option<u64>,
}

impl EventRecord {
    /// Create a record, rejecting NaN times. Infinite times are legal: they
    /// encode "no event" and sort after every finite prediction.
    pub fn new(time: f64, kind: EventKind, gen_i: u64, gen_j: Option<u64>) -> Result<Self> {
        let time =
            NotNan::new(time).map_err(|_| Error::InvalidParam("event time cannot be NaN".into()))?;
        Ok(Self {
            time,
            kind,
            gen_i,
            gen_j,
        })
    }

    /// The no-event sentinel for particle `i` at generation `gen`.
    pub fn idle(i: ParticleId, gen: u64) -> Self {
        // INFINITY is not NaN, so this construction cannot fail.
        let time = NotNan::new(f64::INFINITY).unwrap_or_else(|_| unreachable!());
        Self {
            time,
            kind: EventKind::Idle { i },
            gen_i: gen,
            gen_j: None,
        }
    }

    /// Raw f64 event time.
    #[inline]
    pub fn time_f64(&self) -> f64 {
        self.time.into_inner()
    }

    /// Compare stored generation snapshots against live generations. A
    /// record expecting a second participant is stale if none is supplied.
    #[inline]
    pub fn is_current(&self, gen_i_now: u64, gen_j_now: Option<u64>) -> bool {
        if self.gen_i != gen_i_now {
            return false;
        }
        match (self.gen_j, gen_j_now) {
            (Some(a), Some(b)) => a == b,
            (None, _) => true,
            (Some(_), None) => false,
        }
    }
}

impl Ord for EventRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.time.cmp(&other.time) {
            Ordering::Equal => self.kind.order_key().cmp(&other.kind.order_key()),
            o => o,
        }
    }
}

impl PartialOrd for EventRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// What one driver step reports to logging/statistics collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct EventSummary {
    /// Absolute time the event fired at.
    pub time: f64,
    /// Event kind and its ids.
    pub kind: EventKind,
    /// Particles whose state the event touched.
    pub participants: Participants,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_rejects_nan_time() {
        let err = EventRecord::new(f64::NAN, EventKind::Pair { i: 1, j: 2 }, 0, Some(0)).unwrap_err();
        assert!(err.to_string().contains("NaN"));
    }

    #[test]
    fn infinite_time_is_legal_and_sorts_last() -> Result<()> {
        let idle = EventRecord::idle(0, 0);
        assert!(idle.time_f64().is_infinite());
        let finite = EventRecord::new(1e12, EventKind::Pair { i: 0, j: 1 }, 0, Some(0))?;
        assert!(finite < idle);
        Ok(())
    }

    #[test]
    fn ordering_by_time_then_id_then_kind() -> Result<()> {
        let e1 = EventRecord::new(1.0, EventKind::Pair { i: 0, j: 1 }, 0, Some(0))?;
        let e2 = EventRecord::new(2.0, EventKind::Boundary { i: 0, wall: 0 }, 0, None)?;
        assert!(e1 < e2);

        // Equal time: lower participant id wins.
        let a = EventRecord::new(5.0, EventKind::Boundary { i: 1, wall: 3 }, 0, None)?;
        let b = EventRecord::new(5.0, EventKind::Pair { i: 2, j: 9 }, 0, Some(0))?;
        assert!(a < b);

        // Equal time and id: collision < global < system.
        let c = EventRecord::new(5.0, EventKind::Pair { i: 1, j: 9 }, 0, Some(0))?;
        assert!(c < a);
        let s = EventRecord::new(5.0, EventKind::System { tick: 0 }, 0, None)?;
        assert!(a < s);
        Ok(())
    }

    #[test]
    fn staleness_by_generation_snapshot() -> Result<()> {
        let pair = EventRecord::new(1.0, EventKind::Pair { i: 1, j: 2 }, 10, Some(20))?;
        assert!(pair.is_current(10, Some(20)));
        assert!(!pair.is_current(11, Some(20)));
        assert!(!pair.is_current(10, Some(21)));
        assert!(!pair.is_current(10, None));

        let wall = EventRecord::new(1.0, EventKind::Boundary { i: 3, wall: 0 }, 7, None)?;
        assert!(wall.is_current(7, None));
        // An unrelated second generation does not invalidate a one-particle record.
        assert!(wall.is_current(7, Some(999)));
        Ok(())
    }

    #[test]
    fn participants_per_kind() {
        assert_eq!(
            EventKind::Pair { i: 4, j: 2 }.participants().as_slice(),
            &[4, 2]
        );
        assert_eq!(
            EventKind::Boundary { i: 5, wall: 1 }.participants().as_slice(),
            &[5]
        );
        assert!(EventKind::System { tick: 0 }.participants().is_empty());
    }
}

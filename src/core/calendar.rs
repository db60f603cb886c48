use crate::core::event::{EventKind, EventRecord};
use crate::core::particle::ParticleId;
use crate::error::{Error, Result};
use smallvec::SmallVec;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Lifecycle of a slot's current record.
///
/// `Predicted -> Stale -> Predicted -> ... -> Fired`; `Fired` is terminal
/// for that record instance and is immediately followed by a fresh install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Predicted,
    Stale,
    Fired,
}

#[derive(Debug)]
struct Slot {
    record: EventRecord,
    state: RecordState,
    /// Bumped on every install; heap keys carrying an older value are
    /// superseded and discarded lazily on extraction.
    seq: u64,
}

/// Heap key ordering: the record's own total order (time, lowest id, kind
/// priority), then slot and sequence for a stable total order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct HeapKey {
    record: EventRecord,
    slot: usize,
    seq: u64,
}

/// The event calendar: one outstanding record per participant, plus a
/// pseudo-participant slot for system events, over a minimum-time heap.
///
/// Slots are a dense array indexed by participant id (O(1) lookup); the
/// heap gives amortized-log extraction. Replacing a slot's record bumps its
/// sequence number instead of searching the heap; stale keys fall out when
/// they surface.
///
/// Invariant: once initially scheduled, every slot holds exactly one
/// outstanding record at all times, except inside the atomic fire/reinstall
/// window of the driver's step.
#[derive(Debug)]
pub struct Calendar {
    slots: Vec<Option<Slot>>,
    heap: BinaryHeap<Reverse<HeapKey>>,
    /// For each participant id, the slots whose records snapshot its
    /// generation as a partner. Kept in lockstep with installs so the
    /// driver can eagerly recompute every dependent prediction.
    dependents: Vec<SmallVec<[usize; 4]>>,
}

impl Calendar {
    /// A calendar for `n_particles` particles plus the system pseudo-slot.
    pub fn new(n_particles: usize) -> Self {
        let mut slots = Vec::with_capacity(n_particles + 1);
        slots.resize_with(n_particles + 1, || None);
        Self {
            slots,
            heap: BinaryHeap::new(),
            dependents: vec![SmallVec::new(); n_particles + 1],
        }
    }

    /// Index of the system pseudo-participant slot.
    #[inline]
    pub fn system_slot(&self) -> usize {
        self.slots.len() - 1
    }

    /// Number of slots (particles + the system pseudo-slot).
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Install a fresh record for `slot`, replacing (and superseding) any
    /// previous one. The slot becomes `Predicted`.
    pub fn install(&mut self, slot: usize, record: EventRecord) -> Result<()> {
        if slot >= self.slots.len() {
            return Err(Error::InvariantViolation(format!(
                "install into unknown slot {slot}"
            )));
        }

        // Retire the old record's partner edge before adding the new one.
        if let Some(old) = &self.slots[slot] {
            if let Some(partner) = partner_of(slot, &old.record.kind) {
                self.remove_dependent(partner, slot);
            }
        }
        if let Some(partner) = partner_of(slot, &record.kind) {
            if partner as usize >= self.dependents.len() {
                return Err(Error::InvariantViolation(format!(
                    "record in slot {slot} references unknown participant {partner}"
                )));
            }
            self.dependents[partner as usize].push(slot);
        }

        let seq = self.slots[slot].as_ref().map_or(0, |s| s.seq + 1);
        self.heap.push(Reverse(HeapKey { record, slot, seq }));
        self.slots[slot] = Some(Slot {
            record,
            state: RecordState::Predicted,
            seq,
        });
        Ok(())
    }

    /// Mark a slot's record stale without recomputing. The caller is
    /// expected to follow up with an eager [`Calendar::install`]; a stale
    /// record surfacing at extraction is an invariant violation.
    pub fn mark_stale(&mut self, slot: usize) -> Result<()> {
        match self.slots.get_mut(slot) {
            Some(Some(s)) => {
                s.state = RecordState::Stale;
                Ok(())
            }
            _ => Err(Error::InvariantViolation(format!(
                "no record to invalidate in slot {slot}"
            ))),
        }
    }

    /// Transition a slot's record to `Fired` ahead of its replacement,
    /// returning the fired record.
    pub fn fire(&mut self, slot: usize) -> Result<EventRecord> {
        match self.slots.get_mut(slot) {
            Some(Some(s)) if s.state == RecordState::Predicted => {
                s.state = RecordState::Fired;
                Ok(s.record)
            }
            Some(Some(s)) => Err(Error::InvariantViolation(format!(
                "firing slot {slot} in state {:?}",
                s.state
            ))),
            _ => Err(Error::InvariantViolation(format!(
                "firing empty slot {slot}"
            ))),
        }
    }

    /// The record with minimum (time, participant id, kind priority) and
    /// the slot that owns it, without removing it. Discards superseded heap
    /// keys on the way; `None` only for a calendar with no records at all.
    pub fn peek_min(&mut self) -> Result<Option<(usize, EventRecord)>> {
        while let Some(Reverse(key)) = self.heap.peek().copied() {
            let slot = self.slots.get(key.slot).and_then(|s| s.as_ref()).ok_or_else(|| {
                Error::InvariantViolation(format!("heap key references empty slot {}", key.slot))
            })?;
            if slot.seq != key.seq {
                // Superseded by a later install.
                self.heap.pop();
                continue;
            }
            match slot.state {
                RecordState::Predicted => return Ok(Some((key.slot, slot.record))),
                RecordState::Stale => {
                    return Err(Error::InvariantViolation(format!(
                        "stale record reached the head of the calendar (slot {})",
                        key.slot
                    )))
                }
                RecordState::Fired => {
                    // Fired without reinstall: the slot lost its record.
                    return Err(Error::InvariantViolation(format!(
                        "fired record still heads the calendar (slot {})",
                        key.slot
                    )));
                }
            }
        }
        if self.slots.iter().any(|s| s.is_some()) {
            return Err(Error::InvariantViolation(
                "calendar heap exhausted while records remain".into(),
            ));
        }
        Ok(None)
    }

    /// Current record for a slot, if one was ever installed.
    pub fn record(&self, slot: usize) -> Option<&EventRecord> {
        self.slots.get(slot).and_then(|s| s.as_ref()).map(|s| &s.record)
    }

    /// State of a slot's current record.
    pub fn state(&self, slot: usize) -> Option<RecordState> {
        self.slots.get(slot).and_then(|s| s.as_ref()).map(|s| s.state)
    }

    /// Slots whose records depend on participant `id` as a partner.
    pub fn dependents_of(&self, id: ParticleId) -> &[usize] {
        self.dependents
            .get(id as usize)
            .map(|d| d.as_slice())
            .unwrap_or(&[])
    }

    /// Number of outstanding (`Predicted`) records.
    pub fn outstanding(&self) -> usize {
        self.slots
            .iter()
            .flatten()
            .filter(|s| s.state == RecordState::Predicted)
            .count()
    }

    /// Verify the one-outstanding-record-per-slot invariant.
    pub fn check_integrity(&self) -> Result<()> {
        for (i, slot) in self.slots.iter().enumerate() {
            match slot {
                None => {
                    return Err(Error::InvariantViolation(format!(
                        "slot {i} has no record"
                    )))
                }
                Some(s) if s.state != RecordState::Predicted => {
                    return Err(Error::InvariantViolation(format!(
                        "slot {i} is {:?} outside the update window",
                        s.state
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn remove_dependent(&mut self, id: ParticleId, slot: usize) {
        if let Some(deps) = self.dependents.get_mut(id as usize) {
            if let Some(pos) = deps.iter().position(|&s| s == slot) {
                deps.swap_remove(pos);
            }
        }
    }
}

/// The partner id a slot's record depends on, when the record names a
/// participant other than the slot's owner.
fn partner_of(slot: usize, kind: &EventKind) -> Option<ParticleId> {
    match *kind {
        EventKind::Pair { i, j } => {
            if slot == i as usize {
                Some(j)
            } else {
                Some(i)
            }
        }
        EventKind::Boundary { .. } | EventKind::System { .. } | EventKind::Idle { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(i: ParticleId, j: ParticleId, t: f64) -> EventRecord {
        EventRecord::new(t, EventKind::Pair { i, j }, 0, Some(0)).unwrap()
    }

    fn wall(i: ParticleId, t: f64) -> EventRecord {
        EventRecord::new(t, EventKind::Boundary { i, wall: 0 }, 0, None).unwrap()
    }

    fn idle_all(cal: &mut Calendar) {
        for slot in 0..cal.len() {
            cal.install(slot, EventRecord::idle(slot as ParticleId, 0))
                .unwrap();
        }
    }

    #[test]
    fn minimum_is_earliest_installed_record() -> Result<()> {
        let mut cal = Calendar::new(3);
        idle_all(&mut cal);
        cal.install(0, pair(0, 1, 5.0))?;
        cal.install(1, pair(1, 2, 3.0))?;
        cal.install(2, pair(2, 0, 8.0))?;

        let (slot, rec) = cal.peek_min()?.expect("records exist");
        assert_eq!(slot, 1);
        assert_eq!(rec.time_f64(), 3.0);
        Ok(())
    }

    #[test]
    fn reinstall_supersedes_old_heap_keys() -> Result<()> {
        let mut cal = Calendar::new(2);
        idle_all(&mut cal);
        cal.install(0, pair(0, 1, 1.0))?;
        cal.install(0, pair(0, 1, 9.0))?;
        cal.install(1, pair(1, 0, 4.0))?;

        // The t = 1 key is dead; slot 1 now owns the minimum.
        let (slot, rec) = cal.peek_min()?.expect("records exist");
        assert_eq!(slot, 1);
        assert_eq!(rec.time_f64(), 4.0);
        Ok(())
    }

    #[test]
    fn equal_times_break_ties_deterministically() -> Result<()> {
        let mut cal = Calendar::new(3);
        idle_all(&mut cal);
        cal.install(2, pair(2, 1, 4.0))?;
        cal.install(0, EventRecord::new(4.0, EventKind::Boundary { i: 0, wall: 2 }, 0, None)?)?;

        // Lower participant id wins at equal time, regardless of kind.
        let (slot, _) = cal.peek_min()?.expect("records exist");
        assert_eq!(slot, 0);
        Ok(())
    }

    #[test]
    fn idle_sentinel_is_schedulable_but_never_beats_finite() -> Result<()> {
        let mut cal = Calendar::new(2);
        idle_all(&mut cal);
        cal.install(1, pair(1, 0, 1e9))?;

        let (slot, rec) = cal.peek_min()?.expect("records exist");
        assert_eq!(slot, 1);
        assert!(rec.time_f64().is_finite());

        // With only sentinels left, the minimum is an infinite record.
        cal.install(1, EventRecord::idle(1, 1))?;
        let (_, rec) = cal.peek_min()?.expect("sentinels are records");
        assert!(rec.time_f64().is_infinite());
        Ok(())
    }

    #[test]
    fn stale_at_head_is_a_fault() -> Result<()> {
        let mut cal = Calendar::new(1);
        idle_all(&mut cal);
        cal.install(0, wall(0, 2.0))?;
        cal.mark_stale(0)?;
        assert!(cal.peek_min().is_err());
        Ok(())
    }

    #[test]
    fn fire_requires_a_predicted_record() -> Result<()> {
        let mut cal = Calendar::new(1);
        idle_all(&mut cal);
        cal.install(0, wall(0, 2.0))?;
        let fired = cal.fire(0)?;
        assert_eq!(fired.time_f64(), 2.0);
        // Double fire is a fault.
        assert!(cal.fire(0).is_err());
        Ok(())
    }

    #[test]
    fn dependency_edges_follow_installs() -> Result<()> {
        let mut cal = Calendar::new(3);
        idle_all(&mut cal);
        cal.install(0, pair(0, 2, 5.0))?;
        assert_eq!(cal.dependents_of(2), &[0]);

        // Repointing slot 0 at a new partner retires the old edge.
        cal.install(0, pair(0, 1, 6.0))?;
        assert_eq!(cal.dependents_of(2), &[] as &[usize]);
        assert_eq!(cal.dependents_of(1), &[0]);
        Ok(())
    }

    #[test]
    fn integrity_counts_one_record_per_slot() -> Result<()> {
        let mut cal = Calendar::new(2);
        assert!(cal.check_integrity().is_err());
        idle_all(&mut cal);
        cal.check_integrity()?;
        assert_eq!(cal.outstanding(), 3); // 2 particles + system slot

        cal.fire(0)?;
        assert!(cal.check_integrity().is_err());
        cal.install(0, pair(0, 1, 7.0))?;
        cal.check_integrity()?;
        Ok(())
    }
}

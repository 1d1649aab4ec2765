//! Slab of live reservations.
//!
//! Callers hold a copyable [`ReservationId`] instead of owning the backing
//! storage. Slots are recycled only with a bumped generation, so a handle
//! that outlives its reservation names nothing instead of aliasing a newer
//! reservation in the same slot.

use eventdev_time::Tick;

/// Handle to a live reservation on one device.
///
/// Identity is stable across [`reschedule`](crate::EventDevice::reschedule)
/// calls; it is invalidated by [`release`](crate::EventDevice::release).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReservationId {
    index: u32,
    generation: u32,
}

/// One caller's standing demand: at least `desired_state` from `start_tick`
/// onward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Reservation {
    pub desired_state: u32,
    pub start_tick: Tick,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    entry: Option<Reservation>,
}

#[derive(Debug, Default)]
pub(crate) struct ReservationSet {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl ReservationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reservation: Reservation) -> ReservationId {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entry = Some(reservation);
                ReservationId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(reservation),
                });
                ReservationId {
                    index,
                    generation: 0,
                }
            }
        }
    }

    pub fn get_mut(&mut self, id: ReservationId) -> Option<&mut Reservation> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    pub fn remove(&mut self, id: ReservationId) -> Option<Reservation> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let reservation = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Some(reservation)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reservation> {
        self.slots.iter().filter_map(|slot| slot.entry.as_ref())
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

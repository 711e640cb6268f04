//! Deduplicating storage of state vectors.
//!
//! [`StateStorage`] maps fixed-size byte vectors to dense [`StateIndex`]es. The
//! table is split into lock-protected stripes selected by the high bits of the
//! hash; within a stripe, slots are probed linearly. Capacity is fixed up front:
//! every stripe's slot table is allocated once, and running out of space is
//! reported as [`CapacityError`] rather than growing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use log::debug;
use parking_lot::Mutex;

use crate::error::{CapacityError, CapacityKind};
use crate::types::StateIndex;
use crate::utils::MyHash;

#[derive(Debug)]
struct Stripe {
    /// `index + 1` of the stored state, `0` for an empty slot.
    slots: Vec<u32>,
}

impl Stripe {
    fn new(size: usize) -> Self {
        Self {
            slots: vec![0; size],
        }
    }

    fn mask(&self) -> usize {
        self.slots.len() - 1
    }
}

#[derive(Debug)]
pub struct StateStorage {
    state_size: usize,
    capacity: usize,
    states: Box<[OnceLock<Box<[u8]>>]>,
    stripes: Box<[Mutex<Stripe>]>,
    stripe_bits: u32,
    next_index: AtomicUsize,
}

impl StateStorage {
    /// Creates a storage for up to `capacity` states of `state_size` bytes each.
    pub fn new(state_size: usize, capacity: usize) -> Self {
        assert!(capacity > 0, "Storage capacity must be positive");
        assert!(capacity < u32::MAX as usize, "Storage capacity must fit into u32");

        let stripe_count = (capacity / 1024).clamp(1, 64).next_power_of_two().min(64);
        let stripe_bits = stripe_count.trailing_zeros();
        // At least twice the expected stripe load, so the tables stay below half full.
        let stripe_size = (2 * capacity / stripe_count + 16).next_power_of_two();
        debug!(
            "Allocating state storage: capacity={}, state_size={}, stripes={}x{}",
            capacity, state_size, stripe_count, stripe_size
        );

        Self {
            state_size,
            capacity,
            states: (0..capacity).map(|_| OnceLock::new()).collect(),
            stripes: (0..stripe_count).map(|_| Mutex::new(Stripe::new(stripe_size))).collect(),
            stripe_bits,
            next_index: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn state_size(&self) -> usize {
        self.state_size
    }

    /// Number of stored states.
    pub fn len(&self) -> usize {
        self.next_index.load(Ordering::Acquire).min(self.capacity)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn stripe_of(&self, hash: u64) -> usize {
        hash.checked_shr(64 - self.stripe_bits).unwrap_or(0) as usize
    }

    /// Returns the state vector stored under `index`.
    ///
    /// # Panics
    ///
    /// Panics if no state has been stored under `index`.
    pub fn get(&self, index: StateIndex) -> &[u8] {
        match self.states.get(index as usize).and_then(|s| s.get()) {
            Some(bytes) => bytes,
            None => panic!("State {} has not been stored", index),
        }
    }

    /// Inserts `bytes` unless an equal vector is already stored.
    ///
    /// Returns the index of the stored vector and whether this call inserted it.
    pub fn try_insert(&self, bytes: &[u8]) -> Result<(StateIndex, bool), CapacityError> {
        assert_eq!(bytes.len(), self.state_size, "State vector has the wrong size");

        let hash = bytes.hash();
        let mut stripe = self.stripes[self.stripe_of(hash)].lock();
        let exhausted = CapacityError {
            kind: CapacityKind::States,
            capacity: self.capacity,
        };

        let mask = stripe.mask();
        let mut slot = hash as usize & mask;
        for _ in 0..stripe.slots.len() {
            let entry = stripe.slots[slot];
            if entry == 0 {
                let index = self.next_index.fetch_add(1, Ordering::AcqRel);
                if index >= self.capacity {
                    return Err(exhausted);
                }
                // Each index is handed out once, so the cell is still empty.
                let _ = self.states[index].set(bytes.into());
                stripe.slots[slot] = index as u32 + 1;
                return Ok((index as StateIndex, true));
            }

            let index = entry - 1;
            if self.get(index) == bytes {
                return Ok((index, false));
            }
            slot = (slot + 1) & mask;
        }

        // Every slot of the stripe is taken.
        Err(exhausted)
    }
}

//! Admission control: a bounded pool of session slots.
//!
//! # Responsibility
//! - Bound the number of concurrently running sessions to a capacity of
//!   1..=8.
//! - Block the accept loop while every slot is taken.
//!
//! # Invariants
//! - `in_use <= capacity` at all times.
//! - A slot is released exactly once, when its `AdmissionSlot` is dropped.
//!   Drop runs on normal return, on early return and during panic unwinding
//!   of the owning session thread.

use crate::server::config::ConfigError;
use log::debug;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

pub const MIN_CONNECTIONS: usize = 1;
pub const MAX_CONNECTIONS: usize = 8;

/// Counting semaphore sized to the configured session capacity.
#[derive(Debug)]
pub struct AdmissionController {
    capacity: usize,
    in_use: Mutex<usize>,
    released: Condvar,
}

impl AdmissionController {
    /// Creates a controller; capacity outside 1..=8 is a configuration error.
    pub fn new(capacity: usize) -> Result<Arc<Self>, ConfigError> {
        if !(MIN_CONNECTIONS..=MAX_CONNECTIONS).contains(&capacity) {
            return Err(ConfigError::InvalidCapacity(capacity));
        }
        Ok(Arc::new(Self {
            capacity,
            in_use: Mutex::new(0),
            released: Condvar::new(),
        }))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots currently held.
    pub fn in_use(&self) -> usize {
        *self.in_use.lock()
    }

    /// Takes one slot, blocking until one is free.
    pub fn acquire(self: &Arc<Self>) -> AdmissionSlot {
        let mut in_use = self.in_use.lock();
        while *in_use >= self.capacity {
            self.released.wait(&mut in_use);
        }
        *in_use += 1;
        AdmissionSlot {
            controller: Arc::clone(self),
        }
    }

    /// Takes one slot if one is free right now.
    pub fn try_acquire(self: &Arc<Self>) -> Option<AdmissionSlot> {
        let mut in_use = self.in_use.lock();
        if *in_use >= self.capacity {
            return None;
        }
        *in_use += 1;
        Some(AdmissionSlot {
            controller: Arc::clone(self),
        })
    }

    fn release(&self) {
        let mut in_use = self.in_use.lock();
        *in_use = in_use.saturating_sub(1);
        debug!(
            "event=admission_release module=admission status=ok in_use={} capacity={}",
            *in_use, self.capacity
        );
        drop(in_use);
        self.released.notify_one();
    }
}

/// Capacity token held by one running session.
#[derive(Debug)]
pub struct AdmissionSlot {
    controller: Arc<AdmissionController>,
}

impl Drop for AdmissionSlot {
    fn drop(&mut self) {
        self.controller.release();
    }
}

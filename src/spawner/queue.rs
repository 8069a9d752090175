// src/spawner/queue.rs
//! Shared FIFO of pending spawn tasks. Producers on any thread append;
//! the scheduler is the only consumer and only ever try-locks.

use bevy::prelude::*;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use super::task::SpawnTask;

/// Mutex-guarded task queue, cloneable into worker threads. Append order is
/// execution order, globally across all producers.
#[derive(Resource, Clone, Default)]
pub struct SpawnTaskQueue {
    tasks: Arc<Mutex<VecDeque<SpawnTask>>>,
}

impl SpawnTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fully-constructed task. Blocks briefly if the scheduler is
    /// mid-drain; cannot fail once the lock is held.
    pub fn submit(&self, task: SpawnTask) {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(task);
    }

    pub fn len(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Non-blocking acquisition for the drain side. `None` means a producer
    /// holds the lock; the caller skips this tick rather than stall the
    /// frame.
    pub(crate) fn lock_for_drain(&self) -> Option<MutexGuard<'_, VecDeque<SpawnTask>>> {
        match self.tasks.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }
}

// src/spawner/scheduler.rs
//! Per-tick budgeted drain of the spawn task queue.

use bevy::prelude::*;

use super::plugin::SpawnerSettings;
use super::queue::SpawnTaskQueue;

/// What one tick of draining did. Mostly for logs and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Execution calls made, including retries of the same front task.
    pub attempts: u32,
    /// Tasks that reported done and were removed.
    pub completed: u32,
    /// Complexity charged, including the final over-budget charge that
    /// ended the loop.
    pub spent: u32,
}

/// Drain tasks from the queue front while the running complexity total
/// stays within `budget`.
///
/// The front task's cost is charged before it runs, so a front task costing
/// more than the whole budget is never attempted and starves until the
/// budget is raised; size the budget above the most expensive task class.
/// A task that reports not-done stays at the front, blocking everything
/// behind it, and is charged again for each retry.
///
/// The queue lock is acquired non-blockingly: if a producer is mid-append,
/// this tick does nothing and the next one picks the work up.
pub fn run_spawn_tick(queue: &SpawnTaskQueue, world: &mut World, budget: u32) -> TickStats {
    let mut stats = TickStats::default();
    let Some(mut tasks) = queue.lock_for_drain() else {
        return stats;
    };

    let mut spent = match tasks.front() {
        Some(front) => front.complexity(),
        None => return stats,
    };

    while spent <= budget {
        let Some(front) = tasks.front_mut() else {
            break;
        };
        stats.attempts += 1;
        if front.execute(world) {
            stats.completed += 1;
            tasks.pop_front();
        }
        match tasks.front() {
            Some(next) => spent += next.complexity(),
            None => break,
        }
    }

    stats.spent = spent;
    stats
}

/// Exclusive system the schedule runs once per frame: the host-side drive
/// entry point for the whole subsystem.
pub fn drain_spawn_tasks(world: &mut World) {
    let queue = world.resource::<SpawnTaskQueue>().clone();
    let budget = world.resource::<SpawnerSettings>().complexity_budget;
    let stats = run_spawn_tick(&queue, world, budget);
    if stats.attempts > 0 {
        debug!(
            "spawn drain: {} attempts, {} completed, {} complexity spent (budget {})",
            stats.attempts, stats.completed, stats.spent, budget
        );
    }
}

// src/spawner/plugin.rs
//! Spawner wiring (glue): queue + settings + capacity gate + per-frame drain.

use bevy::prelude::*;

use super::core::{SceneryCensus, SceneryLimits};
use super::queue::SpawnTaskQueue;
use super::scheduler::drain_spawn_tasks;

/// Per-tick drain tuning. The budget is the ceiling on summed task
/// complexity per frame; it must exceed the most expensive single task
/// cost or that task class never runs.
#[derive(Resource, Clone, Copy)]
pub struct SpawnerSettings {
    pub complexity_budget: u32,
}

impl Default for SpawnerSettings {
    fn default() -> Self {
        Self { complexity_budget: 8 }
    }
}

pub struct SpawnerPlugin;

impl Plugin for SpawnerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SpawnTaskQueue>()
            .init_resource::<SpawnerSettings>()
            .init_resource::<SceneryLimits>()
            .init_resource::<SceneryCensus>()
            .add_systems(Update, drain_spawn_tasks);
    }
}

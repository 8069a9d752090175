// src/vehicles.rs
//! Vehicle traffic: shared models owned by the fleet, craft entities spawned
//! through the task queue and bound to their model by a weak reference.
//!
//! The model is the simulation-side object; the craft entity is its world
//! presence. Either side can outlive the other for a few frames, which is
//! why the link is weak in both directions (the fleet holds the only strong
//! refs).

use bevy::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::spawner::core::SceneryCensus;
use crate::spawner::task::{SpawnTask, VehicleSpawn};
use crate::spawner::SpawnTaskQueue;
use crate::templates::TemplateRegistry;

// ---------- Model ----------

/// Simulation-side vehicle state, shared with the spawn task and the craft
/// entity via `Weak`.
pub struct VehicleModel {
    pub origin: Vec3,
    /// Unit-ish travel direction.
    pub heading: Vec3,
    speed: Mutex<f32>,
}

impl VehicleModel {
    pub fn new(origin: Vec3, heading: Vec3) -> Self {
        Self { origin, heading, speed: Mutex::new(0.0) }
    }

    pub fn set_speed(&self, speed: f32) {
        *self.speed.lock().unwrap_or_else(PoisonError::into_inner) = speed;
    }

    pub fn speed(&self) -> f32 {
        *self.speed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------- Components ----------

/// Marker on every spawned craft entity.
#[derive(Component)]
pub struct VehicleCraft;

/// Weak link from a craft entity back to its model.
#[derive(Component)]
pub struct VehicleLink {
    pub model: Weak<VehicleModel>,
}

/// Forward speed of the craft, in meters per second.
#[derive(Component, Clone, Copy)]
pub struct VehicleMotion {
    pub speed: f32,
}

// ---------- Fleet ----------

#[derive(Resource, Clone)]
pub struct TrafficSettings {
    /// Template name looked up in the registry for new craft.
    pub craft_template: String,
    pub max_fleet: usize,
    /// Seconds between dispatch attempts.
    pub dispatch_interval: f32,
    /// Craft past this distance from the world origin are retired.
    pub city_radius: f32,
}

impl Default for TrafficSettings {
    fn default() -> Self {
        Self {
            craft_template: "courier-craft".to_string(),
            max_fleet: 24,
            dispatch_interval: 1.5,
            city_radius: 220.0,
        }
    }
}

/// Owns the strong refs to every live model; everything else sees `Weak`.
#[derive(Resource)]
pub struct VehicleFleet {
    models: Vec<Arc<VehicleModel>>,
    rng: ChaCha8Rng,
    dispatch_timer: f32,
}

impl Default for VehicleFleet {
    fn default() -> Self {
        Self {
            models: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(0x7F1E_E7),
            dispatch_timer: 0.0,
        }
    }
}

impl VehicleFleet {
    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    fn forget(&mut self, link: &VehicleLink) {
        self.models
            .retain(|m| !std::ptr::eq(Arc::as_ptr(m), link.model.as_ptr()));
    }
}

// ---------- Systems ----------

/// Periodically create a model on the city edge and submit its spawn task.
/// The task only holds a weak ref; if the model is retired before the
/// scheduler reaches the task, the spawn quietly does nothing.
fn dispatch_vehicles(
    time: Res<Time>,
    mut fleet: ResMut<VehicleFleet>,
    settings: Res<TrafficSettings>,
    registry: Option<Res<TemplateRegistry>>,
    queue: Res<SpawnTaskQueue>,
) {
    let Some(registry) = registry else { return };
    let Some(template) = registry.index_of(&settings.craft_template) else {
        return;
    };

    fleet.dispatch_timer += time.delta_secs();
    if fleet.dispatch_timer < settings.dispatch_interval || fleet.len() >= settings.max_fleet {
        return;
    }
    fleet.dispatch_timer = 0.0;

    // enter on a circle around the city, headed through the middle
    let angle = fleet.rng.random_range(0.0..std::f32::consts::TAU);
    let lane = fleet.rng.random_range(-12.0..12.0f32);
    let altitude = fleet.rng.random_range(8.0..20.0f32);
    let rim = Vec3::new(angle.cos(), 0.0, angle.sin()) * settings.city_radius * 0.9;
    let origin = Vec3::new(rim.x + lane, altitude, rim.z + lane);
    let heading = (-rim).normalize_or_zero();

    let model = Arc::new(VehicleModel::new(origin, heading));
    queue.submit(SpawnTask::vehicle(VehicleSpawn {
        model: Arc::downgrade(&model),
        template,
        position: origin,
        tangent: heading,
    }));
    fleet.models.push(model);
}

/// Advance every craft along its facing. Craft whose model is gone are
/// orphans and despawn on the spot.
fn steer_vehicles(
    time: Res<Time>,
    mut commands: Commands,
    mut census: ResMut<SceneryCensus>,
    mut query: Query<(Entity, &mut Transform, &VehicleLink, &VehicleMotion), With<VehicleCraft>>,
) {
    let dt = time.delta_secs();
    for (entity, mut tf, link, motion) in query.iter_mut() {
        if link.model.upgrade().is_none() {
            commands.entity(entity).despawn();
            census.live = census.live.saturating_sub(1);
            continue;
        }
        let forward = tf.forward();
        tf.translation += forward * motion.speed * dt;
    }
}

/// Retire craft that left the city: drop the model (expiring any queued
/// task that still points at it) and despawn the entity.
fn retire_vehicles(
    mut commands: Commands,
    mut fleet: ResMut<VehicleFleet>,
    mut census: ResMut<SceneryCensus>,
    settings: Res<TrafficSettings>,
    query: Query<(Entity, &Transform, &VehicleLink), With<VehicleCraft>>,
) {
    for (entity, tf, link) in query.iter() {
        if tf.translation.length() > settings.city_radius {
            fleet.forget(link);
            commands.entity(entity).despawn();
            census.live = census.live.saturating_sub(1);
        }
    }
}

pub struct VehiclesPlugin;

impl Plugin for VehiclesPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<TrafficSettings>()
            .init_resource::<VehicleFleet>()
            .add_systems(
                Update,
                (dispatch_vehicles, steer_vehicles, retire_vehicles.after(steer_vehicles)),
            );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_speed_is_shared_through_the_arc() {
        let model = Arc::new(VehicleModel::new(Vec3::ZERO, Vec3::X));
        let weak = Arc::downgrade(&model);
        weak.upgrade().unwrap().set_speed(17.0);
        assert_eq!(model.speed(), 17.0);
    }

    #[test]
    fn fleet_forget_drops_the_matching_model() {
        let mut fleet = VehicleFleet::default();
        let keep = Arc::new(VehicleModel::new(Vec3::ZERO, Vec3::X));
        let drop_me = Arc::new(VehicleModel::new(Vec3::ONE, Vec3::Z));
        fleet.models.push(keep.clone());
        fleet.models.push(drop_me.clone());

        let link = VehicleLink { model: Arc::downgrade(&drop_me) };
        fleet.forget(&link);
        assert_eq!(fleet.len(), 1);
        assert!(std::ptr::eq(Arc::as_ptr(&fleet.models[0]), Arc::as_ptr(&keep)));
    }
}

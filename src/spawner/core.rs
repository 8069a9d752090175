// src/spawner/core.rs
//! Core types shared by the spawn tasks: object bookkeeping, collision
//! profiles, raw mesh geometry. Keep this file dependency-light; it should
//! compile before the task/scheduler impls.

use bevy::prelude::*;
use bevy::render::mesh::{Indices, Mesh, PrimitiveTopology};
use std::sync::{Arc, Mutex, PoisonError};

// ---------- Object bookkeeping ----------

/// Accumulator of root entities created for one build unit (a district).
///
/// The surrounding build context owns one cell per unit and hands clones to
/// every task of that unit; a later delete task drains the same cell to tear
/// the whole unit down at once. Entities are ids only; the world owns the
/// objects themselves.
#[derive(Clone, Default)]
pub struct BuildCell {
    created: Arc<Mutex<Vec<Entity>>>,
}

impl BuildCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one created root object. Called from task execution on the
    /// sim thread, so the lock is never contended there.
    pub fn record(&self, entity: Entity) {
        self.lock().push(entity);
    }

    /// Take every recorded handle, leaving the cell empty.
    pub fn take(&self) -> Vec<Entity> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot of the recorded handles, in record order.
    pub fn handles(&self) -> Vec<Entity> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Entity>> {
        self.created.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------- Collision ----------

/// Collision profile stamped on every spawned scenery root (and on each
/// spline segment individually).
#[derive(Component, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollisionProfile {
    BlockAllDynamic,
    NoCollision,
}

// ---------- Marker components ----------

/// One fixed mesh object (buildings, debris).
#[derive(Component)]
pub struct StaticScenery;

/// Root of a spline-driven run of segment meshes (roads, rails).
#[derive(Component)]
pub struct SplineScenery;

/// One segment of a spline run, child of a [`SplineScenery`] root.
#[derive(Component)]
pub struct SplineSegment;

/// Container for a runtime-assembled mesh (plazas, ground detail).
#[derive(Component)]
pub struct ProceduralScenery;

/// Object instantiated from a named template.
#[derive(Component)]
pub struct TemplatedScenery;

/// Back-reference from a templated object to the generator that requested it.
#[derive(Component, Clone, Copy, Debug)]
pub struct SpawnedBy(pub Entity);

// ---------- Raw geometry for procedural containers ----------

/// CPU-side mesh buffers, produced by generation logic off-thread and
/// assembled into a [`Mesh`] only on the sim thread.
#[derive(Clone, Debug, Default)]
pub struct MeshGeometry {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl MeshGeometry {
    pub fn build_mesh(&self) -> Mesh {
        let mut mesh = Mesh::new(PrimitiveTopology::TriangleList, Default::default());
        mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, self.positions.clone());
        mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, self.normals.clone());
        mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, self.uvs.clone());
        mesh.insert_indices(Indices::U32(self.indices.clone()));
        mesh
    }
}

// ---------- World capacity gate ----------

/// Hard cap on live task-spawned objects. A spawn attempted at the cap is
/// refused; refusal is the expected failure path, not an error.
#[derive(Resource, Clone, Copy)]
pub struct SceneryLimits {
    pub max_live_objects: usize,
}

impl Default for SceneryLimits {
    fn default() -> Self {
        Self { max_live_objects: 10_000 }
    }
}

/// Count of live task-spawned root objects.
#[derive(Resource, Default)]
pub struct SceneryCensus {
    pub live: usize,
}

/// Missing resources mean "unlimited": tests and tools that never insert the
/// gate still get working spawns.
pub(crate) fn world_has_capacity(world: &World) -> bool {
    let Some(limits) = world.get_resource::<SceneryLimits>() else {
        return true;
    };
    let live = world.get_resource::<SceneryCensus>().map(|c| c.live).unwrap_or(0);
    live < limits.max_live_objects
}

pub(crate) fn note_spawned(world: &mut World) {
    if let Some(mut census) = world.get_resource_mut::<SceneryCensus>() {
        census.live += 1;
    }
}

pub(crate) fn note_destroyed(world: &mut World, count: usize) {
    if let Some(mut census) = world.get_resource_mut::<SceneryCensus>() {
        census.live = census.live.saturating_sub(count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_records_in_order_and_take_clears() {
        let cell = BuildCell::new();
        let a = Entity::from_raw(1);
        let b = Entity::from_raw(2);
        cell.record(a);
        cell.record(b);
        assert_eq!(cell.len(), 2);
        assert_eq!(cell.take(), vec![a, b]);
        assert!(cell.is_empty());
        // a second take on the emptied cell yields nothing
        assert!(cell.take().is_empty());
    }

    #[test]
    fn geometry_builds_indexed_mesh() {
        let geo = MeshGeometry {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
            normals: vec![[0.0, 1.0, 0.0]; 3],
            uvs: vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]],
            indices: vec![0, 2, 1],
        };
        let mesh = geo.build_mesh();
        assert!(mesh.attribute(Mesh::ATTRIBUTE_POSITION).is_some());
        assert_eq!(mesh.indices().map(|i| i.len()), Some(3));
    }

    #[test]
    fn capacity_gate_counts_against_limit() {
        let mut world = World::new();
        world.insert_resource(SceneryLimits { max_live_objects: 1 });
        world.insert_resource(SceneryCensus::default());
        assert!(world_has_capacity(&world));
        note_spawned(&mut world);
        assert!(!world_has_capacity(&world));
        note_destroyed(&mut world, 1);
        assert!(world_has_capacity(&world));
    }
}

// src/spawner/task.rs
//! Deferred world-mutation work. Generation threads build these, the
//! scheduler executes them on the sim thread under the per-tick budget.

use bevy::pbr::MeshMaterial3d;
use bevy::prelude::*;
use std::sync::Weak;

use super::core::{
    note_destroyed, note_spawned, world_has_capacity, BuildCell, CollisionProfile, MeshGeometry,
    ProceduralScenery, SpawnedBy, SplineScenery, SplineSegment, StaticScenery, TemplatedScenery,
};
use crate::templates::{TemplateId, TemplateRegistry};
use crate::vehicles::{VehicleCraft, VehicleLink, VehicleModel, VehicleMotion};

/// Refused spawns are retried this many times before the task is dropped
/// with a diagnostic. Keeps a full world from wedging the queue head.
pub const MAX_SPAWN_ATTEMPTS: u32 = 3;

// Default complexity per variant. The budget must exceed the largest of
// these or that task class never runs (see scheduler docs).
const STATIC_MESH_COST: u32 = 1;
const SPLINE_MESH_COST: u32 = 4;
const PROCEDURAL_MESH_COST: u32 = 6;
const TEMPLATED_COST: u32 = 1;
const VEHICLE_COST: u32 = 1;
const DELETE_COST: u32 = 2;

/// One unit of deferred spawn work: a complexity cost, a retry counter for
/// refused spawns, and the variant payload.
pub struct SpawnTask {
    cost: u32,
    attempts: u32,
    work: TaskWork,
}

/// Closed set of work variants. Adding a kind means extending this enum;
/// every dispatch below matches exhaustively with no wildcard arm.
enum TaskWork {
    StaticMesh(StaticMeshSpawn),
    SplineMesh(SplineMeshSpawn),
    ProceduralMesh(ProceduralMeshSpawn),
    Templated(TemplatedSpawn),
    Vehicle(VehicleSpawn),
    DeleteObjects(DeleteObjects),
}

/// Outcome of one execution step, before the retry policy is applied.
enum Step {
    /// Work finished; remove the task.
    Done,
    /// State advanced but more steps remain (procedural phase one).
    Again,
    /// The world refused the spawn (capacity); eligible for bounded retry.
    Refused,
}

impl SpawnTask {
    pub fn static_mesh(spawn: StaticMeshSpawn) -> Self {
        Self::with_work(STATIC_MESH_COST, TaskWork::StaticMesh(spawn))
    }

    pub fn spline_mesh(spawn: SplineMeshSpawn) -> Self {
        Self::with_work(SPLINE_MESH_COST, TaskWork::SplineMesh(spawn))
    }

    pub fn procedural_mesh(spawn: ProceduralMeshSpawn) -> Self {
        Self::with_work(PROCEDURAL_MESH_COST, TaskWork::ProceduralMesh(spawn))
    }

    pub fn templated(spawn: TemplatedSpawn) -> Self {
        Self::with_work(TEMPLATED_COST, TaskWork::Templated(spawn))
    }

    pub fn vehicle(spawn: VehicleSpawn) -> Self {
        Self::with_work(VEHICLE_COST, TaskWork::Vehicle(spawn))
    }

    pub fn delete_objects(cell: BuildCell) -> Self {
        Self::with_work(DELETE_COST, TaskWork::DeleteObjects(DeleteObjects { cell }))
    }

    fn with_work(cost: u32, work: TaskWork) -> Self {
        Self { cost, attempts: 0, work }
    }

    /// Override the default complexity; fixed thereafter.
    pub fn with_complexity(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }

    pub fn complexity(&self) -> u32 {
        self.cost
    }

    pub fn kind(&self) -> &'static str {
        match self.work {
            TaskWork::StaticMesh(_) => "static-mesh",
            TaskWork::SplineMesh(_) => "spline-mesh",
            TaskWork::ProceduralMesh(_) => "procedural-mesh",
            TaskWork::Templated(_) => "templated",
            TaskWork::Vehicle(_) => "vehicle",
            TaskWork::DeleteObjects(_) => "delete-objects",
        }
    }

    /// Perform (part of) the work. `true` means finished, remove the task;
    /// `false` means leave it at the queue front and retry on a later call.
    /// Failures never propagate past this boundary.
    pub fn execute(&mut self, world: &mut World) -> bool {
        let step = match &mut self.work {
            TaskWork::StaticMesh(s) => s.step(world),
            TaskWork::SplineMesh(s) => s.step(world),
            TaskWork::ProceduralMesh(s) => s.step(world),
            TaskWork::Templated(s) => s.step(world),
            TaskWork::Vehicle(s) => s.step(world),
            TaskWork::DeleteObjects(s) => s.step(world),
        };
        match step {
            Step::Done => true,
            Step::Again => false,
            Step::Refused => {
                self.attempts += 1;
                if self.attempts >= MAX_SPAWN_ATTEMPTS {
                    warn!(
                        "{} task dropped after {} refused spawn attempts",
                        self.kind(),
                        self.attempts
                    );
                    true
                } else {
                    false
                }
            }
        }
    }
}

// ---------- create: static mesh ----------

/// Spawn one fixed mesh object at a transform and record it in the cell.
pub struct StaticMeshSpawn {
    pub mesh: Handle<Mesh>,
    pub material: Handle<StandardMaterial>,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub collision: CollisionProfile,
    pub cell: BuildCell,
}

impl StaticMeshSpawn {
    fn step(&mut self, world: &mut World) -> Step {
        if !world_has_capacity(world) {
            return Step::Refused;
        }
        let entity = world
            .spawn((
                StaticScenery,
                Mesh3d(self.mesh.clone()),
                MeshMaterial3d(self.material.clone()),
                Transform {
                    translation: self.position,
                    rotation: self.rotation,
                    scale: self.scale,
                },
                GlobalTransform::IDENTITY,
                Visibility::Visible,
                InheritedVisibility::VISIBLE,
                ViewVisibility::default(),
                self.collision,
            ))
            .id();
        self.cell.record(entity);
        note_spawned(world);
        Step::Done
    }
}

// ---------- create: spline mesh ----------

/// Spawn a run of segment meshes along a sequence of control points, one
/// segment per consecutive pair. Every segment carries the collision
/// profile; the root is revealed only once all segments exist.
pub struct SplineMeshSpawn {
    pub mesh: Handle<Mesh>,
    pub material: Handle<StandardMaterial>,
    pub origin: Vec3,
    /// World-space control points.
    pub points: Vec<Vec3>,
    pub scale: Vec3,
    pub collision: CollisionProfile,
    pub cell: BuildCell,
}

impl SplineMeshSpawn {
    fn step(&mut self, world: &mut World) -> Step {
        if !world_has_capacity(world) {
            return Step::Refused;
        }
        let root = world
            .spawn((
                SplineScenery,
                Transform::from_translation(self.origin),
                GlobalTransform::IDENTITY,
                Visibility::Hidden,
                InheritedVisibility::default(),
                ViewVisibility::default(),
                self.collision,
            ))
            .id();

        for pair in self.points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let run = b - a;
            let length = run.length();
            if length <= f32::EPSILON {
                continue;
            }
            let midpoint = (a + b) * 0.5 - self.origin;
            let rotation = Quat::from_rotation_arc(Vec3::Z, run / length);
            world.spawn((
                SplineSegment,
                Mesh3d(self.mesh.clone()),
                MeshMaterial3d(self.material.clone()),
                Transform {
                    translation: midpoint,
                    rotation,
                    scale: Vec3::new(self.scale.x, self.scale.y, self.scale.z * length),
                },
                GlobalTransform::IDENTITY,
                Visibility::Inherited,
                InheritedVisibility::default(),
                ViewVisibility::default(),
                self.collision,
                ChildOf(root),
            ));
        }

        // finalize registration: reveal the whole run at once
        if let Some(mut vis) = world.get_mut::<Visibility>(root) {
            *vis = Visibility::Visible;
        }
        self.cell.record(root);
        note_spawned(world);
        Step::Done
    }
}

// ---------- create: procedural mesh (two-phase) ----------

/// Phase one spawns the empty container and reports not-done; a later call
/// assembles the geometry buffers into a mesh on the already-spawned
/// container. Splits the two expensive halves across ticks.
pub struct ProceduralMeshSpawn {
    pub geometry: MeshGeometry,
    pub material: Handle<StandardMaterial>,
    pub position: Vec3,
    pub collision: CollisionProfile,
    pub cell: BuildCell,
    container: Option<Entity>,
}

impl ProceduralMeshSpawn {
    pub fn new(
        geometry: MeshGeometry,
        material: Handle<StandardMaterial>,
        position: Vec3,
        collision: CollisionProfile,
        cell: BuildCell,
    ) -> Self {
        Self { geometry, material, position, collision, cell, container: None }
    }

    fn step(&mut self, world: &mut World) -> Step {
        match self.container {
            None => {
                if !world_has_capacity(world) {
                    return Step::Refused;
                }
                let entity = world
                    .spawn((
                        ProceduralScenery,
                        Transform::from_translation(self.position),
                        GlobalTransform::IDENTITY,
                        Visibility::Visible,
                        InheritedVisibility::VISIBLE,
                        ViewVisibility::default(),
                        self.collision,
                    ))
                    .id();
                self.cell.record(entity);
                note_spawned(world);
                self.container = Some(entity);
                Step::Again
            }
            Some(container) => {
                let handle = {
                    let Some(mut meshes) = world.get_resource_mut::<Assets<Mesh>>() else {
                        warn!("procedural-mesh task finished without a mesh store; container left empty");
                        return Step::Done;
                    };
                    meshes.add(self.geometry.build_mesh())
                };
                if let Ok(mut entity) = world.get_entity_mut(container) {
                    entity.insert((Mesh3d(handle), MeshMaterial3d(self.material.clone())));
                }
                Step::Done
            }
        }
    }
}

// ---------- create: templated object ----------

/// Instantiate a named prototype at a transform, wiring a back-reference to
/// the generator that asked for it.
pub struct TemplatedSpawn {
    pub template: TemplateId,
    pub position: Vec3,
    pub rotation: Quat,
    pub generator: Entity,
    pub cell: BuildCell,
}

impl TemplatedSpawn {
    fn step(&mut self, world: &mut World) -> Step {
        let Some(registry) = world.get_resource::<TemplateRegistry>() else {
            return Step::Refused;
        };
        let Some(def) = registry.get(self.template) else {
            // a template that does not exist never will; consume instead of
            // retrying forever
            warn!("templated task dropped: unknown template id {:?}", self.template);
            return Step::Done;
        };
        let (mesh, material, scale) = (def.mesh.clone(), def.material.clone(), def.scale);

        if !world_has_capacity(world) {
            return Step::Refused;
        }
        let entity = world
            .spawn((
                TemplatedScenery,
                SpawnedBy(self.generator),
                Mesh3d(mesh),
                MeshMaterial3d(material),
                Transform {
                    translation: self.position,
                    rotation: self.rotation,
                    scale,
                },
                GlobalTransform::IDENTITY,
                Visibility::Visible,
                InheritedVisibility::VISIBLE,
                ViewVisibility::default(),
            ))
            .id();
        self.cell.record(entity);
        note_spawned(world);
        Step::Done
    }
}

// ---------- create: managed vehicle ----------

/// Resolve the weak model reference and, if it is still alive, spawn a
/// vehicle bound to it, pushing the craft's cruise speed back into the
/// model. One attempt only: an expired model or a refused spawn both
/// consume the task.
pub struct VehicleSpawn {
    pub model: Weak<VehicleModel>,
    pub template: TemplateId,
    pub position: Vec3,
    /// Travel direction; the craft faces along it.
    pub tangent: Vec3,
}

impl VehicleSpawn {
    fn step(&mut self, world: &mut World) -> Step {
        let Some(model) = self.model.upgrade() else {
            debug!("vehicle model expired before its craft spawned");
            return Step::Done;
        };
        let Some(registry) = world.get_resource::<TemplateRegistry>() else {
            return Step::Done;
        };
        let Some(def) = registry.get(self.template) else {
            warn!("vehicle task dropped: unknown template id {:?}", self.template);
            return Step::Done;
        };
        let (mesh, material, scale, cruise) =
            (def.mesh.clone(), def.material.clone(), def.scale, def.cruise_speed);

        if !world_has_capacity(world) {
            return Step::Done;
        }
        world.spawn((
            VehicleCraft,
            VehicleLink { model: self.model.clone() },
            VehicleMotion { speed: cruise },
            Mesh3d(mesh),
            MeshMaterial3d(material),
            Transform::from_translation(self.position)
                .looking_to(self.tangent, Vec3::Y)
                .with_scale(scale),
            GlobalTransform::IDENTITY,
            Visibility::Visible,
            InheritedVisibility::VISIBLE,
            ViewVisibility::default(),
        ));
        model.set_speed(cruise);
        note_spawned(world);
        Step::Done
    }
}

// ---------- delete objects ----------

/// Destroy everything the cell has recorded, then leave it empty. A second
/// delete on the same cell is a no-op.
struct DeleteObjects {
    cell: BuildCell,
}

impl DeleteObjects {
    fn step(&mut self, world: &mut World) -> Step {
        let mut destroyed = 0usize;
        for entity in self.cell.take() {
            if let Ok(entity) = world.get_entity_mut(entity) {
                entity.despawn();
                destroyed += 1;
            }
        }
        note_destroyed(world, destroyed);
        Step::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spawner::core::{SceneryCensus, SceneryLimits};
    use crate::templates::{TemplateDef, TemplateRegistry};
    use std::sync::Arc;

    fn test_world() -> World {
        let mut world = World::new();
        world.insert_resource(Assets::<Mesh>::default());
        world.insert_resource(SceneryCensus::default());
        world.insert_resource(SceneryLimits::default());
        world
    }

    fn registry_with(name: &str, cruise_speed: f32) -> TemplateRegistry {
        TemplateRegistry::from_defs(vec![TemplateDef {
            name: name.to_string(),
            mesh: Handle::default(),
            material: Handle::default(),
            scale: Vec3::ONE,
            cruise_speed,
        }])
    }

    fn static_task(cell: &BuildCell, x: f32) -> SpawnTask {
        SpawnTask::static_mesh(StaticMeshSpawn {
            mesh: Handle::default(),
            material: Handle::default(),
            position: Vec3::new(x, 0.0, 0.0),
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            collision: CollisionProfile::BlockAllDynamic,
            cell: cell.clone(),
        })
    }

    #[test]
    fn static_mesh_spawns_and_records_once() {
        let mut world = test_world();
        let cell = BuildCell::new();
        let mut task = static_task(&cell, 3.0);
        assert!(task.execute(&mut world));
        assert_eq!(cell.len(), 1);
        let entity = cell.handles()[0];
        let tf = world.get::<Transform>(entity).unwrap();
        assert_eq!(tf.translation.x, 3.0);
        assert!(world.get::<StaticScenery>(entity).is_some());
        assert_eq!(world.resource::<SceneryCensus>().live, 1);
    }

    #[test]
    fn refused_spawn_retries_then_drops() {
        let mut world = test_world();
        world.insert_resource(SceneryLimits { max_live_objects: 0 });
        let cell = BuildCell::new();
        let mut task = static_task(&cell, 0.0);
        for _ in 0..MAX_SPAWN_ATTEMPTS - 1 {
            assert!(!task.execute(&mut world));
        }
        // final attempt consumes the task without creating anything
        assert!(task.execute(&mut world));
        assert!(cell.is_empty());
        assert_eq!(world.resource::<SceneryCensus>().live, 0);
    }

    #[test]
    fn spline_spawns_segments_with_collision() {
        let mut world = test_world();
        let cell = BuildCell::new();
        let points = vec![Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 10.0)];
        let mut task = SpawnTask::spline_mesh(SplineMeshSpawn {
            mesh: Handle::default(),
            material: Handle::default(),
            origin: Vec3::ZERO,
            points,
            scale: Vec3::ONE,
            collision: CollisionProfile::NoCollision,
            cell: cell.clone(),
        });
        assert!(task.execute(&mut world));
        assert_eq!(cell.len(), 1);
        let root = cell.handles()[0];
        assert_eq!(*world.get::<Visibility>(root).unwrap(), Visibility::Visible);

        let mut segments = world.query::<(&SplineSegment, &CollisionProfile, &ChildOf)>();
        let found: Vec<_> = segments.iter(&world).collect();
        assert_eq!(found.len(), 2);
        for (_, collision, parent) in found {
            assert_eq!(*collision, CollisionProfile::NoCollision);
            assert_eq!(parent.parent(), root);
        }
        // one root recorded, not one per segment
        assert_eq!(world.resource::<SceneryCensus>().live, 1);
    }

    #[test]
    fn procedural_spawns_container_then_attaches_mesh() {
        let mut world = test_world();
        let cell = BuildCell::new();
        let geometry = MeshGeometry {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
            normals: vec![[0.0, 1.0, 0.0]; 3],
            uvs: vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]],
            indices: vec![0, 2, 1],
        };
        let mut task = SpawnTask::procedural_mesh(ProceduralMeshSpawn::new(
            geometry,
            Handle::default(),
            Vec3::ZERO,
            CollisionProfile::NoCollision,
            cell.clone(),
        ));

        // phase one: container exists and is recorded, task not finished
        assert!(!task.execute(&mut world));
        assert_eq!(cell.len(), 1);
        let container = cell.handles()[0];
        assert!(world.get::<Mesh3d>(container).is_none());

        // phase two: geometry lands on the same container
        assert!(task.execute(&mut world));
        assert!(world.get::<Mesh3d>(container).is_some());
        assert_eq!(cell.len(), 1);
    }

    #[test]
    fn templated_wires_back_reference() {
        let mut world = test_world();
        world.insert_resource(registry_with("lamp", 0.0));
        let generator = world.spawn_empty().id();
        let cell = BuildCell::new();
        let template = world.resource::<TemplateRegistry>().index_of("lamp").unwrap();
        let mut task = SpawnTask::templated(TemplatedSpawn {
            template,
            position: Vec3::new(1.0, 0.0, 2.0),
            rotation: Quat::IDENTITY,
            generator,
            cell: cell.clone(),
        });
        assert!(task.execute(&mut world));
        let entity = cell.handles()[0];
        assert_eq!(world.get::<SpawnedBy>(entity).unwrap().0, generator);
    }

    #[test]
    fn templated_unknown_template_is_consumed() {
        let mut world = test_world();
        world.insert_resource(registry_with("lamp", 0.0));
        let generator = world.spawn_empty().id();
        let cell = BuildCell::new();
        let mut task = SpawnTask::templated(TemplatedSpawn {
            template: TemplateId(99),
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            generator,
            cell: cell.clone(),
        });
        assert!(task.execute(&mut world));
        assert!(cell.is_empty());
        assert_eq!(world.resource::<SceneryCensus>().live, 0);
    }

    #[test]
    fn vehicle_expired_model_is_consumed_without_side_effects() {
        let mut world = test_world();
        world.insert_resource(registry_with("craft", 9.0));
        let template = world.resource::<TemplateRegistry>().index_of("craft").unwrap();
        let weak = {
            let model = Arc::new(VehicleModel::new(Vec3::ZERO, Vec3::Z));
            Arc::downgrade(&model)
            // model dropped here
        };
        let mut task = SpawnTask::vehicle(VehicleSpawn {
            model: weak,
            template,
            position: Vec3::ZERO,
            tangent: Vec3::Z,
        });
        assert!(task.execute(&mut world));
        assert_eq!(world.resource::<SceneryCensus>().live, 0);
        let mut crafts = world.query::<&VehicleCraft>();
        assert_eq!(crafts.iter(&world).count(), 0);
    }

    #[test]
    fn vehicle_alive_model_receives_craft_speed() {
        let mut world = test_world();
        world.insert_resource(registry_with("craft", 12.5));
        let template = world.resource::<TemplateRegistry>().index_of("craft").unwrap();
        let model = Arc::new(VehicleModel::new(Vec3::ZERO, Vec3::Z));
        let mut task = SpawnTask::vehicle(VehicleSpawn {
            model: Arc::downgrade(&model),
            template,
            position: Vec3::new(0.0, 1.0, 0.0),
            tangent: Vec3::X,
        });
        assert!(task.execute(&mut world));
        assert_eq!(model.speed(), 12.5);
        let mut crafts = world.query::<(&VehicleCraft, &VehicleMotion)>();
        let motions: Vec<_> = crafts.iter(&world).collect();
        assert_eq!(motions.len(), 1);
        assert_eq!(motions[0].1.speed, 12.5);
        assert_eq!(world.resource::<SceneryCensus>().live, 1);
    }

    #[test]
    fn delete_on_empty_cell_is_a_noop() {
        let mut world = test_world();
        let cell = BuildCell::new();
        let mut task = SpawnTask::delete_objects(cell.clone());
        assert!(task.execute(&mut world));
        assert!(cell.is_empty());
    }

    #[test]
    fn delete_despawns_everything_recorded() {
        let mut world = test_world();
        let cell = BuildCell::new();
        for x in 0..3 {
            assert!(static_task(&cell, x as f32).execute(&mut world));
        }
        assert_eq!(world.resource::<SceneryCensus>().live, 3);
        let handles = cell.handles();

        let mut task = SpawnTask::delete_objects(cell.clone());
        assert!(task.execute(&mut world));
        assert!(cell.is_empty());
        assert_eq!(world.resource::<SceneryCensus>().live, 0);
        for entity in handles {
            assert!(world.get_entity(entity).is_err());
        }
    }
}

pub mod core;
pub mod plugin;
pub mod queue;
pub mod scheduler;
pub mod task;

pub use self::core::{BuildCell, CollisionProfile, MeshGeometry, SceneryCensus, SceneryLimits};
pub use plugin::{SpawnerPlugin, SpawnerSettings};
pub use queue::SpawnTaskQueue;
pub use scheduler::{drain_spawn_tasks, run_spawn_tick, TickStats};
pub use task::{
    ProceduralMeshSpawn, SpawnTask, SplineMeshSpawn, StaticMeshSpawn, TemplatedSpawn, VehicleSpawn,
};

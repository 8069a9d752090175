// src/gen/layout.rs
//! Deterministic district layout, run on the async compute pool. Builds
//! fully-resolved spawn tasks and submits them straight into the shared
//! queue; the scheduler spreads the actual spawning over later frames.

use bevy::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::districts::DistrictCoord;
use super::GenPalette;
use crate::spawner::core::{CollisionProfile, MeshGeometry};
use crate::spawner::task::{
    ProceduralMeshSpawn, SpawnTask, SplineMeshSpawn, StaticMeshSpawn, TemplatedSpawn,
};
use crate::spawner::{BuildCell, SpawnTaskQueue};
use crate::templates::TemplateId;

const BLOCK_CELL: f32 = 12.0;
const EDGE_MARGIN: f32 = 6.0;
const PLAZA_HALF: f32 = 9.0;

/// Everything a layout worker needs, snapshotted on the main thread.
pub struct DistrictLayout {
    pub coord: DistrictCoord,
    pub min: Vec2,
    pub max: Vec2,
    pub seed: u64,
    pub palette: GenPalette,
    pub lamp: Option<TemplateId>,
    pub anchor: Entity,
    pub cell: BuildCell,
    pub queue: SpawnTaskQueue,
}

pub struct GenSummary {
    pub buildings: u32,
    pub fixtures: u32,
    pub road_points: u32,
}

/// Must be deterministic for identical inputs: same seed, same district,
/// same task stream.
pub fn lay_out_district(ctx: DistrictLayout) -> GenSummary {
    let mut rng = ChaCha8Rng::seed_from_u64(ctx.seed);
    let center = (ctx.min + ctx.max) * 0.5;
    let mut summary = GenSummary { buildings: 0, fixtures: 0, road_points: 0 };

    // ---- buildings: jittered grid, keeping clear of the plaza ----
    let span = ctx.max - ctx.min - Vec2::splat(2.0 * EDGE_MARGIN);
    let nx = (span.x / BLOCK_CELL).floor().max(1.0) as i32;
    let nz = (span.y / BLOCK_CELL).floor().max(1.0) as i32;

    for j in 0..nz {
        for i in 0..nx {
            let bx = ctx.min.x + EDGE_MARGIN + (i as f32 + 0.5) * BLOCK_CELL;
            let bz = ctx.min.y + EDGE_MARGIN + (j as f32 + 0.5) * BLOCK_CELL;
            let jx = (rng.random::<f32>() - 0.5) * 4.0;
            let jz = (rng.random::<f32>() - 0.5) * 4.0;
            let (bx, bz) = (bx + jx, bz + jz);

            if Vec2::new(bx, bz).distance(center) < PLAZA_HALF + 4.0 {
                continue;
            }

            let width = rng.random_range(4.0..8.0f32);
            let depth = rng.random_range(4.0..8.0f32);
            let height = rng.random_range(6.0..28.0f32);
            let facade = rng.random_range(0..ctx.palette.building_materials.len());
            let yaw = rng.random_range(0.0..std::f32::consts::TAU);

            ctx.queue.submit(SpawnTask::static_mesh(StaticMeshSpawn {
                mesh: ctx.palette.building_mesh.clone(),
                material: ctx.palette.building_materials[facade].clone(),
                position: Vec3::new(bx, height * 0.5, bz),
                rotation: Quat::from_rotation_y(yaw),
                scale: Vec3::new(width, height, depth),
                collision: CollisionProfile::BlockAllDynamic,
                cell: ctx.cell.clone(),
            }));
            summary.buildings += 1;
        }
    }

    // ---- road: spline run along the south edge ----
    let road_z = ctx.min.y + 3.0;
    let mut points = Vec::new();
    let mut x = ctx.min.x;
    while x <= ctx.max.x {
        let wobble = (rng.random::<f32>() - 0.5) * 2.0;
        points.push(Vec3::new(x, 0.4, road_z + wobble));
        x += 16.0;
    }
    summary.road_points = points.len() as u32;
    if points.len() >= 2 {
        let origin = points[0];
        ctx.queue.submit(SpawnTask::spline_mesh(SplineMeshSpawn {
            mesh: ctx.palette.road_mesh.clone(),
            material: ctx.palette.road_material.clone(),
            origin,
            points,
            scale: Vec3::new(5.0, 0.3, 1.0),
            collision: CollisionProfile::BlockAllDynamic,
            cell: ctx.cell.clone(),
        }));
    }

    // ---- plaza: runtime-assembled slab in the middle ----
    ctx.queue.submit(SpawnTask::procedural_mesh(ProceduralMeshSpawn::new(
        plaza_geometry(&mut rng, PLAZA_HALF),
        ctx.palette.plaza_material.clone(),
        Vec3::new(center.x, 0.05, center.y),
        CollisionProfile::NoCollision,
        ctx.cell.clone(),
    )));

    // ---- fixtures: lamps on the plaza corners ----
    if let Some(lamp) = ctx.lamp {
        let inset = PLAZA_HALF + 1.5;
        for (sx, sz) in [(-1.0, -1.0), (-1.0, 1.0), (1.0, -1.0), (1.0, 1.0f32)] {
            ctx.queue.submit(SpawnTask::templated(TemplatedSpawn {
                template: lamp,
                position: Vec3::new(center.x + sx * inset, 2.5, center.y + sz * inset),
                rotation: Quat::IDENTITY,
                generator: ctx.anchor,
                cell: ctx.cell.clone(),
            }));
            summary.fixtures += 1;
        }
    }

    summary
}

/// Flat-ish plaza slab with a little height grain, normals up.
fn plaza_geometry(rng: &mut ChaCha8Rng, half: f32) -> MeshGeometry {
    const N: usize = 5;
    let mut geo = MeshGeometry::default();
    let step = (2.0 * half) / (N as f32 - 1.0);

    for j in 0..N {
        for i in 0..N {
            let x = -half + i as f32 * step;
            let z = -half + j as f32 * step;
            let edge = i == 0 || j == 0 || i == N - 1 || j == N - 1;
            let y = if edge { 0.0 } else { rng.random::<f32>() * 0.12 };
            geo.positions.push([x, y, z]);
            geo.normals.push([0.0, 1.0, 0.0]);
            geo.uvs.push([i as f32 / (N as f32 - 1.0), j as f32 / (N as f32 - 1.0)]);
        }
    }
    for j in 0..N - 1 {
        for i in 0..N - 1 {
            let i0 = (j * N + i) as u32;
            let i1 = (j * N + i + 1) as u32;
            let i2 = ((j + 1) * N + i) as u32;
            let i3 = ((j + 1) * N + i + 1) as u32;
            geo.indices.extend_from_slice(&[i0, i2, i1, i1, i2, i3]);
        }
    }
    geo
}

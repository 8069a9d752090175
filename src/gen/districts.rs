// src/gen/districts.rs
//! District streaming: figure out which districts the camera needs, lay out
//! the missing ones on worker threads, and retire the ones that fell out of
//! range by submitting a delete task for their cell.

use bevy::prelude::*;
use bevy::tasks::AsyncComputeTaskPool;
use futures_lite::future;
use std::collections::HashSet;

use super::layout::{lay_out_district, DistrictLayout};
use super::{DistrictMap, DistrictRecord, GenPalette, GenSettings};
use crate::setup::MainCamera;
use crate::spawner::{BuildCell, SpawnTask, SpawnTaskQueue};
use crate::templates::TemplateRegistry;

/// Integer district coordinate in XZ.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DistrictCoord {
    pub x: i32,
    pub z: i32,
}

impl DistrictCoord {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// World-space XZ bounds of this district.
    pub fn bounds(&self, district_size: f32) -> (Vec2, Vec2) {
        let min = Vec2::new(self.x as f32, self.z as f32) * district_size;
        (min, min + Vec2::splat(district_size))
    }
}

/// Square of districts around a world position.
pub fn needed_districts_around(pos: Vec3, settings: &GenSettings) -> HashSet<DistrictCoord> {
    let cx = (pos.x / settings.district_size).floor() as i32;
    let cz = (pos.z / settings.district_size).floor() as i32;
    let r = settings.stream_radius;
    let mut needed = HashSet::new();
    for dz in -r..=r {
        for dx in -r..=r {
            needed.insert(DistrictCoord::new(cx + dx, cz + dz));
        }
    }
    needed
}

/// Stable per-district seed.
fn district_seed(world_seed: u64, coord: DistrictCoord) -> u64 {
    world_seed
        ^ ((coord.x as u64) << 16)
        ^ ((coord.z as u64) << 32)
        ^ 0xC17E_60D5_2B11_9A3Fu64
}

/// Schedule: retire out-of-range districts, kick off layout for new ones.
pub fn stream_districts(
    mut commands: Commands,
    mut map: ResMut<DistrictMap>,
    settings: Res<GenSettings>,
    palette: Option<Res<GenPalette>>,
    registry: Option<Res<TemplateRegistry>>,
    queue: Res<SpawnTaskQueue>,
    cam_q: Query<&Transform, With<MainCamera>>,
) {
    // wait until both the palette and the template registry are realized
    let (Some(palette), Some(registry)) = (palette, registry) else {
        return;
    };
    let Ok(cam_tf) = cam_q.single() else { return };

    let needed = needed_districts_around(cam_tf.translation, &settings);

    // Retire districts that fell out of range. A district with a layout task
    // still running stays until the task finishes, so its cell cannot gain
    // entries after the delete task drains it.
    let stale: Vec<DistrictCoord> = map
        .districts
        .iter()
        .filter(|(coord, record)| !needed.contains(coord) && record.pending.is_none())
        .map(|(coord, _)| *coord)
        .collect();
    for coord in stale {
        if let Some(record) = map.districts.remove(&coord) {
            queue.submit(SpawnTask::delete_objects(record.cell));
            commands.entity(record.anchor).despawn();
            info!("District ({}, {}) retired", coord.x, coord.z);
        }
    }

    // Lay out districts that came into range
    let lamp = registry.index_of("street-lamp");
    let pool = AsyncComputeTaskPool::get();
    for coord in needed {
        if map.districts.contains_key(&coord) {
            continue;
        }
        let (min, max) = coord.bounds(settings.district_size);
        let center = (min + max) * 0.5;
        let anchor = commands
            .spawn((
                Name::new(format!("District ({}, {})", coord.x, coord.z)),
                Transform::from_xyz(center.x, 0.0, center.y),
                GlobalTransform::IDENTITY,
            ))
            .id();
        let cell = BuildCell::new();

        let ctx = DistrictLayout {
            coord,
            min,
            max,
            seed: district_seed(settings.world_seed, coord),
            palette: (*palette).clone(),
            lamp,
            anchor,
            cell: cell.clone(),
            queue: (*queue).clone(),
        };
        let task = pool.spawn(async move { lay_out_district(ctx) });
        map.districts.insert(coord, DistrictRecord { anchor, cell, pending: Some(task) });
    }
}

/// Collect finished layout reports (the spawn tasks themselves were already
/// submitted from the worker).
pub fn collect_layout_reports(mut map: ResMut<DistrictMap>) {
    for (coord, record) in map.districts.iter_mut() {
        let finished = record.pending.as_ref().is_some_and(|t| t.is_finished());
        if !finished {
            continue;
        }
        if let Some(task) = record.pending.take() {
            if let Some(summary) = future::block_on(future::poll_once(task)) {
                info!(
                    "District ({}, {}) laid out: {} buildings, {} fixtures, {} road points",
                    coord.x, coord.z, summary.buildings, summary.fixtures, summary.road_points
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needed_set_is_a_square_around_the_position() {
        let settings = GenSettings { world_seed: 0, district_size: 64.0, stream_radius: 1 };
        let needed = needed_districts_around(Vec3::new(10.0, 50.0, -10.0), &settings);
        assert_eq!(needed.len(), 9);
        assert!(needed.contains(&DistrictCoord::new(0, -1)));
        assert!(needed.contains(&DistrictCoord::new(-1, -1)));
        assert!(!needed.contains(&DistrictCoord::new(2, 0)));
    }

    #[test]
    fn district_seeds_differ_per_coord_and_world() {
        let a = district_seed(1, DistrictCoord::new(0, 0));
        let b = district_seed(1, DistrictCoord::new(1, 0));
        let c = district_seed(2, DistrictCoord::new(0, 0));
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, district_seed(1, DistrictCoord::new(0, 0)));
    }

    #[test]
    fn bounds_tile_without_gaps() {
        let size = 64.0;
        let (min_a, max_a) = DistrictCoord::new(0, 0).bounds(size);
        let (min_b, _) = DistrictCoord::new(1, 0).bounds(size);
        assert_eq!(max_a.x, min_b.x);
        assert_eq!(min_a, Vec2::ZERO);
    }
}

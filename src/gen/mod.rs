// src/gen/mod.rs
//! Producer side: districts stream in around the camera, each laid out on a
//! worker thread that submits spawn tasks as it goes.

use bevy::prelude::*;
use std::collections::HashMap;

use crate::spawner::BuildCell;

pub mod districts;
pub mod layout;

pub use districts::{needed_districts_around, DistrictCoord};
pub use layout::{lay_out_district, DistrictLayout, GenSummary};

/// World seed + streaming shape.
#[derive(Resource, Clone, Copy)]
pub struct GenSettings {
    pub world_seed: u64,
    /// Side length of one district, meters.
    pub district_size: f32,
    /// Districts kept laid out in each direction around the camera.
    pub stream_radius: i32,
}

impl Default for GenSettings {
    fn default() -> Self {
        Self { world_seed: 1337, district_size: 64.0, stream_radius: 1 }
    }
}

/// Pre-resolved handles the layout workers stamp onto tasks. Producers never
/// touch the asset stores; everything is resolved up front.
#[derive(Resource, Clone)]
pub struct GenPalette {
    pub building_mesh: Handle<Mesh>,
    pub building_materials: Vec<Handle<StandardMaterial>>,
    pub road_mesh: Handle<Mesh>,
    pub road_material: Handle<StandardMaterial>,
    pub plaza_material: Handle<StandardMaterial>,
}

/// One streamed-in district: its anchor entity, the cell collecting what its
/// tasks create, and the in-flight layout task if any.
pub struct DistrictRecord {
    pub anchor: Entity,
    pub cell: BuildCell,
    pub pending: Option<bevy::tasks::Task<GenSummary>>,
}

#[derive(Resource, Default)]
pub struct DistrictMap {
    pub districts: HashMap<DistrictCoord, DistrictRecord>,
}

pub struct GenPlugin;

impl Plugin for GenPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<GenSettings>()
            .init_resource::<DistrictMap>()
            .add_systems(Startup, build_palette)
            .add_systems(
                Update,
                (districts::stream_districts, districts::collect_layout_reports),
            );
    }
}

/// Startup: resolve the shared meshes/materials the workers will reference.
fn build_palette(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let facade = |r: f32, g: f32, b: f32| StandardMaterial {
        base_color: Color::linear_rgb(r, g, b),
        perceptual_roughness: 0.85,
        metallic: 0.0,
        ..default()
    };
    commands.insert_resource(GenPalette {
        building_mesh: meshes.add(Mesh::from(Cuboid::new(1.0, 1.0, 1.0))),
        building_materials: vec![
            materials.add(facade(0.55, 0.53, 0.5)),
            materials.add(facade(0.4, 0.45, 0.52)),
            materials.add(facade(0.62, 0.58, 0.45)),
            materials.add(facade(0.35, 0.37, 0.4)),
        ],
        road_mesh: meshes.add(Mesh::from(Cuboid::new(1.0, 1.0, 1.0))),
        road_material: materials.add(facade(0.18, 0.18, 0.2)),
        plaza_material: materials.add(facade(0.45, 0.42, 0.38)),
    });
}

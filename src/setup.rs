use bevy::pbr::MeshMaterial3d;
use bevy::prelude::*;

#[derive(Component)]
pub struct MainCamera;

pub fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    // 1) Light
    commands.spawn((
        DirectionalLight {
            illuminance: 9_000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(40.0, 80.0, 20.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    // 2) Ground slab the city sits on
    commands.spawn((
        Mesh3d(meshes.add(Plane3d::default().mesh().size(600.0, 600.0))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::linear_rgb(0.3, 0.33, 0.3),
            perceptual_roughness: 1.0,
            ..default()
        })),
        Transform::default(),
    ));

    // 3) Camera
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(-60.0, 90.0, 110.0).looking_at(Vec3::new(32.0, 0.0, 32.0), Vec3::Y),
        MainCamera,
    ));
}

// src/templates.rs
//! Data-driven named prototypes for templated spawns + loader.

use bevy::asset::{io::Reader, AssetLoader, LoadContext};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------- Public plugin to register asset+loader ----------

pub struct TemplatesPlugin;

impl Plugin for TemplatesPlugin {
    fn build(&self, app: &mut App) {
        app.init_asset::<TemplateManifest>()
            .register_asset_loader(TemplateManifestLoader)
            .init_resource::<TemplateSettings>()
            .init_resource::<TemplateManifestHandle>()
            .add_systems(Startup, load_manifest)
            .add_systems(Update, realize_templates);
    }
}

/// Where the manifest lives under `assets/`.
#[derive(Resource, Clone)]
pub struct TemplateSettings {
    pub manifest_path: String,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self { manifest_path: "city.templates.ron".to_string() }
    }
}

#[derive(Resource, Default)]
pub struct TemplateManifestHandle(pub Handle<TemplateManifest>);

// ---------- Shape defs (data form) ----------

/// Primitive shape a template renders as. Kept to parametric primitives so
/// the manifest stays self-contained.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub enum ShapeDef {
    Cuboid { x: f32, y: f32, z: f32 },
    Cylinder { radius: f32, height: f32 },
    Sphere { radius: f32 },
}

impl ShapeDef {
    fn build_mesh(self) -> Mesh {
        match self {
            ShapeDef::Cuboid { x, y, z } => Mesh::from(Cuboid::new(x, y, z)),
            ShapeDef::Cylinder { radius, height } => Mesh::from(Cylinder::new(radius, height)),
            ShapeDef::Sphere { radius } => Mesh::from(Sphere::new(radius)),
        }
    }
}

// ---------- Template definition (data form) ----------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TemplateManifestEntry {
    /// Unique human-readable name (used for lookup).
    pub name: String,

    /// Optional category hint (e.g., "fixture", "vehicle").
    #[serde(default)]
    pub category: Option<String>,

    pub shape: ShapeDef,

    /// Linear RGB base color.
    pub color: [f32; 3],

    #[serde(default = "default_scale")]
    pub scale: [f32; 3],

    /// Forward speed for vehicle templates; zero for fixtures.
    #[serde(default)]
    pub cruise_speed: f32,
}

fn default_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

// ---------- Manifest asset ----------

#[derive(Asset, TypePath, Clone)]
pub struct TemplateManifest {
    /// Ordered list; index in this vector is the `TemplateId.0`.
    pub entries: Vec<TemplateManifestEntry>,
    /// Name → index for quick lookups.
    pub name_to_index: HashMap<String, u32>,
}

/// Build the lookup table, rejecting duplicate names.
pub fn index_entries(
    entries: &[TemplateManifestEntry],
) -> Result<HashMap<String, u32>, TemplateManifestError> {
    let mut name_to_index = HashMap::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        if let Some(prev) = name_to_index.insert(entry.name.clone(), i as u32) {
            return Err(TemplateManifestError::DuplicateName {
                name: entry.name.clone(),
                first: prev,
                second: i as u32,
            });
        }
    }
    Ok(name_to_index)
}

// ---------- Asset loader for `.templates.ron` ----------

#[derive(Default)]
pub struct TemplateManifestLoader;

impl AssetLoader for TemplateManifestLoader {
    type Asset = TemplateManifest;
    type Settings = ();
    type Error = TemplateManifestError;

    fn extensions(&self) -> &[&str] {
        &["templates.ron"]
    }

    async fn load(
        &self,
        reader: &mut dyn Reader,
        _settings: &Self::Settings,
        _load_context: &mut LoadContext<'_>,
    ) -> Result<Self::Asset, Self::Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        let entries: Vec<TemplateManifestEntry> =
            ron::de::from_bytes(&bytes).map_err(|e| TemplateManifestError::Ron(e.to_string()))?;
        let name_to_index = index_entries(&entries)?;
        Ok(TemplateManifest { entries, name_to_index })
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TemplateManifestError {
    #[error("I/O while reading template manifest: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(String),
    #[error("Duplicate template name '{name}' (first idx {first}, second idx {second})")]
    DuplicateName { name: String, first: u32, second: u32 },
}

// ---------- Runtime registry ----------

/// Index of a template in the registry (stable during a session).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TemplateId(pub u32);

/// A realized template: mesh/material handles ready to stamp onto spawns.
#[derive(Clone)]
pub struct TemplateDef {
    pub name: String,
    pub mesh: Handle<Mesh>,
    pub material: Handle<StandardMaterial>,
    pub scale: Vec3,
    pub cruise_speed: f32,
}

#[derive(Resource)]
pub struct TemplateRegistry {
    defs: Vec<TemplateDef>,
    name_to_index: HashMap<String, u32>,
}

impl TemplateRegistry {
    pub fn from_defs(defs: Vec<TemplateDef>) -> Self {
        let name_to_index = defs
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name.clone(), i as u32))
            .collect();
        Self { defs, name_to_index }
    }

    pub fn index_of(&self, name: &str) -> Option<TemplateId> {
        self.name_to_index.get(name).map(|&i| TemplateId(i))
    }

    pub fn get(&self, id: TemplateId) -> Option<&TemplateDef> {
        self.defs.get(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

// ---------- Systems ----------

/// Startup: request loading the manifest, store the handle.
fn load_manifest(
    mut handle_res: ResMut<TemplateManifestHandle>,
    settings: Res<TemplateSettings>,
    assets: Res<AssetServer>,
) {
    let h: Handle<TemplateManifest> = assets.load(settings.manifest_path.as_str());
    handle_res.0 = h;
    info!("Templates: loading manifest from '{}'", settings.manifest_path);
}

/// Update: once the manifest is in, realize every entry into mesh/material
/// handles and publish the registry. Runs once.
fn realize_templates(
    mut commands: Commands,
    registry: Option<Res<TemplateRegistry>>,
    handle: Res<TemplateManifestHandle>,
    manifests: Res<Assets<TemplateManifest>>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    if registry.is_some() {
        return;
    }
    let Some(manifest) = manifests.get(&handle.0) else {
        return;
    };

    let defs = manifest
        .entries
        .iter()
        .map(|entry| {
            let [r, g, b] = entry.color;
            TemplateDef {
                name: entry.name.clone(),
                mesh: meshes.add(entry.shape.build_mesh()),
                material: materials.add(StandardMaterial {
                    base_color: Color::linear_rgb(r, g, b),
                    perceptual_roughness: 0.9,
                    metallic: 0.0,
                    ..default()
                }),
                scale: Vec3::from_array(entry.scale),
                cruise_speed: entry.cruise_speed,
            }
        })
        .collect();

    commands.insert_resource(TemplateRegistry::from_defs(defs));
    info!("Templates: registry ready with {} templates", manifest.entries.len());
}

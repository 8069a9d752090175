use bevy::prelude::*;

mod gen;
mod setup;
mod spawner;
mod templates;
mod vehicles;

use gen::GenPlugin;
use spawner::{SpawnerPlugin, SpawnerSettings};
use templates::TemplatesPlugin;
use vehicles::VehiclesPlugin;

fn main() {
    App::new()
        .add_plugins(DefaultPlugins)
        // spawn scheduler: queue + per-frame budgeted drain
        .add_plugins(SpawnerPlugin)
        // named prototypes loaded from assets/city.templates.ron
        .add_plugins(TemplatesPlugin)
        // traffic models + craft
        .add_plugins(VehiclesPlugin)
        // district streaming (the producers)
        .add_plugins(GenPlugin)
        // keep frames smooth even when a whole district lands in the queue
        .insert_resource(SpawnerSettings { complexity_budget: 8 })
        .add_systems(Startup, setup::setup)
        .run();
}

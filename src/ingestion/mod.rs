pub mod texture_loader;

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{AtlasError, Result};
use crate::types::{BuildingPlan, TextureLibrary};

pub use texture_loader::{TextureEntry, decode_texture, load_texture};

/// Result of the ingestion stage.
#[derive(Debug)]
pub struct SceneInput {
    pub library: TextureLibrary,
    pub buildings: Vec<BuildingPlan>,
}

#[derive(Debug, Deserialize)]
struct SceneFile {
    #[serde(default)]
    textures: Vec<TextureEntry>,
    buildings: Vec<BuildingPlan>,
}

/// Load a JSON scene: decode every texture and parse every building plan.
///
/// Texture paths resolve relative to the scene file. Unnamed buildings are
/// named `building_<index>`.
pub fn load_scene(path: &Path) -> Result<SceneInput> {
    if !path.exists() {
        return Err(AtlasError::Input(format!(
            "Scene file not found: {}",
            path.display()
        )));
    }

    let text = std::fs::read_to_string(path)?;
    let scene: SceneFile = serde_json::from_str(&text)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let textures = scene
        .textures
        .iter()
        .map(|entry| load_texture(entry, base_dir))
        .collect::<Result<Vec<_>>>()?;

    let mut buildings = scene.buildings;
    for (i, building) in buildings.iter_mut().enumerate() {
        if building.name.is_empty() {
            building.name = format!("building_{i}");
        }
        debug!(
            building = %building.name,
            volumes = building.volumes.len(),
            roof_surfaces = building.roof.len(),
            "Parsed building plan"
        );
    }

    info!(
        path = %path.display(),
        textures = textures.len(),
        buildings = buildings.len(),
        "Loaded scene"
    );

    Ok(SceneInput {
        library: TextureLibrary::new(textures),
        buildings,
    })
}

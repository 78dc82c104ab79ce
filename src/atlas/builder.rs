use serde::Serialize;
use tracing::info;

use crate::atlas::compositor::{Atlas, CompositeStats, composite};
use crate::atlas::layout::{LayoutPlan, plan_building};
use crate::atlas::packer::{PackResult, pack};
use crate::atlas::remap::remap;
use crate::atlas::texture_cache::SourceTextureCache;
use crate::config::AtlasConfig;
use crate::error::{AtlasError, Result};
use crate::types::{BuildingPlan, IndexedMesh, PackedRect};

/// Everything produced for one building.
#[derive(Debug, Clone)]
pub struct LodBuild {
    pub name: String,
    pub atlas: Atlas,
    pub mesh: IndexedMesh,
    pub layout: LayoutPlan,
    pub pack: PackResult,
    pub stats: CompositeStats,
}

/// Serializable per-building record for the run manifest.
#[derive(Debug, Clone, Serialize)]
pub struct BuildSummary {
    pub name: String,
    /// Stem of the `<stem>.glb` and atlas image written for this building.
    pub file_stem: String,
    pub atlas_width: u32,
    pub natural_width: u32,
    pub scale: f32,
    pub vertices: usize,
    pub triangles: usize,
    pub slots: Vec<PackedRect>,
    pub stats: CompositeStats,
}

impl LodBuild {
    pub fn summary(&self, file_stem: &str) -> BuildSummary {
        BuildSummary {
            name: self.name.clone(),
            file_stem: file_stem.to_string(),
            atlas_width: self.atlas.width,
            natural_width: self.pack.natural_width,
            scale: self.pack.scale,
            vertices: self.mesh.vertex_count(),
            triangles: self.mesh.triangle_count(),
            slots: self.pack.rects.clone(),
            stats: self.stats,
        }
    }
}

/// Plan and pack without touching pixels.
pub fn plan_lod(plan: &BuildingPlan, config: &AtlasConfig) -> (LayoutPlan, PackResult) {
    let layout = plan_building(plan, config.pixels_per_meter);
    let packed = pack(&layout.pack_inputs(), config.padding, config.max_dimension);
    (layout, packed)
}

/// Build the atlas and low-detail mesh of one building.
///
/// Runs synchronously: packing, then compositing, then UV remapping. The only
/// failures are a missing texture library and an unallocatable atlas; both
/// abandon this building only.
pub fn build_lod(plan: &BuildingPlan, cache: &SourceTextureCache<'_>, config: &AtlasConfig) -> Result<LodBuild> {
    let (layout, packed) = plan_lod(plan, config);

    if !layout.is_empty() && cache.is_empty() {
        return Err(AtlasError::NoSourceTextures {
            building: plan.name.clone(),
        });
    }

    let mut atlas = Atlas::allocate(packed.width, packed.scale)?;
    let stats = composite(&mut atlas, &packed, &layout, plan, cache, config);
    let mesh = remap(plan, &layout, &packed, atlas.width);

    info!(
        building = %plan.name,
        slots = layout.slot_count(),
        width = atlas.width,
        scale = atlas.scale,
        triangles = mesh.triangle_count(),
        "Built LOD atlas"
    );

    Ok(LodBuild {
        name: plan.name.clone(),
        atlas,
        mesh,
        layout,
        pack: packed,
        stats,
    })
}

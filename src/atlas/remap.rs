use glam::Vec2;
use tracing::warn;

use crate::atlas::layout::{FacadeSlot, LayoutPlan, RoofSlot};
use crate::atlas::packer::PackResult;
use crate::types::{BuildingPlan, IndexedMesh, Rect, RoofSurface, SubmeshKind, Volume};

/// Triangles of a facade quad: bottom-left, bottom-right, top-left, top-right.
const QUAD_INDICES: [u32; 6] = [0, 2, 1, 2, 3, 1];

/// Build the low-detail mesh with UVs normalized against `atlas_width`.
///
/// Emission order is underside caps (when requested), facade quads in slot
/// order, then roof surfaces. Each kind forms one submesh group.
pub fn remap(plan: &BuildingPlan, layout: &LayoutPlan, packed: &PackResult, atlas_width: u32) -> IndexedMesh {
    let mut mesh = IndexedMesh::default();
    let atlas_width = atlas_width.max(1) as f32;

    if plan.draw_underside {
        for volume in &plan.volumes {
            emit_underside(&mut mesh, plan, volume);
        }
    }

    for slot in &layout.facades {
        let Some(rect) = packed.get(&slot.key).map(|p| p.rect) else {
            continue;
        };
        emit_facade(&mut mesh, slot, &rect, atlas_width);
    }

    for surface in &plan.roof {
        let slot = layout.roofs.iter().find(|s| s.texture == surface.texture);
        let rect = slot.and_then(|s| packed.get(&s.key)).map(|p| p.rect);
        let (Some(slot), Some(rect)) = (slot, rect) else {
            continue;
        };
        emit_roof(&mut mesh, surface, slot, &rect, atlas_width);
    }

    mesh
}

/// Plan point to world position at height `y`.
fn world(p: Vec2, y: f32) -> [f32; 3] {
    [p.x, y, p.y]
}

fn emit_facade(mesh: &mut IndexedMesh, slot: &FacadeSlot, rect: &Rect, atlas_width: f32) {
    let bottom = slot.floor_base as f32 * slot.floor_height;
    let top = bottom + slot.floor_count as f32 * slot.floor_height;

    let positions = [
        world(slot.start, bottom),
        world(slot.end, bottom),
        world(slot.start, top),
        world(slot.end, top),
    ];

    let (u0, v0) = (rect.x / atlas_width, rect.y / atlas_width);
    let (u1, v1) = (rect.x_max() / atlas_width, rect.y_max() / atlas_width);
    let uvs = [[u0, v0], [u1, v0], [u0, v1], [u1, v1]];

    mesh.append(SubmeshKind::Facade, &positions, &uvs, &QUAD_INDICES);
}

fn emit_roof(mesh: &mut IndexedMesh, surface: &RoofSurface, slot: &RoofSlot, rect: &Rect, atlas_width: f32) {
    let count = surface.positions.len();
    if surface.uvs.len() != count {
        warn!(
            texture = surface.texture,
            positions = count,
            uvs = surface.uvs.len(),
            "Roof surface UV count mismatch, skipping"
        );
        return;
    }
    if surface.indices.iter().any(|&i| i as usize >= count) {
        warn!(texture = surface.texture, "Roof surface index out of range, skipping");
        return;
    }

    let extent = slot.extent();
    let origin = Vec2::new(rect.x, rect.y);
    let size = Vec2::new(rect.width, rect.height);

    let positions: Vec<[f32; 3]> = surface.positions.iter().map(|p| p.to_array()).collect();
    let uvs: Vec<[f32; 2]> = surface
        .uvs
        .iter()
        .map(|&uv| {
            let rel = uv - slot.uv_min;
            let t = Vec2::new(
                if extent.x > 0.0 { rel.x / extent.x } else { 0.0 },
                if extent.y > 0.0 { rel.y / extent.y } else { 0.0 },
            );
            ((origin + t * size) / atlas_width).to_array()
        })
        .collect();

    mesh.append(SubmeshKind::Roof, &positions, &uvs, &surface.indices);
}

/// Ground-level cap of `volume`, wound to face down, with zero UVs.
fn emit_underside(mesh: &mut IndexedMesh, plan: &BuildingPlan, volume: &Volume) {
    let Some(points) = volume
        .points
        .iter()
        .map(|&i| plan.points.get(i).copied())
        .collect::<Option<Vec<Vec2>>>()
    else {
        warn!(building = %plan.name, "Volume references unknown plan point, no underside");
        return;
    };
    if points.len() < 3 {
        return;
    }

    let flat: Vec<f64> = points
        .iter()
        .flat_map(|p| [p.x as f64, p.y as f64])
        .collect();
    let triangles = match earcutr::earcut(&flat, &[], 2) {
        Ok(t) if !t.is_empty() => t,
        Ok(_) => return,
        Err(e) => {
            warn!(building = %plan.name, error = ?e, "Underside triangulation failed");
            return;
        }
    };

    // Counter-clockwise in plan space faces down once mapped to (x, 0, y).
    let mut indices: Vec<u32> = Vec::with_capacity(triangles.len());
    for tri in triangles.chunks_exact(3) {
        let (a, b, c) = (points[tri[0]], points[tri[1]], points[tri[2]]);
        if (b - a).perp_dot(c - a) >= 0.0 {
            indices.extend([tri[0] as u32, tri[1] as u32, tri[2] as u32]);
        } else {
            indices.extend([tri[2] as u32, tri[1] as u32, tri[0] as u32]);
        }
    }

    let positions: Vec<[f32; 3]> = points.iter().map(|&p| world(p, 0.0)).collect();
    let uvs = vec![[0.0, 0.0]; positions.len()];

    mesh.append(SubmeshKind::Underside, &positions, &uvs, &indices);
}

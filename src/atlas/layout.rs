use glam::Vec2;
use tracing::debug;

use crate::atlas::packer::PackInput;
use crate::types::{BuildingPlan, SlotKey, StyleUnit};

/// Per-floor facade design lookup for one facade edge.
///
/// Style units are expanded to one entry per floor they span, then reversed:
/// units are authored top-down while floors count from the ground, so floor 0
/// resolves to the last configured unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FloorPattern {
    /// Style unit index per pattern floor, reversed.
    table: Vec<usize>,
    /// Facade design index per style unit.
    facades: Vec<usize>,
}

impl FloorPattern {
    pub fn from_units(units: &[StyleUnit]) -> Self {
        let mut table = Vec::new();
        for (unit_idx, unit) in units.iter().enumerate() {
            table.extend(std::iter::repeat_n(unit_idx, unit.floors as usize));
        }
        table.reverse();
        Self {
            table,
            facades: units.iter().map(|u| u.facade).collect(),
        }
    }

    /// Number of floors before the pattern repeats.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Style unit drawn on `floor` (0 = ground).
    pub fn unit_for_floor(&self, floor: u32) -> Option<usize> {
        if self.table.is_empty() {
            return None;
        }
        Some(self.table[floor as usize % self.table.len()])
    }

    /// Facade design drawn on `floor` (0 = ground).
    pub fn facade_for_floor(&self, floor: u32) -> Option<usize> {
        self.unit_for_floor(floor).map(|u| self.facades[u])
    }
}

/// The planned atlas region of one rendered facade edge.
#[derive(Debug, Clone)]
pub struct FacadeSlot {
    pub key: SlotKey,
    pub volume: usize,
    pub edge: usize,
    /// Edge endpoints on the plan, in metres.
    pub start: Vec2,
    pub end: Vec2,
    pub width_m: f32,
    /// Floors actually visible on this edge.
    pub floor_count: u32,
    /// Floors hidden by an adjoining taller volume.
    pub floor_base: u32,
    pub floor_height: f32,
    pub width_px: f32,
    pub height_px: f32,
    pub pattern: FloorPattern,
}

/// The planned atlas region of one distinct roof texture.
#[derive(Debug, Clone)]
pub struct RoofSlot {
    pub key: SlotKey,
    pub texture: usize,
    /// World UV bounds (metres) of every roof surface using this texture.
    pub uv_min: Vec2,
    pub uv_max: Vec2,
    pub width_px: f32,
    pub height_px: f32,
}

impl RoofSlot {
    pub fn extent(&self) -> Vec2 {
        (self.uv_max - self.uv_min).max(Vec2::ZERO)
    }
}

/// Facade slots followed by roof slots, in packing order.
#[derive(Debug, Clone, Default)]
pub struct LayoutPlan {
    pub facades: Vec<FacadeSlot>,
    pub roofs: Vec<RoofSlot>,
}

impl LayoutPlan {
    pub fn is_empty(&self) -> bool {
        self.facades.is_empty() && self.roofs.is_empty()
    }

    pub fn slot_count(&self) -> usize {
        self.facades.len() + self.roofs.len()
    }

    /// Rectangles for the packer: facades in plan order, then roofs.
    pub fn pack_inputs(&self) -> Vec<PackInput> {
        let facades = self.facades.iter().map(|s| PackInput {
            key: s.key,
            width: s.width_px,
            height: s.height_px,
        });
        let roofs = self.roofs.iter().map(|s| PackInput {
            key: s.key,
            width: s.width_px,
            height: s.height_px,
        });
        facades.chain(roofs).collect()
    }
}

/// Plan every facade and roof region of `plan`.
pub fn plan_building(plan: &BuildingPlan, pixels_per_meter: f32) -> LayoutPlan {
    let layout = LayoutPlan {
        facades: plan_facades(plan, pixels_per_meter),
        roofs: plan_roof(plan, pixels_per_meter),
    };
    debug!(
        building = %plan.name,
        facades = layout.facades.len(),
        roofs = layout.roofs.len(),
        "Planned atlas slots"
    );
    layout
}

/// One slot per rendered, visible facade edge, volumes and edges in order.
pub fn plan_facades(plan: &BuildingPlan, pixels_per_meter: f32) -> Vec<FacadeSlot> {
    let mut slots = Vec::new();

    for (v, volume) in plan.volumes.iter().enumerate() {
        for edge in 0..volume.points.len() {
            if !volume.renders_facade(edge) {
                continue;
            }
            let Some((start, end)) = plan.edge_points(volume, edge) else {
                continue;
            };

            let floor_base = volume.floor_base(edge);
            // Fully covered by a taller neighbour.
            if volume.floors as i64 - (floor_base as i64) < 1 {
                continue;
            }
            let floor_count = volume.floors - floor_base;

            let width_m = start.distance(end);
            let mut width_px = width_m * pixels_per_meter;
            let mut height_px = floor_count as f32 * plan.floor_height * pixels_per_meter;
            if !height_px.is_finite() || height_px < 0.0 || !width_px.is_finite() {
                width_px = 0.0;
                height_px = 0.0;
            }

            slots.push(FacadeSlot {
                key: SlotKey::Facade { volume: v, edge },
                volume: v,
                edge,
                start,
                end,
                width_m,
                floor_count,
                floor_base,
                floor_height: plan.floor_height,
                width_px,
                height_px,
                pattern: FloorPattern::from_units(volume.style_units(edge)),
            });
        }
    }

    slots
}

/// One slot per distinct roof texture, in first-encounter order.
pub fn plan_roof(plan: &BuildingPlan, pixels_per_meter: f32) -> Vec<RoofSlot> {
    let mut slots: Vec<RoofSlot> = Vec::new();

    for surface in &plan.roof {
        let idx = match slots.iter().position(|s| s.texture == surface.texture) {
            Some(i) => i,
            None => {
                slots.push(RoofSlot {
                    key: SlotKey::Roof {
                        texture: surface.texture,
                    },
                    texture: surface.texture,
                    uv_min: Vec2::splat(f32::INFINITY),
                    uv_max: Vec2::splat(f32::NEG_INFINITY),
                    width_px: 0.0,
                    height_px: 0.0,
                });
                slots.len() - 1
            }
        };
        let slot = &mut slots[idx];
        for uv in &surface.uvs {
            slot.uv_min = slot.uv_min.min(*uv);
            slot.uv_max = slot.uv_max.max(*uv);
        }
    }

    for slot in &mut slots {
        if !slot.uv_min.is_finite() || !slot.uv_max.is_finite() {
            slot.uv_min = Vec2::ZERO;
            slot.uv_max = Vec2::ZERO;
        }
        let size = slot.extent() * pixels_per_meter;
        slot.width_px = size.x.round();
        slot.height_px = size.y.round();
    }

    slots
}

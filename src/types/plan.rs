use std::collections::BTreeMap;

use glam::{Vec2, Vec3};
use serde::Deserialize;

/// Everything the atlas builder needs to know about one building.
///
/// Produced by the surrounding plan/style collaborators; this crate only reads it.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildingPlan {
    #[serde(default)]
    pub name: String,
    /// Footprint points shared between volumes, in metres.
    pub points: Vec<Vec2>,
    pub volumes: Vec<Volume>,
    /// Height of one floor in metres.
    pub floor_height: f32,
    #[serde(default)]
    pub facades: Vec<FacadeDesign>,
    #[serde(default)]
    pub bays: Vec<BayStyle>,
    #[serde(default)]
    pub roof: Vec<RoofSurface>,
    #[serde(default)]
    pub draw_underside: bool,
}

impl BuildingPlan {
    /// Start and end point of `edge` on `volume`, wrapping at the last point.
    pub fn edge_points(&self, volume: &Volume, edge: usize) -> Option<(Vec2, Vec2)> {
        let count = volume.points.len();
        if edge >= count {
            return None;
        }
        let a = *self.points.get(volume.points[edge])?;
        let b = *self.points.get(volume.points[(edge + 1) % count])?;
        Some((a, b))
    }
}

/// One extruded footprint of a building.
#[derive(Debug, Clone, Deserialize)]
pub struct Volume {
    /// Indices into `BuildingPlan::points`, in boundary order.
    pub points: Vec<usize>,
    /// Per-edge render flags. Missing entries render.
    #[serde(default)]
    pub render_facade: Vec<bool>,
    pub floors: u32,
    /// Per-edge count of floors already covered by an adjoining taller volume.
    #[serde(default)]
    pub floor_base: Vec<u32>,
    /// Style units applied to every edge without an override.
    #[serde(default)]
    pub styles: Vec<StyleUnit>,
    #[serde(default)]
    pub edge_styles: BTreeMap<usize, Vec<StyleUnit>>,
}

impl Volume {
    pub fn renders_facade(&self, edge: usize) -> bool {
        self.render_facade.get(edge).copied().unwrap_or(true)
    }

    pub fn floor_base(&self, edge: usize) -> u32 {
        self.floor_base.get(edge).copied().unwrap_or(0)
    }

    pub fn style_units(&self, edge: usize) -> &[StyleUnit] {
        self.edge_styles
            .get(&edge)
            .map(Vec::as_slice)
            .unwrap_or(&self.styles)
    }
}

/// A run of `floors` floors drawn with facade design `facade`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct StyleUnit {
    pub facade: usize,
    pub floors: u32,
}

/// A facade design: either a repeating bay pattern or one simple bay.
#[derive(Debug, Clone, Deserialize)]
pub struct FacadeDesign {
    #[serde(default = "default_true")]
    pub has_windows: bool,
    #[serde(default)]
    pub patterned: bool,
    /// Indices into `BuildingPlan::bays`.
    #[serde(default)]
    pub bay_pattern: Vec<usize>,
    pub simple_bay: BayStyle,
}

fn default_true() -> bool {
    true
}

/// Which texture of a bay a region samples from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BayFace {
    Wall,
    OpeningBack,
    Column,
    Row,
    Cross,
}

/// A texture reference plus the axis-swap flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct TextureRef {
    pub texture: usize,
    #[serde(default)]
    pub flipped: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct BayTextures {
    pub wall: TextureRef,
    #[serde(default)]
    pub opening: TextureRef,
    #[serde(default)]
    pub column: TextureRef,
    #[serde(default)]
    pub row: TextureRef,
    #[serde(default)]
    pub cross: TextureRef,
}

impl BayTextures {
    /// Same texture for every face.
    pub fn uniform(texture: usize) -> Self {
        let r = TextureRef {
            texture,
            flipped: false,
        };
        Self {
            wall: r,
            opening: r,
            column: r,
            row: r,
            cross: r,
        }
    }

    pub fn get(&self, face: BayFace) -> TextureRef {
        match face {
            BayFace::Wall => self.wall,
            BayFace::OpeningBack => self.opening,
            BayFace::Column => self.column,
            BayFace::Row => self.row,
            BayFace::Cross => self.cross,
        }
    }
}

/// One repeating facade module. Dimensions in metres.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BayStyle {
    pub opening_width: f32,
    pub opening_height: f32,
    pub spacing: f32,
    /// Share of the bay spacing placed left of the opening.
    #[serde(default = "half")]
    pub opening_width_ratio: f32,
    /// Share of the free floor height placed below the opening.
    #[serde(default = "half")]
    pub opening_height_ratio: f32,
    #[serde(default = "default_true")]
    pub is_opening: bool,
    pub textures: BayTextures,
}

fn half() -> f32 {
    0.5
}

impl BayStyle {
    /// A windowless bay that draws `texture` everywhere.
    pub fn plain(texture: usize) -> Self {
        Self {
            opening_width: 0.0,
            opening_height: 0.0,
            spacing: 0.0,
            opening_width_ratio: 0.5,
            opening_height_ratio: 0.5,
            is_opening: false,
            textures: BayTextures::uniform(texture),
        }
    }
}

/// Roof triangles produced by the roof collaborator, one texture per surface.
///
/// `uvs` are planar world coordinates in metres.
#[derive(Debug, Clone, Deserialize)]
pub struct RoofSurface {
    pub texture: usize,
    pub positions: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u32>,
}

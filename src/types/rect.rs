use serde::Serialize;

/// Axis-aligned rectangle in atlas pixel space (or UV space once normalized).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn x_max(&self) -> f32 {
        self.x + self.width
    }

    pub fn y_max(&self) -> f32 {
        self.y + self.height
    }

    /// Multiply position and size by `factor`.
    pub fn scaled(&self, factor: f32) -> Rect {
        Rect {
            x: self.x * factor,
            y: self.y * factor,
            width: self.width * factor,
            height: self.height * factor,
        }
    }

    /// Whether two rectangles share interior area. Touching edges do not overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.x_max()
            && other.x < self.x_max()
            && self.y < other.y_max()
            && other.y < self.y_max()
    }
}

/// Stable identity of one packed region.
///
/// Planner, packer, compositor and remapper all key their rectangles by this
/// instead of relying on matching loop order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlotKey {
    Facade { volume: usize, edge: usize },
    Roof { texture: usize },
}

/// A packed rectangle tagged with the slot it represents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PackedRect {
    pub key: SlotKey,
    /// Content rectangle (padding excluded).
    pub rect: Rect,
}

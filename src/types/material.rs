use glam::Vec2;
use image::{Rgba, RgbaImage};

/// Encoded image payload (PNG / WebP) ready to be embedded or written.
#[derive(Debug, Clone)]
pub struct TextureData {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
}

/// A named material texture as supplied by the resource collaborator.
///
/// `image` rows are stored bottom-up: row 0 is the side nearest the ground.
#[derive(Debug, Clone)]
pub struct TextureSource {
    pub name: String,
    pub image: RgbaImage,
    /// Tiled textures repeat at `unit_size` metres; others stretch to fit.
    pub tiled: bool,
    /// How often a stretched texture repeats across its region.
    pub tile_count: Vec2,
    /// Physical size of one tile in metres.
    pub unit_size: Vec2,
}

impl TextureSource {
    pub fn tiled(name: impl Into<String>, image: RgbaImage, unit_size: Vec2) -> Self {
        Self {
            name: name.into(),
            image,
            tiled: true,
            tile_count: Vec2::ONE,
            unit_size,
        }
    }

    pub fn stretched(name: impl Into<String>, image: RgbaImage, tile_count: Vec2) -> Self {
        Self {
            name: name.into(),
            image,
            tiled: false,
            tile_count,
            unit_size: Vec2::ONE,
        }
    }
}

/// The ordered texture list a building plan indexes into.
#[derive(Debug, Clone, Default)]
pub struct TextureLibrary {
    pub textures: Vec<TextureSource>,
}

impl TextureLibrary {
    pub fn new(textures: Vec<TextureSource>) -> Self {
        Self { textures }
    }

    pub fn get(&self, id: usize) -> Option<&TextureSource> {
        self.textures.get(id)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

/// A source texture prepared for one atlas scale.
///
/// Tiled sources are already resampled to their physical tile size in atlas
/// pixels; stretched sources keep their native resolution.
#[derive(Debug, Clone)]
pub struct SourceTexture {
    pub id: usize,
    pub pixels: RgbaImage,
    pub tiled: bool,
    pub tile_count: Vec2,
}

impl SourceTexture {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Size of one repeat in atlas pixels. Only meaningful for tiled sources.
    pub fn physical_tile_size(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Wrap the destination offset into the tile.
    pub fn sample_tiled(&self, px: u32, py: u32) -> Rgba<u8> {
        *self
            .pixels
            .get_pixel(px % self.width(), py % self.height())
    }

    /// Stretch-to-fit lookup, `stretch` = source size / destination size.
    pub fn sample_stretched(&self, px: u32, py: u32, stretch: Vec2) -> Rgba<u8> {
        let sx = (px as f32 * stretch.x * self.tile_count.x).round() as u32 % self.width();
        let sy = (py as f32 * stretch.y * self.tile_count.y).round() as u32 % self.height();
        *self.pixels.get_pixel(sx, sy)
    }
}

use std::path::{Path, PathBuf};

use glam::Vec2;
use image::RgbaImage;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{AtlasError, Result};
use crate::types::{TextureData, TextureSource};

/// One texture entry of a scene file.
#[derive(Debug, Clone, Deserialize)]
pub struct TextureEntry {
    pub name: String,
    /// Image file, relative to the scene file.
    pub path: PathBuf,
    #[serde(default)]
    pub tiled: bool,
    #[serde(default = "unit")]
    pub tile_count: Vec2,
    /// Physical tile size in metres (tiled textures).
    #[serde(default = "unit")]
    pub unit_size: Vec2,
    /// Pixel size of raw RGBA / RGB files.
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

fn unit() -> Vec2 {
    Vec2::ONE
}

/// Read and decode `entry`, stored bottom-up (row 0 = ground side).
pub fn load_texture(entry: &TextureEntry, base_dir: &Path) -> Result<TextureSource> {
    let path = base_dir.join(&entry.path);
    let data = std::fs::read(&path).map_err(|e| {
        AtlasError::Input(format!("Cannot read texture '{}' ({}): {e}", entry.name, path.display()))
    })?;

    let tex = TextureData {
        data,
        mime_type: "application/octet-stream".into(),
        width: entry.width.unwrap_or(0),
        height: entry.height.unwrap_or(0),
    };
    let image = decode_texture(&tex).ok_or_else(|| {
        AtlasError::Input(format!("Cannot decode texture '{}' ({})", entry.name, path.display()))
    })?;
    let image = image::imageops::flip_vertical(&image);

    debug!(
        name = %entry.name,
        width = image.width(),
        height = image.height(),
        tiled = entry.tiled,
        "Loaded texture"
    );

    Ok(TextureSource {
        name: entry.name.clone(),
        image,
        tiled: entry.tiled,
        tile_count: entry.tile_count,
        unit_size: entry.unit_size,
    })
}

/// Decode encoded image bytes, falling back to raw RGBA / RGB pixels.
pub fn decode_texture(tex: &TextureData) -> Option<RgbaImage> {
    if let Ok(img) = image::load_from_memory(&tex.data) {
        return Some(img.to_rgba8());
    }

    let pixel_count = tex.width as usize * tex.height as usize;
    if pixel_count == 0 {
        warn!(data_len = tex.data.len(), "Undecodable texture without raw dimensions");
        return None;
    }

    if tex.data.len() == pixel_count * 4 {
        return RgbaImage::from_raw(tex.width, tex.height, tex.data.clone());
    }

    if tex.data.len() == pixel_count * 3 {
        let mut rgba = Vec::with_capacity(pixel_count * 4);
        for chunk in tex.data.chunks_exact(3) {
            rgba.extend_from_slice(chunk);
            rgba.push(255);
        }
        return RgbaImage::from_raw(tex.width, tex.height, rgba);
    }

    warn!(
        width = tex.width,
        height = tex.height,
        data_len = tex.data.len(),
        "Cannot decode texture data"
    );
    None
}

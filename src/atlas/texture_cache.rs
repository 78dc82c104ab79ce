use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use image::RgbaImage;
use image::imageops::{self, FilterType};
use parking_lot::Mutex;
use tracing::debug;

use crate::types::{SourceTexture, TextureLibrary, TextureSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    id: usize,
    width: u32,
    height: u32,
}

type Slot = Arc<OnceLock<Arc<SourceTexture>>>;

/// Memoized, resampled source textures.
///
/// A tiled texture's prepared size depends on the atlas scale, so entries are
/// keyed by texture id and target size. The cache can be shared by parallel
/// building builds; each entry is computed at most once.
pub struct SourceTextureCache<'a> {
    library: &'a TextureLibrary,
    pixels_per_meter: f32,
    entries: Mutex<HashMap<CacheKey, Slot>>,
}

impl<'a> SourceTextureCache<'a> {
    pub fn new(library: &'a TextureLibrary, pixels_per_meter: f32) -> Self {
        Self {
            library,
            pixels_per_meter,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn library(&self) -> &'a TextureLibrary {
        self.library
    }

    pub fn is_empty(&self) -> bool {
        self.library.is_empty()
    }

    /// Number of prepared textures held.
    pub fn cached_count(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|slot| slot.get().is_some())
            .count()
    }

    /// Prepared texture `id` for an atlas drawn at `atlas_scale`.
    ///
    /// Returns `None` for ids outside the library.
    pub fn get(&self, id: usize, atlas_scale: f32) -> Option<Arc<SourceTexture>> {
        let source = self.library.get(id)?;
        let (width, height) = self.target_size(source, atlas_scale);
        let key = CacheKey { id, width, height };

        // Hold the map lock only long enough to fetch the slot.
        let slot = self.entries.lock().entry(key).or_default().clone();
        let prepared = slot.get_or_init(|| {
            debug!(id, name = %source.name, width, height, "Preparing source texture");
            Arc::new(SourceTexture {
                id,
                pixels: resample_nearest(&source.image, width, height),
                tiled: source.tiled,
                tile_count: source.tile_count,
            })
        });
        Some(Arc::clone(prepared))
    }

    /// Physical tile size in atlas pixels for tiled sources, native size otherwise.
    fn target_size(&self, source: &TextureSource, atlas_scale: f32) -> (u32, u32) {
        if !source.tiled {
            return source.image.dimensions();
        }
        let size = source.unit_size * self.pixels_per_meter * atlas_scale;
        (
            (size.x.round() as u32).max(1),
            (size.y.round() as u32).max(1),
        )
    }
}

/// Nearest-neighbour resample; keeps hard texel edges on repeating patterns.
pub fn resample_nearest(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let (width, height) = (width.max(1), height.max(1));
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    imageops::resize(image, width, height, FilterType::Nearest)
}

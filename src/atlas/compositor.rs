use glam::Vec2;
use image::{Rgba, RgbaImage};
use tracing::{debug, warn};

use crate::atlas::layout::{FacadeSlot, LayoutPlan, RoofSlot};
use crate::atlas::packer::PackResult;
use crate::atlas::texture_cache::{SourceTextureCache, resample_nearest};
use crate::config::AtlasConfig;
use crate::error::{AtlasError, Result};
use crate::types::{BayFace, BayStyle, BuildingPlan, FacadeDesign, Rect, TextureRef};

/// Upper bound on bays laid out across one floor.
const MAX_BAYS_PER_FLOOR: usize = 100;

/// The square RGBA pixel buffer every slot is drawn into.
///
/// Rows are bottom-up: row 0 holds the ground side of facades.
#[derive(Debug, Clone)]
pub struct Atlas {
    pub width: u32,
    pub image: RgbaImage,
    /// Factor applied to every packed rectangle (1.0 unless downscaled).
    pub scale: f32,
}

impl Atlas {
    /// Allocate a transparent `width` x `width` buffer.
    ///
    /// Fails with [`AtlasError::Allocation`] instead of aborting when the
    /// buffer cannot be reserved.
    pub fn allocate(width: u32, scale: f32) -> Result<Self> {
        let len = (width as usize)
            .checked_mul(width as usize)
            .and_then(|n| n.checked_mul(4))
            .ok_or(AtlasError::Allocation { width })?;

        let mut buf: Vec<u8> = Vec::new();
        buf.try_reserve_exact(len)
            .map_err(|_| AtlasError::Allocation { width })?;
        buf.resize(len, 0);

        let image = RgbaImage::from_raw(width, width, buf).ok_or(AtlasError::Allocation { width })?;
        Ok(Self {
            width,
            image,
            scale,
        })
    }

    /// The atlas in conventional top-down row order, for encoding.
    pub fn to_top_down(&self) -> RgbaImage {
        image::imageops::flip_vertical(&self.image)
    }
}

/// Counters gathered while compositing one building.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CompositeStats {
    /// Facade regions drawn (bay parts and blank walls).
    pub facade_draws: usize,
    /// Floors drawn as one plain wall.
    pub blank_walls: usize,
    pub bays: usize,
    pub roof_draws: usize,
    /// Roof textures skipped for a zero tiling extent.
    pub skipped_roofs: usize,
    /// Lookups of texture or design indices that do not exist.
    pub missing_textures: usize,
    /// Pixel reads or writes forced back into the buffer.
    pub clamped_writes: usize,
}

/// A facade sub-region in metres, relative to the slot origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub face: BayFace,
    pub texture: TextureRef,
}

/// Which region edges replicate outward.
#[derive(Debug, Clone, Copy, Default)]
struct Sides {
    left: bool,
    right: bool,
    bottom: bool,
    top: bool,
}

impl Sides {
    const ALL: Sides = Sides {
        left: true,
        right: true,
        bottom: true,
        top: true,
    };
}

/// Draw every facade slot and roof texture of `layout` into `atlas`.
pub fn composite(
    atlas: &mut Atlas,
    packed: &PackResult,
    layout: &LayoutPlan,
    plan: &BuildingPlan,
    cache: &SourceTextureCache<'_>,
    config: &AtlasConfig,
) -> CompositeStats {
    let mut painter = Painter {
        pixels_per_meter: config.pixels_per_meter,
        scale: atlas.scale,
        padding: (config.padding as f32 * atlas.scale).floor() as i64,
        assert_on_clamp: config.assert_on_clamp,
        atlas,
        cache,
        stats: CompositeStats::default(),
    };

    for slot in &layout.facades {
        match packed.get(&slot.key) {
            Some(p) => painter.draw_facade(plan, slot, &p.rect),
            None => warn!(key = ?slot.key, "Facade slot missing from packing"),
        }
    }

    for slot in &layout.roofs {
        match packed.get(&slot.key) {
            Some(p) => painter.draw_roof(slot, &p.rect),
            None => warn!(key = ?slot.key, "Roof slot missing from packing"),
        }
    }

    let stats = painter.stats;
    if stats.clamped_writes > 0 {
        warn!(
            building = %plan.name,
            clamped = stats.clamped_writes,
            "Pixel indices clamped into the atlas"
        );
    }
    if stats.missing_textures > 0 {
        warn!(
            building = %plan.name,
            missing = stats.missing_textures,
            "Regions referenced unknown textures or designs"
        );
    }
    debug!(building = %plan.name, ?stats, "Composited atlas");
    stats
}

/// Whether a floor of `facade` is drawn as one plain wall.
///
/// `bays` is the facade's resolved bay sequence (pattern or simple bay).
pub fn is_blank_wall(facade: &FacadeDesign, bays: &[BayStyle], facade_width: f32) -> bool {
    if !facade.has_windows {
        return true;
    }
    if facade.patterned {
        match bays.first() {
            None => true,
            Some(first) => first.opening_width > facade_width,
        }
    } else {
        let bay = &facade.simple_bay;
        bay.opening_width + bay.spacing > facade_width
    }
}

/// Number of bays that fit across `facade_width`, and the width they fill.
pub fn fit_bays(bays: &[BayStyle], facade_width: f32) -> (usize, f32) {
    let mut pattern_size = 0.0;
    let mut count = 0;
    if bays.is_empty() {
        return (0, 0.0);
    }
    while count < MAX_BAYS_PER_FLOOR {
        let bay = &bays[count % bays.len()];
        let addition = bay.opening_width + bay.spacing;
        if pattern_size + addition < facade_width {
            pattern_size += addition;
            count += 1;
        } else {
            break;
        }
    }
    (count, pattern_size)
}

/// Regions of one bay starting at `x`, plus the horizontal advance.
///
/// `extra_spacing` is this bay's share of the width left over after fitting.
pub fn bay_regions(
    bay: &BayStyle,
    x: f32,
    floor_y: f32,
    floor_height: f32,
    extra_spacing: f32,
) -> (Vec<Region>, f32) {
    let region = |x, y, width, height, face| Region {
        x,
        y,
        width,
        height,
        face,
        texture: bay.textures.get(face),
    };

    let spacing = bay.spacing + extra_spacing;
    let opening = bay.opening_width;

    if !bay.is_opening {
        let width = opening + spacing;
        return (
            vec![region(x, floor_y, width, floor_height, BayFace::Wall)],
            width,
        );
    }

    let left = spacing * bay.opening_width_ratio;
    let right = spacing - left;
    let row_bottom = (floor_height - bay.opening_height) * bay.opening_height_ratio;
    let row_top = floor_height - row_bottom - bay.opening_height;
    let opening_y = floor_y + row_bottom;
    let top_y = opening_y + bay.opening_height;
    let right_x = x + left + opening;

    let mut regions = vec![region(
        x + left,
        opening_y,
        opening,
        bay.opening_height,
        BayFace::OpeningBack,
    )];
    if left > 0.0 {
        regions.push(region(x, opening_y, left, bay.opening_height, BayFace::Column));
    }
    if right > 0.0 {
        regions.push(region(right_x, opening_y, right, bay.opening_height, BayFace::Column));
    }
    if row_bottom > 0.0 {
        regions.push(region(x + left, floor_y, opening, row_bottom, BayFace::Row));
    }
    if row_top > 0.0 {
        regions.push(region(x + left, top_y, opening, row_top, BayFace::Row));
    }
    if left > 0.0 {
        regions.push(region(x, floor_y, left, row_bottom, BayFace::Cross));
        regions.push(region(x, top_y, left, row_top, BayFace::Cross));
    }
    if right > 0.0 {
        regions.push(region(right_x, floor_y, right, row_bottom, BayFace::Cross));
        regions.push(region(right_x, top_y, right, row_top, BayFace::Cross));
    }

    (regions, left + opening + right)
}

struct Painter<'p, 'c> {
    atlas: &'p mut Atlas,
    cache: &'p SourceTextureCache<'c>,
    pixels_per_meter: f32,
    scale: f32,
    /// Bleed width in final atlas pixels.
    padding: i64,
    assert_on_clamp: bool,
    stats: CompositeStats,
}

impl Painter<'_, '_> {
    fn draw_facade(&mut self, plan: &BuildingPlan, slot: &FacadeSlot, packed: &Rect) {
        // Degenerate slots keep their metre sizes; only the pixel sizes are zeroed.
        if slot.width_px == 0.0 || slot.height_px == 0.0 {
            return;
        }
        for floor in 0..slot.floor_count {
            let floor_y = floor as f32 * slot.floor_height;

            let design = slot
                .pattern
                .facade_for_floor(floor)
                .and_then(|i| plan.facades.get(i))
                .or_else(|| plan.facades.first());
            let Some(design) = design else {
                self.stats.missing_textures += 1;
                continue;
            };

            let bays: Vec<BayStyle> = if design.patterned {
                design
                    .bay_pattern
                    .iter()
                    .filter_map(|&i| {
                        let bay = plan.bays.get(i).copied();
                        if bay.is_none() {
                            self.stats.missing_textures += 1;
                        }
                        bay
                    })
                    .collect()
            } else {
                vec![design.simple_bay]
            };

            let (count, pattern_size) = fit_bays(&bays, slot.width_m);
            if is_blank_wall(design, &bays, slot.width_m) || count == 0 {
                self.draw_blank_wall(design, slot, floor_y, packed);
                continue;
            }

            let extra = (slot.width_m - pattern_size) / count as f32;
            let mut x = 0.0;
            for c in 0..count {
                let bay = &bays[c % bays.len()];
                let (regions, advance) = bay_regions(bay, x, floor_y, slot.floor_height, extra);
                for region in &regions {
                    self.draw_region(region, packed);
                }
                self.stats.bays += 1;
                x += advance;
            }
        }
    }

    fn draw_blank_wall(&mut self, design: &FacadeDesign, slot: &FacadeSlot, floor_y: f32, packed: &Rect) {
        let region = Region {
            x: 0.0,
            y: floor_y,
            width: slot.width_m,
            height: slot.floor_height,
            face: BayFace::Wall,
            texture: design.simple_bay.textures.wall,
        };
        self.draw_region(&region, packed);
        self.stats.blank_walls += 1;
    }

    /// Paint one region of a facade slot, then bleed the slot-boundary edges.
    fn draw_region(&mut self, region: &Region, packed: &Rect) {
        if region.width <= 0.0 || region.height <= 0.0 {
            return;
        }
        let Some(source) = self.cache.get(region.texture.texture, self.scale) else {
            self.stats.missing_textures += 1;
            return;
        };

        let to_px = self.pixels_per_meter * self.scale;
        let mut paint_w = (region.width * to_px).round() as i64;
        let mut paint_h = (region.height * to_px).round() as i64;
        let stretch = if source.tiled {
            Vec2::splat(self.scale)
        } else {
            Vec2::new(
                source.width() as f32 / paint_w.max(1) as f32,
                source.height() as f32 / paint_h.max(1) as f32,
            )
        };
        let base_x = (region.x * to_px + packed.x).round() as i64;
        let base_y = (region.y * to_px + packed.y).round() as i64;

        // One extra pixel hides rounding seams between neighbouring regions.
        paint_w += 1;
        paint_h += 1;

        let flipped = region.texture.flipped;
        let (walk_w, walk_h) = if flipped {
            (paint_h, paint_w)
        } else {
            (paint_w, paint_h)
        };

        for px in 0..walk_w {
            for py in 0..walk_h {
                let colour = if source.tiled {
                    source.sample_tiled(px as u32, py as u32)
                } else {
                    source.sample_stretched(px as u32, py as u32, stretch)
                };
                let (dx, dy) = if flipped {
                    (base_x + py, base_y + px)
                } else {
                    (base_x + px, base_y + py)
                };
                self.put(dx, dy, colour);
            }
        }

        let sides = Sides {
            left: region.x == 0.0,
            right: (base_x + paint_w) as f32 > packed.x_max(),
            bottom: region.y == 0.0,
            top: (base_y + paint_h) as f32 > packed.y_max(),
        };
        self.bleed(base_x, base_y, paint_w, paint_h, sides);
        self.stats.facade_draws += 1;
    }

    /// Tile a roof texture across its packed rectangle and bleed all sides.
    fn draw_roof(&mut self, slot: &RoofSlot, packed: &Rect) {
        let Some(source) = self.cache.library().get(slot.texture) else {
            self.stats.missing_textures += 1;
            return;
        };

        let target_w = packed.width.round() as i64;
        let target_h = packed.height.round() as i64;
        let repeats = if source.tiled {
            slot.extent() / source.unit_size
        } else {
            source.tile_count
        };
        if !(repeats.x > 0.0 && repeats.y > 0.0 && repeats.is_finite()) {
            warn!(texture = %source.name, "Roof texture has no tiling extent, skipping");
            self.stats.skipped_roofs += 1;
            return;
        }

        let tile_w = (target_w as f32 / repeats.x).round() as u32;
        let tile_h = (target_h as f32 / repeats.y).round() as u32;
        if tile_w == 0 || tile_h == 0 {
            self.stats.skipped_roofs += 1;
            return;
        }
        let tile = resample_nearest(&source.image, tile_w, tile_h);

        let base_x = packed.x.floor() as i64;
        let base_y = packed.y.floor() as i64;
        for x in 0..target_w {
            for y in 0..target_h {
                let colour = *tile.get_pixel(x as u32 % tile_w, y as u32 % tile_h);
                self.put(base_x + x, base_y + y, colour);
            }
        }
        self.bleed(base_x, base_y, target_w, target_h, Sides::ALL);
        self.stats.roof_draws += 1;
    }

    /// Replicate the outermost written rows/columns outward by the padding.
    ///
    /// Bleed that would leave the atlas is dropped.
    fn bleed(&mut self, x0: i64, y0: i64, w: i64, h: i64, sides: Sides) {
        if w <= 0 || h <= 0 || self.padding <= 0 {
            return;
        }
        let pad = self.padding;
        let (x1, y1) = (x0 + w - 1, y0 + h - 1);

        for y in y0..=y1 {
            if sides.left {
                let c = self.get(x0, y);
                for p in 1..=pad {
                    self.put_bleed(x0 - p, y, c);
                }
            }
            if sides.right {
                let c = self.get(x1, y);
                for p in 1..=pad {
                    self.put_bleed(x1 + p, y, c);
                }
            }
        }

        // Columns include the side bleed so corners are filled too.
        let xs = if sides.left { x0 - pad } else { x0 }..=if sides.right { x1 + pad } else { x1 };
        for x in xs {
            if sides.bottom {
                if let Some(c) = self.peek(x, y0) {
                    for p in 1..=pad {
                        self.put_bleed(x, y0 - p, c);
                    }
                }
            }
            if sides.top {
                if let Some(c) = self.peek(x, y1) {
                    for p in 1..=pad {
                        self.put_bleed(x, y1 + p, c);
                    }
                }
            }
        }
    }

    fn clamp(&mut self, x: i64, y: i64) -> (u32, u32) {
        let max = self.atlas.width as i64 - 1;
        let cx = x.clamp(0, max);
        let cy = y.clamp(0, max);
        if (cx, cy) != (x, y) {
            self.stats.clamped_writes += 1;
            if self.assert_on_clamp {
                debug_assert!(
                    false,
                    "pixel ({x}, {y}) outside {0}x{0} atlas",
                    self.atlas.width
                );
            }
        }
        (cx as u32, cy as u32)
    }

    fn put(&mut self, x: i64, y: i64, colour: Rgba<u8>) {
        let (cx, cy) = self.clamp(x, y);
        self.atlas.image.put_pixel(cx, cy, colour);
    }

    fn get(&mut self, x: i64, y: i64) -> Rgba<u8> {
        let (cx, cy) = self.clamp(x, y);
        *self.atlas.image.get_pixel(cx, cy)
    }

    fn in_bounds(&self, x: i64, y: i64) -> bool {
        let w = self.atlas.width as i64;
        x >= 0 && y >= 0 && x < w && y < w
    }

    /// Read without clamping; bled corner columns may lie outside the atlas.
    fn peek(&self, x: i64, y: i64) -> Option<Rgba<u8>> {
        self.in_bounds(x, y)
            .then(|| *self.atlas.image.get_pixel(x as u32, y as u32))
    }

    fn put_bleed(&mut self, x: i64, y: i64, colour: Rgba<u8>) {
        if self.in_bounds(x, y) {
            self.atlas.image.put_pixel(x as u32, y as u32, colour);
        }
    }
}

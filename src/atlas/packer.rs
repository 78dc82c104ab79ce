use std::collections::HashMap;

use tracing::debug;

use crate::types::{PackedRect, Rect, SlotKey};

/// One rectangle to place, in unscaled atlas pixels.
#[derive(Debug, Clone, Copy)]
pub struct PackInput {
    pub key: SlotKey,
    pub width: f32,
    pub height: f32,
}

/// Result of packing one building's slots.
#[derive(Debug, Clone)]
pub struct PackResult {
    /// Content rectangles, same order as the input.
    pub rects: Vec<PackedRect>,
    /// Reserved padded footprints, same order as `rects`.
    pub footprints: Vec<Rect>,
    /// Final atlas edge length (power of two).
    pub width: u32,
    /// Edge length of the packing before normalization.
    pub natural_width: u32,
    /// Factor applied to every rectangle; 1.0 unless the natural size was too large.
    pub scale: f32,
    lookup: HashMap<SlotKey, usize>,
}

impl PackResult {
    pub fn get(&self, key: &SlotKey) -> Option<&PackedRect> {
        self.lookup.get(key).map(|&i| &self.rects[i])
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }
}

/// Placement inside the natural (unscaled) bin.
#[derive(Clone, Copy)]
struct Placement {
    x: u32,
    y: u32,
}

/// A horizontal row of rectangles.
struct Shelf {
    y: u32,
    height: u32,
    cursor: u32,
}

/// Pack `inputs` into a square power-of-two bin.
///
/// Shelf packing with rectangles sorted by decreasing height. Every rectangle
/// reserves `padding` pixels on each side, so a footprint grows by twice the
/// padding per axis rather than once, and bleed of up to `padding` pixels never
/// reaches a neighbour. The returned content rectangles exclude it. When the natural bin edge exceeds `max_dimension`, every
/// rectangle is scaled down uniformly so the bin is exactly `max_dimension`.
pub fn pack(inputs: &[PackInput], padding: u32, max_dimension: u32) -> PackResult {
    let sizes: Vec<(u32, u32)> = inputs
        .iter()
        .map(|r| {
            (
                pixel_extent(r.width) + padding * 2,
                pixel_extent(r.height) + padding * 2,
            )
        })
        .collect();

    // Tallest first; the stable sort keeps submission order among equal heights.
    let mut order: Vec<usize> = (0..sizes.len()).collect();
    order.sort_by(|&a, &b| sizes[b].1.cmp(&sizes[a].1));

    let shelf_width = choose_shelf_width(&order, &sizes);
    let (placements, used_w, used_h) = shelf_layout(&order, &sizes, shelf_width);
    let natural_width = used_w.max(used_h);

    let (width, scale) = if natural_width > max_dimension {
        let scale = max_dimension as f32 / natural_width as f32;
        ((scale * natural_width as f32).round() as u32, scale)
    } else {
        (natural_width.next_power_of_two().max(1), 1.0)
    };

    debug!(
        rects = inputs.len(),
        shelf_width, natural_width, width, scale, "Packed atlas rectangles"
    );

    let pad = padding as f32;
    let mut rects = Vec::with_capacity(inputs.len());
    let mut footprints = Vec::with_capacity(inputs.len());
    let mut lookup = HashMap::with_capacity(inputs.len());

    for (i, input) in inputs.iter().enumerate() {
        let p = placements[i];
        let content = Rect::new(
            p.x as f32 + pad,
            p.y as f32 + pad,
            sanitize(input.width),
            sanitize(input.height),
        );
        let footprint = Rect::new(p.x as f32, p.y as f32, sizes[i].0 as f32, sizes[i].1 as f32);

        rects.push(PackedRect {
            key: input.key,
            rect: content.scaled(scale),
        });
        footprints.push(footprint.scaled(scale));
        lookup.insert(input.key, i);
    }

    PackResult {
        rects,
        footprints,
        width,
        natural_width,
        scale,
        lookup,
    }
}

fn sanitize(v: f32) -> f32 {
    if v.is_finite() { v.max(0.0) } else { 0.0 }
}

/// Whole pixels reserved for a (possibly fractional) extent.
fn pixel_extent(v: f32) -> u32 {
    sanitize(v).ceil() as u32
}

/// Pick the shelf width giving the smallest square bin.
///
/// Candidates are the widest rectangle, every running sum of widths in
/// placement order, and the side of a square holding the total area.
fn choose_shelf_width(order: &[usize], sizes: &[(u32, u32)]) -> u32 {
    let widest = sizes.iter().map(|s| s.0).max().unwrap_or(0);
    let area: u64 = sizes.iter().map(|&(w, h)| w as u64 * h as u64).sum();

    let mut candidates = vec![widest, (area as f64).sqrt().ceil() as u32];
    let mut running = 0u32;
    for &idx in order {
        running = running.saturating_add(sizes[idx].0);
        candidates.push(running);
    }
    candidates.retain(|&c| c >= widest);
    candidates.sort_unstable();
    candidates.dedup();

    let mut best = widest;
    let mut best_key = (u32::MAX, u64::MAX);
    for candidate in candidates {
        let (_, used_w, used_h) = shelf_layout(order, sizes, candidate);
        let key = (used_w.max(used_h), used_w as u64 * used_h as u64);
        if key < best_key {
            best_key = key;
            best = candidate;
        }
    }
    best
}

/// Place rectangles (already sorted) onto shelves of `bin_width`.
///
/// Returns placements indexed like `sizes`, plus used width and height.
fn shelf_layout(order: &[usize], sizes: &[(u32, u32)], bin_width: u32) -> (Vec<Placement>, u32, u32) {
    let mut placements = vec![Placement { x: 0, y: 0 }; sizes.len()];
    let mut shelves: Vec<Shelf> = Vec::new();
    let mut used_w = 0u32;
    let mut used_h = 0u32;

    for &idx in order {
        let (w, h) = sizes[idx];

        let shelf_idx = match shelves
            .iter()
            .position(|s| bin_width - s.cursor.min(bin_width) >= w && s.height >= h)
        {
            Some(i) => i,
            None => {
                shelves.push(Shelf {
                    y: used_h,
                    height: h,
                    cursor: 0,
                });
                used_h += h;
                shelves.len() - 1
            }
        };

        let shelf = &mut shelves[shelf_idx];
        placements[idx] = Placement {
            x: shelf.cursor,
            y: shelf.y,
        };
        shelf.cursor += w;
        used_w = used_w.max(shelf.cursor);
    }

    (placements, used_w, used_h)
}

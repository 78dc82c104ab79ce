use criterion::{Criterion, criterion_group, criterion_main};
use facade_atlas::atlas::builder::build_lod;
use facade_atlas::atlas::packer::{PackInput, pack};
use facade_atlas::atlas::texture_cache::SourceTextureCache;
use facade_atlas::config::AtlasConfig;
use facade_atlas::types::{
    BayStyle, BayTextures, BuildingPlan, FacadeDesign, SlotKey, StyleUnit, TextureLibrary,
    TextureRef, TextureSource, Volume,
};
use glam::Vec2;
use image::{Rgba, RgbaImage};

/// A terrace of `n` adjoining 8x10 m houses, 4 floors each.
fn make_terrace(n: usize) -> BuildingPlan {
    let mut points = Vec::with_capacity((n + 1) * 2);
    for i in 0..=n {
        let x = i as f32 * 8.0;
        points.push(Vec2::new(x, 0.0));
        points.push(Vec2::new(x, 10.0));
    }

    let volumes = (0..n)
        .map(|i| Volume {
            points: vec![i * 2, (i + 1) * 2, (i + 1) * 2 + 1, i * 2 + 1],
            render_facade: vec![true, i + 1 == n, true, i == 0],
            floors: 4,
            floor_base: vec![],
            styles: vec![StyleUnit { facade: 0, floors: 1 }],
            edge_styles: Default::default(),
        })
        .collect();

    BuildingPlan {
        name: format!("terrace_{n}"),
        points,
        volumes,
        floor_height: 3.0,
        facades: vec![FacadeDesign {
            has_windows: true,
            patterned: false,
            bay_pattern: vec![],
            simple_bay: BayStyle {
                opening_width: 1.2,
                opening_height: 1.5,
                spacing: 1.4,
                opening_width_ratio: 0.5,
                opening_height_ratio: 0.4,
                is_opening: true,
                textures: BayTextures {
                    opening: TextureRef { texture: 1, flipped: false },
                    ..BayTextures::uniform(0)
                },
            },
        }],
        bays: vec![],
        roof: vec![],
        draw_underside: true,
    }
}

fn make_library() -> TextureLibrary {
    TextureLibrary::new(vec![
        TextureSource::tiled(
            "brick",
            RgbaImage::from_fn(64, 64, |x, y| Rgba([(x * 4) as u8, (y * 4) as u8, 90, 255])),
            Vec2::new(1.0, 1.0),
        ),
        TextureSource::stretched("glass", RgbaImage::from_pixel(16, 16, Rgba([30, 60, 120, 255])), Vec2::ONE),
    ])
}

fn bench_pack(c: &mut Criterion) {
    let inputs: Vec<PackInput> = (0..2000)
        .map(|i| PackInput {
            key: SlotKey::Facade { volume: i / 4, edge: i % 4 },
            width: 20.0 + (i * 37 % 400) as f32,
            height: 30.0 + (i * 53 % 240) as f32,
        })
        .collect();

    c.bench_function("pack_2000_rects", |b| {
        b.iter(|| pack(&inputs, 4, 8192));
    });
}

fn bench_build_lod(c: &mut Criterion) {
    let plan = make_terrace(12);
    let library = make_library();
    let config = AtlasConfig {
        pixels_per_meter: 32.0,
        max_dimension: 2048,
        ..Default::default()
    };

    c.bench_function("build_lod_terrace_12", |b| {
        b.iter(|| {
            let cache = SourceTextureCache::new(&library, config.pixels_per_meter);
            build_lod(&plan, &cache, &config)
        });
    });
}

criterion_group!(benches, bench_pack, bench_build_lod);
criterion_main!(benches);

//! End-to-end integration tests.
//!
//! These tests write synthetic textures and a scene file, run the full
//! pipeline, and validate the atlas images, GLB meshes and manifest.

use std::fs;
use std::path::Path;

use facade_atlas::config::{AtlasConfig, OutputConfig, PipelineConfig, TextureFormat};
use facade_atlas::Pipeline;
use serde_json::{Value, json};

const BRICK: [u8; 4] = [170, 70, 50, 255];
const GLASS: [u8; 4] = [30, 60, 120, 255];
const SLATE: [u8; 4] = [60, 60, 70, 255];

fn write_textures(dir: &Path) {
    let brick = image::RgbaImage::from_fn(32, 32, |x, y| {
        if y % 8 == 0 || (x + (y / 8) * 4) % 16 == 0 {
            image::Rgba([200, 200, 190, 255])
        } else {
            image::Rgba(BRICK)
        }
    });
    brick.save(dir.join("brick.png")).unwrap();
    image::RgbaImage::from_pixel(8, 8, image::Rgba(GLASS))
        .save(dir.join("glass.png"))
        .unwrap();
    // Raw RGBA fallback.
    fs::write(dir.join("slate.rgba"), SLATE.repeat(4 * 4)).unwrap();
}

fn bay(texture_wall: usize, opening: f32) -> Value {
    json!({
        "opening_width": opening,
        "opening_height": 1.4,
        "spacing": 1.0,
        "textures": {
            "wall": { "texture": texture_wall },
            "opening": { "texture": 1 },
            "column": { "texture": texture_wall },
            "row": { "texture": texture_wall },
            "cross": { "texture": texture_wall, "flipped": true }
        }
    })
}

/// Two buildings: a windowed box with a flat roof, and an L-shape with
/// a taller wing hiding part of the lower one.
fn scene(with_textures: bool) -> Value {
    let textures = if with_textures {
        json!([
            { "name": "brick", "path": "brick.png", "tiled": true, "unit_size": [1.0, 1.0] },
            { "name": "glass", "path": "glass.png" },
            { "name": "slate", "path": "slate.rgba", "tiled": true, "unit_size": [2.0, 2.0],
              "width": 4, "height": 4 }
        ])
    } else {
        json!([])
    };

    json!({
        "textures": textures,
        "buildings": [
            {
                "name": "box",
                "points": [[0, 0], [12, 0], [12, 8], [0, 8]],
                "volumes": [{
                    "points": [0, 1, 2, 3],
                    "floors": 4,
                    "styles": [{ "facade": 1, "floors": 1 }, { "facade": 0, "floors": 3 }]
                }],
                "floor_height": 3.0,
                "facades": [
                    { "simple_bay": bay(0, 1.2) },
                    { "has_windows": false, "simple_bay": bay(0, 1.2) }
                ],
                "roof": [{
                    "texture": 2,
                    "positions": [[0, 12, 0], [12, 12, 0], [12, 12, 8], [0, 12, 8]],
                    "uvs": [[0, 0], [12, 0], [12, 8], [0, 8]],
                    "indices": [0, 2, 1, 0, 3, 2]
                }],
                "draw_underside": true
            },
            {
                "name": "ell wing",
                "points": [[0, 0], [6, 0], [6, 6], [0, 6], [6, 3], [10, 3], [10, 6]],
                "volumes": [
                    {
                        "points": [0, 1, 2, 3],
                        "floors": 5,
                        "styles": [{ "facade": 0, "floors": 1 }]
                    },
                    {
                        "points": [4, 5, 6, 2],
                        "floors": 2,
                        "render_facade": [true, true, true, false],
                        "floor_base": [0, 0, 0, 2],
                        "styles": [{ "facade": 0, "floors": 1 }]
                    }
                ],
                "floor_height": 3.2,
                "facades": [{ "patterned": true, "bay_pattern": [0, 1], "simple_bay": bay(0, 1.0) }],
                "bays": [bay(0, 1.0), bay(0, 0.6)]
            }
        ]
    })
}

fn write_scene(dir: &Path, with_textures: bool) -> std::path::PathBuf {
    if with_textures {
        write_textures(dir);
    }
    let path = dir.join("scene.json");
    fs::write(&path, serde_json::to_string_pretty(&scene(with_textures)).unwrap()).unwrap();
    path
}

fn config(input: &Path, output: &Path) -> PipelineConfig {
    PipelineConfig {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        atlas: AtlasConfig {
            pixels_per_meter: 20.0,
            padding: 4,
            max_dimension: 1024,
            assert_on_clamp: true,
        },
        ..Default::default()
    }
}

#[test]
fn builds_every_building() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_scene(dir.path(), true);
    let out = dir.path().join("out");

    let result = Pipeline::run(&config(&input, &out)).unwrap();
    assert_eq!(result.built, 2);
    assert_eq!(result.skipped, 0);

    for stem in ["box", "ell_wing"] {
        let png = image::open(out.join(format!("{stem}.png"))).unwrap().to_rgba8();
        assert_eq!(png.width(), png.height());
        assert!(png.width().is_power_of_two());
        assert!(out.join(format!("{stem}.glb")).exists());
    }
}

#[test]
fn atlas_contains_source_colours() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_scene(dir.path(), true);
    let out = dir.path().join("out");
    Pipeline::run(&config(&input, &out)).unwrap();

    let png = image::open(out.join("box.png")).unwrap().to_rgba8();
    let has = |c: [u8; 4]| png.pixels().any(|p| p.0 == c);
    assert!(has(BRICK));
    assert!(has(GLASS));
    assert!(has(SLATE));
}

#[test]
fn glb_matches_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_scene(dir.path(), true);
    let out = dir.path().join("out");
    Pipeline::run(&config(&input, &out)).unwrap();

    let manifest: Value = serde_json::from_slice(&fs::read(out.join("manifest.json")).unwrap()).unwrap();
    let buildings = manifest["buildings"].as_array().unwrap();
    assert_eq!(buildings.len(), 2);
    assert!(manifest["skipped"].as_array().unwrap().is_empty());
    assert_eq!(manifest["pixels_per_meter"], 20.0);

    let entry = buildings.iter().find(|b| b["name"] == "box").unwrap();
    // Four facades then one roof slot.
    let slots = entry["slots"].as_array().unwrap();
    assert_eq!(slots.len(), 5);
    assert_eq!(slots[0]["key"]["kind"], "facade");
    assert_eq!(slots[4]["key"]["kind"], "roof");
    assert_eq!(entry["stats"]["clamped_writes"], 0);

    let (doc, buffers, images) = gltf::import(out.join("box.glb")).unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].width as u64, entry["atlas_width"].as_u64().unwrap());

    let mesh = doc.meshes().next().unwrap();
    // Underside, facades, roof.
    assert_eq!(mesh.primitives().count(), 3);
    let triangles: usize = mesh
        .primitives()
        .map(|p| {
            let reader = p.reader(|b| Some(&buffers[b.index()]));
            reader.read_indices().unwrap().into_u32().count() / 3
        })
        .sum();
    assert_eq!(triangles as u64, entry["triangles"].as_u64().unwrap());
    assert_eq!(triangles, 2 + 4 * 2 + 2);
}

#[test]
fn covered_edge_gets_no_slot() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_scene(dir.path(), true);
    let out = dir.path().join("out");
    Pipeline::run(&config(&input, &out)).unwrap();

    let manifest: Value = serde_json::from_slice(&fs::read(out.join("manifest.json")).unwrap()).unwrap();
    let entry = manifest["buildings"]
        .as_array()
        .unwrap()
        .iter()
        .find(|b| b["name"] == "ell wing")
        .unwrap();
    // 4 edges on the tall wing, 3 rendered on the low one.
    assert_eq!(entry["slots"].as_array().unwrap().len(), 7);
    assert_eq!(entry["stats"]["missing_textures"], 0);
}

#[test]
fn empty_texture_library_skips_buildings() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_scene(dir.path(), false);
    let out = dir.path().join("out");

    let result = Pipeline::run(&config(&input, &out)).unwrap();
    assert_eq!(result.built, 0);
    assert_eq!(result.skipped, 2);
    assert!(!out.join("box.glb").exists());

    let manifest: Value = serde_json::from_slice(&fs::read(out.join("manifest.json")).unwrap()).unwrap();
    let skipped = manifest["skipped"].as_array().unwrap();
    assert_eq!(skipped.len(), 2);
    assert!(skipped[0]["reason"].as_str().unwrap().contains("no source textures"));
}

#[test]
fn webp_and_compressed_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_scene(dir.path(), true);
    let out = dir.path().join("out");
    let mut cfg = config(&input, &out);
    cfg.output_format = OutputConfig {
        format: TextureFormat::WebP,
        compress_mesh: true,
        write_manifest: false,
    };

    Pipeline::run(&cfg).unwrap();
    let webp = image::open(out.join("box.webp")).unwrap();
    assert!(webp.width().is_power_of_two());

    let bytes = fs::read(out.join("box.glb")).unwrap();
    let glb = gltf::binary::Glb::from_slice(&bytes).unwrap();
    assert!(std::str::from_utf8(&glb.json).unwrap().contains("EXT_meshopt_compression"));
    assert!(!out.join("manifest.json").exists());
}

#[test]
fn small_max_dimension_downscales() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_scene(dir.path(), true);
    let out = dir.path().join("out");
    let mut cfg = config(&input, &out);
    cfg.atlas.max_dimension = 128;
    // Bleed padding shrinks below a pixel here, so edge writes may clamp.
    cfg.atlas.assert_on_clamp = false;

    Pipeline::run(&cfg).unwrap();
    let manifest: Value = serde_json::from_slice(&fs::read(out.join("manifest.json")).unwrap()).unwrap();
    for entry in manifest["buildings"].as_array().unwrap() {
        assert_eq!(entry["atlas_width"], 128);
        assert!(entry["scale"].as_f64().unwrap() < 1.0);
    }
}

#[test]
fn colliding_names_write_separate_files() {
    let dir = tempfile::tempdir().unwrap();
    write_textures(dir.path());
    let mut scene = scene(true);
    let mut first = scene["buildings"][0].clone();
    let mut second = first.clone();
    first["name"] = json!("Town Hall");
    second["name"] = json!("Town/Hall");
    scene["buildings"] = json!([first, second]);
    let input = dir.path().join("scene.json");
    fs::write(&input, serde_json::to_string(&scene).unwrap()).unwrap();
    let out = dir.path().join("out");

    let result = Pipeline::run(&config(&input, &out)).unwrap();
    assert_eq!(result.built, 2);

    let glbs = fs::read_dir(&out)
        .unwrap()
        .filter(|e| e.as_ref().unwrap().path().extension().is_some_and(|x| x == "glb"))
        .count();
    assert_eq!(glbs, result.built);

    let manifest: Value = serde_json::from_slice(&fs::read(out.join("manifest.json")).unwrap()).unwrap();
    let stems: Vec<&str> = manifest["buildings"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["file_stem"].as_str().unwrap())
        .collect();
    assert!(stems.contains(&"Town_Hall"));
    assert!(stems.contains(&"Town_Hall_1"));
    for stem in stems {
        assert!(out.join(format!("{stem}.glb")).exists());
        assert!(out.join(format!("{stem}.png")).exists());
    }
}

#[test]
fn dry_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_scene(dir.path(), true);
    let out = dir.path().join("out");
    let mut cfg = config(&input, &out);
    cfg.dry_run = true;

    let result = Pipeline::run(&cfg).unwrap();
    assert_eq!(result.built, 0);
    assert!(!out.exists());
}

use std::collections::HashSet;
use std::path::Path;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::atlas::builder::{BuildSummary, LodBuild, build_lod, plan_lod};
use crate::atlas::glb_writer::write_glb;
use crate::atlas::texture_cache::SourceTextureCache;
use crate::atlas::texture_compress::encode_texture;
use crate::config::{OutputConfig, PipelineConfig};
use crate::error::Result;
use crate::ingestion::{self, SceneInput};

/// Summary of a completed pipeline run.
#[derive(Debug)]
pub struct ProcessingResult {
    pub built: usize,
    pub skipped: usize,
    pub duration: Duration,
}

/// A building abandoned without affecting its siblings.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedBuilding {
    pub name: String,
    pub reason: String,
}

/// Contents of `manifest.json`.
#[derive(Debug, Serialize)]
pub struct Manifest {
    pub pixels_per_meter: f32,
    pub padding: u32,
    pub max_dimension: u32,
    pub buildings: Vec<BuildSummary>,
    pub skipped: Vec<SkippedBuilding>,
}

enum Outcome {
    Built(BuildSummary),
    Skipped(SkippedBuilding),
}

/// Pipeline orchestrator: load the scene, build every building, write outputs.
pub struct Pipeline;

impl Pipeline {
    /// Run the full pipeline.
    pub fn run(config: &PipelineConfig) -> Result<ProcessingResult> {
        let start = Instant::now();
        config.atlas.validate()?;

        info!(input = %config.input.display(), "Starting pipeline");

        if config.dry_run {
            info!("--dry-run: planning and packing only");
            let scene = ingestion::load_scene(&config.input)?;
            print_dry_run_summary(config, &scene);
            return Ok(ProcessingResult {
                built: 0,
                skipped: 0,
                duration: start.elapsed(),
            });
        }

        info!("Stage 1/3: Ingestion");
        let scene = ingestion::load_scene(&config.input)?;

        info!("Stage 2/3: Building atlases");
        std::fs::create_dir_all(&config.output)?;
        let outcomes = Self::build_all(config, &scene)?;

        let mut buildings = Vec::new();
        let mut skipped = Vec::new();
        for outcome in outcomes {
            match outcome {
                Outcome::Built(summary) => buildings.push(summary),
                Outcome::Skipped(s) => skipped.push(s),
            }
        }

        info!("Stage 3/3: Manifest");
        let result = ProcessingResult {
            built: buildings.len(),
            skipped: skipped.len(),
            duration: Duration::ZERO,
        };
        if config.output_format.write_manifest {
            let manifest = Manifest {
                pixels_per_meter: config.atlas.pixels_per_meter,
                padding: config.atlas.padding,
                max_dimension: config.atlas.max_dimension,
                buildings,
                skipped,
            };
            write_manifest(&manifest, &config.output)?;
        }

        let duration = start.elapsed();
        info!(
            built = result.built,
            skipped = result.skipped,
            elapsed = ?duration,
            "Pipeline complete"
        );

        Ok(ProcessingResult { duration, ..result })
    }

    /// Build and write every building in parallel over one shared cache.
    ///
    /// Building-scoped failures become `Outcome::Skipped`; anything else
    /// (I/O, encoding) aborts the run.
    fn build_all(config: &PipelineConfig, scene: &SceneInput) -> Result<Vec<Outcome>> {
        let cache = SourceTextureCache::new(&scene.library, config.atlas.pixels_per_meter);
        let names: Vec<&str> = scene.buildings.iter().map(|b| b.name.as_str()).collect();
        let stems = unique_file_stems(&names);

        let outcomes = scene
            .buildings
            .par_iter()
            .zip(stems.par_iter())
            .map(|(plan, stem)| match build_lod(plan, &cache, &config.atlas) {
                Ok(build) => {
                    write_building(&build, stem, &config.output, &config.output_format)?;
                    Ok(Outcome::Built(build.summary(stem)))
                }
                Err(e) if e.is_building_scoped() => {
                    warn!(building = %plan.name, error = %e, "Skipping building");
                    Ok(Outcome::Skipped(SkippedBuilding {
                        name: plan.name.clone(),
                        reason: e.to_string(),
                    }))
                }
                Err(e) => Err(e),
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            buildings = scene.buildings.len(),
            prepared_textures = cache.cached_count(),
            "Atlas builds complete"
        );
        Ok(outcomes)
    }
}

/// File stem for a building name: anything outside `[A-Za-z0-9._-]` becomes `_`.
pub fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() { "building".into() } else { stem }
}

/// One distinct file stem per building, in input order.
///
/// Names that sanitise to a stem already taken (compared case-insensitively)
/// get the building index appended, then a counter if that is taken too.
pub fn unique_file_stems(names: &[&str]) -> Vec<String> {
    let mut taken = HashSet::new();
    let mut stems = Vec::with_capacity(names.len());

    for (i, name) in names.iter().enumerate() {
        let base = file_stem(name);
        let mut stem = base.clone();
        let mut n = 0;
        while !taken.insert(stem.to_ascii_lowercase()) {
            stem = if n == 0 {
                format!("{base}_{i}")
            } else {
                format!("{base}_{i}_{n}")
            };
            n += 1;
        }
        if stem != base {
            warn!(building = %name, file_stem = %stem, "Output name collides, renamed");
        }
        stems.push(stem);
    }
    stems
}

/// Write `<stem>.<png|webp>` and `<stem>.glb` for one building.
fn write_building(build: &LodBuild, stem: &str, output: &Path, cfg: &OutputConfig) -> Result<()> {
    let texture = encode_texture(&build.atlas.to_top_down(), cfg.format)?;

    let image_path = output.join(format!("{stem}.{}", cfg.format.extension()));
    std::fs::write(&image_path, &texture.data)?;

    let glb = write_glb(&build.mesh, Some(&texture), cfg.compress_mesh)?;
    let glb_path = output.join(format!("{stem}.glb"));
    std::fs::write(&glb_path, &glb)?;

    info!(
        building = %build.name,
        atlas = %image_path.display(),
        atlas_bytes = texture.data.len(),
        glb_bytes = glb.len(),
        "Wrote building outputs"
    );
    Ok(())
}

fn write_manifest(manifest: &Manifest, output: &Path) -> Result<()> {
    let path = output.join("manifest.json");
    let file = std::fs::File::create(&path)?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), manifest)?;
    info!(path = %path.display(), "Wrote manifest");
    Ok(())
}

/// Print planned slot counts and atlas sizes without compositing.
fn print_dry_run_summary(config: &PipelineConfig, scene: &SceneInput) {
    println!("=== Dry Run Summary ===");
    println!("  Textures:  {}", scene.library.len());
    println!("  Buildings: {}", scene.buildings.len());
    println!(
        "  Atlas:     {} px/m, padding {}, max {}",
        config.atlas.pixels_per_meter, config.atlas.padding, config.atlas.max_dimension
    );
    println!();
    for plan in &scene.buildings {
        let (layout, packed) = plan_lod(plan, &config.atlas);
        println!(
            "  {:<24} facades {:>3}  roofs {:>2}  natural {:>6}  atlas {:>5}  scale {:.3}",
            plan.name,
            layout.facades.len(),
            layout.roofs.len(),
            packed.natural_width,
            packed.width,
            packed.scale
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_stem_replaces_separators() {
        assert_eq!(file_stem("Town Hall/east"), "Town_Hall_east");
        assert_eq!(file_stem("b-12_x.v2"), "b-12_x.v2");
        assert_eq!(file_stem(""), "building");
    }

    #[test]
    fn colliding_names_get_distinct_stems() {
        let stems = unique_file_stems(&["Town Hall", "Town/Hall", "town_hall", "Town Hall", "mill"]);
        assert_eq!(stems, vec!["Town_Hall", "Town_Hall_1", "town_hall_2", "Town_Hall_3", "mill"]);
    }

    #[test]
    fn suffixed_stem_already_in_use() {
        let stems = unique_file_stems(&["a", "a_1", "a", "a"]);
        assert_eq!(stems, vec!["a", "a_1", "a_2", "a_3"]);
        // The third building's indexed stem "b_2" is already a real name.
        let stems = unique_file_stems(&["b", "b_2", "b"]);
        assert_eq!(stems, vec!["b", "b_2", "b_2_1"]);
    }

    #[test]
    fn invalid_config_rejected_before_io() {
        let mut config = PipelineConfig {
            input: "/nonexistent/scene.json".into(),
            ..Default::default()
        };
        config.atlas.max_dimension = 1000;
        let err = Pipeline::run(&config).unwrap_err();
        assert!(err.to_string().contains("power of two"));
    }

    #[test]
    fn missing_scene_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            input: dir.path().join("scene.json"),
            output: dir.path().join("out"),
            ..Default::default()
        };
        assert!(Pipeline::run(&config).is_err());
    }
}

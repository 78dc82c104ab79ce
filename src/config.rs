use std::path::PathBuf;

use clap::Parser;

use crate::error::{AtlasError, Result};

/// Output atlas image encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TextureFormat {
    #[value(name = "png")]
    Png,
    #[value(name = "webp")]
    WebP,
}

impl TextureFormat {
    /// File extension used when writing the atlas next to the mesh.
    pub fn extension(&self) -> &'static str {
        match self {
            TextureFormat::Png => "png",
            TextureFormat::WebP => "webp",
        }
    }
}

impl std::fmt::Display for TextureFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Atlas build parameters shared by every building in a run.
#[derive(Debug, Clone)]
pub struct AtlasConfig {
    /// Atlas pixels per metre of facade / roof surface.
    pub pixels_per_meter: f32,
    /// Bleed padding around every packed rectangle, in unscaled pixels.
    pub padding: u32,
    /// Largest atlas edge. Larger natural packings are scaled down to fit.
    pub max_dimension: u32,
    /// Debug builds assert when a pixel write has to be clamped into the atlas.
    pub assert_on_clamp: bool,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            pixels_per_meter: 100.0,
            padding: 16,
            max_dimension: 1024,
            assert_on_clamp: false,
        }
    }
}

impl AtlasConfig {
    /// Reject parameter combinations the packer cannot honour.
    pub fn validate(&self) -> Result<()> {
        if !self.pixels_per_meter.is_finite() || self.pixels_per_meter <= 0.0 {
            return Err(AtlasError::Config(format!(
                "pixels per metre must be positive, got {}",
                self.pixels_per_meter
            )));
        }
        if !self.max_dimension.is_power_of_two() {
            return Err(AtlasError::Config(format!(
                "maximum atlas dimension must be a power of two, got {}",
                self.max_dimension
            )));
        }
        Ok(())
    }
}

/// What gets written per building.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub format: TextureFormat,
    /// Apply EXT_meshopt_compression to the GLB buffers.
    pub compress_mesh: bool,
    pub write_manifest: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: TextureFormat::Png,
            compress_mesh: false,
            write_manifest: true,
        }
    }
}

/// Fully resolved pipeline configuration (constructed from CLI args).
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub atlas: AtlasConfig,
    pub output_format: OutputConfig,
    pub dry_run: bool,
    pub verbose: bool,
    pub threads: Option<usize>,
}

/// CLI argument definition (clap derive).
#[derive(Parser, Debug)]
#[command(
    name = "facade-atlas",
    about = "Bake building facade and roof textures into a low-detail atlas + mesh",
    version
)]
pub struct CliArgs {
    /// Scene file (JSON) with textures and building plans
    #[arg(short = 'i', long)]
    pub input: PathBuf,

    /// Output directory
    #[arg(short = 'o', long)]
    pub output: PathBuf,

    /// Atlas pixels per metre
    #[arg(long, default_value_t = 100.0)]
    pub pixels_per_meter: f32,

    /// Bleed padding around packed rectangles, in pixels
    #[arg(long, default_value_t = 16)]
    pub padding: u32,

    /// Max atlas dimension in pixels (power of two)
    #[arg(long, default_value_t = 1024)]
    pub max_atlas_size: u32,

    /// Atlas image format: png or webp
    #[arg(long, value_enum, default_value = "png")]
    pub texture_format: TextureFormat,

    /// Compress GLB buffers with EXT_meshopt_compression
    #[arg(long)]
    pub compress: bool,

    /// Skip writing manifest.json
    #[arg(long)]
    pub no_manifest: bool,

    /// Plan and pack only, report atlas sizes
    #[arg(long)]
    pub dry_run: bool,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Worker thread count (default: all cores)
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,
}

impl From<CliArgs> for PipelineConfig {
    fn from(args: CliArgs) -> Self {
        PipelineConfig {
            input: args.input,
            output: args.output,
            atlas: AtlasConfig {
                pixels_per_meter: args.pixels_per_meter,
                padding: args.padding,
                max_dimension: args.max_atlas_size,
                assert_on_clamp: false,
            },
            output_format: OutputConfig {
                format: args.texture_format,
                compress_mesh: args.compress,
                write_manifest: !args.no_manifest,
            },
            dry_run: args.dry_run,
            verbose: args.verbose,
            threads: args.threads,
        }
    }
}

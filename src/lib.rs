pub mod atlas;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod pipeline;
pub mod types;

pub use config::{AtlasConfig, OutputConfig, PipelineConfig, TextureFormat};
pub use error::{AtlasError, Result};
pub use pipeline::Pipeline;

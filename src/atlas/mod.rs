pub mod builder;
pub mod compositor;
pub mod glb_writer;
pub mod layout;
pub mod packer;
pub mod remap;
pub mod texture_cache;
pub mod texture_compress;

pub use builder::{BuildSummary, LodBuild, build_lod, plan_lod};
pub use compositor::{Atlas, CompositeStats, composite};
pub use layout::{FacadeSlot, FloorPattern, LayoutPlan, RoofSlot, plan_building};
pub use packer::{PackInput, PackResult, pack};
pub use remap::remap;
pub use texture_cache::SourceTextureCache;

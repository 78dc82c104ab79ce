pub mod material;
pub mod mesh;
pub mod plan;
pub mod rect;

pub use material::{SourceTexture, TextureData, TextureLibrary, TextureSource};
pub use mesh::{IndexedMesh, SubmeshGroup, SubmeshKind};
pub use plan::{
    BayFace, BayStyle, BayTextures, BuildingPlan, FacadeDesign, RoofSurface, StyleUnit,
    TextureRef, Volume,
};
pub use rect::{PackedRect, Rect, SlotKey};

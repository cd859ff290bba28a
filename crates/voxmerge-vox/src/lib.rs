//! Reading, merging, and writing MagicaVoxel `.vox` containers.
//!
//! A file is parsed into a [`Chunk`] tree, from which [`Container`] derives
//! the flat scene graph. Shapes from other files are grafted in with
//! [`Container::merge`], which remaps their colors into the target palette,
//! and [`Container::to_bytes`] writes the result back out.

pub mod chunk;
pub mod codec;
pub mod container;
pub mod error;
pub mod merge;
pub mod palette;
pub mod writer;

#[cfg(test)]
mod testing;

pub use chunk::{
    Chunk, ChunkBody, ChunkTag, GroupNode, ShapeNode, SizeChunk, TransformNode, Voxel, VoxelChunk,
};
pub use codec::{ByteCursor, DecodeError, Dict};
pub use container::{
    ChunkIndex, Container, ContainerSummary, DetachedShape, FORMAT_VERSION, MAGIC, Shape,
    ShapeView,
};
pub use error::VoxError;
pub use merge::{MergeOptions, MergeReport, merge_shape};
pub use palette::{
    ColorRemap, MATERIAL_BANDS, MaterialBand, MaterialCategory, Palette, Rgba, SlotAllocator,
    SlotAssignment,
};

//! Builds small in-memory scenes for tests.

use crate::chunk::{
    Chunk, ChunkBody, ChunkTag, GroupNode, ShapeNode, SizeChunk, TransformNode, Voxel, VoxelChunk,
};
use crate::codec::{Dict, put_u32};
use crate::container::{Container, FORMAT_VERSION, MAGIC};
use crate::palette::{PALETTE_LEN, Palette, Rgba};

/// A distinct color for every slot.
pub fn distinct_palette(seed: u8) -> Palette {
    let mut colors = [Rgba::default(); PALETTE_LEN];
    for (i, c) in colors.iter_mut().enumerate() {
        let i = i as u8;
        *c = Rgba::new(i, 255 - i, i.wrapping_mul(3).wrapping_add(seed), 255);
    }
    Palette::from_colors(colors)
}

/// Flat scene: root transform 0 → group 1 → (transform 2k+2 → shape 2k+3).
pub struct SceneBuilder {
    models: Vec<([u32; 3], Vec<Voxel>)>,
    extra: Vec<Chunk>,
    palette: Palette,
}

impl SceneBuilder {
    pub fn new() -> Self {
        Self {
            models: Vec::new(),
            extra: Vec::new(),
            palette: distinct_palette(0),
        }
    }

    pub fn palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    /// Adds a model; voxels are `(x, y, z, color_index)`.
    pub fn model(mut self, size: [u32; 3], voxels: &[(u8, u8, u8, u8)]) -> Self {
        let voxels = voxels
            .iter()
            .map(|&(x, y, z, color_index)| Voxel {
                x,
                y,
                z,
                color_index,
            })
            .collect();
        self.models.push((size, voxels));
        self
    }

    /// Adds a pass-through chunk written before the palette.
    pub fn opaque(mut self, tag: &[u8; 4], payload: &[u8]) -> Self {
        self.extra.push(Chunk::opaque(ChunkTag(*tag), payload.to_vec()));
        self
    }

    /// The `MAIN` chunk, children in the order the writer emits them.
    pub fn root(&self) -> Chunk {
        let mut children = Vec::new();
        for ([x, y, z], voxels) in &self.models {
            children.push(Chunk::new(ChunkBody::Size(SizeChunk {
                x: *x,
                y: *y,
                z: *z,
            })));
            children.push(Chunk::new(ChunkBody::Voxels(VoxelChunk {
                voxels: voxels.clone(),
            })));
        }

        children.push(Chunk::new(ChunkBody::Transform(TransformNode {
            node_id: 0,
            attributes: Dict::new(),
            child_node_id: 1,
            layer_id: -1,
            frame: Dict::new(),
        })));
        let model_ids = 0..self.models.len() as i32;
        children.push(Chunk::new(ChunkBody::Group(GroupNode {
            node_id: 1,
            attributes: Dict::new(),
            child_ids: model_ids.clone().map(|k| 2 * k + 2).collect(),
        })));

        for k in model_ids {
            let translation = format!("{} 0 0", k * 10);
            children.push(Chunk::new(ChunkBody::Transform(TransformNode {
                node_id: 2 * k + 2,
                attributes: [("_name", format!("model{k}"))].into_iter().collect(),
                child_node_id: 2 * k + 3,
                layer_id: 0,
                frame: [("_t", translation)].into_iter().collect(),
            })));
            children.push(Chunk::new(ChunkBody::Shape(ShapeNode {
                node_id: 2 * k + 3,
                attributes: Dict::new(),
                model_id: k,
                model_attributes: Dict::new(),
            })));
        }

        children.extend(self.extra.iter().cloned());
        children.push(Chunk::new(ChunkBody::Palette(self.palette.clone())));

        Chunk {
            body: ChunkBody::Opaque {
                tag: ChunkTag::MAIN,
                payload: Vec::new(),
            },
            children,
        }
    }

    /// Encoded file, header included.
    pub fn bytes(&self) -> Vec<u8> {
        let mut out = MAGIC.to_vec();
        put_u32(&mut out, FORMAT_VERSION);
        self.root().write_to(&mut out);
        out
    }

    pub fn build(&self) -> Container {
        Container::from_root(FORMAT_VERSION, self.root()).expect("builder produces a valid scene")
    }
}

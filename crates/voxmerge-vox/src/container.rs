//! A parsed `.vox` file: the chunk tree plus the scene graph derived from it.
//!
//! The scene is assumed to be flat: one root transform, one group node whose
//! children are transforms, and one shape node under each of those
//! transforms. The nth `SIZE`, `XYZI` and `nSHP` chunks describe the same
//! model, and a shape node with id `n` sits under the transform with id
//! `n - 1`.

use std::path::Path;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use tracing::{debug, info};

use crate::chunk::{
    Chunk, ChunkBody, ChunkTag, GroupNode, ShapeNode, SizeChunk, TransformNode, VoxelChunk,
};
use crate::codec::ByteCursor;
use crate::error::VoxError;
use crate::palette::{PALETTE_LEN, Palette};

/// Signature at the start of every `.vox` file.
pub const MAGIC: [u8; 4] = *b"VOX ";

/// Version written into the file header.
pub const FORMAT_VERSION: u32 = 200;

// ---------------------------------------------------------------------------
// Tag index
// ---------------------------------------------------------------------------

/// Positions of the root's children grouped by tag, in file order.
///
/// Rebuilt whenever the root's child list changes.
#[derive(Clone, Debug, Default)]
pub struct ChunkIndex {
    by_tag: FxHashMap<ChunkTag, Vec<usize>>,
}

impl ChunkIndex {
    /// Indexes `children`.
    pub fn build(children: &[Chunk]) -> Self {
        let mut by_tag: FxHashMap<ChunkTag, Vec<usize>> = FxHashMap::default();
        for (i, chunk) in children.iter().enumerate() {
            by_tag.entry(chunk.tag()).or_default().push(i);
        }
        Self { by_tag }
    }

    /// Positions of children tagged `tag`.
    pub fn positions(&self, tag: ChunkTag) -> &[usize] {
        self.by_tag.get(&tag).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of children tagged `tag`.
    pub fn count(&self, tag: ChunkTag) -> usize {
        self.positions(tag).len()
    }

    fn single(&self, tag: ChunkTag) -> Result<usize, VoxError> {
        match self.positions(tag) {
            [] => Err(VoxError::MissingChunk(tag)),
            [pos] => Ok(*pos),
            many => Err(VoxError::Structure(format!(
                "expected one {tag} chunk, found {}",
                many.len()
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------------

/// One model instance, as positions of its chunks among the root's children.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Shape {
    pub transform: usize,
    pub size: usize,
    pub node: usize,
    pub voxels: usize,
}

/// Borrowed, typed view of a [`Shape`].
#[derive(Clone, Copy, Debug)]
pub struct ShapeView<'a> {
    pub transform: &'a TransformNode,
    pub size: &'a SizeChunk,
    pub node: &'a ShapeNode,
    pub voxels: &'a VoxelChunk,
}

/// A shape moved out of its container, carrying its origin palette.
#[derive(Clone, Debug)]
pub struct DetachedShape {
    pub transform: TransformNode,
    pub node: ShapeNode,
    pub size: SizeChunk,
    pub voxels: VoxelChunk,
    pub palette: Palette,
}

/// Counts describing a container, for logging.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContainerSummary {
    pub version: u32,
    pub chunks: usize,
    pub models: usize,
    pub transforms: usize,
    pub shape_nodes: usize,
    pub voxels: usize,
    pub colors_in_use: usize,
}

// ---------------------------------------------------------------------------
// Container
// ---------------------------------------------------------------------------

/// A `.vox` file in memory.
#[derive(Clone, Debug)]
pub struct Container {
    version: u32,
    root: Chunk,
    index: ChunkIndex,
    shapes: Vec<Shape>,
    group: usize,
    palette: usize,
}

impl Container {
    /// Parses a complete file.
    pub fn from_bytes(data: &[u8]) -> Result<Self, VoxError> {
        if data.len() < 4 || data[0..4] != MAGIC {
            return Err(VoxError::InvalidMagic {
                found: data[..data.len().min(4)].to_vec(),
            });
        }
        let mut cursor = ByteCursor::at(data, 4);
        let version = cursor.read_u32()?;
        let (root, end) = Chunk::parse(data, cursor.position())?;
        if end < data.len() {
            debug!(trailing = data.len() - end, "ignoring bytes after root chunk");
        }
        Self::from_root(version, root)
    }

    /// Reads and parses the file at `path`.
    pub fn open(path: &Path) -> Result<Self, VoxError> {
        let data = std::fs::read(path)?;
        let container = Self::from_bytes(&data)?;
        info!(
            path = %path.display(),
            version = container.version,
            chunks = container.root.children.len(),
            shapes = container.shapes.len(),
            "loaded vox file"
        );
        Ok(container)
    }

    /// Builds the scene graph over an already parsed root chunk.
    pub fn from_root(version: u32, root: Chunk) -> Result<Self, VoxError> {
        let index = ChunkIndex::build(&root.children);
        let group = index.single(ChunkTag::GROUP)?;
        let palette = index.single(ChunkTag::PALETTE)?;
        let shapes = reconstruct_shapes(&root.children, &index)?;
        debug!(shapes = shapes.len(), "reconstructed scene graph");
        Ok(Self {
            version,
            root,
            index,
            shapes,
            group,
            palette,
        })
    }

    /// Version from the file header.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// The `MAIN` chunk.
    pub fn root(&self) -> &Chunk {
        &self.root
    }

    /// Tag index over the root's children.
    pub fn index(&self) -> &ChunkIndex {
        &self.index
    }

    /// Shapes in model order.
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// Children tagged `tag`, in file order.
    pub fn chunks(&self, tag: ChunkTag) -> impl Iterator<Item = &Chunk> + '_ {
        self.index
            .positions(tag)
            .iter()
            .map(|&i| &self.root.children[i])
    }

    /// Voxel chunks in file order.
    pub fn voxel_chunks(&self) -> impl Iterator<Item = &VoxelChunk> + '_ {
        self.chunks(ChunkTag::XYZI).filter_map(|c| match &c.body {
            ChunkBody::Voxels(v) => Some(v),
            _ => None,
        })
    }

    /// Transform nodes in file order.
    pub fn transforms(&self) -> impl Iterator<Item = &TransformNode> + '_ {
        self.chunks(ChunkTag::TRANSFORM).filter_map(|c| match &c.body {
            ChunkBody::Transform(t) => Some(t),
            _ => None,
        })
    }

    /// Shape nodes in file order.
    pub fn shape_nodes(&self) -> impl Iterator<Item = &ShapeNode> + '_ {
        self.chunks(ChunkTag::SHAPE).filter_map(|c| match &c.body {
            ChunkBody::Shape(s) => Some(s),
            _ => None,
        })
    }

    /// The single group node.
    pub fn group(&self) -> &GroupNode {
        match &self.root.children[self.group].body {
            ChunkBody::Group(g) => g,
            _ => unreachable!("group index points at a non-group chunk"),
        }
    }

    pub(crate) fn group_mut(&mut self) -> &mut GroupNode {
        match &mut self.root.children[self.group].body {
            ChunkBody::Group(g) => g,
            _ => unreachable!("group index points at a non-group chunk"),
        }
    }

    /// The single palette.
    pub fn palette(&self) -> &Palette {
        match &self.root.children[self.palette].body {
            ChunkBody::Palette(p) => p,
            _ => unreachable!("palette index points at a non-palette chunk"),
        }
    }

    pub(crate) fn palette_mut(&mut self) -> &mut Palette {
        match &mut self.root.children[self.palette].body {
            ChunkBody::Palette(p) => p,
            _ => unreachable!("palette index points at a non-palette chunk"),
        }
    }

    /// Typed view of `shape`.
    pub fn shape_view(&self, shape: &Shape) -> ShapeView<'_> {
        let children = &self.root.children;
        match (
            &children[shape.transform].body,
            &children[shape.size].body,
            &children[shape.node].body,
            &children[shape.voxels].body,
        ) {
            (
                ChunkBody::Transform(transform),
                ChunkBody::Size(size),
                ChunkBody::Shape(node),
                ChunkBody::Voxels(voxels),
            ) => ShapeView {
                transform,
                size,
                node,
                voxels,
            },
            _ => unreachable!("shape positions point at mismatched chunks"),
        }
    }

    /// Slots referenced by any voxel in the container.
    pub fn slots_in_use(&self) -> [bool; PALETTE_LEN] {
        let mut in_use = [false; PALETTE_LEN];
        for chunk in self.voxel_chunks() {
            for slot in chunk.voxels.iter().filter_map(|v| v.slot()) {
                in_use[slot as usize] = true;
            }
        }
        in_use
    }

    /// Highest id among transform, shape, and group nodes.
    pub fn max_node_id(&self) -> i32 {
        let transforms = self.transforms().map(|t| t.node_id);
        let shapes = self.shape_nodes().map(|s| s.node_id);
        transforms
            .chain(shapes)
            .chain(std::iter::once(self.group().node_id))
            .max()
            .unwrap_or(0)
    }

    /// Appends a shape's chunks to the root and records it as a new shape.
    ///
    /// Children are pushed in the order transform, shape node, size, voxels.
    pub(crate) fn graft(
        &mut self,
        transform: TransformNode,
        node: ShapeNode,
        size: SizeChunk,
        voxels: VoxelChunk,
    ) {
        let base = self.root.children.len();
        self.root.children.extend([
            Chunk::new(ChunkBody::Transform(transform)),
            Chunk::new(ChunkBody::Shape(node)),
            Chunk::new(ChunkBody::Size(size)),
            Chunk::new(ChunkBody::Voxels(voxels)),
        ]);
        self.index = ChunkIndex::build(&self.root.children);
        self.shapes.push(Shape {
            transform: base,
            node: base + 1,
            size: base + 2,
            voxels: base + 3,
        });
    }

    /// Moves every shape out of the container, paired with a copy of its palette.
    ///
    /// Fails if two shapes share a chunk, which [`from_root`](Self::from_root)
    /// already rejects.
    pub fn detach_shapes(self) -> Result<Vec<DetachedShape>, VoxError> {
        let palette = self.palette().clone();
        let mut slots: Vec<Option<ChunkBody>> = self
            .root
            .children
            .into_iter()
            .map(|c| Some(c.body))
            .collect();

        let mut detached = Vec::with_capacity(self.shapes.len());
        for shape in &self.shapes {
            let taken = (
                slots[shape.transform].take(),
                slots[shape.node].take(),
                slots[shape.size].take(),
                slots[shape.voxels].take(),
            );
            let (
                Some(ChunkBody::Transform(transform)),
                Some(ChunkBody::Shape(node)),
                Some(ChunkBody::Size(size)),
                Some(ChunkBody::Voxels(voxels)),
            ) = taken
            else {
                return Err(VoxError::Structure(format!(
                    "shape at chunk {} shares its chunks with another shape",
                    shape.node
                )));
            };
            detached.push(DetachedShape {
                transform,
                node,
                size,
                voxels,
                palette: palette.clone(),
            });
        }
        Ok(detached)
    }

    /// Counts for logging.
    pub fn summary(&self) -> ContainerSummary {
        ContainerSummary {
            version: self.version,
            chunks: self.root.children.len(),
            models: self.index.count(ChunkTag::SIZE),
            transforms: self.index.count(ChunkTag::TRANSFORM),
            shape_nodes: self.index.count(ChunkTag::SHAPE),
            voxels: self.voxel_chunks().map(|c| c.voxels.len()).sum(),
            colors_in_use: self.slots_in_use().iter().filter(|&&u| u).count(),
        }
    }
}

/// Joins `SIZE`, `XYZI` and `nSHP` positionally and finds each shape's transform.
fn reconstruct_shapes(children: &[Chunk], index: &ChunkIndex) -> Result<Vec<Shape>, VoxError> {
    let sizes = index.positions(ChunkTag::SIZE);
    let voxels = index.positions(ChunkTag::XYZI);
    let nodes = index.positions(ChunkTag::SHAPE);
    if sizes.len() != voxels.len() || sizes.len() != nodes.len() {
        return Err(VoxError::Structure(format!(
            "{} SIZE, {} XYZI and {} nSHP chunks cannot be paired",
            sizes.len(),
            voxels.len(),
            nodes.len()
        )));
    }

    let mut transform_by_id: FxHashMap<i32, usize> = FxHashMap::default();
    for &pos in index.positions(ChunkTag::TRANSFORM) {
        if let ChunkBody::Transform(t) = &children[pos].body
            && transform_by_id.insert(t.node_id, pos).is_some()
        {
            return Err(VoxError::Structure(format!(
                "transform node id {} appears more than once",
                t.node_id
            )));
        }
    }

    let mut bound: FxHashSet<usize> = FxHashSet::default();
    let mut shapes = Vec::with_capacity(nodes.len());
    for ((&size, &vox), &node) in sizes.iter().zip(voxels).zip(nodes) {
        let ChunkBody::Shape(shape_node) = &children[node].body else {
            continue;
        };
        let Some(parent_id) = shape_node.node_id.checked_sub(1) else {
            return Err(VoxError::Structure(format!(
                "shape node id {} has no parent id",
                shape_node.node_id
            )));
        };
        let Some(&transform) = transform_by_id.get(&parent_id) else {
            return Err(VoxError::Structure(format!(
                "shape node {} has no transform node {parent_id}",
                shape_node.node_id
            )));
        };
        if !bound.insert(transform) {
            return Err(VoxError::Structure(format!(
                "transform node {parent_id} is claimed by more than one shape node"
            )));
        }
        shapes.push(Shape {
            transform,
            size,
            node,
            voxels: vox,
        });
    }
    Ok(shapes)
}

//! Chunk tree model: tags, typed payloads, and the recursive parser.
//!
//! ## Chunk Layout
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | Tag (ASCII, e.g. `SIZE`) |
//! | 4 | 4 | Content size `N` (`u32`, little-endian) |
//! | 8 | 4 | Children size `M` (`u32`, little-endian) |
//! | 12 | N | Payload |
//! | 12+N | M | Child chunks |
//!
//! Only `MAIN` has children in practice. Payloads of the scene and model
//! tags are decoded into typed structs; everything else is kept as raw bytes.

use std::fmt;

use tracing::{trace, warn};

use crate::codec::{ByteCursor, DecodeError, Dict, put_dict, put_i32, put_u32};
use crate::palette::Palette;

/// Size of the fixed chunk header in bytes.
pub const CHUNK_HEADER_LEN: usize = 12;

/// Deepest child level [`Chunk::parse`] descends to; the root is level 0.
pub const MAX_CHUNK_DEPTH: usize = 64;

/// Four-byte chunk identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkTag(pub [u8; 4]);

impl ChunkTag {
    /// Root chunk.
    pub const MAIN: Self = Self(*b"MAIN");
    /// Model dimensions.
    pub const SIZE: Self = Self(*b"SIZE");
    /// Model voxels.
    pub const XYZI: Self = Self(*b"XYZI");
    /// Transform node.
    pub const TRANSFORM: Self = Self(*b"nTRN");
    /// Shape node.
    pub const SHAPE: Self = Self(*b"nSHP");
    /// Group node.
    pub const GROUP: Self = Self(*b"nGRP");
    /// Color palette.
    pub const PALETTE: Self = Self(*b"RGBA");
    /// Material properties.
    pub const MATERIAL: Self = Self(*b"MATL");
    /// Layer.
    pub const LAYER: Self = Self(*b"LAYR");
    /// Render settings.
    pub const RENDER_OBJECT: Self = Self(*b"rOBJ");
    /// Render camera.
    pub const RENDER_CAMERA: Self = Self(*b"rCAM");
    /// Palette notes.
    pub const NOTE: Self = Self(*b"NOTE");
}

impl fmt::Display for ChunkTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ChunkTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkTag({self})")
    }
}

// ---------------------------------------------------------------------------
// Payload types
// ---------------------------------------------------------------------------

/// `SIZE`: model bounding box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SizeChunk {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

/// A single voxel from an `XYZI` chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Voxel {
    pub x: u8,
    pub y: u8,
    pub z: u8,
    /// 1-based palette reference: palette slot + 1.
    pub color_index: u8,
}

impl Voxel {
    /// Palette slot this voxel is colored with, or `None` for index 0.
    pub fn slot(&self) -> Option<u8> {
        self.color_index.checked_sub(1)
    }
}

/// `XYZI`: voxel occupancy and colors of one model.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VoxelChunk {
    pub voxels: Vec<Voxel>,
}

/// `nTRN`: places its child node in the scene.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransformNode {
    pub node_id: i32,
    pub attributes: Dict,
    pub child_node_id: i32,
    pub layer_id: i32,
    /// Attributes of the single frame (`_r`, `_t`).
    pub frame: Dict,
}

/// `nSHP`: instantiates one model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShapeNode {
    pub node_id: i32,
    pub attributes: Dict,
    pub model_id: i32,
    pub model_attributes: Dict,
}

/// `nGRP`: lists the transform nodes of the scene.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupNode {
    pub node_id: i32,
    pub attributes: Dict,
    pub child_ids: Vec<i32>,
}

/// Reserved id written after a transform node's child id.
const TRANSFORM_RESERVED_ID: i32 = -1;

/// Frame and model counts; animation is not supported so both are always 1.
const SINGLE_ENTRY: i32 = 1;

/// Decoded payload of a chunk.
#[derive(Clone, Debug, PartialEq)]
pub enum ChunkBody {
    Size(SizeChunk),
    Voxels(VoxelChunk),
    Transform(TransformNode),
    Shape(ShapeNode),
    Group(GroupNode),
    Palette(Palette),
    /// Any other tag; the payload is kept byte for byte.
    Opaque { tag: ChunkTag, payload: Vec<u8> },
}

impl ChunkBody {
    /// Decodes `payload` according to `tag`.
    pub fn decode(tag: ChunkTag, payload: &[u8]) -> Result<Self, DecodeError> {
        let mut c = ByteCursor::new(payload);
        let body = match tag {
            ChunkTag::SIZE => Self::Size(SizeChunk {
                x: c.read_u32()?,
                y: c.read_u32()?,
                z: c.read_u32()?,
            }),
            ChunkTag::XYZI => {
                let count = c.read_u32()? as usize;
                let bytes = c.read_bytes(count.saturating_mul(4))?;
                let voxels = bytes
                    .chunks_exact(4)
                    .map(|v| Voxel {
                        x: v[0],
                        y: v[1],
                        z: v[2],
                        color_index: v[3],
                    })
                    .collect();
                Self::Voxels(VoxelChunk { voxels })
            }
            ChunkTag::TRANSFORM => {
                let node_id = c.read_i32()?;
                let attributes = c.read_dict()?;
                let child_node_id = c.read_i32()?;
                let _reserved = c.read_i32()?;
                let layer_id = c.read_i32()?;
                let frames = c.read_i32()?;
                let frame = if frames > 0 { c.read_dict()? } else { Dict::new() };
                if frames > 1 {
                    warn!(node_id, frames, "animated transform node, keeping first frame only");
                }
                Self::Transform(TransformNode {
                    node_id,
                    attributes,
                    child_node_id,
                    layer_id,
                    frame,
                })
            }
            ChunkTag::SHAPE => {
                let node_id = c.read_i32()?;
                let attributes = c.read_dict()?;
                let _models = c.read_i32()?;
                Self::Shape(ShapeNode {
                    node_id,
                    attributes,
                    model_id: c.read_i32()?,
                    model_attributes: c.read_dict()?,
                })
            }
            ChunkTag::GROUP => {
                let node_id = c.read_i32()?;
                let attributes = c.read_dict()?;
                let count = c.read_u32()? as usize;
                if count > c.remaining() / 4 {
                    return Err(DecodeError::Truncated {
                        offset: c.position(),
                        needed: count.saturating_mul(4),
                        available: c.remaining(),
                    });
                }
                let child_ids = (0..count)
                    .map(|_| c.read_i32())
                    .collect::<Result<_, _>>()?;
                Self::Group(GroupNode {
                    node_id,
                    attributes,
                    child_ids,
                })
            }
            ChunkTag::PALETTE => Self::Palette(Palette::decode(payload)?),
            _ => Self::Opaque {
                tag,
                payload: payload.to_vec(),
            },
        };
        Ok(body)
    }

    /// The tag this body is written under.
    pub fn tag(&self) -> ChunkTag {
        match self {
            Self::Size(_) => ChunkTag::SIZE,
            Self::Voxels(_) => ChunkTag::XYZI,
            Self::Transform(_) => ChunkTag::TRANSFORM,
            Self::Shape(_) => ChunkTag::SHAPE,
            Self::Group(_) => ChunkTag::GROUP,
            Self::Palette(_) => ChunkTag::PALETTE,
            Self::Opaque { tag, .. } => *tag,
        }
    }

    /// Re-encodes the payload; the exact inverse of [`decode`](Self::decode).
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Self::Size(s) => {
                put_u32(&mut out, s.x);
                put_u32(&mut out, s.y);
                put_u32(&mut out, s.z);
            }
            Self::Voxels(v) => {
                out.reserve(4 + v.voxels.len() * 4);
                put_u32(&mut out, v.voxels.len() as u32);
                for voxel in &v.voxels {
                    out.extend_from_slice(&[voxel.x, voxel.y, voxel.z, voxel.color_index]);
                }
            }
            Self::Transform(t) => {
                put_i32(&mut out, t.node_id);
                put_dict(&mut out, &t.attributes);
                put_i32(&mut out, t.child_node_id);
                put_i32(&mut out, TRANSFORM_RESERVED_ID);
                put_i32(&mut out, t.layer_id);
                put_i32(&mut out, SINGLE_ENTRY);
                put_dict(&mut out, &t.frame);
            }
            Self::Shape(s) => {
                put_i32(&mut out, s.node_id);
                put_dict(&mut out, &s.attributes);
                put_i32(&mut out, SINGLE_ENTRY);
                put_i32(&mut out, s.model_id);
                put_dict(&mut out, &s.model_attributes);
            }
            Self::Group(g) => {
                put_i32(&mut out, g.node_id);
                put_dict(&mut out, &g.attributes);
                put_u32(&mut out, g.child_ids.len() as u32);
                for &id in &g.child_ids {
                    put_i32(&mut out, id);
                }
            }
            Self::Palette(p) => p.encode_into(&mut out),
            Self::Opaque { payload, .. } => out.extend_from_slice(payload),
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Chunk tree
// ---------------------------------------------------------------------------

/// One node of the chunk tree.
#[derive(Clone, Debug, PartialEq)]
pub struct Chunk {
    pub body: ChunkBody,
    pub children: Vec<Chunk>,
}

impl Chunk {
    /// Creates a leaf chunk.
    pub fn new(body: ChunkBody) -> Self {
        Self {
            body,
            children: Vec::new(),
        }
    }

    /// Creates an opaque chunk carrying `payload` unchanged.
    pub fn opaque(tag: ChunkTag, payload: Vec<u8>) -> Self {
        Self::new(ChunkBody::Opaque { tag, payload })
    }

    /// This chunk's tag.
    pub fn tag(&self) -> ChunkTag {
        self.body.tag()
    }

    /// Parses the chunk starting at `offset` in `buf`, children included.
    ///
    /// Returns the chunk and the offset just past its children region. The
    /// payload is decoded after the whole subtree has been read. Trees deeper
    /// than [`MAX_CHUNK_DEPTH`] fail with [`DecodeError::TooDeep`].
    pub fn parse(buf: &[u8], offset: usize) -> Result<(Self, usize), DecodeError> {
        Self::parse_at_depth(buf, offset, 0)
    }

    fn parse_at_depth(
        buf: &[u8],
        offset: usize,
        depth: usize,
    ) -> Result<(Self, usize), DecodeError> {
        if depth > MAX_CHUNK_DEPTH {
            return Err(DecodeError::TooDeep { offset });
        }
        let mut c = ByteCursor::at(buf, offset);
        let tag = ChunkTag(c.read_array()?);
        let content_size = c.read_u32()? as usize;
        let children_size = c.read_u32()? as usize;
        let payload = c.read_bytes(content_size)?;

        let start = c.position();
        if children_size > c.remaining() {
            return Err(DecodeError::Truncated {
                offset: start,
                needed: children_size,
                available: c.remaining(),
            });
        }
        let end = start + children_size;

        let mut children = Vec::new();
        let mut pos = start;
        while pos < end {
            let (child, next) = Self::parse_at_depth(buf, pos, depth + 1)?;
            if next > end {
                return Err(DecodeError::ChildOverrun { offset: pos, end });
            }
            children.push(child);
            pos = next;
        }

        let body = ChunkBody::decode(tag, payload)?;
        trace!(%tag, content_size, children = children.len(), "parsed chunk");
        Ok((Self { body, children }, end))
    }

    /// Number of bytes [`write_to`](Self::write_to) emits.
    pub fn encoded_len(&self) -> usize {
        CHUNK_HEADER_LEN + self.body.encode().len() + self.children_len()
    }

    fn children_len(&self) -> usize {
        self.children.iter().map(Chunk::encoded_len).sum()
    }

    /// Appends the header, payload, and children to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        let payload = self.body.encode();
        out.extend_from_slice(&self.tag().0);
        put_u32(out, payload.len() as u32);
        put_u32(out, self.children_len() as u32);
        out.extend_from_slice(&payload);
        for child in &self.children {
            child.write_to(out);
        }
    }

    /// Children with the given tag, in file order.
    pub fn children_with_tag(&self, tag: ChunkTag) -> impl Iterator<Item = &Chunk> {
        self.children.iter().filter(move |c| c.tag() == tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_chunk(tag: &[u8; 4], payload: &[u8], children: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(tag);
        put_u32(&mut out, payload.len() as u32);
        put_u32(&mut out, children.len() as u32);
        out.extend_from_slice(payload);
        out.extend_from_slice(children);
        out
    }

    fn transform(node_id: i32, child: i32) -> TransformNode {
        TransformNode {
            node_id,
            attributes: Dict::new(),
            child_node_id: child,
            layer_id: 0,
            frame: [("_t", "1 -2 3")].into_iter().collect(),
        }
    }

    #[test]
    fn test_tag_display() {
        assert_eq!(ChunkTag::TRANSFORM.to_string(), "nTRN");
        assert_eq!(ChunkTag([b'a', 0, b'b', 0xFF]).to_string(), "a\\x00b\\xff");
    }

    #[test]
    fn test_parse_size_chunk() {
        let bytes = raw_chunk(b"SIZE", &[4, 0, 0, 0, 5, 0, 0, 0, 6, 0, 0, 0], &[]);
        let (chunk, end) = Chunk::parse(&bytes, 0).unwrap();
        assert_eq!(end, bytes.len());
        assert_eq!(chunk.body, ChunkBody::Size(SizeChunk { x: 4, y: 5, z: 6 }));
    }

    #[test]
    fn test_parse_nested_children() {
        let size = raw_chunk(b"SIZE", &[1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0], &[]);
        let note = raw_chunk(b"NOTE", &[0, 0, 0, 0], &[]);
        let mut kids = size.clone();
        kids.extend_from_slice(&note);
        let main = raw_chunk(b"MAIN", &[], &kids);

        let (chunk, end) = Chunk::parse(&main, 0).unwrap();
        assert_eq!(end, main.len());
        assert_eq!(chunk.tag(), ChunkTag::MAIN);
        let tags: Vec<_> = chunk.children.iter().map(Chunk::tag).collect();
        assert_eq!(tags, [ChunkTag::SIZE, ChunkTag::NOTE]);

        let mut out = Vec::new();
        chunk.write_to(&mut out);
        assert_eq!(out, main);
        assert_eq!(chunk.encoded_len(), main.len());
    }

    #[test]
    fn test_unknown_tag_is_opaque() {
        let bytes = raw_chunk(b"IMAP", &[9, 8, 7], &[]);
        let (chunk, _) = Chunk::parse(&bytes, 0).unwrap();
        assert_eq!(chunk.tag(), ChunkTag(*b"IMAP"));
        assert_eq!(chunk.body.encode(), [9, 8, 7]);
    }

    #[test]
    fn test_transform_encoding_layout() {
        let body = ChunkBody::Transform(transform(2, 3));
        let bytes = body.encode();
        // node id, empty attributes, child id, reserved -1, layer 0, 1 frame
        assert_eq!(&bytes[0..4], &2i32.to_le_bytes());
        assert_eq!(&bytes[4..8], &0u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &3i32.to_le_bytes());
        assert_eq!(&bytes[12..16], &[0xFF; 4]);
        assert_eq!(&bytes[16..20], &0i32.to_le_bytes());
        assert_eq!(&bytes[20..24], &1i32.to_le_bytes());
        assert_eq!(ChunkBody::decode(ChunkTag::TRANSFORM, &bytes).unwrap(), body);
    }

    #[test]
    fn test_shape_and_group_decode() {
        let shape = ChunkBody::Shape(ShapeNode {
            node_id: 3,
            attributes: Dict::new(),
            model_id: 0,
            model_attributes: Dict::new(),
        });
        assert_eq!(
            ChunkBody::decode(ChunkTag::SHAPE, &shape.encode()).unwrap(),
            shape
        );

        let group = ChunkBody::Group(GroupNode {
            node_id: 1,
            attributes: Dict::new(),
            child_ids: vec![2, 4, 6],
        });
        assert_eq!(
            ChunkBody::decode(ChunkTag::GROUP, &group.encode()).unwrap(),
            group
        );
    }

    #[test]
    fn test_voxel_slot_is_index_minus_one() {
        let v = Voxel {
            x: 0,
            y: 0,
            z: 0,
            color_index: 6,
        };
        assert_eq!(v.slot(), Some(5));
        let empty = Voxel { color_index: 0, ..v };
        assert_eq!(empty.slot(), None);
    }

    #[test]
    fn test_truncated_voxel_list_is_rejected() {
        // count says 2 voxels but only one follows
        let payload = [2, 0, 0, 0, 1, 1, 1, 1];
        let result = ChunkBody::decode(ChunkTag::XYZI, &payload);
        assert!(matches!(result, Err(DecodeError::Truncated { .. })));
    }

    #[test]
    fn test_content_size_past_end_is_rejected() {
        let mut bytes = raw_chunk(b"NOTE", &[1, 2, 3, 4], &[]);
        bytes.truncate(14);
        assert!(matches!(
            Chunk::parse(&bytes, 0),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn test_deeply_nested_chunks_are_rejected() {
        // 300 empty chunks, each the only child of the one before.
        let mut bytes = raw_chunk(b"NEST", &[], &[]);
        for _ in 0..299 {
            bytes = raw_chunk(b"NEST", &[], &bytes);
        }

        let result = Chunk::parse(&bytes, 0);
        let offset = (MAX_CHUNK_DEPTH + 1) * CHUNK_HEADER_LEN;
        assert_eq!(result, Err(DecodeError::TooDeep { offset }));
    }

    #[test]
    fn test_nesting_at_depth_limit_is_accepted() {
        let mut bytes = raw_chunk(b"NEST", &[], &[]);
        for _ in 0..MAX_CHUNK_DEPTH {
            bytes = raw_chunk(b"NEST", &[], &bytes);
        }

        let (mut chunk, end) = Chunk::parse(&bytes, 0).unwrap();
        assert_eq!(end, bytes.len());
        let mut depth = 0;
        while let Some(child) = chunk.children.pop() {
            chunk = child;
            depth += 1;
        }
        assert_eq!(depth, MAX_CHUNK_DEPTH);
    }

    #[test]
    fn test_child_overrunning_parent_is_rejected() {
        let child = raw_chunk(b"NOTE", &[1, 2, 3, 4], &[]);
        // Parent claims only 12 bytes of children but the child needs 16.
        let mut main = Vec::new();
        main.extend_from_slice(b"MAIN");
        put_u32(&mut main, 0);
        put_u32(&mut main, 12);
        main.extend_from_slice(&child);

        let result = Chunk::parse(&main, 0);
        assert!(
            matches!(result, Err(DecodeError::ChildOverrun { offset: 12, end: 24 })),
            "expected ChildOverrun, got {result:?}"
        );
    }
}

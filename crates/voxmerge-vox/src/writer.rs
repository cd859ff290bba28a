//! Serializes a [`Container`] back into a `.vox` byte stream.
//!
//! ## Section Order
//!
//! 1. `VOX ` and the `u32` version
//! 2. `MAIN` header: content size 0, children size = all following bytes
//! 3. (`SIZE`, `XYZI`) pairs in model order
//! 4. The first `nTRN` followed by the `nGRP`
//! 5. Each remaining `nTRN` followed by the `nSHP` at the same position
//! 6. `MATL`, `LAYR`, `rOBJ`, `rCAM`, `NOTE`, then any unrecognized chunks
//! 7. `RGBA`
//!
//! Every child is written flat, with a children size of 0.

use std::path::Path;

use tracing::{debug, info};

use crate::chunk::{CHUNK_HEADER_LEN, Chunk, ChunkTag};
use crate::codec::put_u32;
use crate::container::{Container, FORMAT_VERSION, MAGIC};
use crate::error::VoxError;

/// Pass-through tags, in the order they are written.
const PASS_THROUGH: [ChunkTag; 5] = [
    ChunkTag::MATERIAL,
    ChunkTag::LAYER,
    ChunkTag::RENDER_OBJECT,
    ChunkTag::RENDER_CAMERA,
    ChunkTag::NOTE,
];

/// Tags the writer places explicitly.
const ORDERED: [ChunkTag; 12] = [
    ChunkTag::MAIN,
    ChunkTag::SIZE,
    ChunkTag::XYZI,
    ChunkTag::TRANSFORM,
    ChunkTag::SHAPE,
    ChunkTag::GROUP,
    ChunkTag::PALETTE,
    ChunkTag::MATERIAL,
    ChunkTag::LAYER,
    ChunkTag::RENDER_OBJECT,
    ChunkTag::RENDER_CAMERA,
    ChunkTag::NOTE,
];

/// Appends a chunk without its children.
fn write_flat(out: &mut Vec<u8>, chunk: &Chunk) {
    let payload = chunk.body.encode();
    out.extend_from_slice(&chunk.tag().0);
    put_u32(out, payload.len() as u32);
    put_u32(out, 0);
    out.extend_from_slice(&payload);
}

/// Encodes the children of `MAIN` in section order.
fn write_children(container: &Container, out: &mut Vec<u8>) {
    let mut sizes = container.chunks(ChunkTag::SIZE);
    let mut voxels = container.chunks(ChunkTag::XYZI);
    loop {
        match (sizes.next(), voxels.next()) {
            (None, None) => break,
            (size, vox) => {
                size.into_iter()
                    .chain(vox)
                    .for_each(|c| write_flat(out, c));
            }
        }
    }

    let mut transforms = container.chunks(ChunkTag::TRANSFORM);
    if let Some(first) = transforms.next() {
        write_flat(out, first);
    }
    for group in container.chunks(ChunkTag::GROUP) {
        write_flat(out, group);
    }

    let mut shapes = container.chunks(ChunkTag::SHAPE);
    loop {
        match (transforms.next(), shapes.next()) {
            (None, None) => break,
            (transform, shape) => {
                transform
                    .into_iter()
                    .chain(shape)
                    .for_each(|c| write_flat(out, c));
            }
        }
    }

    for tag in PASS_THROUGH {
        for chunk in container.chunks(tag) {
            write_flat(out, chunk);
        }
    }

    for chunk in &container.root().children {
        if !ORDERED.contains(&chunk.tag()) {
            write_flat(out, chunk);
        }
    }

    for palette in container.chunks(ChunkTag::PALETTE) {
        write_flat(out, palette);
    }
}

impl Container {
    /// Encodes the container with the default format version.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_bytes_with_version(FORMAT_VERSION)
    }

    /// Encodes the container, writing `version` into the header.
    pub fn to_bytes_with_version(&self, version: u32) -> Vec<u8> {
        let mut children = Vec::new();
        write_children(self, &mut children);

        let mut out = Vec::with_capacity(8 + CHUNK_HEADER_LEN + children.len());
        out.extend_from_slice(&MAGIC);
        put_u32(&mut out, version);
        out.extend_from_slice(&ChunkTag::MAIN.0);
        put_u32(&mut out, 0);
        put_u32(&mut out, children.len() as u32);
        out.extend_from_slice(&children);
        debug!(bytes = out.len(), version, "serialized container");
        out
    }

    /// Writes the container to `path`.
    pub fn save(&self, path: &Path, version: u32) -> Result<(), VoxError> {
        let bytes = self.to_bytes_with_version(version);
        std::fs::write(path, &bytes)?;
        info!(path = %path.display(), bytes = bytes.len(), "wrote vox file");
        Ok(())
    }
}

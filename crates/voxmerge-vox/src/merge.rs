//! Grafts shapes from one container into another.
//!
//! Colors of an incoming shape are placed into the target palette with a
//! [`SlotAllocator`], the shape's voxels are rewritten to the new slots, and
//! its nodes are renumbered past the highest node id of the target before
//! the chunks are appended.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::container::{Container, DetachedShape};
use crate::error::VoxError;
use crate::palette::SlotAllocator;

/// Tunables for a merge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOptions {
    /// Keep relocated colors inside their material band.
    pub preserve_material_category: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            preserve_material_category: true,
        }
    }
}

/// Outcome of grafting one shape.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Node id given to the incoming transform.
    pub transform_id: i32,
    /// Node id given to the incoming shape node.
    pub shape_id: i32,
    /// Model index given to the incoming shape node.
    pub model_id: i32,
    /// Colors copied into free palette slots.
    pub colors_allocated: usize,
    /// Colors that borrowed the nearest existing target color.
    pub colors_matched: usize,
}

/// Grafts `shape` into `target`.
///
/// The shape is consumed; its chunks become children of the target's root.
pub fn merge_shape(
    target: &mut Container,
    mut shape: DetachedShape,
    options: MergeOptions,
) -> Result<MergeReport, VoxError> {
    let highest = target.max_node_id();
    let (Some(transform_id), Some(shape_id)) = (highest.checked_add(1), highest.checked_add(2))
    else {
        return Err(VoxError::Structure(format!("no node ids left above {highest}")));
    };
    let model_id = target.shape_nodes().count() as i32;

    let in_use = target.slots_in_use();
    let to_merge: BTreeSet<u8> = shape.voxels.voxels.iter().filter_map(|v| v.slot()).collect();

    let remap = SlotAllocator::new(
        target.palette_mut(),
        in_use,
        options.preserve_material_category,
    )
    .remap(&shape.palette, to_merge)?;

    for voxel in &mut shape.voxels.voxels {
        voxel.color_index = remap.remap_index(voxel.color_index);
    }

    debug!(
        old_transform = shape.transform.node_id,
        old_shape = shape.node.node_id,
        transform_id,
        shape_id,
        model_id,
        "renumbering shape"
    );
    shape.transform.node_id = transform_id;
    shape.transform.child_node_id = shape_id;
    shape.node.node_id = shape_id;
    shape.node.model_id = model_id;

    target.graft(shape.transform, shape.node, shape.size, shape.voxels);
    target.group_mut().child_ids.push(transform_id);

    Ok(MergeReport {
        transform_id,
        shape_id,
        model_id,
        colors_allocated: remap.allocated(),
        colors_matched: remap.matched(),
    })
}

impl Container {
    /// Grafts every shape of `source` into this container, in model order.
    pub fn merge(
        &mut self,
        source: Container,
        options: MergeOptions,
    ) -> Result<Vec<MergeReport>, VoxError> {
        let mut reports = Vec::new();
        for shape in source.detach_shapes()? {
            reports.push(merge_shape(self, shape, options)?);
        }
        let allocated: usize = reports.iter().map(|r| r.colors_allocated).sum();
        let matched: usize = reports.iter().map(|r| r.colors_matched).sum();
        info!(
            shapes = reports.len(),
            colors_allocated = allocated,
            colors_matched = matched,
            "merged container"
        );
        Ok(reports)
    }
}

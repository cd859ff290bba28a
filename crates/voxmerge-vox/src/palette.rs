//! Indexed color palette, material category bands, and slot allocation.
//!
//! A palette holds 256 colors. Slot 0 is reserved; voxels refer to slot `s`
//! with color index `s + 1`, so the slots a voxel can reach while leaving
//! slot 0 alone are `1..255`.
//!
//! MagicaVoxel groups palette slots into contiguous bands by physical
//! material. When colors are moved between palettes they stay inside their
//! band if the caller asks for it.

use std::ops::Range;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::codec::DecodeError;
use crate::error::VoxError;

/// Number of entries in a palette.
pub const PALETTE_LEN: usize = 256;

/// Slots that may be assigned to merged colors.
pub const USABLE_SLOTS: Range<usize> = 1..255;

// ---------------------------------------------------------------------------
// Colors
// ---------------------------------------------------------------------------

/// One palette color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Squared Euclidean distance over all four channels.
    pub fn distance_sq(self, other: Self) -> u32 {
        let d = |a: u8, b: u8| {
            let d = a.abs_diff(b) as u32;
            d * d
        };
        d(self.r, other.r) + d(self.g, other.g) + d(self.b, other.b) + d(self.a, other.a)
    }

    /// Euclidean distance over all four channels.
    pub fn distance(self, other: Self) -> f64 {
        f64::from(self.distance_sq(other)).sqrt()
    }
}

/// The 256-color table of an `RGBA` chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    colors: Box<[Rgba; PALETTE_LEN]>,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            colors: Box::new([Rgba::default(); PALETTE_LEN]),
        }
    }
}

impl Palette {
    /// Builds a palette from explicit colors.
    pub fn from_colors(colors: [Rgba; PALETTE_LEN]) -> Self {
        Self {
            colors: Box::new(colors),
        }
    }

    /// Decodes an `RGBA` payload of exactly 256 × 4 bytes.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() != PALETTE_LEN * 4 {
            return Err(DecodeError::PaletteLength(payload.len()));
        }
        let mut palette = Self::default();
        for (slot, c) in payload.chunks_exact(4).enumerate() {
            palette.colors[slot] = Rgba::new(c[0], c[1], c[2], c[3]);
        }
        Ok(palette)
    }

    /// Appends the 1024-byte payload to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.reserve(PALETTE_LEN * 4);
        for c in self.colors.iter() {
            out.extend_from_slice(&[c.r, c.g, c.b, c.a]);
        }
    }

    /// Color at `slot`.
    pub fn get(&self, slot: u8) -> Rgba {
        self.colors[slot as usize]
    }

    /// Overwrites the color at `slot`.
    pub fn set(&mut self, slot: u8, color: Rgba) {
        self.colors[slot as usize] = color;
    }
}

// ---------------------------------------------------------------------------
// Material bands
// ---------------------------------------------------------------------------

/// Physical material class associated with a band of palette slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaterialCategory {
    Glass,
    Grass,
    Dirt,
    Rock,
    Wood,
    Concrete,
    Brick,
    Plaster,
    WeakMetal,
    HeavyMetal,
    Plastic,
    Reserved,
    Unphysical,
}

/// A contiguous, half-open range of palette slots with one category.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaterialBand {
    pub category: MaterialCategory,
    pub start: u8,
    pub end: u8,
}

impl MaterialBand {
    const fn new(category: MaterialCategory, start: u8, end: u8) -> Self {
        Self {
            category,
            start,
            end,
        }
    }

    /// Slots covered by this band.
    pub fn slots(&self) -> Range<usize> {
        self.start as usize..self.end as usize
    }

    /// Returns `true` if `slot` lies inside the band.
    pub fn contains(&self, slot: u8) -> bool {
        (self.start..self.end).contains(&slot)
    }
}

/// Band table covering [`USABLE_SLOTS`] without gaps, in slot order.
pub const MATERIAL_BANDS: [MaterialBand; 14] = [
    MaterialBand::new(MaterialCategory::Glass, 1, 9),
    MaterialBand::new(MaterialCategory::Grass, 9, 25),
    MaterialBand::new(MaterialCategory::Dirt, 25, 41),
    MaterialBand::new(MaterialCategory::Rock, 41, 57),
    MaterialBand::new(MaterialCategory::Wood, 57, 73),
    MaterialBand::new(MaterialCategory::Concrete, 73, 89),
    MaterialBand::new(MaterialCategory::Brick, 89, 105),
    MaterialBand::new(MaterialCategory::Plaster, 105, 121),
    MaterialBand::new(MaterialCategory::WeakMetal, 121, 137),
    MaterialBand::new(MaterialCategory::HeavyMetal, 137, 153),
    MaterialBand::new(MaterialCategory::Plastic, 153, 169),
    MaterialBand::new(MaterialCategory::Reserved, 169, 185),
    MaterialBand::new(MaterialCategory::Unphysical, 185, 201),
    MaterialBand::new(MaterialCategory::Reserved, 201, 255),
];

impl MaterialCategory {
    /// Band containing `slot`, or `None` for the reserved slots 0 and 255.
    pub fn band_of(slot: u8) -> Option<&'static MaterialBand> {
        MATERIAL_BANDS.iter().find(|band| band.contains(slot))
    }

    /// Category of `slot`, if it lies in a band.
    pub fn of_slot(slot: u8) -> Option<Self> {
        Self::band_of(slot).map(|band| band.category)
    }
}

// ---------------------------------------------------------------------------
// Slot allocation
// ---------------------------------------------------------------------------

/// How a source color ended up in the target palette.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotAssignment {
    /// Copied into a free slot.
    Allocated(u8),
    /// No free slot; borrows the closest existing target color.
    Nearest(u8),
}

impl SlotAssignment {
    /// Target slot the color maps to.
    pub fn slot(self) -> u8 {
        match self {
            Self::Allocated(s) | Self::Nearest(s) => s,
        }
    }
}

/// Result of placing a set of source colors into a target palette.
#[derive(Clone, Debug, Default)]
pub struct ColorRemap {
    assignments: FxHashMap<u8, SlotAssignment>,
}

impl ColorRemap {
    /// Target slot for source slot `from`, if it was part of the remap.
    pub fn target_slot(&self, from: u8) -> Option<u8> {
        self.assignments.get(&from).map(|a| a.slot())
    }

    /// Rewrites a 1-based voxel color index. Index 0 and unmapped colors are
    /// returned unchanged.
    pub fn remap_index(&self, color_index: u8) -> u8 {
        match color_index
            .checked_sub(1)
            .and_then(|slot| self.target_slot(slot))
        {
            Some(target) => target + 1,
            None => color_index,
        }
    }

    /// Number of colors copied into free slots.
    pub fn allocated(&self) -> usize {
        self.assignments
            .values()
            .filter(|a| matches!(a, SlotAssignment::Allocated(_)))
            .count()
    }

    /// Number of colors that fell back to a nearest match.
    pub fn matched(&self) -> usize {
        self.assignments.len() - self.allocated()
    }

    /// Number of source colors remapped.
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Returns `true` if no colors were remapped.
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

/// Places source colors into a target palette.
///
/// Tracks which target slots are referenced by voxels (`in_use`) and which
/// slots were handed out during this allocation (`claimed`). A nearest-color
/// fallback avoids claimed slots as long as any unclaimed candidate exists.
pub struct SlotAllocator<'a> {
    palette: &'a mut Palette,
    in_use: [bool; PALETTE_LEN],
    claimed: [bool; PALETTE_LEN],
    preserve_category: bool,
}

impl<'a> SlotAllocator<'a> {
    /// Creates an allocator over `palette`; `in_use` marks slots already
    /// referenced by voxels of the target.
    pub fn new(palette: &'a mut Palette, in_use: [bool; PALETTE_LEN], preserve_category: bool) -> Self {
        Self {
            palette,
            in_use,
            claimed: [false; PALETTE_LEN],
            preserve_category,
        }
    }

    /// Candidate slots for a color currently at `slot` in its source palette.
    pub fn candidates(&self, slot: u8) -> Range<usize> {
        if self.preserve_category
            && let Some(band) = MaterialCategory::band_of(slot)
        {
            return band.slots();
        }
        USABLE_SLOTS
    }

    /// Finds or allocates a target slot for `color`, which sits at `slot` in
    /// the source palette.
    pub fn assign(&mut self, slot: u8, color: Rgba) -> Result<SlotAssignment, VoxError> {
        let candidates = self.candidates(slot);
        if candidates.is_empty() {
            return Err(VoxError::EmptyBand { slot });
        }

        if let Some(free) = candidates.clone().find(|&s| !self.in_use[s]) {
            self.in_use[free] = true;
            self.claimed[free] = true;
            self.palette.set(free as u8, color);
            debug!(from = slot, to = free, "allocated palette slot");
            return Ok(SlotAssignment::Allocated(free as u8));
        }

        let unclaimed = candidates.clone().any(|s| !self.claimed[s]);
        let nearest = candidates
            .filter(|&s| !unclaimed || !self.claimed[s])
            .min_by_key(|&s| (self.palette.get(s as u8).distance_sq(color), s))
            .ok_or(VoxError::EmptyBand { slot })?;
        self.claimed[nearest] = true;
        warn!(
            from = slot,
            to = nearest,
            distance = self.palette.get(nearest as u8).distance(color),
            "no free palette slot, using nearest color"
        );
        Ok(SlotAssignment::Nearest(nearest as u8))
    }

    /// Assigns every slot in `slots` (ascending) using colors from `source`.
    pub fn remap(
        &mut self,
        source: &Palette,
        slots: impl IntoIterator<Item = u8>,
    ) -> Result<ColorRemap, VoxError> {
        let mut remap = ColorRemap::default();
        for slot in slots {
            let assignment = self.assign(slot, source.get(slot))?;
            remap.assignments.insert(slot, assignment);
        }
        Ok(remap)
    }
}

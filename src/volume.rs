//! The uniform decoded-schematic value produced by the loader.
//!
//! Cells are stored densely in XZY order: X varies fastest, then Z,
//! then Y. Linear index `i` maps to
//! `(x = i % W, z = (i / W) % L, y = i / (W * L))`.

use crate::error::{Result, SchemError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Pre-flattening: numeric IDs + 4-bit metadata, no palette.
    Classic,
    /// Palette + bit-packed or varint cell indices at the root.
    Modern,
    /// Modern data nested under a `Blocks` compound.
    StatesWrapped,
    /// Loose (palette, block-array) pair found by the fallback search.
    Generic,
}

/// Block content, split by how the dialect stores cells.
#[derive(Debug, Clone)]
pub enum BlockStorage {
    /// Palette of Java descriptors plus one palette index per cell.
    Paletted { palette: Vec<String>, cells: Vec<u32> },
    /// Numeric block IDs (8 or 12 bits) plus 4-bit metadata per cell.
    Legacy { blocks: Vec<u16>, data: Vec<u8> },
}

#[derive(Debug, Clone)]
pub struct Volume {
    pub width: u32,
    pub height: u32,
    pub length: u32,
    pub dialect: Dialect,
    pub storage: BlockStorage,
}

impl Volume {
    pub fn new(
        width: i64,
        height: i64,
        length: i64,
        dialect: Dialect,
        storage: BlockStorage,
    ) -> Result<Self> {
        if width < 0 || height < 0 || length < 0 {
            return Err(SchemError::DimensionMismatch(format!(
                "negative dimensions {width}x{height}x{length}"
            )));
        }
        let product = (width as u64) * (height as u64) * (length as u64);
        if product > u32::MAX as u64 {
            return Err(SchemError::DimensionMismatch(format!(
                "volume {product} does not fit in 32 bits"
            )));
        }
        let volume = product as usize;

        match &storage {
            BlockStorage::Paletted { palette, cells } => {
                if cells.len() != volume {
                    return Err(SchemError::DimensionMismatch(format!(
                        "decoded {} cells for a {volume}-cell volume",
                        cells.len()
                    )));
                }
                if let Some(&max) = cells.iter().max() {
                    if max as usize >= palette.len() {
                        return Err(SchemError::DimensionMismatch(format!(
                            "cell index {max} outside palette of {}",
                            palette.len()
                        )));
                    }
                }
            }
            BlockStorage::Legacy { blocks, data } => {
                if blocks.len() != volume || data.len() != volume {
                    return Err(SchemError::DimensionMismatch(format!(
                        "decoded {} ids / {} metadata for a {volume}-cell volume",
                        blocks.len(),
                        data.len()
                    )));
                }
            }
        }

        Ok(Volume {
            width: width as u32,
            height: height as u32,
            length: length as u32,
            dialect,
            storage,
        })
    }

    pub fn volume(&self) -> usize {
        self.width as usize * self.height as usize * self.length as usize
    }

    #[inline]
    pub fn index(&self, x: u32, y: u32, z: u32) -> usize {
        (x as usize)
            + (z as usize) * self.width as usize
            + (y as usize) * self.width as usize * self.length as usize
    }

    #[inline]
    pub fn coords(&self, index: usize) -> (u32, u32, u32) {
        let w = self.width as usize;
        let wl = w * self.length as usize;
        (
            (index % w) as u32,
            (index / wl) as u32,
            ((index / w) % self.length as usize) as u32,
        )
    }
}

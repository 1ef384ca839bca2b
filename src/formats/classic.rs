//! Pre-flattening block storage: numeric IDs plus 4-bit metadata.

use crate::error::{Result, SchemError};
use crate::nbt::Compound;

/// Decode `Blocks` / `AddBlocks` (or `Add`) / `Data` into per-cell
/// numeric IDs and metadata.
///
/// `Blocks` carries the low 8 bits of each ID. The optional add array
/// packs the high 4 bits of two cells per byte: the even cell in the
/// high nibble, the odd cell in the low nibble. Metadata is the low
/// 4 bits of each `Data` byte; a missing `Data` means all zeros.
pub fn decode(root: &Compound, volume: usize) -> Result<(Vec<u16>, Vec<u8>)> {
    let blocks = root
        .get("Blocks")
        .and_then(|t| t.byte_array())
        .ok_or_else(|| {
            SchemError::UnsupportedEncoding("classic schematic without a Blocks byte array".into())
        })?;
    if blocks.len() != volume {
        return Err(SchemError::DimensionMismatch(format!(
            "Blocks holds {} entries for a {volume}-cell volume",
            blocks.len()
        )));
    }

    let add = match root.get("AddBlocks").or_else(|| root.get("Add")) {
        Some(tag) => {
            let add = tag.byte_array().ok_or_else(|| {
                SchemError::UnsupportedEncoding("AddBlocks is not a byte array".into())
            })?;
            if add.len() < (volume + 1) / 2 {
                return Err(SchemError::DimensionMismatch(format!(
                    "AddBlocks holds {} bytes, {} needed for {volume} cells",
                    add.len(),
                    (volume + 1) / 2
                )));
            }
            Some(add)
        }
        None => None,
    };

    let mut ids = Vec::with_capacity(volume);
    for i in 0..volume {
        let low = blocks[i] as u8 as u16;
        let high = match add {
            Some(add) => {
                let byte = add[i / 2] as u8;
                if i % 2 == 0 {
                    (byte >> 4) as u16
                } else {
                    (byte & 0x0F) as u16
                }
            }
            None => 0,
        };
        ids.push((high << 8) | low);
    }

    let data = match root.get("Data").and_then(|t| t.byte_array()) {
        Some(data) => {
            if data.len() != volume {
                return Err(SchemError::DimensionMismatch(format!(
                    "Data holds {} entries for a {volume}-cell volume",
                    data.len()
                )));
            }
            data.iter().map(|&b| b as u8 & 0x0F).collect()
        }
        None => vec![0u8; volume],
    };

    Ok((ids, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nbt::Tag;

    fn root(entries: Vec<(&str, Tag)>) -> Compound {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn plain_blocks_and_data() {
        let c = root(vec![
            ("Blocks", Tag::ByteArray(vec![1, 1, 4])),
            ("Data", Tag::ByteArray(vec![0, 0, 2])),
        ]);
        let (ids, data) = decode(&c, 3).unwrap();
        assert_eq!(ids, vec![1, 1, 4]);
        assert_eq!(data, vec![0, 0, 2]);
    }

    #[test]
    fn missing_data_is_zeros() {
        let c = root(vec![("Blocks", Tag::ByteArray(vec![1, 2]))]);
        let (_, data) = decode(&c, 2).unwrap();
        assert_eq!(data, vec![0, 0]);
    }

    #[test]
    fn add_nibbles_extend_ids() {
        // cells 0..3 with high nibbles 0x1, 0x2, 0x3 (odd count pads low nibble)
        let c = root(vec![
            ("Blocks", Tag::ByteArray(vec![0x10u8 as i8, 0x20u8 as i8, 0x30u8 as i8])),
            ("AddBlocks", Tag::ByteArray(vec![0x12u8 as i8, 0x30u8 as i8])),
        ]);
        let (ids, _) = decode(&c, 3).unwrap();
        assert_eq!(ids, vec![0x110, 0x220, 0x330]);
    }

    #[test]
    fn short_add_is_fatal() {
        let c = root(vec![
            ("Blocks", Tag::ByteArray(vec![1, 1, 1, 1, 1])),
            ("Add", Tag::ByteArray(vec![0])),
        ]);
        let err = decode(&c, 5).unwrap_err();
        assert!(matches!(err, SchemError::DimensionMismatch(_)));
    }

    #[test]
    fn metadata_keeps_low_nibble_only() {
        let c = root(vec![
            ("Blocks", Tag::ByteArray(vec![1])),
            ("Data", Tag::ByteArray(vec![0x5Fu8 as i8])),
        ]);
        let (_, data) = decode(&c, 1).unwrap();
        assert_eq!(data, vec![0x0F]);
    }
}

//! Cell decoders for palette-indexed block storage.

use crate::error::{Result, SchemError};
use crate::nbt::Tag;

/// Bits per packed entry for a palette of `palette_len` descriptors.
/// Floored at 4, matching the writers of this format.
pub fn bits_per_entry(palette_len: usize) -> usize {
    let needed = if palette_len <= 1 {
        0
    } else {
        (usize::BITS - (palette_len - 1).leading_zeros()) as usize
    };
    needed.max(4)
}

/// Unpack `volume` palette indices from a packed 64-bit-int array.
///
/// Entries straddle long boundaries: when an entry starts near the top
/// of a long, its high bits are spliced in from the next one. Longs are
/// treated as unsigned for shifting.
pub fn unpack_longs(longs: &[i64], volume: usize, palette_len: usize) -> Result<Vec<u32>> {
    let bpe = bits_per_entry(palette_len);
    let required = (volume * bpe + 63) / 64;
    if longs.len() < required {
        return Err(SchemError::DimensionMismatch(format!(
            "packed block states hold {} longs, {required} needed for {volume} cells at {bpe} bits",
            longs.len()
        )));
    }

    let mask = (1u64 << bpe) - 1;
    let mut cells = Vec::with_capacity(volume);
    for i in 0..volume {
        let bit_index = i * bpe;
        let long_index = bit_index / 64;
        let start_bit = bit_index % 64;

        let mut value = (longs[long_index] as u64) >> start_bit;
        if start_bit + bpe > 64 {
            value |= (longs[long_index + 1] as u64) << (64 - start_bit);
        }
        cells.push((value & mask) as u32);
    }
    Ok(cells)
}

/// Decode `volume` LEB128 varints (7-bit little-endian groups with a
/// continuation bit).
pub fn decode_varints(bytes: &[i8], volume: usize) -> Result<Vec<u32>> {
    let mut cells = Vec::with_capacity(volume);
    let mut pos = 0usize;
    for _ in 0..volume {
        let mut value: u64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = *bytes.get(pos).ok_or_else(|| {
                SchemError::DimensionMismatch(format!(
                    "varint stream ended after {} of {volume} cells",
                    cells.len()
                ))
            })? as u8;
            pos += 1;
            value |= ((byte & 0x7F) as u64) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
            if shift > 35 {
                return Err(SchemError::UnsupportedEncoding(
                    "varint wider than 35 bits".to_string(),
                ));
            }
        }
        cells.push(value as u32);
    }
    Ok(cells)
}

/// Decode a raw index array: an int array of exactly `volume` entries is
/// copied, a byte array of exactly `volume` entries is widened, and any
/// other byte array is read as varints.
pub fn decode_raw(tag: &Tag, volume: usize) -> Result<Vec<u32>> {
    match tag {
        Tag::IntArray(ints) => {
            if ints.len() != volume {
                return Err(SchemError::DimensionMismatch(format!(
                    "raw index array holds {} entries for a {volume}-cell volume",
                    ints.len()
                )));
            }
            Ok(ints.iter().map(|&v| v as u32).collect())
        }
        Tag::ByteArray(bytes) => {
            if bytes.len() == volume {
                Ok(bytes.iter().map(|&b| b as u8 as u32).collect())
            } else {
                decode_varints(bytes, volume)
            }
        }
        other => Err(SchemError::UnsupportedEncoding(format!(
            "block index array has kind {}",
            other.kind_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack_longs(values: &[u32], bpe: usize) -> Vec<i64> {
        let mut longs = vec![0i64; (values.len() * bpe + 63) / 64];
        let mask = (1u64 << bpe) - 1;
        for (i, &value) in values.iter().enumerate() {
            let bit_index = i * bpe;
            let long_index = bit_index / 64;
            let start_bit = bit_index % 64;
            let v = value as u64 & mask;
            longs[long_index] |= (v << start_bit) as i64;
            if start_bit + bpe > 64 {
                longs[long_index + 1] |= (v >> (64 - start_bit)) as i64;
            }
        }
        longs
    }

    fn encode_varints(values: &[u32]) -> Vec<i8> {
        let mut out = Vec::new();
        for &value in values {
            let mut v = value;
            loop {
                let mut byte = (v & 0x7F) as u8;
                v >>= 7;
                if v != 0 {
                    byte |= 0x80;
                }
                out.push(byte as i8);
                if v == 0 {
                    break;
                }
            }
        }
        out
    }

    #[test]
    fn bits_per_entry_floors_at_four() {
        assert_eq!(bits_per_entry(0), 4);
        assert_eq!(bits_per_entry(1), 4);
        assert_eq!(bits_per_entry(16), 4);
        assert_eq!(bits_per_entry(17), 5);
        assert_eq!(bits_per_entry(4096), 12);
    }

    #[test]
    fn packed_roundtrip_all_widths() {
        for bpe in 4..=12usize {
            let palette_len = 1usize << bpe;
            let count = 200;
            let values: Vec<u32> = (0..count).map(|i| (i * 7 % palette_len) as u32).collect();
            let longs = pack_longs(&values, bpe);
            assert_eq!(
                unpack_longs(&longs, count, palette_len).unwrap(),
                values,
                "bpe {bpe}"
            );
        }
    }

    #[test]
    fn packed_entries_straddle_longs() {
        // 5-bit entries: entry 12 occupies bits 60..65 and spans two longs.
        let values: Vec<u32> = (0..20).map(|i| (i % 32) as u32).collect();
        let longs = pack_longs(&values, 5);
        assert_eq!(unpack_longs(&longs, 20, 32).unwrap(), values);
    }

    #[test]
    fn packed_short_input_is_fatal() {
        let err = unpack_longs(&[0], 100, 16).unwrap_err();
        assert!(matches!(err, SchemError::DimensionMismatch(_)));
    }

    #[test]
    fn varint_roundtrip() {
        let values = vec![0, 1, 127, 128, 300, 16384, u32::MAX];
        let bytes = encode_varints(&values);
        assert_eq!(decode_varints(&bytes, values.len()).unwrap(), values);
    }

    #[test]
    fn varint_premature_end_is_fatal() {
        let bytes = encode_varints(&[1, 2, 3]);
        let err = decode_varints(&bytes, 4).unwrap_err();
        assert!(matches!(err, SchemError::DimensionMismatch(_)));
    }

    #[test]
    fn varint_overflow_is_fatal() {
        let bytes: Vec<i8> = vec![-1, -1, -1, -1, -1, -1];
        let err = decode_varints(&bytes, 1).unwrap_err();
        assert!(matches!(err, SchemError::UnsupportedEncoding(_)));
    }

    #[test]
    fn raw_int_array_is_copied() {
        let tag = Tag::IntArray(vec![0, 1, 2]);
        assert_eq!(decode_raw(&tag, 3).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn raw_byte_array_is_widened_unsigned() {
        let tag = Tag::ByteArray(vec![0, -1, 2]);
        assert_eq!(decode_raw(&tag, 3).unwrap(), vec![0, 255, 2]);
    }

    #[test]
    fn raw_byte_array_of_other_length_is_varints() {
        // [128, 1] as two varint cells needs three bytes
        let tag = Tag::ByteArray(vec![-128i8, 1, 1]);
        assert_eq!(decode_raw(&tag, 2).unwrap(), vec![128, 1]);
    }
}

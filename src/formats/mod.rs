//! Dialect classification and volume loading.
//!
//! The root compound is classified as one of four dialects (first match
//! wins): states_wrapped, modern, classic, or a generic fallback that
//! hunts for a (palette, block-array) pair. All of them materialise the
//! same [`Volume`] value.

pub mod classic;
pub mod modern;

use tracing::debug;

use crate::block_state::BlockState;
use crate::error::{Result, SchemError};
use crate::nbt::{Compound, Tag};
use crate::volume::{BlockStorage, Dialect, Volume};

/// Field names that identify palette-indexed storage inside a wrapping
/// `Blocks` compound.
const WRAPPED_KEYS: [&str; 5] = [
    "Palette",
    "BlockStatePalette",
    "BlockStates",
    "BlockData",
    "Data",
];

pub fn load(root: &Tag) -> Result<Volume> {
    let mut root = root
        .as_compound()
        .ok_or_else(|| SchemError::UnknownDialect("root is not a compound".into()))?;

    // Some writers nest everything under a `Schematic` wrapper.
    if let Some(Tag::Compound(inner)) = root.get("Schematic") {
        root = inner;
    }

    let (width, height, length) = read_dimensions(root)?;
    let volume = checked_volume(width, height, length)?;

    // 1. states_wrapped: a `Blocks` compound that carries the storage.
    if let Some(Tag::Compound(blocks)) = root.get("Blocks") {
        if WRAPPED_KEYS.iter().any(|k| blocks.contains_key(*k)) {
            debug!(width, height, length, "states_wrapped dialect");
            return load_paletted(blocks, width, height, length, volume, Dialect::StatesWrapped);
        }
    }

    // 2. modern: palette and a block array at the root.
    let has_palette = root.contains_key("Palette") || root.contains_key("BlockStatePalette");
    let has_blocks = ["BlockStates", "BlockData", "Blocks", "Data"]
        .iter()
        .any(|k| root.contains_key(*k));
    if has_palette && has_blocks {
        debug!(width, height, length, "modern dialect");
        return load_paletted(root, width, height, length, volume, Dialect::Modern);
    }

    // 3. classic: explicit dimensions plus legacy ID arrays.
    let has_whl = root.contains_key("Width")
        && root.contains_key("Height")
        && root.contains_key("Length");
    let has_legacy = ["Blocks", "Data", "BlockData"]
        .iter()
        .any(|k| root.contains_key(*k));
    if has_whl && has_legacy {
        debug!(width, height, length, "classic dialect");
        let (blocks, data) = classic::decode(root, volume)?;
        return Volume::new(
            width,
            height,
            length,
            Dialect::Classic,
            BlockStorage::Legacy { blocks, data },
        );
    }

    // 4. fallback: look for any palette-shaped child next to any block
    // array, in the root or inside `Blocks`, and treat the pair with
    // modern semantics.
    if let Some((palette_tag, cells_tag)) = generic_search(root, volume) {
        debug!(width, height, length, "generic fallback dialect");
        let palette = materialise_palette(palette_tag)?;
        let cells = decode_cells(cells_tag, volume, palette.len())?;
        return Volume::new(
            width,
            height,
            length,
            Dialect::Generic,
            BlockStorage::Paletted { palette, cells },
        );
    }

    Err(SchemError::UnknownDialect(
        "no palette, block array or legacy ID storage found".into(),
    ))
}

fn checked_volume(width: i64, height: i64, length: i64) -> Result<usize> {
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
    Ok(product as usize)
}

/// Dimensions come from a `Size` list of at least three entries when
/// present, otherwise from `Width`/`Height`/`Length` scalars.
fn read_dimensions(root: &Compound) -> Result<(i64, i64, i64)> {
    if let Some(Tag::List(size)) = root.get("Size") {
        if size.len() >= 3 {
            if let (Some(w), Some(h), Some(l)) =
                (size[0].as_int(), size[1].as_int(), size[2].as_int())
            {
                return Ok((w, h, l));
            }
        }
    }

    let scalar = |key: &str| root.get(key).and_then(Tag::as_int);
    match (scalar("Width"), scalar("Height"), scalar("Length")) {
        (Some(w), Some(h), Some(l)) => Ok((w, h, l)),
        _ => Err(SchemError::DimensionMismatch(
            "missing dimensions (no Size list and no Width/Height/Length)".into(),
        )),
    }
}

fn load_paletted(
    container: &Compound,
    width: i64,
    height: i64,
    length: i64,
    volume: usize,
    dialect: Dialect,
) -> Result<Volume> {
    let palette_tag = container
        .get("Palette")
        .or_else(|| container.get("BlockStatePalette"))
        .ok_or_else(|| {
            SchemError::UnknownDialect("palette-indexed storage without a palette".into())
        })?;
    let palette = materialise_palette(palette_tag)?;

    let cells = if let Some(tag) = container.get("BlockStates") {
        let longs = tag.long_array().ok_or_else(|| {
            SchemError::UnsupportedEncoding(format!(
                "BlockStates must be a 64-bit int array, found {}",
                tag.kind_name()
            ))
        })?;
        modern::unpack_longs(longs, volume, palette.len())?
    } else if let Some(tag) = container.get("BlockData") {
        let bytes = tag.byte_array().ok_or_else(|| {
            SchemError::UnsupportedEncoding(format!(
                "BlockData must be a byte array, found {}",
                tag.kind_name()
            ))
        })?;
        modern::decode_varints(bytes, volume)?
    } else if let Some(tag) = container.get("Blocks").or_else(|| container.get("Data")) {
        modern::decode_raw(tag, volume)?
    } else {
        return Err(SchemError::UnknownDialect(
            "palette present but no block array alongside it".into(),
        ));
    };

    Volume::new(
        width,
        height,
        length,
        dialect,
        BlockStorage::Paletted { palette, cells },
    )
}

fn decode_cells(tag: &Tag, volume: usize, palette_len: usize) -> Result<Vec<u32>> {
    match tag {
        Tag::LongArray(longs) => modern::unpack_longs(longs, volume, palette_len),
        _ => modern::decode_raw(tag, volume),
    }
}

/// Materialise either palette shape into an index → descriptor table.
fn materialise_palette(tag: &Tag) -> Result<Vec<String>> {
    match tag {
        // List form: compounds of `{Name, Properties?}`.
        Tag::List(entries) => {
            let mut palette = Vec::with_capacity(entries.len());
            for entry in entries {
                let compound = entry.as_compound().ok_or_else(|| {
                    SchemError::UnsupportedEncoding(format!(
                        "palette entry is a {}, not a compound",
                        entry.kind_name()
                    ))
                })?;
                palette.push(descriptor_from_entry(compound)?);
            }
            Ok(palette)
        }
        // Object form: descriptor string → integer index.
        Tag::Compound(map) => {
            let mut pairs = Vec::with_capacity(map.len());
            let mut max_index = 0usize;
            for (descriptor, value) in map {
                let index = value.as_int().ok_or_else(|| {
                    SchemError::UnsupportedEncoding(format!(
                        "palette index for {descriptor:?} is a {}, not an integer",
                        value.kind_name()
                    ))
                })?;
                if index < 0 {
                    return Err(SchemError::UnsupportedEncoding(format!(
                        "negative palette index {index} for {descriptor:?}"
                    )));
                }
                max_index = max_index.max(index as usize);
                pairs.push((descriptor.clone(), index as usize));
            }
            // Indices the compound never names resolve to air so a
            // sparse table cannot send cells out of bounds.
            let len = if pairs.is_empty() { 0 } else { max_index + 1 };
            let mut palette = vec!["minecraft:air".to_string(); len];
            for (descriptor, index) in pairs {
                palette[index] = descriptor;
            }
            Ok(palette)
        }
        other => Err(SchemError::UnsupportedEncoding(format!(
            "palette has kind {}",
            other.kind_name()
        ))),
    }
}

fn descriptor_from_entry(compound: &Compound) -> Result<String> {
    let name = compound
        .get("Name")
        .and_then(Tag::as_str)
        .ok_or_else(|| SchemError::UnsupportedEncoding("palette entry without a Name".into()))?;
    let mut state = BlockState::new(name);
    if let Some(Tag::Compound(properties)) = compound.get("Properties") {
        for (key, value) in properties {
            if let Some(value) = value.as_str() {
                state = state.with_property(key.as_str(), value);
            }
        }
    }
    Ok(state.to_descriptor())
}

/// Fallback hunt: any palette-shaped child next to any block-array
/// child, searched in the root and in a `Blocks` compound.
fn generic_search<'a>(root: &'a Compound, volume: usize) -> Option<(&'a Tag, &'a Tag)> {
    let mut scopes: Vec<&Compound> = vec![root];
    if let Some(Tag::Compound(blocks)) = root.get("Blocks") {
        scopes.push(blocks);
    }

    let mut palette = None;
    let mut cells = None;
    for scope in scopes {
        for (_, tag) in scope {
            if palette.is_none() && is_palette_shaped(tag) {
                palette = Some(tag);
                continue;
            }
            if cells.is_none() && is_cell_array(tag, volume) {
                cells = Some(tag);
            }
        }
    }
    palette.zip(cells)
}

fn is_palette_shaped(tag: &Tag) -> bool {
    match tag {
        Tag::List(entries) => {
            !entries.is_empty()
                && entries.iter().all(|e| {
                    e.as_compound()
                        .map(|c| c.contains_key("Name"))
                        .unwrap_or(false)
                })
        }
        Tag::Compound(map) => !map.is_empty() && map.values().all(|v| v.as_int().is_some()),
        _ => false,
    }
}

fn is_cell_array(tag: &Tag, volume: usize) -> bool {
    match tag {
        Tag::LongArray(_) => true,
        Tag::ByteArray(_) => true,
        // An int array only qualifies when it actually covers the
        // volume; three-element offset vectors are common bystanders.
        Tag::IntArray(ints) => ints.len() == volume,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compound(entries: Vec<(&str, Tag)>) -> Compound {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    fn palette_entry(name: &str, props: Vec<(&str, &str)>) -> Tag {
        let mut c = Compound::new();
        c.insert("Name".to_string(), Tag::String(name.to_string()));
        if !props.is_empty() {
            let props = props
                .into_iter()
                .map(|(k, v)| (k.to_string(), Tag::String(v.to_string())))
                .collect();
            c.insert("Properties".to_string(), Tag::Compound(props));
        }
        Tag::Compound(c)
    }

    #[test]
    fn classic_is_classified_and_decoded() {
        let root = Tag::Compound(compound(vec![
            ("Width", Tag::Short(2)),
            ("Height", Tag::Short(1)),
            ("Length", Tag::Short(1)),
            ("Blocks", Tag::ByteArray(vec![1, 4])),
            ("Data", Tag::ByteArray(vec![0, 0])),
        ]));
        let volume = load(&root).unwrap();
        assert_eq!(volume.dialect, Dialect::Classic);
        match &volume.storage {
            BlockStorage::Legacy { blocks, data } => {
                assert_eq!(blocks, &vec![1, 4]);
                assert_eq!(data, &vec![0, 0]);
            }
            _ => panic!("expected legacy storage"),
        }
    }

    #[test]
    fn modern_object_palette_with_varints() {
        let root = Tag::Compound(compound(vec![
            ("Width", Tag::Short(3)),
            ("Height", Tag::Short(1)),
            ("Length", Tag::Short(1)),
            (
                "Palette",
                Tag::Compound(compound(vec![
                    ("minecraft:air", Tag::Int(0)),
                    ("minecraft:stone", Tag::Int(1)),
                ])),
            ),
            ("BlockData", Tag::ByteArray(vec![0, 1, 0])),
        ]));
        let volume = load(&root).unwrap();
        assert_eq!(volume.dialect, Dialect::Modern);
        match &volume.storage {
            BlockStorage::Paletted { palette, cells } => {
                assert_eq!(palette[1], "minecraft:stone");
                assert_eq!(cells, &vec![0, 1, 0]);
            }
            _ => panic!("expected paletted storage"),
        }
    }

    #[test]
    fn states_wrapped_takes_precedence() {
        let inner = compound(vec![
            (
                "Palette",
                Tag::Compound(compound(vec![("minecraft:dirt", Tag::Int(0))])),
            ),
            ("Data", Tag::ByteArray(vec![0])),
        ]);
        let root = Tag::Compound(compound(vec![
            ("Width", Tag::Short(1)),
            ("Height", Tag::Short(1)),
            ("Length", Tag::Short(1)),
            ("Blocks", Tag::Compound(inner)),
        ]));
        let volume = load(&root).unwrap();
        assert_eq!(volume.dialect, Dialect::StatesWrapped);
    }

    #[test]
    fn schematic_wrapper_is_unwrapped() {
        let inner = compound(vec![
            ("Width", Tag::Short(1)),
            ("Height", Tag::Short(1)),
            ("Length", Tag::Short(1)),
            (
                "Palette",
                Tag::List(vec![palette_entry("minecraft:stone", vec![])]),
            ),
            ("BlockData", Tag::ByteArray(vec![0])),
        ]);
        let root = Tag::Compound(compound(vec![("Schematic", Tag::Compound(inner))]));
        let volume = load(&root).unwrap();
        assert_eq!(volume.dialect, Dialect::Modern);
    }

    #[test]
    fn list_palette_sorts_properties() {
        let root = Tag::Compound(compound(vec![
            ("Width", Tag::Short(1)),
            ("Height", Tag::Short(1)),
            ("Length", Tag::Short(1)),
            (
                "Palette",
                Tag::List(vec![palette_entry(
                    "minecraft:lever",
                    vec![("powered", "true"), ("face", "wall")],
                )]),
            ),
            ("BlockData", Tag::ByteArray(vec![0])),
        ]));
        let volume = load(&root).unwrap();
        match &volume.storage {
            BlockStorage::Paletted { palette, .. } => {
                assert_eq!(palette[0], "minecraft:lever[face=wall,powered=true]");
            }
            _ => panic!("expected paletted storage"),
        }
    }

    #[test]
    fn size_list_wins_over_scalars() {
        let root = Tag::Compound(compound(vec![
            (
                "Size",
                Tag::List(vec![Tag::Int(2), Tag::Int(1), Tag::Int(1)]),
            ),
            ("Width", Tag::Short(9)),
            ("Height", Tag::Short(9)),
            ("Length", Tag::Short(9)),
            (
                "Palette",
                Tag::Compound(compound(vec![("minecraft:stone", Tag::Int(0))])),
            ),
            ("BlockData", Tag::ByteArray(vec![0, 0])),
        ]));
        let volume = load(&root).unwrap();
        assert_eq!((volume.width, volume.height, volume.length), (2, 1, 1));
    }

    #[test]
    fn missing_dimensions_are_fatal() {
        let root = Tag::Compound(compound(vec![(
            "Palette",
            Tag::Compound(compound(vec![("minecraft:stone", Tag::Int(0))])),
        )]));
        let err = load(&root).unwrap_err();
        assert!(matches!(err, SchemError::DimensionMismatch(_)));
    }

    #[test]
    fn unknown_dialect_is_fatal() {
        let root = Tag::Compound(compound(vec![
            ("Width", Tag::Short(1)),
            ("Height", Tag::Short(1)),
            ("Length", Tag::Short(1)),
            ("Stuff", Tag::Int(3)),
        ]));
        let err = load(&root).unwrap_err();
        assert!(matches!(err, SchemError::UnknownDialect(_)));
    }

    #[test]
    fn fallback_finds_loose_pair() {
        // Palette and cell array under unusual names.
        let root = Tag::Compound(compound(vec![
            ("Width", Tag::Short(2)),
            ("Height", Tag::Short(1)),
            ("Length", Tag::Short(1)),
            (
                "BlockTable",
                Tag::Compound(compound(vec![
                    ("minecraft:air", Tag::Int(0)),
                    ("minecraft:stone", Tag::Int(1)),
                ])),
            ),
            ("Voxels", Tag::ByteArray(vec![1, 0])),
        ]));
        let volume = load(&root).unwrap();
        assert_eq!(volume.dialect, Dialect::Generic);
        match &volume.storage {
            BlockStorage::Paletted { cells, .. } => assert_eq!(cells, &vec![1, 0]),
            _ => panic!("expected paletted storage"),
        }
    }

    #[test]
    fn wrong_blockstates_kind_is_unsupported() {
        let root = Tag::Compound(compound(vec![
            ("Width", Tag::Short(1)),
            ("Height", Tag::Short(1)),
            ("Length", Tag::Short(1)),
            (
                "Palette",
                Tag::Compound(compound(vec![("minecraft:stone", Tag::Int(0))])),
            ),
            ("BlockStates", Tag::ByteArray(vec![0])),
        ]));
        let err = load(&root).unwrap_err();
        assert!(matches!(err, SchemError::UnsupportedEncoding(_)));
    }
}

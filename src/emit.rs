//! Origin selection, greedy box merging and command emission.
//!
//! Cells are visited in linear XZY order. Each unvisited cell grows a
//! box along +X, then +Z one row at a time, then +Y one slab at a time;
//! that order is part of the output contract. One `setblock` or `fill`
//! line is written per box, offset so the origin lands on `~1 ~1 ~1`.

use smol_str::SmolStr;
use std::collections::HashMap;
use std::io::Write;
use tracing::debug;

use crate::error::Result;
use crate::translate::Translator;
use crate::volume::{BlockStorage, Volume};

const NO_KEY: u32 = u32::MAX;

/// A volume reduced to interned per-cell Bedrock keys. `NO_KEY` marks
/// cells whose translation is null.
pub struct KeyedVolume {
    width: u32,
    height: u32,
    length: u32,
    keys: Vec<u32>,
    table: Vec<SmolStr>,
}

impl KeyedVolume {
    #[inline]
    fn index(&self, x: u32, y: u32, z: u32) -> usize {
        (x as usize)
            + (z as usize) * self.width as usize
            + (y as usize) * self.width as usize * self.length as usize
    }

    #[inline]
    fn coords(&self, index: usize) -> (u32, u32, u32) {
        let w = self.width as usize;
        let wl = w * self.length as usize;
        (
            (index % w) as u32,
            (index / wl) as u32,
            ((index / w) % self.length as usize) as u32,
        )
    }
}

fn intern(key: Option<SmolStr>, table: &mut Vec<SmolStr>, seen: &mut HashMap<SmolStr, u32>) -> u32 {
    match key {
        None => NO_KEY,
        Some(key) => {
            if let Some(&id) = seen.get(&key) {
                id
            } else {
                let id = table.len() as u32;
                table.push(key.clone());
                seen.insert(key, id);
                id
            }
        }
    }
}

/// Translate every cell once, interning identical Bedrock keys so that
/// aliased palette entries merge into the same boxes.
pub fn key_volume(volume: &Volume, translator: &mut Translator) -> KeyedVolume {
    let mut table: Vec<SmolStr> = Vec::new();
    let mut seen: HashMap<SmolStr, u32> = HashMap::new();

    let keys = match &volume.storage {
        BlockStorage::Paletted { palette, cells } => {
            let ids: Vec<u32> = palette
                .iter()
                .enumerate()
                .map(|(index, descriptor)| {
                    let key = translator.translate_index(index as u32, descriptor);
                    intern(key, &mut table, &mut seen)
                })
                .collect();
            cells.iter().map(|&cell| ids[cell as usize]).collect()
        }
        BlockStorage::Legacy { blocks, data } => {
            let mut memo: HashMap<(u16, u8), u32> = HashMap::new();
            blocks
                .iter()
                .zip(data.iter())
                .map(|(&id, &meta)| {
                    *memo.entry((id, meta)).or_insert_with(|| {
                        let key = translator.translate_legacy(id, meta);
                        intern(key, &mut table, &mut seen)
                    })
                })
                .collect()
        }
    };

    debug!(distinct_keys = table.len(), "volume keyed for merging");
    KeyedVolume {
        width: volume.width,
        height: volume.height,
        length: volume.length,
        keys,
        table,
    }
}

/// The minimum-corner non-null cell in (z, x, y) lexicographic order,
/// or the zero corner when nothing is placeable.
pub fn find_origin(keyed: &KeyedVolume) -> (u32, u32, u32) {
    let mut best: Option<(u32, u32, u32)> = None;
    for (i, &key) in keyed.keys.iter().enumerate() {
        if key == NO_KEY {
            continue;
        }
        let (x, y, z) = keyed.coords(i);
        let candidate = (z, x, y);
        if best.map_or(true, |current| candidate < current) {
            best = Some(candidate);
        }
    }
    match best {
        Some((z, x, y)) => (x, y, z),
        None => (0, 0, 0),
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EmitStats {
    pub commands: u64,
    pub filled_cells: u64,
    pub skipped_cells: u64,
}

/// Partition the volume into boxes of identically-keyed cells and write
/// one command line per box.
pub fn emit<W: Write>(
    keyed: &KeyedVolume,
    origin: (u32, u32, u32),
    sink: &mut W,
) -> Result<EmitStats> {
    let (w, h, l) = (keyed.width, keyed.height, keyed.length);
    let volume = w as usize * h as usize * l as usize;
    let mut visited = vec![false; volume];
    let mut stats = EmitStats::default();
    let (ox, oy, oz) = (origin.0 as i64, origin.1 as i64, origin.2 as i64);

    for start in 0..volume {
        if visited[start] {
            continue;
        }
        let key_id = keyed.keys[start];
        if key_id == NO_KEY {
            stats.skipped_cells += 1;
            continue;
        }
        let (x, y, z) = keyed.coords(start);

        // Grow along +X.
        let mut x2 = x;
        while x2 + 1 < w {
            let i = keyed.index(x2 + 1, y, z);
            if visited[i] || keyed.keys[i] != key_id {
                break;
            }
            x2 += 1;
        }

        // Grow along +Z, a whole row at a time.
        let mut z2 = z;
        'rows: while z2 + 1 < l {
            for xx in x..=x2 {
                let i = keyed.index(xx, y, z2 + 1);
                if visited[i] || keyed.keys[i] != key_id {
                    break 'rows;
                }
            }
            z2 += 1;
        }

        // Grow along +Y, a whole slab at a time.
        let mut y2 = y;
        'slabs: while y2 + 1 < h {
            for zz in z..=z2 {
                for xx in x..=x2 {
                    let i = keyed.index(xx, y2 + 1, zz);
                    if visited[i] || keyed.keys[i] != key_id {
                        break 'slabs;
                    }
                }
            }
            y2 += 1;
        }

        for yy in y..=y2 {
            for zz in z..=z2 {
                for xx in x..=x2 {
                    visited[keyed.index(xx, yy, zz)] = true;
                }
            }
        }

        let cells =
            (x2 - x + 1) as u64 * (y2 - y + 1) as u64 * (z2 - z + 1) as u64;
        stats.filled_cells += cells;
        stats.commands += 1;

        let key = &keyed.table[key_id as usize];
        let (rx1, ry1, rz1) = (x as i64 - ox + 1, y as i64 - oy + 1, z as i64 - oz + 1);
        if cells == 1 {
            writeln!(sink, "setblock ~{rx1} ~{ry1} ~{rz1} {key}")?;
        } else {
            let (rx2, ry2, rz2) = (x2 as i64 - ox + 1, y2 as i64 - oy + 1, z2 as i64 - oz + 1);
            writeln!(sink, "fill ~{rx1} ~{ry1} ~{rz1} ~{rx2} ~{ry2} ~{rz2} {key}")?;
        }
    }

    debug!(
        commands = stats.commands,
        filled = stats.filled_cells,
        skipped = stats.skipped_cells,
        "command stream emitted"
    );
    Ok(stats)
}

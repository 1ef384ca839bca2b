//! Converts Java-edition schematics into Bedrock-edition command
//! streams.
//!
//! The pipeline: strip at most one layer of gzip/zlib framing, parse
//! the tagged binary tree, classify the schematic dialect and decode a
//! dense [`Volume`], translate each palette entry into its Bedrock
//! form, then greedily merge identically-keyed cells into boxes and
//! write one `setblock`/`fill` line per box.
//!
//! The library performs no I/O of its own: input arrives as a byte
//! slice and the command stream goes to any [`std::io::Write`] sink.
//! Translation tables are loaded once and shared immutably; everything
//! per-conversion lives in values created inside [`convert`].

pub mod block_state;
pub mod decompress;
pub mod emit;
pub mod error;
pub mod formats;
pub mod nbt;
pub mod translate;
pub mod volume;

pub use block_state::BlockState;
pub use emit::EmitStats;
pub use error::{Result, SchemError};
pub use translate::{Tables, TranslationEntry, Translator};
pub use volume::{BlockStorage, Dialect, Volume};

use std::io::Write;

/// Run the whole pipeline over one schematic blob.
///
/// Nothing is written to `sink` until decoding and translation have
/// fully succeeded, so a failed conversion never leaves a truncated
/// command stream behind.
pub fn convert<W: Write>(input: &[u8], tables: &Tables, sink: &mut W) -> Result<EmitStats> {
    let bytes = decompress::inflate(input);
    let root = nbt::parse(&bytes)?;
    let volume = formats::load(&root)?;

    let mut translator = Translator::new(tables);
    let keyed = emit::key_volume(&volume, &mut translator);
    let origin = emit::find_origin(&keyed);
    emit::emit(&keyed, origin, sink)
}

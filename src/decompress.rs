//! Container probing: gzip, then zlib, then raw pass-through.

use flate2::read::{GzDecoder, ZlibDecoder};
use std::borrow::Cow;
use std::io::Read;
use tracing::debug;

/// Strip at most one layer of gzip or zlib framing from `data`.
///
/// Never fails: a blob that is neither gzip nor zlib is returned
/// unchanged, on the assumption that it is an uncompressed tree.
pub fn inflate(data: &[u8]) -> Cow<'_, [u8]> {
    let mut out = Vec::new();
    if GzDecoder::new(data).read_to_end(&mut out).is_ok() {
        debug!(inner = out.len(), "gzip container");
        return Cow::Owned(out);
    }

    out.clear();
    if ZlibDecoder::new(data).read_to_end(&mut out).is_ok() {
        debug!(inner = out.len(), "zlib container");
        return Cow::Owned(out);
    }

    debug!("no compression framing detected");
    Cow::Borrowed(data)
}

//! Chunk splitters.
//!
//! Network reads can end anywhere, including inside a multi-byte character.
//! These helpers cut a body into the chunk sequences a transport might
//! deliver. Empty chunks are never produced.

use bytes::Bytes;

/// Splits a body into two chunks at `at` (clamped to the body length).
pub fn split_at(body: &[u8], at: usize) -> Vec<Bytes> {
    split_at_points(body, &[at])
}

/// Splits a body into chunks of `size` bytes (the last may be shorter).
pub fn split_every(body: &[u8], size: usize) -> Vec<Bytes> {
    body.chunks(size.max(1)).map(Bytes::copy_from_slice).collect()
}

/// Splits a body at each cut point. Points may be unsorted or repeated.
pub fn split_at_points(body: &[u8], points: &[usize]) -> Vec<Bytes> {
    let mut cuts: Vec<usize> = points.iter().map(|p| (*p).min(body.len())).collect();
    cuts.sort_unstable();
    cuts.dedup();

    let mut chunks = Vec::with_capacity(cuts.len() + 1);
    let mut start = 0;
    for cut in cuts.into_iter().chain(std::iter::once(body.len())) {
        if cut > start {
            chunks.push(Bytes::copy_from_slice(&body[start..cut]));
            start = cut;
        }
    }
    chunks
}

/// Joins chunks back into one body.
pub fn concat(chunks: &[Bytes]) -> Vec<u8> {
    chunks.iter().flat_map(|c| c.iter().copied()).collect()
}

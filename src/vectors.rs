//! Embedding vector codecs and scoring.
//!
//! Vectors live in the `source_embeddings.embedding` BLOB column as packed
//! little-endian `f32`s; [`vec_to_blob`] and [`blob_to_vec`] are the two
//! sides of that format. [`cosine_similarity`] is the only scoring function
//! retrieval uses.

/// Pack a float vector into the BLOB layout the store expects: each `f32`
/// as 4 little-endian bytes, nothing else.
///
/// ```rust
/// let blob = repomind::vectors::vec_to_blob(&[0.5f32, -0.25]);
/// assert_eq!(blob.len(), 8);
/// assert_eq!(repomind::vectors::blob_to_vec(&blob), vec![0.5, -0.25]);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Unpack a stored BLOB back into a float vector. Trailing bytes that do
/// not form a whole `f32` are dropped.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`; 1.0 means same direction.
///
/// Returns `0.0` for empty vectors or vectors of different lengths, so a
/// stray row with the wrong dimensionality can never outrank a real match.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

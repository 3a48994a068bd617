//! Chunk sizing rules.

/// Chunk size used when the caller does not ask for one: spread the table
/// over at most `max_chunks` chunks, but never go below twice the split
/// threshold.
pub fn derive_chunk_size(total_rows: i64, split_threshold: i64, max_chunks: i64) -> i64 {
    (total_rows / max_chunks.max(1)).max(2 * split_threshold)
}

/// Number of sub-chunks for a merged range holding `delta` rows.
///
/// Rounds half up, so `delta` in `[0.5, 1.5)` chunk sizes gives 1, `[1.5, 2.5)`
/// gives 2, and so on. `delta == 0` gives 0, which splitters treat like 1.
pub fn sub_chunk_count(delta: i64, chunk_size: i64) -> usize {
    if delta <= 0 || chunk_size <= 0 {
        return 0;
    }
    ((delta + chunk_size / 2) / chunk_size) as usize
}

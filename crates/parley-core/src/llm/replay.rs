//! Replay pacing for non-streaming replies.
//!
//! The provider returns one complete reply. `replay` cuts it into
//! fixed-size chunks and hands them out one at a time with a pause in
//! between, so the terminal shows the reply arriving progressively.

use std::time::Duration;

use parley_types::config::ReplayConfig;

/// Chunk size and inter-chunk delay for a replayed reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayPacing {
    /// Unicode scalar values per chunk. Always at least 1.
    pub chunk_chars: usize,
    /// Pause between two consecutive chunks.
    pub delay: Duration,
}

impl Default for ReplayPacing {
    fn default() -> Self {
        Self {
            chunk_chars: 20,
            delay: Duration::from_millis(50),
        }
    }
}

impl ReplayPacing {
    /// Deliver all chunks back to back, with no pause in between.
    pub fn instant(chunk_chars: usize) -> Self {
        Self {
            chunk_chars: chunk_chars.max(1),
            delay: Duration::ZERO,
        }
    }
}

impl From<ReplayConfig> for ReplayPacing {
    fn from(config: ReplayConfig) -> Self {
        Self {
            chunk_chars: config.chunk_chars.max(1),
            delay: Duration::from_millis(config.delay_ms),
        }
    }
}

/// Split `text` into consecutive slices of at most `chunk_chars` characters.
///
/// Splits on char boundaries, never inside a UTF-8 sequence. Concatenating
/// the result yields `text`; an empty `text` yields no chunks.
pub fn split_chunks(text: &str, chunk_chars: usize) -> Vec<&str> {
    let chunk_chars = chunk_chars.max(1);
    let mut chunks = Vec::with_capacity(text.len() / chunk_chars + 1);
    let mut start = 0;
    let mut count = 0;

    for (idx, _) in text.char_indices() {
        if count == chunk_chars {
            chunks.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}

/// Hand `text` to `on_chunk` chunk by chunk, sleeping `pacing.delay` between chunks.
///
/// Runs on the calling task and returns the number of chunks delivered once
/// the last one has been handed out. With a zero delay it still yields to the
/// scheduler between chunks, so event subscribers keep up with the replay.
pub async fn replay<F>(text: &str, pacing: ReplayPacing, mut on_chunk: F) -> usize
where
    F: FnMut(&str),
{
    let chunks = split_chunks(text, pacing.chunk_chars);
    for (i, chunk) in chunks.iter().enumerate() {
        if i > 0 {
            if pacing.delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(pacing.delay).await;
            }
        }
        on_chunk(chunk);
    }
    chunks.len()
}

//! Line boundary location over the raw byte buffer.
//!
//! A line start is the byte just past a `\n` or the buffer's start; `end`
//! stands in for the start of the (possibly delimiter-less) final line's
//! successor. Both scans use SIMD-accelerated memchr and never allocate.

use memchr::{memchr, memrchr};

/// Offset just past the next `\n` at or after `pos`, or `end` if the
/// remaining bytes hold none (the final line).
#[inline]
pub fn next_line(data: &[u8], pos: usize, end: usize) -> usize {
    match memchr(b'\n', &data[pos..end]) {
        Some(i) => pos + i + 1,
        None => end,
    }
}

/// Offset just past the `\n` immediately preceding the line starting at
/// `pos`, or `start` if `pos` is within the first line.
/// The delimiter terminating the line at `pos - 1` is skipped, so calling
/// this with a line start yields the previous line's start.
#[inline]
pub fn prev_line(data: &[u8], start: usize, pos: usize) -> usize {
    if pos <= start + 1 {
        return start;
    }
    match memrchr(b'\n', &data[start..pos - 1]) {
        Some(i) => start + i + 1,
        None => start,
    }
}

//! Core engine for flsort: an adaptive, bounded insertion sort that
//! relocates out-of-order lines directly inside a mutable byte buffer.
//!
//! The buffer is usually a read-write file mapping, but the engine only
//! sees offsets into `[u8]`, so tests run it on plain vectors. Three parts
//! cooperate here: the placement scan (decides which line moves where),
//! the rotation engine (performs the length-preserving byte swap), and the
//! flush coordinator (tracks the coalesced dirty range and makes it
//! durable at natural boundaries).

use std::io;
use std::ops::{Deref, DerefMut};

use memmap2::MmapMut;
use thiserror::Error;

use super::compare;
use super::locate;
use crate::cancel::CancelToken;

/// How modified byte ranges are made durable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushMode {
    /// msync-style blocking write-back.
    Sync,
    /// Schedule write-back and continue.
    #[default]
    Async,
}

/// Configuration for one in-place sorting pass.
#[derive(Debug, Clone, Default)]
pub struct SortConfig {
    /// Maximum bytes compared per line pair; 0 = unbounded.
    /// A nonzero budget may leave the file not fully sorted.
    pub max_compare: usize,
    /// Maximum byte span one relocation or flush batch may cover;
    /// 0 = unbounded. Exceeding it is fatal, not a policy to relax.
    pub max_distance: usize,
    /// Sort in descending order.
    pub reverse: bool,
    pub flush: FlushMode,
    /// Flush after every relocation instead of batching dirty ranges.
    pub immediate: bool,
}

/// Counters reported by a completed pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortStats {
    pub lines: u64,
    pub relocations: u64,
    pub flushes: u64,
}

/// A relocation performed by the engine, for verbose reporting.
/// Line numbers are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relocation {
    /// The line at `line` was inserted back at position `to`.
    MovedBack { line: u64, to: u64 },
    /// The line at `line` was pushed forward to position `to`.
    MovedForward { line: u64, to: u64 },
}

/// Progress and relocation events, consumed by the CLI's terminal printer.
pub trait SortObserver {
    /// Percentage of bytes scanned; called only when the value changes.
    fn progress(&mut self, _percent: u64) {}
    fn relocated(&mut self, _event: Relocation) {}
}

/// Observer that discards all events.
pub struct NullObserver;

impl SortObserver for NullObserver {}

/// Fatal conditions for one file's pass. None is retried internally; the
/// pending dirty range is flushed before any of these is returned.
#[derive(Debug, Error)]
pub enum SortError {
    #[error("{line}: distance {span} exceeds allowed maximum of {limit}")]
    DistanceExceeded { line: u64, span: usize, limit: usize },

    #[error("{line}: out of memory reserving {bytes} bytes")]
    Allocation { line: u64, bytes: usize },

    #[error("aborted")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// The buffer a pass operates on — a mutable file mapping in production,
/// an owned vector in tests. Dereferences to `[u8]`; its length is fixed
/// for the whole pass.
pub enum SortBuffer {
    Mapped(MmapMut),
    Owned(Vec<u8>),
}

impl Deref for SortBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            SortBuffer::Mapped(m) => m,
            SortBuffer::Owned(v) => v,
        }
    }
}

impl DerefMut for SortBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        match self {
            SortBuffer::Mapped(m) => m,
            SortBuffer::Owned(v) => v,
        }
    }
}

impl SortBuffer {
    /// Request durability for `len` bytes starting at `offset`.
    /// No-op for owned buffers.
    fn flush_range(&self, offset: usize, len: usize, mode: FlushMode) -> io::Result<()> {
        match self {
            SortBuffer::Mapped(m) => match mode {
                FlushMode::Sync => m.flush_range(offset, len),
                FlushMode::Async => m.flush_async_range(offset, len),
            },
            SortBuffer::Owned(_) => Ok(()),
        }
    }
}

/// The coalesced `[begin, end)` span of bytes modified since the last
/// flush. Created empty, extended by every relocation, emptied by `take`.
#[derive(Debug, Default)]
struct DirtyRange {
    range: Option<(usize, usize)>,
}

impl DirtyRange {
    /// The span covering both the pending range and `[begin, end)`.
    fn union(&self, begin: usize, end: usize) -> (usize, usize) {
        match self.range {
            Some((b, e)) => (b.min(begin), e.max(end)),
            None => (begin, end),
        }
    }

    fn set(&mut self, begin: usize, end: usize) {
        self.range = Some((begin, end));
    }

    fn take(&mut self) -> Option<(usize, usize)> {
        self.range.take()
    }
}

/// Sort the buffer's lines in place.
///
/// Returns pass counters on success. On any error the buffer is left
/// length-preserved and internally consistent: every completed rotation is
/// a permutation of whole lines and the pending dirty range has been
/// flushed. With a nonzero `max_compare` the result may be only partially
/// sorted (see [`SortConfig::max_compare`]).
pub fn sort_in_place(
    buf: &mut SortBuffer,
    config: &SortConfig,
    cancel: &CancelToken,
    observer: &mut dyn SortObserver,
) -> Result<SortStats, SortError> {
    let pass = Pass {
        buf,
        config,
        cancel,
        observer,
        scratch: Vec::new(),
        dirty: DirtyRange::default(),
        stats: SortStats::default(),
    };
    pass.run()
}

struct Pass<'a> {
    buf: &'a mut SortBuffer,
    config: &'a SortConfig,
    cancel: &'a CancelToken,
    observer: &'a mut dyn SortObserver,
    scratch: Vec<u8>,
    dirty: DirtyRange,
    stats: SortStats,
}

impl Pass<'_> {
    fn run(mut self) -> Result<SortStats, SortError> {
        let result = self.scan();
        // Single cleanup path: the pending range is flushed on every exit,
        // but a flush failure must not mask the original error.
        match result {
            Ok(()) => {
                self.flush_dirty()?;
                Ok(self.stats)
            }
            Err(e) => {
                let _ = self.flush_dirty();
                Err(e)
            }
        }
    }

    fn scan(&mut self) -> Result<(), SortError> {
        let end = self.buf.len();
        if end == 0 {
            return Ok(());
        }

        let mut prev = 0usize;
        let mut current = locate::next_line(self.buf, 0, end);
        let mut line: u64 = 2;
        let mut last_percent = u64::MAX;

        while current != end {
            self.check_cancel()?;

            let percent = (current as u128 * 100 / end as u128) as u64;
            if percent != last_percent {
                self.observer.progress(percent);
                last_percent = percent;
            }

            let mut next = locate::next_line(self.buf, current, end);
            if self.ordered((prev, current), (current, next)) {
                // Natural boundary: coalescing stops here.
                self.flush_dirty()?;
                prev = current;
                current = next;
                line += 1;
                continue;
            }

            // Walk the anchor back while the line before it is still
            // greater than the misplaced line.
            let mut dest_line = line - 1;
            while prev != 0 {
                self.check_cancel()?;
                self.check_distance(line, next - prev)?;
                let peek = locate::prev_line(self.buf, 0, prev);
                if self.ordered((peek, prev), (current, next)) {
                    break;
                }
                prev = peek;
                dest_line -= 1;
            }

            // If backward made no progress, probe forward instead: extend
            // the window while the anchor line outranks the peeked lines,
            // then push it past them in one rotation.
            let mut fwd_line = line;
            if dest_line + 1 == line {
                while next != end {
                    self.check_cancel()?;
                    self.check_distance(line, next - prev)?;
                    let peek = locate::next_line(self.buf, next, end);
                    if self.ordered((prev, current), (next, peek)) {
                        break;
                    }
                    next = peek;
                    fwd_line += 1;
                }
            }

            // Every performed relocation honors the budget, including ones
            // whose initial window needed no search step.
            self.check_distance(line, next - prev)?;

            // Coalesce into the pending dirty range; if the union would
            // itself bust the budget, flush the old range and start fresh.
            let (mut dirty_begin, mut dirty_end) = self.dirty.union(prev, next);
            if self.config.max_distance != 0 && dirty_end - dirty_begin > self.config.max_distance {
                self.flush_dirty()?;
                dirty_begin = prev;
                dirty_end = next;
            }

            let run_size = current - prev;
            let line_size = next - current;

            if line_size <= run_size {
                self.ensure_scratch(line, line_size + 1)?;
                self.rotate_back(prev, current, next);
                self.observer.relocated(Relocation::MovedBack {
                    line,
                    to: dest_line,
                });
                // Offsets shifted: recompute the window from the buffer.
                // A relocated empty line can dissolve into the final
                // delimiter-less position, leaving no boundary before
                // `next`; restart from the first line in that case.
                current = locate::prev_line(self.buf, 0, next);
                if current == 0 {
                    prev = 0;
                    current = locate::next_line(self.buf, 0, end);
                } else {
                    prev = locate::prev_line(self.buf, 0, current);
                }
            } else {
                self.ensure_scratch(line, run_size)?;
                self.rotate_forward(prev, current, next);
                self.observer.relocated(Relocation::MovedForward {
                    line: dest_line,
                    to: fwd_line,
                });
                current = locate::next_line(self.buf, prev, end);
            }

            self.dirty.set(dirty_begin, dirty_end);
            self.stats.relocations += 1;
            if self.config.immediate {
                self.flush_dirty()?;
            }
        }

        self.stats.lines = line - 1;
        Ok(())
    }

    /// Move-back rotation over the window `[prev, next)`: the misplaced
    /// span `[current, next)` is scratch-copied (gaining a trailing `\n`
    /// if its last byte lacks one), the run `[prev, current)` shifts
    /// forward minus its final byte, and the scratch lands at `prev`.
    /// When no delimiter was synthesized, the moved span's old trailing
    /// `\n` at `next - 1` stays put and terminates the shifted run; when
    /// one was, the run's dropped `\n` absorbs it. Either way the window's
    /// total length is unchanged.
    fn rotate_back(&mut self, prev: usize, current: usize, next: usize) {
        self.scratch.clear();
        self.scratch.extend_from_slice(&self.buf[current..next]);
        if self.scratch.last() != Some(&b'\n') {
            self.scratch.push(b'\n');
        }
        let moved = self.scratch.len();
        let data = &mut self.buf[..];
        data.copy_within(prev..current - 1, prev + moved);
        data[prev..prev + moved].copy_from_slice(&self.scratch);
    }

    /// Mirror image of [`Self::rotate_back`]: the run `[prev, current)` is
    /// the smaller side, so it is scratch-copied and the span
    /// `[current, next)` shifts back to `prev` instead.
    fn rotate_forward(&mut self, prev: usize, current: usize, next: usize) {
        let run_size = current - prev;
        self.scratch.clear();
        self.scratch.extend_from_slice(&self.buf[prev..current]);
        let data = &mut self.buf[..];
        data.copy_within(current..next, prev);
        let mut moved = next - current;
        if data[prev + moved - 1] != b'\n' {
            data[prev + moved] = b'\n';
            moved += 1;
        }
        data[prev + moved..prev + moved + run_size - 1]
            .copy_from_slice(&self.scratch[..run_size - 1]);
    }

    fn ordered(&self, lhs: compare::Span, rhs: compare::Span) -> bool {
        compare::in_order(&self.buf[..], lhs, rhs, self.config)
    }

    #[inline]
    fn check_cancel(&self) -> Result<(), SortError> {
        if self.cancel.is_cancelled() {
            return Err(SortError::Cancelled);
        }
        Ok(())
    }

    #[inline]
    fn check_distance(&self, line: u64, span: usize) -> Result<(), SortError> {
        let limit = self.config.max_distance;
        if limit != 0 && span > limit {
            return Err(SortError::DistanceExceeded { line, span, limit });
        }
        Ok(())
    }

    /// Grow the scratch allocation on demand; it never shrinks.
    fn ensure_scratch(&mut self, line: u64, needed: usize) -> Result<(), SortError> {
        if self.scratch.capacity() < needed {
            self.scratch
                .try_reserve(needed)
                .map_err(|_| SortError::Allocation { line, bytes: needed })?;
        }
        Ok(())
    }

    fn flush_dirty(&mut self) -> Result<(), SortError> {
        if let Some((begin, end)) = self.dirty.take() {
            self.buf.flush_range(begin, end - begin, self.config.flush)?;
            self.stats.flushes += 1;
        }
        Ok(())
    }
}

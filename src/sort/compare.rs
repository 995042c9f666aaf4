//! Byte-wise line ordering with an optional compare budget.

use super::core::SortConfig;

/// A line as a half-open `[begin, end)` byte range.
pub type Span = (usize, usize);

/// True when `lhs` may stay before `rhs` under the configured direction.
/// With `reverse` set, the operands are swapped and nothing else changes.
#[inline]
pub fn in_order(data: &[u8], lhs: Span, rhs: Span, config: &SortConfig) -> bool {
    if config.reverse {
        le(data, rhs, lhs, config.max_compare)
    } else {
        le(data, lhs, rhs, config.max_compare)
    }
}

/// lhs <= rhs over at most `max_compare` bytes (0 = unbounded).
///
/// A single trailing `\n` is stripped from each side first, so content
/// equality is unaffected by the delimiter's presence. Resolution order:
/// the first differing byte decides; a comparison truncated by the budget
/// counts as in order (a bounded compare cannot prove disorder, so the
/// engine must not move data on its account); otherwise a line that is a
/// prefix of the other sorts before or with it.
fn le(data: &[u8], lhs: Span, rhs: Span, max_compare: usize) -> bool {
    let lhs = strip_delimiter(data, lhs);
    let rhs = strip_delimiter(data, rhs);
    let lhs_size = lhs.1 - lhs.0;
    let rhs_size = rhs.1 - rhs.0;

    let mut size = lhs_size.min(rhs_size);
    if max_compare != 0 && size > max_compare {
        size = max_compare;
    }

    match data[lhs.0..lhs.0 + size].cmp(&data[rhs.0..rhs.0 + size]) {
        std::cmp::Ordering::Less => true,
        std::cmp::Ordering::Greater => false,
        std::cmp::Ordering::Equal => {
            if max_compare != 0 && size == max_compare {
                // Truncated comparison: treat as in order.
                return true;
            }
            lhs_size <= rhs_size
        }
    }
}

#[inline]
fn strip_delimiter(data: &[u8], span: Span) -> Span {
    let (begin, mut end) = span;
    if end != begin && data[end - 1] == b'\n' {
        end -= 1;
    }
    (begin, end)
}

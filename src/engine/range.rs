//! Byte range partitioning for ranged fetches

use gdrive::ByteRange;
use std::num::NonZeroU64;

/// Split `[0, total_length)` into consecutive inclusive ranges of at most `part_size` bytes.
pub fn partition(total_length: u64, part_size: NonZeroU64) -> Vec<ByteRange> {
    let part = part_size.get();
    let count = usize::try_from(total_length.div_ceil(part)).unwrap_or(0);
    let mut ranges = Vec::with_capacity(count);

    let mut start = 0;
    while start < total_length {
        let end = start.saturating_add(part).min(total_length) - 1;
        ranges.push(ByteRange::new(start, end));
        start = end + 1;
    }

    ranges
}

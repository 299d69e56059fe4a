/// A contiguous byte range of a file downloaded by one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Segment index (0-based)
    pub index: u32,
    /// Starting byte offset
    pub start: u64,
    /// Ending byte offset (exclusive)
    pub end:   u64,
}

impl Segment {
    pub fn len(&self) -> u64 { self.end - self.start }

    pub fn is_empty(&self) -> bool { self.end == self.start }
}

/// Split `file_size` bytes into `num_segments` contiguous ranges.
///
/// The remainder is spread one byte at a time over the leading segments.
/// Never yields more segments than bytes, and a zero `num_segments` is
/// treated as one.
pub fn calculate_segments(file_size: u64, num_segments: u32) -> Vec<Segment> {
    if file_size == 0 {
        return vec![Segment {
            index: 0,
            start: 0,
            end:   0,
        }];
    }

    let num_segments = u64::from(num_segments.max(1)).min(file_size);
    let segment_size = file_size / num_segments;
    let remainder = file_size % num_segments;

    let mut segments = Vec::with_capacity(num_segments as usize);
    let mut current_offset = 0;

    for i in 0..num_segments {
        let start = current_offset;
        let size = if i < remainder { segment_size + 1 } else { segment_size };
        let end = start + size;
        current_offset = end;

        segments.push(Segment {
            index: i as u32,
            start,
            end,
        });
    }

    segments
}

//! Completion bitmap over a fixed segment plan.

const WORD_BITS: usize = u64::BITS as usize;

/// One bit per planned segment; bit `i` set once segment `i` is done.
/// Indices outside the plan are ignored.
#[derive(Debug, Clone, Default)]
pub struct SegmentBitmap {
    words: Vec<u64>,
    len: usize,
    completed: usize,
}

impl SegmentBitmap {
    pub fn new(segment_count: usize) -> Self {
        SegmentBitmap {
            words: vec![0; segment_count.div_ceil(WORD_BITS)],
            len: segment_count,
            completed: 0,
        }
    }

    /// Mark segment `index` done. Returns false if it already was (or is out of range).
    pub fn set_completed(&mut self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        let mask = 1u64 << (index % WORD_BITS);
        let word = &mut self.words[index / WORD_BITS];
        if *word & mask != 0 {
            return false;
        }
        *word |= mask;
        self.completed += 1;
        true
    }

    pub fn is_completed(&self, index: usize) -> bool {
        index < self.len && self.words[index / WORD_BITS] & (1u64 << (index % WORD_BITS)) != 0
    }

    pub fn count_completed(&self) -> usize {
        self.completed
    }

    /// True once every planned segment is done (trivially for an empty plan).
    pub fn all_completed(&self) -> bool {
        self.completed == self.len
    }

    /// Planned indices not yet done, ascending.
    pub fn missing(&self) -> Vec<usize> {
        (0..self.len).filter(|&i| !self.is_completed(i)).collect()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

// Fixed-capacity byte buffer: the substrate for both generation and
// shrinking. A Buffer never grows past the capacity it was created with.

use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone)]
pub struct Buffer {
    data: Vec<u8>,
    fill: usize,
}

impl Buffer {
    /// Allocates zeroed storage of exactly `capacity` bytes, empty (`fill == 0`).
    pub fn new(capacity: usize) -> Buffer {
        Buffer {
            data: vec![0; capacity],
            fill: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn fill(&self) -> usize {
        self.fill
    }

    pub fn set_fill(&mut self, fill: usize) {
        assert!(fill <= self.capacity());
        self.fill = fill;
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.fill]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        let fill = self.fill;
        &mut self.data[..fill]
    }

    /// The full backing storage, including bytes beyond `fill`. Used when
    /// refilling from a randomness source, which writes before updating fill.
    pub fn storage_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Copies `src` into `self`. Both buffers must share capacity.
    pub fn copy_from(&mut self, src: &Buffer) {
        assert_eq!(self.capacity(), src.capacity());
        self.fill = src.fill;
        self.data[..src.fill].copy_from_slice(&src.data[..src.fill]);
    }

    /// Total order used by shrinking: shorter buffers precede longer ones;
    /// among equal-length buffers, lexicographically smaller ones precede.
    pub fn shrink_cmp(&self, other: &Buffer) -> Ordering {
        self.fill
            .cmp(&other.fill)
            .then_with(|| self.as_slice().cmp(other.as_slice()))
    }

    pub fn is_shrink_smaller_than(&self, other: &Buffer) -> bool {
        self.shrink_cmp(other) == Ordering::Less
    }
}

impl fmt::Display for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, byte) in self.as_slice().iter().enumerate() {
            if i > 0 {
                write!(f, "|")?;
            }
            write!(f, "{:x}", byte)?;
        }
        write!(f, "]:{}", self.fill)
    }
}

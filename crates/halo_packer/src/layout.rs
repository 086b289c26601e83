//! Placement of several transfers inside one communication buffer.
//!
//! Ranges are laid out back to back in push order, so the offsets array has
//! the same shape as a CSR row-pointer array: `offsets[i]..offsets[i + 1]` is
//! transfer `i` and the last entry is the buffer length.

use std::ops::Range;

use crate::core::vector_count;
use crate::error::{PackError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Scalar { count: u32 },
    Vector { count_x: u32, count_y: u32 },
}

impl TransferKind {
    pub fn element_count(&self) -> Result<u32> {
        match *self {
            TransferKind::Scalar { count } => Ok(count),
            TransferKind::Vector { count_x, count_y } => vector_count(count_x, count_y),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BufferLayout {
    kinds: Vec<TransferKind>,
    offsets: Vec<u32>,
}

impl Default for BufferLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferLayout {
    pub fn new() -> Self {
        Self {
            kinds: Vec::new(),
            offsets: vec![0],
        }
    }

    /// Appends a transfer and returns its buffer offset.
    pub fn push(&mut self, kind: TransferKind) -> Result<u32> {
        let start = self.total_len();
        let end = start
            .checked_add(kind.element_count()?)
            .ok_or(PackError::LayoutOverflow)?;
        self.kinds.push(kind);
        self.offsets.push(end);
        Ok(start)
    }

    pub fn push_scalar(&mut self, count: u32) -> Result<u32> {
        self.push(TransferKind::Scalar { count })
    }

    pub fn push_vector(&mut self, count_x: u32, count_y: u32) -> Result<u32> {
        self.push(TransferKind::Vector { count_x, count_y })
    }

    /// Number of transfers.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Buffer length needed to hold every transfer.
    pub fn total_len(&self) -> u32 {
        self.offsets.last().copied().unwrap_or(0)
    }

    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    pub fn kind(&self, transfer: usize) -> Option<TransferKind> {
        self.kinds.get(transfer).copied()
    }

    pub fn offset(&self, transfer: usize) -> Option<u32> {
        self.range(transfer).map(|range| range.start)
    }

    pub fn range(&self, transfer: usize) -> Option<Range<u32>> {
        if transfer >= self.kinds.len() {
            return None;
        }
        Some(self.offsets[transfer]..self.offsets[transfer + 1])
    }

    pub fn ranges(&self) -> impl Iterator<Item = Range<u32>> + '_ {
        self.offsets.windows(2).map(|pair| pair[0]..pair[1])
    }
}

/// Checks that caller-chosen buffer ranges never overlap. Empty ranges never
/// conflict with anything.
pub fn is_disjoint(ranges: &[Range<u32>]) -> bool {
    let mut sorted: Vec<&Range<u32>> = ranges.iter().filter(|r| r.start < r.end).collect();
    sorted.sort_by_key(|r| r.start);
    sorted.windows(2).all(|pair| pair[0].end <= pair[1].start)
}

use crate::{DriveError, DriveResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Contiguous run of logical blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LbaRange {
    pub start: u64,
    pub count: u64,
}

impl LbaRange {
    pub fn new(start: u64, count: u64) -> Self {
        Self { start, count }
    }

    /// One past the last block
    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.count)
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Consecutive pieces of at most `max_count` blocks covering this range
    pub fn split(self, max_count: u64) -> impl Iterator<Item = LbaRange> {
        let step = max_count.max(1);
        let end = self.end();
        let mut next = self.start;
        std::iter::from_fn(move || {
            if next >= end {
                return None;
            }
            let count = step.min(end - next);
            let piece = LbaRange::new(next, count);
            next += count;
            Some(piece)
        })
    }
}

impl fmt::Display for LbaRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end())
    }
}

/// Maps N work units onto M display cells and onto the device's LBA space.
///
/// Every unit gets at least one cell. With N <= M the cell ranges tile
/// `0..M` in order; with N > M neighbouring units share a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPlan {
    units: usize,
    cells: usize,
}

impl ChunkPlan {
    pub fn new(units: usize, cells: usize) -> DriveResult<Self> {
        if units == 0 {
            return Err(DriveError::InvalidPlan("unit count must be positive".into()));
        }
        if cells == 0 {
            return Err(DriveError::InvalidPlan("cell count must be positive".into()));
        }
        Ok(Self { units, cells })
    }

    pub fn units(&self) -> usize {
        self.units
    }

    pub fn cells(&self) -> usize {
        self.cells
    }

    /// floor(i * M / N), computed wide
    fn cell_start(&self, unit: usize) -> usize {
        (unit as u128 * self.cells as u128 / self.units as u128) as usize
    }

    /// Cells owned by `unit`, half-open.
    ///
    /// Empty only when `unit` is out of range.
    pub fn map(&self, unit: usize) -> Range<usize> {
        let start = self.cell_start(unit);
        if unit >= self.units || start >= self.cells {
            return self.cells..self.cells;
        }

        let end = self.cell_start(unit + 1).min(self.cells);
        if end <= start {
            start..start + 1
        } else {
            start..end
        }
    }

    /// Blocks covered by `unit` when the device has `total_lbas` blocks.
    ///
    /// Units tile `0..total_lbas` without gaps; the remainder of an uneven
    /// split is spread across units rather than piled onto the last one.
    pub fn lba_range(&self, unit: usize, total_lbas: u64) -> LbaRange {
        let unit = unit.min(self.units);
        let boundary = |i: usize| (i as u128 * total_lbas as u128 / self.units as u128) as u64;
        let start = boundary(unit);
        let end = boundary((unit + 1).min(self.units));
        LbaRange::new(start, end - start)
    }

    /// The unit drawn in `cell`.
    ///
    /// When several units share a cell the last one wins, since it is the
    /// one whose state the cell shows once processing has moved past it.
    pub fn unit_of_cell(&self, cell: usize) -> Option<usize> {
        if cell >= self.cells {
            return None;
        }

        // First unit whose range starts after `cell`
        let (mut lo, mut hi) = (0, self.units);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.cell_start(mid) <= cell {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo.checked_sub(1)
    }
}

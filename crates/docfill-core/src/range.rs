use serde::{Deserialize, Serialize};

use crate::error::SheetError;

/// Maximum number of rows in an xlsx sheet
pub const MAX_ROWS: u32 = 1_048_576;
/// Maximum number of columns in an xlsx sheet (column XFD)
pub const MAX_COLS: u32 = 16_384;

/// Zero-based cell position; orders row-major
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct CellCoord {
    pub row: u32,
    pub col: u32,
}

impl CellCoord {
    pub const fn new(row: u32, col: u32) -> Self {
        CellCoord { row, col }
    }

    /// Parse `B3` (case-insensitive, surrounding whitespace ignored)
    pub fn from_a1(notation: &str) -> Option<Self> {
        let notation = notation.trim();
        let digits_at = notation.find(|c: char| !c.is_ascii_alphabetic())?;
        let (col_str, row_str) = notation.split_at(digits_at);

        if row_str.is_empty() || !row_str.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let col = col_from_label(col_str)?;
        let row = row_str.parse::<u32>().ok()?.checked_sub(1)?;
        (row < MAX_ROWS && col < MAX_COLS).then_some(CellCoord { row, col })
    }

    pub fn to_a1(&self) -> String {
        format!("{}{}", col_to_label(self.col), self.row + 1)
    }
}

/// Parse a cell address such as "B3" into zero-based indices
pub fn decode_address(address: &str) -> Result<CellCoord, SheetError> {
    CellCoord::from_a1(address).ok_or_else(|| SheetError::InvalidAddress(address.to_string()))
}

/// Format zero-based indices as a cell address
pub fn encode_address(row: u32, col: u32) -> String {
    CellCoord::new(row, col).to_a1()
}

/// Column label for a zero-based index: 0 -> "A", 25 -> "Z", 26 -> "AA"
pub fn col_to_label(col: u32) -> String {
    let mut letters = Vec::new();
    let mut rest = u64::from(col) + 1;
    while rest > 0 {
        let digit = ((rest - 1) % 26) as u8;
        letters.push(char::from(b'A' + digit));
        rest = (rest - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Zero-based index for a column label, case-insensitive; `None` on overflow
pub fn col_from_label(label: &str) -> Option<u32> {
    if label.is_empty() {
        return None;
    }
    let number = label.chars().try_fold(0u32, |acc, c| {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = u32::from(c.to_ascii_uppercase() as u8 - b'A') + 1;
        acc.checked_mul(26)?.checked_add(digit)
    })?;
    Some(number - 1)
}

/// A rectangular range of cells (e.g., A1:B10)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRange {
    pub start: CellCoord,
    pub end: CellCoord,
}

impl CellRange {
    /// Corners may be given in any order
    pub fn new(start: CellCoord, end: CellCoord) -> Self {
        CellRange {
            start: CellCoord::new(start.row.min(end.row), start.col.min(end.col)),
            end: CellCoord::new(start.row.max(end.row), start.col.max(end.col)),
        }
    }

    /// The one-cell range at `coord`
    pub fn single(coord: CellCoord) -> Self {
        CellRange {
            start: coord,
            end: coord,
        }
    }

    /// Parse `B2:C3` or a single `B2`; `$` markers are ignored
    pub fn from_a1(notation: &str) -> Option<Self> {
        let notation = notation.replace('$', "");
        match notation.split_once(':') {
            None => CellCoord::from_a1(&notation).map(CellRange::single),
            Some((_, end)) if end.contains(':') => None,
            Some((start, end)) => Some(CellRange::new(
                CellCoord::from_a1(start)?,
                CellCoord::from_a1(end)?,
            )),
        }
    }

    /// `B2:C3`, or just `B2` for a single cell
    pub fn to_a1(&self) -> String {
        if self.start == self.end {
            self.start.to_a1()
        } else {
            format!("{}:{}", self.start.to_a1(), self.end.to_a1())
        }
    }

    pub fn contains(&self, coord: CellCoord) -> bool {
        (self.start.row..=self.end.row).contains(&coord.row)
            && (self.start.col..=self.end.col).contains(&coord.col)
    }

    /// Smallest range containing both this range and `coord`
    pub fn expand(&self, coord: CellCoord) -> CellRange {
        CellRange {
            start: CellCoord::new(self.start.row.min(coord.row), self.start.col.min(coord.col)),
            end: CellCoord::new(self.end.row.max(coord.row), self.end.col.max(coord.col)),
        }
    }
}

/// Grow `current` to cover `coord`; an absent range becomes the single cell
pub fn expand_range(current: Option<CellRange>, coord: CellCoord) -> CellRange {
    match current {
        Some(range) => range.expand(coord),
        None => CellRange::single(coord),
    }
}

/// Top-left cell of the first merge region containing `coord`, or `coord` itself
pub fn merge_anchor(merges: &[CellRange], coord: CellCoord) -> CellCoord {
    merges
        .iter()
        .find(|region| region.contains(coord))
        .map(|region| region.start)
        .unwrap_or(coord)
}

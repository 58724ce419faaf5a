use std::collections::{BTreeMap, BTreeSet};

use crate::cell::CellValue;
use crate::range::{expand_range, merge_anchor, CellCoord, CellRange};

/// A single sheet with sparse cell storage
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    /// Sheet name (displayed in tab)
    pub name: String,
    cells: BTreeMap<CellCoord, CellValue>,
    /// Bounding rectangle of every addressed cell
    used_range: Option<CellRange>,
    merges: Vec<CellRange>,
    /// Cells written since the sheet was loaded; the storage layer persists these
    written: BTreeSet<CellCoord>,
}

impl Sheet {
    /// Create a new empty sheet with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Build a sheet from loaded contents; nothing is marked as written
    pub fn with_contents(
        name: impl Into<String>,
        cells: impl IntoIterator<Item = (CellCoord, CellValue)>,
        merges: Vec<CellRange>,
    ) -> Self {
        let mut sheet = Sheet::new(name);
        for (coord, value) in cells {
            sheet.used_range = Some(expand_range(sheet.used_range, coord));
            sheet.cells.insert(coord, value);
        }
        sheet.merges = merges;
        sheet
    }

    /// Get the value of a cell, if one is stored
    pub fn get_cell(&self, coord: CellCoord) -> Option<&CellValue> {
        self.cells.get(&coord)
    }

    /// Store a value and grow the used range to include it
    pub fn set_cell(&mut self, coord: CellCoord, value: CellValue) {
        self.cells.insert(coord, value);
        self.used_range = Some(expand_range(self.used_range, coord));
        self.written.insert(coord);
    }

    /// The cell a write to `coord` lands on when merged regions are respected
    pub fn merge_anchor(&self, coord: CellCoord) -> CellCoord {
        merge_anchor(&self.merges, coord)
    }

    pub fn add_merge(&mut self, range: CellRange) {
        self.merges.push(range);
    }

    pub fn merges(&self) -> &[CellRange] {
        &self.merges
    }

    /// Minimal rectangle bounding every cell ever stored, `None` for an empty sheet
    pub fn used_range(&self) -> Option<CellRange> {
        self.used_range
    }

    /// Get the number of stored cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Cells written since load, in row-major order
    pub fn written_cells(&self) -> impl Iterator<Item = (CellCoord, &CellValue)> + '_ {
        self.written
            .iter()
            .filter_map(|coord| self.cells.get(coord).map(|value| (*coord, value)))
    }

    pub fn has_changes(&self) -> bool {
        !self.written.is_empty()
    }
}

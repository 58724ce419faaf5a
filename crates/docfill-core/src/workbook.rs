use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cell::CellValue;
use crate::error::SheetError;
use crate::range::{decode_address, CellCoord};
use crate::reference::parse_reference;
use crate::sheet::Sheet;

/// A workbook-level defined name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRange {
    pub name: String,
    /// Reference text as stored in the file, e.g. `'Sheet2'!$D$5`
    pub reference: String,
}

/// One entry of a bulk write request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CellWrite {
    #[serde(default)]
    pub cell: Option<String>,
    #[serde(default)]
    pub value: Value,
}

impl CellWrite {
    pub fn new(cell: impl Into<String>, value: Value) -> Self {
        Self {
            cell: Some(cell.into()),
            value,
        }
    }
}

/// Outcome of a single-cell write
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResult {
    pub sheet_name: String,
    pub cell: String,
    pub value: CellValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedWrite {
    pub cell: String,
    pub value: CellValue,
}

/// A bulk entry that was not applied
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedWrite {
    /// Position in the request's `writes` array
    pub index: usize,
    pub cell: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkWriteResult {
    pub sheet_name: String,
    pub applied: Vec<AppliedWrite>,
    pub skipped: Vec<SkippedWrite>,
    /// Used range after all writes, e.g. `A1:C4`
    pub used_range: Option<String>,
}

/// A rectangular window of cell values anchored at A1
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    pub sheet_name: String,
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<Vec<CellValue>>,
}

/// An in-memory workbook: ordered sheets plus defined names
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    /// List of sheets in declaration order
    pub sheets: Vec<Sheet>,
    named_ranges: Vec<NamedRange>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a workbook with empty sheets of the given names
    pub fn with_sheets<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sheets: names.into_iter().map(Sheet::new).collect(),
            named_ranges: Vec::new(),
        }
    }

    pub fn add_sheet(&mut self, sheet: Sheet) {
        self.sheets.push(sheet);
    }

    /// Register a defined name; the first definition of a name wins
    pub fn add_named_range(&mut self, name: impl Into<String>, reference: impl Into<String>) {
        let name = name.into();
        if self.find_named_range(&name).is_some() {
            return;
        }
        self.named_ranges.push(NamedRange {
            name,
            reference: reference.into(),
        });
    }

    /// Get all sheet names
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Defined names, excluding entries with an empty name
    pub fn named_ranges(&self) -> Vec<&NamedRange> {
        self.named_ranges
            .iter()
            .filter(|n| !n.name.is_empty())
            .collect()
    }

    fn find_named_range(&self, name: &str) -> Option<&NamedRange> {
        let wanted = name.to_lowercase();
        self.named_ranges
            .iter()
            .find(|n| n.name.to_lowercase() == wanted)
    }

    fn sheet_index(&self, name: Option<&str>) -> Result<usize, SheetError> {
        match name {
            Some(name) => self
                .sheets
                .iter()
                .position(|s| s.name == name)
                .ok_or_else(|| SheetError::SheetNotFound(name.to_string())),
            None if self.sheets.is_empty() => {
                Err(SheetError::SheetNotFound("(workbook has no sheets)".to_string()))
            }
            None => Ok(0),
        }
    }

    /// Get a sheet by name, or the first sheet when no name is given
    pub fn sheet(&self, name: Option<&str>) -> Result<&Sheet, SheetError> {
        let index = self.sheet_index(name)?;
        Ok(&self.sheets[index])
    }

    pub fn sheet_mut(&mut self, name: Option<&str>) -> Result<&mut Sheet, SheetError> {
        let index = self.sheet_index(name)?;
        Ok(&mut self.sheets[index])
    }

    /// Resolve a defined name, or a raw reference, to a sheet and cell
    pub fn resolve_reference(&self, name_or_ref: &str) -> Result<(String, CellCoord), SheetError> {
        let reference = self
            .find_named_range(name_or_ref)
            .map(|n| n.reference.as_str())
            .unwrap_or(name_or_ref);

        let parsed = parse_reference(reference)?;
        let sheet = self.sheet(parsed.sheet.as_deref())?;
        Ok((sheet.name.clone(), parsed.coord))
    }

    /// Write one value; the sheet defaults to the first sheet
    pub fn write_cell(
        &mut self,
        sheet_name: Option<&str>,
        address: &str,
        value: &Value,
    ) -> Result<WriteResult, SheetError> {
        let sheet = self.sheet_mut(sheet_name)?;
        let coord = decode_address(address)?;
        let value = CellValue::infer(value);
        sheet.set_cell(coord, value.clone());

        Ok(WriteResult {
            sheet_name: sheet.name.clone(),
            cell: coord.to_a1(),
            value,
        })
    }

    /// Apply writes in order. Blank or malformed addresses are skipped and
    /// reported; applied entries are kept even when later entries are skipped.
    pub fn write_cells_bulk(
        &mut self,
        sheet_name: Option<&str>,
        writes: &[CellWrite],
        respect_merges: bool,
    ) -> Result<BulkWriteResult, SheetError> {
        let sheet = self.sheet_mut(sheet_name)?;
        let mut applied = Vec::with_capacity(writes.len());
        let mut skipped = Vec::new();

        for (index, write) in writes.iter().enumerate() {
            let address = write.cell.as_deref().unwrap_or_default();
            if address.trim().is_empty() {
                skipped.push(SkippedWrite {
                    index,
                    cell: address.to_string(),
                    reason: "cell address is blank".to_string(),
                });
                continue;
            }

            let coord = match decode_address(address) {
                Ok(coord) => coord,
                Err(err) => {
                    skipped.push(SkippedWrite {
                        index,
                        cell: address.to_string(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };
            let target = if respect_merges {
                sheet.merge_anchor(coord)
            } else {
                coord
            };

            let value = CellValue::infer(&write.value);
            sheet.set_cell(target, value.clone());
            applied.push(AppliedWrite {
                cell: target.to_a1(),
                value,
            });
        }

        Ok(BulkWriteResult {
            sheet_name: sheet.name.clone(),
            applied,
            skipped,
            used_range: sheet.used_range().map(|r| r.to_a1()),
        })
    }

    /// Write through a defined name (or a raw reference)
    pub fn write_named_value(
        &mut self,
        name: &str,
        value: &Value,
    ) -> Result<WriteResult, SheetError> {
        let (sheet_name, coord) = self.resolve_reference(name)?;
        self.write_cell(Some(&sheet_name), &coord.to_a1(), value)
    }

    /// Read a window of at most `max_rows` x `max_cols` values starting at A1.
    ///
    /// The window is clipped to the used range; a sheet without one yields
    /// the full requested size. Missing cells are empty strings.
    pub fn read_preview(
        &self,
        sheet_name: Option<&str>,
        max_rows: usize,
        max_cols: usize,
    ) -> Result<Preview, SheetError> {
        let sheet = self.sheet(sheet_name)?;
        let (rows, cols) = match sheet.used_range() {
            Some(range) => (
                max_rows.min(range.end.row as usize + 1),
                max_cols.min(range.end.col as usize + 1),
            ),
            None => (max_rows, max_cols),
        };

        let data = (0..rows)
            .map(|r| {
                (0..cols)
                    .map(|c| {
                        sheet
                            .get_cell(CellCoord::new(r as u32, c as u32))
                            .cloned()
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect();

        Ok(Preview {
            sheet_name: sheet.name.clone(),
            rows,
            cols,
            data,
        })
    }
}

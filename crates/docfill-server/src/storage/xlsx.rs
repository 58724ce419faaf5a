//! xlsx persistence backed by umya-spreadsheet.

use std::path::Path;

use docfill_core::{CellCoord, CellRange, CellValue, Sheet, SheetError, Workbook, WorkbookStore};
use umya_spreadsheet::{CellRawValue, Spreadsheet};

use super::ensure_parent;
use crate::error::AppError;

/// Loads workbooks from xlsx files and writes changed cells back
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxStore;

impl WorkbookStore for XlsxStore {
    type Error = AppError;

    fn load(&self, path: &Path) -> Result<Workbook, AppError> {
        if !path.is_file() {
            return Err(AppError::excel_not_found(path));
        }
        let book = umya_spreadsheet::reader::xlsx::read(path)?;
        let workbook = to_workbook(&book);
        tracing::debug!(
            path = %path.display(),
            sheets = workbook.sheets.len(),
            "loaded workbook"
        );
        Ok(workbook)
    }

    /// Re-reads `source` so styles, formulas and everything the in-memory
    /// model does not carry survive; only written cells are patched.
    fn save(&self, workbook: &Workbook, source: &Path, destination: &Path) -> Result<(), AppError> {
        let mut book = umya_spreadsheet::reader::xlsx::read(source)?;

        let mut patched = 0usize;
        for sheet in workbook.sheets.iter().filter(|s| s.has_changes()) {
            let target = book
                .get_sheet_by_name_mut(&sheet.name)
                .ok_or_else(|| SheetError::SheetNotFound(sheet.name.clone()))?;
            for (coord, value) in sheet.written_cells() {
                let cell = target.get_cell_mut((coord.col + 1, coord.row + 1));
                match value {
                    CellValue::Number(n) => {
                        cell.set_value_number(*n);
                    }
                    CellValue::Text(s) => {
                        cell.set_value_string(s.clone());
                    }
                    CellValue::Boolean(b) => {
                        cell.set_value_bool(*b);
                    }
                }
                patched += 1;
            }
        }

        ensure_parent(destination)?;
        umya_spreadsheet::writer::xlsx::write(&book, destination)?;
        tracing::info!(
            path = %destination.display(),
            cells = patched,
            "saved workbook"
        );
        Ok(())
    }
}

fn to_workbook(book: &Spreadsheet) -> Workbook {
    let mut workbook = Workbook::new();

    for defined in book.get_defined_names() {
        workbook.add_named_range(defined.get_name(), defined.get_address());
    }

    for ws in book.get_sheet_collection() {
        let cells = ws.get_cell_collection().into_iter().filter_map(|cell| {
            let coord = cell.get_coordinate();
            let value = cell_value(cell.get_cell_value())?;
            let row = coord.get_row_num().checked_sub(1)?;
            let col = coord.get_col_num().checked_sub(1)?;
            Some((CellCoord::new(row, col), value))
        });
        let merges = ws
            .get_merge_cells()
            .iter()
            .filter_map(|range| CellRange::from_a1(&range.get_range()))
            .collect();
        workbook.add_sheet(Sheet::with_contents(ws.get_name(), cells, merges));

        for defined in ws.get_defined_names() {
            workbook.add_named_range(defined.get_name(), defined.get_address());
        }
    }

    workbook
}

fn cell_value(value: &umya_spreadsheet::CellValue) -> Option<CellValue> {
    match value.get_raw_value() {
        CellRawValue::Empty => None,
        CellRawValue::Numeric(n) => Some(CellValue::Number(*n)),
        CellRawValue::Bool(b) => Some(CellValue::Boolean(*b)),
        CellRawValue::Lazy(text) => {
            let text: &str = text.as_ref();
            Some(match stored_number(text) {
                Some(n) => CellValue::Number(n),
                None if text.eq_ignore_ascii_case("TRUE") => CellValue::Boolean(true),
                None if text.eq_ignore_ascii_case("FALSE") => CellValue::Boolean(false),
                None => CellValue::Text(text.to_string()),
            })
        }
        _ => Some(CellValue::Text(value.get_value().to_string())),
    }
}

/// Unparsed cell text that looks like a number Excel wrote. Text such as
/// "007", "+5" or "inf" stays text.
fn stored_number(text: &str) -> Option<f64> {
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    let mut chars = unsigned.chars();
    let first = chars.next()?;
    let leading_zero = first == '0' && chars.next().is_some_and(|c| c.is_ascii_digit());
    if leading_zero || !(first.is_ascii_digit() || first == '.') {
        return None;
    }
    text.parse::<f64>().ok().filter(|n| n.is_finite())
}

pub mod cell;
pub mod error;
pub mod range;
pub mod reference;
pub mod sheet;
pub mod storage;
pub mod workbook;

pub use cell::CellValue;
pub use error::SheetError;
pub use range::{
    col_from_label, col_to_label, decode_address, encode_address, expand_range, merge_anchor,
    CellCoord, CellRange,
};
pub use reference::{parse_reference, SheetReference};
pub use sheet::Sheet;
pub use storage::WorkbookStore;
pub use workbook::{
    AppliedWrite, BulkWriteResult, CellWrite, NamedRange, Preview, SkippedWrite, Workbook,
    WriteResult,
};

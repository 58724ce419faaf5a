use std::path::Path;

use crate::workbook::Workbook;

/// Load/save capability for a workbook file format
///
/// Implementations read the whole file into a [`Workbook`] and write it back
/// whole. `save` receives the path the workbook was loaded from so a backend
/// can carry over content the in-memory model does not represent (styles,
/// formulas, drawings) and patch only the cells written since load.
pub trait WorkbookStore {
    type Error;

    fn load(&self, path: &Path) -> Result<Workbook, Self::Error>;

    /// Persist `workbook` to `destination`, creating missing parent directories.
    /// `source` may equal `destination` for in-place saves.
    fn save(&self, workbook: &Workbook, source: &Path, destination: &Path)
        -> Result<(), Self::Error>;
}

mod uploads;
mod xlsx;

use std::io;
use std::path::{Path, PathBuf};

pub use uploads::{StoredUpload, UploadStore};
pub use xlsx::XlsxStore;

/// Resolve a client-supplied path against the working directory
pub fn resolve_path(path: &str) -> io::Result<PathBuf> {
    std::path::absolute(path)
}

/// Create the parent directories of `path` when missing
pub fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// `report.docx` becomes `report.out.docx`; other names get `.out.docx` appended
pub fn default_output_path(template: &Path) -> PathBuf {
    let text = template.to_string_lossy();
    let stem = match text.len().checked_sub(".docx".len()) {
        Some(cut) if text.is_char_boundary(cut) && text[cut..].eq_ignore_ascii_case(".docx") => {
            &text[..cut]
        }
        _ => &text[..],
    };
    PathBuf::from(format!("{stem}.out.docx"))
}

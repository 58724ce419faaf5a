use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::AppError;

/// Where multipart uploads land; the directory is also served under `/uploads`
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    unsafe_chars: Regex,
}

/// A file written by [`UploadStore::save`]
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub path: PathBuf,
    pub file_name: String,
}

impl StoredUpload {
    /// Public URL the file is served from
    pub fn url(&self) -> String {
        format!("/uploads/{}", self.file_name)
    }
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, regex::Error> {
        Ok(Self {
            dir: dir.into(),
            unsafe_chars: Regex::new(r"[^A-Za-z0-9_.\-]")?,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist an uploaded file as `<unix millis>_<sanitised original name>`
    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<StoredUpload, AppError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let file_name = format!(
            "{}_{}",
            chrono::Utc::now().timestamp_millis(),
            self.sanitize(original_name)
        );
        let path = std::path::absolute(self.dir.join(&file_name))?;
        tokio::fs::write(&path, bytes).await?;

        tracing::info!(path = %path.display(), size = bytes.len(), "stored upload");
        Ok(StoredUpload { path, file_name })
    }

    fn sanitize(&self, name: &str) -> String {
        let name = self.unsafe_chars.replace_all(name.trim(), "_");
        if name.is_empty() {
            "upload".to_string()
        } else {
            name.into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        let store = UploadStore::new("uploads").unwrap();
        assert_eq!(store.sanitize("Q1 report (final).xlsx"), "Q1_report__final_.xlsx");
        assert_eq!(store.sanitize("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(store.sanitize(""), "upload");
    }

    #[tokio::test]
    async fn test_save_writes_timestamped_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().join("incoming")).unwrap();

        let stored = store.save("letter.docx", b"data").await.unwrap();

        assert!(stored.file_name.ends_with("_letter.docx"));
        assert!(stored.url().starts_with("/uploads/"));
        assert_eq!(std::fs::read(&stored.path).unwrap(), b"data");
        assert!(stored.path.starts_with(dir.path().join("incoming")));
    }
}

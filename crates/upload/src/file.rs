//! Files handed to the orchestrator.

use std::path::{Path, PathBuf};

use crate::errors::*;

/// Accepted file name suffix (case-sensitive).
pub const ACCEPTED_EXTENSION: &str = ".vcf";

/// Largest accepted upload: 100 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    Path(PathBuf),
    Memory(Vec<u8>),
}

/// A file selected for upload. Its contents are not read until needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub size: u64,
    pub source: FileSource,
}

impl UploadFile {
    /// Describe a file on disk; only its metadata is touched.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| UploadError::Validation(format!("cannot stat {}: {e}", path.display())))?;
        if !metadata.is_file() {
            return Err(UploadError::Validation(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            name,
            size: metadata.len(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            source: FileSource::Memory(bytes),
        }
    }

    /// Name, extension and size checks. Runs before any pipeline stage.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(UploadError::Validation("file name is empty".to_string()));
        }
        if !self.name.ends_with(ACCEPTED_EXTENSION) {
            return Err(UploadError::Validation(format!(
                "Please upload a VCF file (got `{}`)",
                self.name
            )));
        }
        if self.size > MAX_UPLOAD_BYTES {
            return Err(UploadError::Validation(format!(
                "file is {} bytes, limit is {} bytes",
                self.size, MAX_UPLOAD_BYTES
            )));
        }
        Ok(())
    }

    pub async fn read_bytes(&self) -> Result<Vec<u8>> {
        match &self.source {
            FileSource::Memory(bytes) => Ok(bytes.clone()),
            FileSource::Path(path) => tokio::fs::read(path).await.map_err(|e| {
                UploadError::Validation(format!("cannot read {}: {e}", path.display()))
            }),
        }
    }

    /// Contents as UTF-8 text.
    pub async fn read_text(&self) -> Result<String> {
        let bytes = self.read_bytes().await?;
        String::from_utf8(bytes)
            .map_err(|_| UploadError::Validation(format!("{} is not UTF-8 text", self.name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_rules() {
        assert!(UploadFile::from_bytes("sample.vcf", b"##".to_vec()).validate().is_ok());

        for name in ["sample.txt", "sample.VCF", "sample.vcf.gz", "", "   "] {
            let file = UploadFile::from_bytes(name, b"##".to_vec());
            assert!(
                matches!(file.validate(), Err(UploadError::Validation(_))),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_size_ceiling() {
        let mut file = UploadFile::from_bytes("big.vcf", Vec::new());
        file.size = MAX_UPLOAD_BYTES;
        assert!(file.validate().is_ok());
        file.size = MAX_UPLOAD_BYTES + 1;
        assert!(matches!(file.validate(), Err(UploadError::Validation(_))));
    }

    #[tokio::test]
    async fn test_from_path_reads_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.vcf");
        std::fs::write(&path, "##fileformat").unwrap();

        let file = UploadFile::from_path(&path).await.unwrap();
        assert_eq!(file.name, "sample.vcf");
        assert_eq!(file.size, 12);
        assert_eq!(file.read_text().await.unwrap(), "##fileformat");
    }

    #[tokio::test]
    async fn test_non_utf8_is_rejected() {
        let file = UploadFile::from_bytes("sample.vcf", vec![0xff, 0xfe, 0x00]);
        assert!(matches!(
            file.read_text().await,
            Err(UploadError::Validation(_))
        ));
    }
}

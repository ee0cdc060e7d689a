use std::path::{Path, PathBuf};

use reqwest::multipart::{Form, Part};

use crate::error::{ClientError, ClientResult};

/// Content types the backend knows how to ingest.
pub const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "image/png",
    "image/jpeg",
    "image/webp",
    "text/plain",
];

#[derive(Debug, Clone)]
enum FileSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// A file the user picked for ingestion. Bytes behind a path are only read
/// once the file has passed validation and is about to be sent.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub content_type: Option<String>,
    source: FileSource,
}

impl UploadFile {
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Self {
            name,
            content_type: infer_content_type(path),
            source: FileSource::Path(path.to_path_buf()),
        }
    }

    pub fn from_bytes(name: &str, content_type: Option<&str>, data: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            content_type: content_type.map(str::to_string),
            source: FileSource::Bytes(data),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ALLOWED_CONTENT_TYPES.contains(&ct))
    }

    pub fn validate(&self) -> ClientResult<()> {
        if self.is_supported() {
            Ok(())
        } else {
            Err(ClientError::UnsupportedFileType {
                file_name: self.name.clone(),
                content_type: self.content_type.clone(),
            })
        }
    }

    async fn read_bytes(&self) -> ClientResult<Vec<u8>> {
        match &self.source {
            FileSource::Bytes(data) => Ok(data.clone()),
            FileSource::Path(path) => tokio::fs::read(path).await.map_err(|source| ClientError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    /// Build the multipart body with the single `file` field.
    pub async fn to_form(&self) -> ClientResult<Form> {
        let data = self.read_bytes().await?;
        let mut part = Part::bytes(data).file_name(self.name.clone());
        if let Some(content_type) = &self.content_type {
            part = part
                .mime_str(content_type)
                .map_err(|e| ClientError::InvalidPayload(format!("bad content type: {}", e)))?;
        }
        Ok(Form::new().part("file", part))
    }
}

/// Infers the declared content type from the file extension.
fn infer_content_type(path: &Path) -> Option<String> {
    mime_guess::from_path(path)
        .first()
        .map(|mime| mime.essence_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_every_allowed_extension() {
        for name in ["report.pdf", "notes.docx", "scan.png", "photo.jpg", "photo.jpeg", "shot.webp", "readme.txt"] {
            let file = UploadFile::from_path(name);
            assert!(file.is_supported(), "{} should be accepted (got {:?})", name, file.content_type);
        }
    }

    #[test]
    fn rejects_unlisted_types() {
        for name in ["archive.zip", "slides.pptx", "legacy.doc", "movie.mp4", "no_extension"] {
            let file = UploadFile::from_path(name);
            let err = file.validate().unwrap_err();
            assert!(matches!(err, ClientError::UnsupportedFileType { .. }), "{}", name);
        }
    }

    #[test]
    fn name_is_the_final_path_component() {
        let file = UploadFile::from_path("/tmp/some/dir/report.pdf");
        assert_eq!(file.name, "report.pdf");
        assert_eq!(file.content_type.as_deref(), Some("application/pdf"));
    }

    #[test]
    fn declared_type_wins_for_in_memory_files() {
        let file = UploadFile::from_bytes("blob", Some("image/webp"), vec![1, 2, 3]);
        assert!(file.is_supported());

        let untyped = UploadFile::from_bytes("blob.pdf", None, vec![]);
        assert!(!untyped.is_supported());
    }

    #[tokio::test]
    async fn missing_file_surfaces_io_error() {
        let file = UploadFile::from_path("/definitely/not/here/report.pdf");
        let err = file.to_form().await.unwrap_err();
        assert!(matches!(err, ClientError::Io { .. }));
    }
}

use chrono::Utc;
use doc_model::{DocumentContent, DocumentId, DocumentRecord};
use pdf_engine::{PdfBackend, PdfDocument};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::thumbnail::{placeholder_thumbnail, render_thumbnail, ThumbnailSize};

pub const PDF_MIME_TYPE: &str = "application/pdf";
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// A file handed to the library, with the bytes already read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, mime_type: Option<&str>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), mime_type: mime_type.map(ToOwned::to_owned), bytes }
    }

    /// Reads a file from disk. The MIME type is inferred from the extension.
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = has_pdf_extension(&name).then(|| PDF_MIME_TYPE.to_owned());

        Ok(Self { name, mime_type, bytes })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{name} is not a PDF file")]
    NotPdf { name: String },
    #[error("{name} is too large. Maximum file size is {limit_mb}MB.")]
    TooLarge { name: String, size: u64, limit_mb: u64 },
    #[error("{name} is empty")]
    Empty { name: String },
}

impl ValidationError {
    pub fn file_name(&self) -> &str {
        match self {
            Self::NotPdf { name } | Self::TooLarge { name, .. } | Self::Empty { name } => name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    pub max_upload_bytes: u64,
    pub thumbnail_size: ThumbnailSize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self { max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES, thumbnail_size: ThumbnailSize::default() }
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub accepted: Vec<DocumentRecord>,
    pub rejected: Vec<ValidationError>,
}

pub struct Ingestor<B: PdfBackend> {
    backend: B,
    options: IngestOptions,
}

impl<B: PdfBackend> Ingestor<B> {
    pub fn new(backend: B, options: IngestOptions) -> Self {
        Self { backend, options }
    }

    pub fn validate(&self, file: &UploadedFile) -> Result<(), ValidationError> {
        let is_pdf_type = file.mime_type.as_deref() == Some(PDF_MIME_TYPE);
        if !is_pdf_type && !has_pdf_extension(&file.name) {
            return Err(ValidationError::NotPdf { name: file.name.clone() });
        }

        if file.size() > self.options.max_upload_bytes {
            return Err(ValidationError::TooLarge {
                name: file.name.clone(),
                size: file.size(),
                limit_mb: self.options.max_upload_bytes / BYTES_PER_MB,
            });
        }

        if file.size() == 0 {
            return Err(ValidationError::Empty { name: file.name.clone() });
        }

        Ok(())
    }

    /// Assembles a record with a fresh id. Thumbnail and title are derived
    /// from the decoded document and fall back to a placeholder image and
    /// the cleaned file name when decoding or rendering fails.
    pub fn build_record(&self, file: UploadedFile) -> DocumentRecord {
        let (thumbnail, title) = match self.backend.decode(&file.bytes) {
            Ok(document) => {
                let thumbnail = render_thumbnail(&document).unwrap_or_else(|err| {
                    debug!(name = %file.name, error = %err, "thumbnail render failed, using placeholder");
                    placeholder_thumbnail(self.options.thumbnail_size, &file.name, file.size())
                });
                (thumbnail, document_title(&document, &file.name))
            }
            Err(err) => {
                debug!(name = %file.name, error = %err, "could not decode for thumbnail and title");
                (
                    placeholder_thumbnail(self.options.thumbnail_size, &file.name, file.size()),
                    clean_file_name(&file.name),
                )
            }
        };

        DocumentRecord {
            id: DocumentId::new_random(),
            display_name: file.name,
            title,
            content: Some(DocumentContent::new(file.bytes)),
            thumbnail,
            uploaded_at: Utc::now(),
        }
    }

    pub fn ingest(&self, file: UploadedFile) -> Result<DocumentRecord, ValidationError> {
        self.validate(&file)?;
        let record = self.build_record(file);

        info!(id = %record.id, name = %record.display_name, title = %record.title, "ingested file");
        Ok(record)
    }

    /// Ingests every file independently; a rejected file does not stop the
    /// rest of the batch.
    pub fn ingest_batch<I>(&self, files: I) -> BatchReport
    where
        I: IntoIterator<Item = UploadedFile>,
    {
        let mut report = BatchReport::default();

        for file in files {
            match self.ingest(file) {
                Ok(record) => report.accepted.push(record),
                Err(err) => {
                    warn!(error = %err, "rejected upload");
                    report.rejected.push(err);
                }
            }
        }

        report
    }
}

pub fn document_title<D: PdfDocument>(document: &D, file_name: &str) -> String {
    document
        .metadata_title()
        .map(|title| title.trim().to_owned())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| clean_file_name(file_name))
}

/// Drops a trailing `.pdf` and turns `-` and `_` into spaces.
pub fn clean_file_name(file_name: &str) -> String {
    let stem = if has_pdf_extension(file_name) {
        &file_name[..file_name.len() - ".pdf".len()]
    } else {
        file_name
    };

    stem.replace(['-', '_'], " ").trim().to_owned()
}

fn has_pdf_extension(name: &str) -> bool {
    name.len() >= 4
        && name.is_char_boundary(name.len() - 4)
        && name[name.len() - 4..].eq_ignore_ascii_case(".pdf")
}

pub mod collection;
pub mod extract;
pub mod ingest;
pub mod settings;
pub mod thumbnail;

pub use collection::Library;
pub use ingest::{BatchReport, IngestOptions, Ingestor, UploadedFile, ValidationError};
pub use thumbnail::ThumbnailSize;

use doc_model::DocumentId;
use pdf_engine::PdfEngineError;
use storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("File not available. Please re-upload the PDF. (document {id})")]
    ContentUnavailable { id: DocumentId },
    #[error("no document with id {id}")]
    NotFound { id: DocumentId },
    #[error("a document with id {id} already exists")]
    DuplicateId { id: DocumentId },
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Engine(#[from] PdfEngineError),
    #[error("image encoding error: {0}")]
    Image(#[from] image::ImageError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub const EXPORT_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn new_random() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Live handle on the bytes of an uploaded file. Only exists for files
/// added during the current run; it is never written to the store.
#[derive(Clone, PartialEq, Eq)]
pub struct DocumentContent(Arc<[u8]>);

impl DocumentContent {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self(bytes.into())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for DocumentContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentContent({} bytes)", self.0.len())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub display_name: String,
    pub title: String,
    pub content: Option<DocumentContent>,
    pub thumbnail: String,
    pub uploaded_at: DateTime<Utc>,
}

impl DocumentRecord {
    /// A stale record was reloaded from metadata and cannot be opened.
    pub fn is_stale(&self) -> bool {
        self.content.is_none()
    }

    pub fn size_bytes(&self) -> Option<u64> {
        self.content.as_ref().map(|content| content.len() as u64)
    }

    pub fn to_stored(&self) -> StoredRecord {
        StoredRecord {
            id: self.id.clone(),
            name: self.display_name.clone(),
            title: self.title.clone(),
            thumbnail: self.thumbnail.clone(),
            upload_date: self.uploaded_at,
        }
    }

    pub fn from_stored(stored: StoredRecord) -> Self {
        Self {
            id: stored.id,
            display_name: stored.name,
            title: stored.title,
            content: None,
            thumbnail: stored.thumbnail,
            uploaded_at: stored.upload_date,
        }
    }
}

/// Metadata-only shape of a record as persisted and exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    pub id: DocumentId,
    pub name: String,
    pub title: String,
    pub thumbnail: String,
    pub upload_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryExport {
    pub pdfs: Vec<StoredRecord>,
    pub export_date: DateTime<Utc>,
    pub version: String,
}

impl LibraryExport {
    pub fn new(pdfs: Vec<StoredRecord>, export_date: DateTime<Utc>) -> Self {
        Self { pdfs, export_date, version: EXPORT_VERSION.to_owned() }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Title, ascending.
    Name,
    /// Newest upload first.
    #[default]
    Date,
}

/// Zoom factor held as a count of quarter steps, so that stepping in and
/// back out always lands on the exact starting value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Zoom(u8);

impl Zoom {
    const MIN_STEPS: u8 = 2;
    const MAX_STEPS: u8 = 12;
    const DEFAULT_STEPS: u8 = 4;

    pub const MIN: Zoom = Zoom(Self::MIN_STEPS);
    pub const MAX: Zoom = Zoom(Self::MAX_STEPS);

    /// Nearest quarter step to `factor`, clamped to `[0.5, 3.0]`. A
    /// non-finite factor gives the default zoom.
    pub fn from_factor(factor: f32) -> Self {
        if !factor.is_finite() {
            return Self::default();
        }

        let steps = (factor * 4.0).round().clamp(Self::MIN_STEPS as f32, Self::MAX_STEPS as f32);
        Self(steps as u8)
    }

    pub fn factor(self) -> f32 {
        f32::from(self.0) / 4.0
    }

    pub fn percent(self) -> u16 {
        u16::from(self.0) * 25
    }

    pub fn can_zoom_in(self) -> bool {
        self.0 < Self::MAX_STEPS
    }

    pub fn can_zoom_out(self) -> bool {
        self.0 > Self::MIN_STEPS
    }

    pub fn zoomed_in(self) -> Self {
        Self((self.0 + 1).min(Self::MAX_STEPS))
    }

    pub fn zoomed_out(self) -> Self {
        Self(self.0.saturating_sub(1).max(Self::MIN_STEPS))
    }
}

impl Default for Zoom {
    fn default() -> Self {
        Self(Self::DEFAULT_STEPS)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(self) -> u16 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Deg0 => Self::Deg90,
            Self::Deg90 => Self::Deg180,
            Self::Deg180 => Self::Deg270,
            Self::Deg270 => Self::Deg0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderState {
    pub current_page: u32,
    pub zoom: Zoom,
    pub rotation: Rotation,
}

impl Default for ReaderState {
    fn default() -> Self {
        Self { current_page: 1, zoom: Zoom::default(), rotation: Rotation::default() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderAction {
    GoToPage(u32),
    NextPage,
    PreviousPage,
    ZoomIn,
    ZoomOut,
    Rotate,
}

/// Applies `action` and reports whether anything changed. Out-of-range
/// pages and zoom steps past the bounds leave the state untouched.
pub fn apply_reader_action(state: &mut ReaderState, total_pages: u32, action: ReaderAction) -> bool {
    let before = *state;

    match action {
        ReaderAction::GoToPage(page) => {
            if (1..=total_pages).contains(&page) {
                state.current_page = page;
            }
        }
        ReaderAction::NextPage => {
            return apply_reader_action(
                state,
                total_pages,
                ReaderAction::GoToPage(state.current_page.saturating_add(1)),
            );
        }
        ReaderAction::PreviousPage => {
            return apply_reader_action(
                state,
                total_pages,
                ReaderAction::GoToPage(state.current_page.saturating_sub(1)),
            );
        }
        ReaderAction::ZoomIn => state.zoom = state.zoom.zoomed_in(),
        ReaderAction::ZoomOut => state.zoom = state.zoom.zoomed_out(),
        ReaderAction::Rotate => state.rotation = state.rotation.next(),
    }

    *state != before
}

use doc_model::{DocumentContent, DocumentId, DocumentRecord, SortOrder, StoredRecord};
use storage::MetadataStore;
use tracing::{debug, info};

use crate::CatalogError;

/// The in-memory set of records backed by a metadata store. Every
/// mutation rewrites the store in full; a failed write leaves the
/// in-memory set as it was.
pub struct Library<S: MetadataStore> {
    store: S,
    records: Vec<DocumentRecord>,
}

impl<S: MetadataStore> Library<S> {
    /// Reads the stored metadata. Every loaded record is stale.
    pub fn load(store: S) -> Result<Self, CatalogError> {
        let records: Vec<DocumentRecord> =
            store.load_all()?.into_iter().map(DocumentRecord::from_stored).collect();

        debug!(count = records.len(), "loaded library");
        Ok(Self { store, records })
    }

    pub fn records(&self) -> &[DocumentRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn get(&self, id: &DocumentId) -> Option<&DocumentRecord> {
        self.records.iter().find(|record| &record.id == id)
    }

    pub fn add(&mut self, record: DocumentRecord) -> Result<(), CatalogError> {
        if self.get(&record.id).is_some() {
            return Err(CatalogError::DuplicateId { id: record.id });
        }

        self.records.push(record);
        if let Err(err) = self.persist() {
            self.records.pop();
            return Err(err);
        }

        if let Some(record) = self.records.last() {
            info!(id = %record.id, title = %record.title, "added document");
        }
        Ok(())
    }

    pub fn delete(&mut self, id: &DocumentId) -> Result<DocumentRecord, CatalogError> {
        let index = self.index_of(id)?;
        let removed = self.records.remove(index);

        if let Err(err) = self.persist() {
            self.records.insert(index, removed);
            return Err(err);
        }

        info!(id = %removed.id, "deleted document");
        Ok(removed)
    }

    /// Removes every record and returns how many there were.
    pub fn clear(&mut self) -> Result<usize, CatalogError> {
        let previous = std::mem::take(&mut self.records);

        if let Err(err) = self.persist() {
            self.records = previous;
            return Err(err);
        }

        info!(count = previous.len(), "cleared library");
        Ok(previous.len())
    }

    /// Records whose title or file name contains `query` (case-insensitive),
    /// in the requested order.
    pub fn view(&self, query: &str, sort: SortOrder) -> Vec<&DocumentRecord> {
        let needle = query.to_lowercase();

        let mut visible: Vec<&DocumentRecord> = self
            .records
            .iter()
            .filter(|record| {
                record.title.to_lowercase().contains(&needle)
                    || record.display_name.to_lowercase().contains(&needle)
            })
            .collect();

        match sort {
            SortOrder::Name => {
                visible.sort_by_cached_key(|record| record.title.to_lowercase());
            }
            SortOrder::Date => visible.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at)),
        }

        visible
    }

    /// The record to open for reading. Stale records are refused.
    pub fn select(&self, id: &DocumentId) -> Result<&DocumentRecord, CatalogError> {
        let record = self.get(id).ok_or_else(|| CatalogError::NotFound { id: id.clone() })?;

        if record.is_stale() {
            return Err(CatalogError::ContentUnavailable { id: id.clone() });
        }

        Ok(record)
    }

    /// Gives a stale record its bytes back for the rest of this run.
    pub fn attach_content(
        &mut self,
        id: &DocumentId,
        content: DocumentContent,
    ) -> Result<&DocumentRecord, CatalogError> {
        let index = self.index_of(id)?;
        let record = &mut self.records[index];
        record.content = Some(content);

        debug!(id = %record.id, "attached content");
        Ok(record)
    }

    fn index_of(&self, id: &DocumentId) -> Result<usize, CatalogError> {
        self.records
            .iter()
            .position(|record| &record.id == id)
            .ok_or_else(|| CatalogError::NotFound { id: id.clone() })
    }

    fn persist(&mut self) -> Result<(), CatalogError> {
        let stored: Vec<StoredRecord> = self.records.iter().map(DocumentRecord::to_stored).collect();
        self.store.save_all(&stored)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use storage::{MemoryStore, StorageError};

    fn record(id: &str, title: &str, name: &str, day: u32) -> DocumentRecord {
        DocumentRecord {
            id: DocumentId::from(id),
            display_name: name.to_owned(),
            title: title.to_owned(),
            content: Some(DocumentContent::new(vec![0; 10])),
            thumbnail: String::new(),
            uploaded_at: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).single().expect("valid date"),
        }
    }

    fn sample_library() -> Library<MemoryStore> {
        let mut library = Library::load(MemoryStore::new()).expect("load should succeed");
        library.add(record("a", "zebra facts", "zoo.pdf", 1)).expect("add should succeed");
        library.add(record("b", "Apple pie", "recipes.pdf", 3)).expect("add should succeed");
        library.add(record("c", "mango notes", "fruit-notes.pdf", 2)).expect("add should succeed");
        library
    }

    struct FailingStore;

    impl MetadataStore for FailingStore {
        fn load_all(&self) -> Result<Vec<StoredRecord>, StorageError> {
            Ok(Vec::new())
        }

        fn save_all(&mut self, _records: &[StoredRecord]) -> Result<(), StorageError> {
            Err(StorageError::Io(std::io::Error::other("disk full")))
        }
    }

    #[test]
    fn every_mutation_rewrites_the_store() {
        let mut library = sample_library();
        assert_eq!(library.store().saves(), 3);
        assert_eq!(library.store().records().len(), 3);

        library.delete(&DocumentId::from("b")).expect("delete should succeed");
        assert_eq!(library.store().saves(), 4);
        assert_eq!(library.store().records().len(), 2);

        assert_eq!(library.clear().expect("clear should succeed"), 2);
        assert_eq!(library.store().saves(), 5);
        assert!(library.store().records().is_empty());
        assert!(library.is_empty());
    }

    #[test]
    fn reloaded_records_are_stale_and_cannot_be_selected() {
        let library = sample_library();
        let store = MemoryStore::with_records(library.store().records().to_vec());

        let reloaded = Library::load(store).expect("load should succeed");
        assert_eq!(reloaded.len(), 3);
        assert!(reloaded.records().iter().all(DocumentRecord::is_stale));

        let err = reloaded.select(&DocumentId::from("a")).expect_err("stale record");
        assert!(matches!(err, CatalogError::ContentUnavailable { .. }));
    }

    #[test]
    fn attach_content_makes_stale_record_selectable() {
        let mut library =
            Library::load(MemoryStore::with_records(vec![record("a", "A", "a.pdf", 1).to_stored()]))
                .expect("load should succeed");
        let id = DocumentId::from("a");

        library.attach_content(&id, DocumentContent::new(vec![1, 2])).expect("attach");
        assert_eq!(library.select(&id).expect("selectable").size_bytes(), Some(2));
        assert_eq!(library.store().saves(), 0);
    }

    #[test]
    fn select_unknown_id_is_not_found() {
        let library = sample_library();
        let err = library.select(&DocumentId::from("missing")).expect_err("unknown id");
        assert!(matches!(err, CatalogError::NotFound { .. }));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut library = sample_library();
        let err = library.add(record("a", "again", "again.pdf", 4)).expect_err("duplicate");

        assert!(matches!(err, CatalogError::DuplicateId { .. }));
        assert_eq!(library.len(), 3);
    }

    #[test]
    fn view_sorts_by_date_newest_first() {
        let library = sample_library();
        let ids: Vec<&str> =
            library.view("", SortOrder::Date).iter().map(|r| r.id.as_str()).collect();

        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn view_sorts_by_title_ignoring_case() {
        let library = sample_library();
        let titles: Vec<&str> =
            library.view("", SortOrder::Name).iter().map(|r| r.title.as_str()).collect();

        assert_eq!(titles, vec!["Apple pie", "mango notes", "zebra facts"]);
    }

    #[test]
    fn view_filters_on_title_or_file_name() {
        let library = sample_library();

        let by_title: Vec<&str> =
            library.view("APPLE", SortOrder::Date).iter().map(|r| r.id.as_str()).collect();
        assert_eq!(by_title, vec!["b"]);

        let by_name: Vec<&str> =
            library.view("fruit", SortOrder::Date).iter().map(|r| r.id.as_str()).collect();
        assert_eq!(by_name, vec!["c"]);

        assert!(library.view("nothing like this", SortOrder::Name).is_empty());
    }

    #[test]
    fn failed_writes_leave_records_unchanged() {
        let mut library = Library::load(FailingStore).expect("load should succeed");

        assert!(library.add(record("a", "A", "a.pdf", 1)).is_err());
        assert!(library.is_empty());
    }
}

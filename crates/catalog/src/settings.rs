//! Library statistics and backup export.

use chrono::{DateTime, NaiveDate, Utc};
use doc_model::{DocumentRecord, LibraryExport};
use serde::Serialize;

use crate::CatalogError;

const BYTE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryStats {
    pub total_documents: usize,
    /// Records loaded from the store whose content is gone.
    pub stale_documents: usize,
    /// Sum of the live content sizes. Stale records count as zero.
    pub storage_bytes: u64,
    pub last_upload: Option<DateTime<Utc>>,
}

pub fn library_stats(records: &[DocumentRecord]) -> LibraryStats {
    LibraryStats {
        total_documents: records.len(),
        stale_documents: records.iter().filter(|record| record.is_stale()).count(),
        storage_bytes: records.iter().filter_map(DocumentRecord::size_bytes).sum(),
        last_upload: records.iter().map(|record| record.uploaded_at).max(),
    }
}

/// Human readable size: `0 Bytes`, `1.5 KB`, `2 MB`.
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_owned();
    }

    let mut exponent = 0;
    while exponent + 1 < BYTE_UNITS.len() && bytes >= 1024_u64.pow(exponent as u32 + 1) {
        exponent += 1;
    }
    let value = bytes as f64 / 1024_u64.pow(exponent as u32) as f64;

    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');

    format!("{trimmed} {}", BYTE_UNITS[exponent])
}

pub fn export_library(records: &[DocumentRecord], now: DateTime<Utc>) -> LibraryExport {
    LibraryExport::new(records.iter().map(DocumentRecord::to_stored).collect(), now)
}

pub fn export_json(export: &LibraryExport) -> Result<String, CatalogError> {
    Ok(serde_json::to_string_pretty(export)?)
}

pub fn export_file_name(date: NaiveDate) -> String {
    format!("pdf-library-backup-{}.json", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use doc_model::{DocumentContent, DocumentId, EXPORT_VERSION};
    use serde_json::Value;

    fn record(id: &str, size: Option<usize>, day: u32) -> DocumentRecord {
        DocumentRecord {
            id: DocumentId::from(id),
            display_name: format!("{id}.pdf"),
            title: id.to_owned(),
            content: size.map(|size| DocumentContent::new(vec![0; size])),
            thumbnail: "data:image/png;base64,AAAA".to_owned(),
            uploaded_at: Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).single().expect("valid date"),
        }
    }

    #[test]
    fn format_bytes_matches_expected_strings() {
        assert_eq!(format_bytes(0), "0 Bytes");
        assert_eq!(format_bytes(512), "512 Bytes");
        assert_eq!(format_bytes(1024), "1 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1_234_567), "1.18 MB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5 GB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024 * 1024), "3072 GB");
    }

    #[test]
    fn stats_count_live_bytes_and_stale_records() {
        let records = vec![record("a", Some(1000), 1), record("b", None, 9), record("c", Some(24), 4)];
        let stats = library_stats(&records);

        assert_eq!(stats.total_documents, 3);
        assert_eq!(stats.stale_documents, 1);
        assert_eq!(stats.storage_bytes, 1024);
        assert_eq!(stats.last_upload, Some(records[1].uploaded_at));
    }

    #[test]
    fn stats_of_empty_library() {
        let stats = library_stats(&[]);

        assert_eq!(stats.total_documents, 0);
        assert_eq!(stats.storage_bytes, 0);
        assert_eq!(stats.last_upload, None);
    }

    #[test]
    fn export_has_documented_shape() {
        let now = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).single().expect("valid date");
        let export = export_library(&[record("a", Some(3), 1)], now);
        let value: Value =
            serde_json::from_str(&export_json(&export).expect("serializes")).expect("valid json");

        assert_eq!(value["version"], EXPORT_VERSION);
        assert_eq!(value["exportDate"], "2024-05-06T07:08:09Z");
        assert_eq!(value["pdfs"][0]["id"], "a");
        assert_eq!(value["pdfs"][0]["name"], "a.pdf");
        assert_eq!(value["pdfs"][0]["thumbnail"], "data:image/png;base64,AAAA");
        assert!(value["pdfs"][0].get("uploadDate").is_some());
        assert!(value["pdfs"][0].get("content").is_none());
    }

    #[test]
    fn export_file_name_uses_calendar_date() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 9).expect("valid date");
        assert_eq!(export_file_name(date), "pdf-library-backup-2024-02-09.json");
    }
}

use crate::error::{GenError, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

struct ArchiveState {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    entries: HashSet<String>,
}

/// In-memory zip writer shared by concurrent renderers.
///
/// Entries are written one at a time under a mutex; a path can only be
/// written once.
pub struct ArchiveWriter {
    state: Mutex<ArchiveState>,
}

impl std::fmt::Debug for ArchiveWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveWriter")
            .field("entries", &self.state.lock().entries.len())
            .finish()
    }
}

impl Default for ArchiveWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveWriter {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ArchiveState {
                zip: ZipWriter::new(Cursor::new(Vec::new())),
                entries: HashSet::new(),
            }),
        }
    }

    /// # Errors
    ///
    /// [`GenError::Archive`] for a duplicate path or a zip write failure.
    pub fn add(&self, path: &str, content: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        if !state.entries.insert(path.to_string()) {
            return Err(GenError::Archive(format!("duplicate archive entry `{path}`")));
        }
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        state
            .zip
            .start_file(path, options)
            .map_err(|e| GenError::Archive(format!("start {path}: {e}")))?;
        state
            .zip
            .write_all(content)
            .map_err(|e| GenError::Archive(format!("write {path}: {e}")))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close the archive and return its bytes.
    ///
    /// # Errors
    ///
    /// [`GenError::Archive`] when the central directory cannot be written.
    pub fn finish(self) -> Result<Vec<u8>> {
        let state = self.state.into_inner();
        let cursor = state
            .zip
            .finish()
            .map_err(|e| GenError::Archive(format!("finish: {e}")))?;
        Ok(cursor.into_inner())
    }
}

/// Suggested download name: `{table}_{stamp}.zip` for one table,
/// `tables_bundle_{stamp}.zip` otherwise.
pub fn archive_filename(table_names: &[&str], now: DateTime<Utc>) -> String {
    let stamp = now.format("%Y%m%d%H%M%S");
    match table_names {
        [single] => format!("{single}_{stamp}.zip"),
        _ => format!("tables_bundle_{stamp}.zip"),
    }
}

/// Archive directory per table, by class name. Repeated class names get the
/// GenTable id appended.
pub fn namespace_prefixes(tables: &[(i64, &str)]) -> Vec<String> {
    let mut seen = HashSet::new();
    tables
        .iter()
        .map(|(id, class_name)| {
            let base = if class_name.trim().is_empty() {
                format!("table_{id}")
            } else {
                class_name.to_string()
            };
            if seen.insert(base.clone()) {
                return base;
            }
            let mut unique = format!("{base}_{id}");
            let mut n = 2;
            while !seen.insert(unique.clone()) {
                unique = format!("{base}_{id}_{n}");
                n += 1;
            }
            unique
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Read;

    #[test]
    fn test_writes_readable_zip() {
        let writer = ArchiveWriter::new();
        writer.add("a/page.tsx", b"page").unwrap();
        writer.add("b/page.tsx", b"other").unwrap();
        assert!(writer.add("a/page.tsx", b"again").is_err());
        let bytes = writer.finish().unwrap();

        let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(zip.len(), 2);
        let mut content = String::new();
        zip.by_name("b/page.tsx")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "other");
    }

    #[test]
    fn test_filenames() {
        let now = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(archive_filename(&["users"], now), "users_20250304050607.zip");
        assert_eq!(
            archive_filename(&["users", "orders"], now),
            "tables_bundle_20250304050607.zip"
        );
    }

    #[test]
    fn test_prefixes_never_collide() {
        let p = namespace_prefixes(&[(1, "User"), (2, "Order"), (3, "User")]);
        assert_eq!(p, vec!["User", "Order", "User_3"]);
    }

    #[test]
    fn test_prefix_fallback_skips_taken_names() {
        let p = namespace_prefixes(&[(5, "User_7"), (6, "User"), (7, "User")]);
        assert_eq!(p, vec!["User_7", "User", "User_7_2"]);

        let p = namespace_prefixes(&[(1, "A"), (2, "A_3"), (3, "A"), (4, "A_3_2"), (3, "A")]);
        let unique: HashSet<&String> = p.iter().collect();
        assert_eq!(unique.len(), p.len());
    }
}

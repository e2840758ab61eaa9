//! Persisted stage 1 candidate list

use super::{read_json, write_json_atomic, StorageResult};
use crate::crawler::dedup_by_identity;
use crate::record::CandidateLink;
use std::path::{Path, PathBuf};

/// Saves and restores the candidate list so stage 1 can be skipped on restart
#[derive(Debug, Clone)]
pub struct ResumeStore {
    path: PathBuf,
}

impl ResumeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the persisted list
    ///
    /// The list is deduplicated by identity on the way in, so a hand-edited
    /// file cannot break the one-record-per-identity guarantee.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - No list has been persisted
    /// * `Ok(Some(list))` - The persisted list, possibly empty
    /// * `Err(StorageError)` - The file exists but could not be read or parsed
    pub fn load(&self) -> StorageResult<Option<Vec<CandidateLink>>> {
        let Some(rows) = read_json::<Vec<CandidateLink>>(&self.path)? else {
            return Ok(None);
        };

        let before = rows.len();
        let candidates = dedup_by_identity(rows);
        if candidates.len() < before {
            tracing::warn!(
                path = %self.path.display(),
                duplicates = before - candidates.len(),
                "Dropped duplicate identities from persisted candidates"
            );
        }

        Ok(Some(candidates))
    }

    /// The persisted list if it can stand in for stage 1
    ///
    /// Missing, empty, unreadable and corrupt files all yield `None`; the last
    /// two are logged.
    pub fn load_for_resume(&self) -> Option<Vec<CandidateLink>> {
        match self.load() {
            Ok(Some(candidates)) if !candidates.is_empty() => Some(candidates),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Ignoring persisted candidates: {}", e);
                None
            }
        }
    }

    /// Persists `candidates` as a JSON array of `{title, link}` objects
    pub fn save(&self, candidates: &[CandidateLink]) -> StorageResult<()> {
        write_json_atomic(&self.path, candidates)?;
        tracing::info!(
            path = %self.path.display(),
            count = candidates.len(),
            "Saved candidate list"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> ResumeStore {
        ResumeStore::new(dir.path().join("publications_links.json"))
    }

    #[test]
    fn test_missing_file_loads_none() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        assert!(store.load().unwrap().is_none());
        assert!(store.load_for_resume().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let candidates = vec![
            CandidateLink::new("One", "https://example.com/1"),
            CandidateLink::new("Two", "https://example.com/2"),
        ];

        store.save(&candidates).unwrap();

        assert_eq!(store.load().unwrap(), Some(candidates.clone()));
        assert_eq!(store.load_for_resume(), Some(candidates));
    }

    #[test]
    fn test_file_shape_is_title_and_link() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store
            .save(&[CandidateLink::new("One", "https://example.com/1")])
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw[0]["title"], "One");
        assert_eq!(raw[0]["link"], "https://example.com/1");
    }

    #[test]
    fn test_empty_list_does_not_resume() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save(&[]).unwrap();

        assert_eq!(store.load().unwrap(), Some(Vec::new()));
        assert!(store.load_for_resume().is_none());
    }

    #[test]
    fn test_corrupt_file_does_not_resume() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        std::fs::write(store.path(), "{ not json").unwrap();

        assert!(store.load().is_err());
        assert!(store.load_for_resume().is_none());
    }

    #[test]
    fn test_duplicates_are_collapsed_on_load() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        std::fs::write(
            store.path(),
            r#"[{"title": "a", "link": "https://x/1"}, {"title": "b", "link": "https://x/1"}]"#,
        )
        .unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, vec![CandidateLink::new("b", "https://x/1")]);
    }
}

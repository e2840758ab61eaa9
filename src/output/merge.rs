//! Final dataset reconciliation

use crate::output::stats::RunStats;
use crate::record::{CandidateLink, DetailRecord};
use crate::storage::{write_json_atomic, StorageResult};
use std::collections::HashMap;
use std::path::PathBuf;

/// Reconciles candidates with detail results and writes the run's outputs
#[derive(Debug, Clone)]
pub struct MergeWriter {
    dataset_path: PathBuf,
    stats_path: PathBuf,
}

impl MergeWriter {
    pub fn new(dataset_path: impl Into<PathBuf>, stats_path: impl Into<PathBuf>) -> Self {
        Self {
            dataset_path: dataset_path.into(),
            stats_path: stats_path.into(),
        }
    }

    /// Produces exactly one record per distinct candidate identity
    ///
    /// Every candidate starts as a placeholder; a detail record with the same
    /// identity replaces it. Detail records for identities that are not
    /// candidates are ignored. Output follows first-seen candidate order.
    ///
    /// # Example
    ///
    /// ```
    /// use gleaner::output::MergeWriter;
    /// use gleaner::{CandidateLink, DetailRecord};
    ///
    /// let candidates = vec![CandidateLink::new("A", "https://x/a"), CandidateLink::new("B", "https://x/b")];
    /// let mut detail = DetailRecord::placeholder(&candidates[1]);
    /// detail.abstract_text = "Found".to_string();
    ///
    /// let merged = MergeWriter::merge(&candidates, vec![detail]);
    /// assert_eq!(merged.len(), 2);
    /// assert_eq!(merged[1].abstract_text, "Found");
    /// ```
    pub fn merge(candidates: &[CandidateLink], details: Vec<DetailRecord>) -> Vec<DetailRecord> {
        let mut positions: HashMap<&str, usize> = HashMap::with_capacity(candidates.len());
        let mut merged: Vec<DetailRecord> = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            if !positions.contains_key(candidate.identity()) {
                positions.insert(candidate.identity(), merged.len());
                merged.push(DetailRecord::placeholder(candidate));
            }
        }

        let mut ignored = 0usize;
        for detail in details {
            match positions.get(detail.identity()) {
                Some(&index) => merged[index] = detail,
                None => ignored += 1,
            }
        }
        if ignored > 0 {
            tracing::warn!(ignored, "Detail records without a matching candidate were dropped");
        }

        merged
    }

    /// Writes the merged dataset as a JSON array
    pub fn write_dataset(&self, records: &[DetailRecord]) -> StorageResult<()> {
        write_json_atomic(&self.dataset_path, records)?;
        tracing::info!(
            path = %self.dataset_path.display(),
            records = records.len(),
            "Wrote dataset"
        );
        Ok(())
    }

    /// Writes the performance snapshot
    pub fn write_stats(&self, stats: &RunStats) -> StorageResult<()> {
        write_json_atomic(&self.stats_path, stats)?;
        tracing::info!(path = %self.stats_path.display(), "Wrote performance stats");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn enriched(candidate: &CandidateLink) -> DetailRecord {
        DetailRecord {
            title: format!("{} (full)", candidate.title),
            link: candidate.link.clone(),
            authors: vec!["Smith, J.".to_string()],
            published_date: Some("2022".to_string()),
            abstract_text: "Abstract".to_string(),
        }
    }

    #[test]
    fn test_missing_details_become_placeholders() {
        let candidates = vec![
            CandidateLink::new("A", "https://x/a"),
            CandidateLink::new("B", "https://x/b"),
            CandidateLink::new("C", "https://x/c"),
        ];
        let merged = MergeWriter::merge(&candidates, vec![enriched(&candidates[2])]);

        assert_eq!(merged.len(), 3);
        assert!(merged[0].is_placeholder());
        assert_eq!(merged[0].title, "A");
        assert!(merged[1].is_placeholder());
        assert_eq!(merged[2].title, "C (full)");
    }

    #[test]
    fn test_unknown_details_are_ignored() {
        let candidates = vec![CandidateLink::new("A", "https://x/a")];
        let stray = enriched(&CandidateLink::new("Z", "https://x/z"));
        let merged = MergeWriter::merge(&candidates, vec![stray]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].link, "https://x/a");
    }

    #[test]
    fn test_write_dataset_shape() {
        let dir = tempfile::TempDir::new().unwrap();
        let writer = MergeWriter::new(dir.path().join("data.json"), dir.path().join("stats.json"));
        let candidates = vec![CandidateLink::new("A", "https://x/a")];

        writer
            .write_dataset(&MergeWriter::merge(&candidates, Vec::new()))
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("data.json")).unwrap())
                .unwrap();
        assert_eq!(raw[0]["title"], "A");
        assert_eq!(raw[0]["authors"], serde_json::json!([]));
        assert!(raw[0]["published_date"].is_null());
        assert_eq!(raw[0]["abstract"], "");
    }

    proptest! {
        #[test]
        fn prop_one_record_per_distinct_identity(
            ids in proptest::collection::vec(0u8..20, 0..60),
            detail_ids in proptest::collection::vec(0u8..30, 0..40),
        ) {
            let candidates: Vec<CandidateLink> = ids
                .iter()
                .map(|i| CandidateLink::new(format!("t{}", i), format!("https://x/{}", i)))
                .collect();
            let details: Vec<DetailRecord> = detail_ids
                .iter()
                .map(|i| enriched(&CandidateLink::new(format!("t{}", i), format!("https://x/{}", i))))
                .collect();

            let merged = MergeWriter::merge(&candidates, details);

            let distinct: HashSet<&str> = candidates.iter().map(|c| c.identity()).collect();
            prop_assert_eq!(merged.len(), distinct.len());

            let merged_ids: HashSet<&str> = merged.iter().map(|r| r.identity()).collect();
            prop_assert_eq!(merged_ids, distinct);
        }
    }
}

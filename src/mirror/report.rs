// ABOUTME: ChangeReport - structured record of one reconciliation pass
// ABOUTME: Five insertion-ordered categories, read-only once the pass returns

use serde::Serialize;

use super::path_key::PathKey;

/// What a single reconciliation pass changed in the replica.
///
/// Entries are replica-relative keys, in the order the pass produced them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeReport {
    dirs_created: Vec<PathKey>,
    files_added: Vec<PathKey>,
    files_removed: Vec<PathKey>,
    files_updated: Vec<PathKey>,
    dirs_removed: Vec<PathKey>,
}

/// Per-category counts, for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub dirs_created: usize,
    pub files_added: usize,
    pub files_removed: usize,
    pub files_updated: usize,
    pub dirs_removed: usize,
}

impl ChangeReport {
    pub fn dirs_created(&self) -> &[PathKey] {
        &self.dirs_created
    }

    pub fn files_added(&self) -> &[PathKey] {
        &self.files_added
    }

    pub fn files_removed(&self) -> &[PathKey] {
        &self.files_removed
    }

    pub fn files_updated(&self) -> &[PathKey] {
        &self.files_updated
    }

    pub fn dirs_removed(&self) -> &[PathKey] {
        &self.dirs_removed
    }

    /// True when the pass changed nothing.
    pub fn is_empty(&self) -> bool {
        self.total_changes() == 0
    }

    pub fn total_changes(&self) -> usize {
        self.dirs_created.len()
            + self.files_added.len()
            + self.files_removed.len()
            + self.files_updated.len()
            + self.dirs_removed.len()
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            dirs_created: self.dirs_created.len(),
            files_added: self.files_added.len(),
            files_removed: self.files_removed.len(),
            files_updated: self.files_updated.len(),
            dirs_removed: self.dirs_removed.len(),
        }
    }

    pub(crate) fn record_dir_created(&mut self, key: PathKey) {
        self.dirs_created.push(key);
    }

    pub(crate) fn record_file_added(&mut self, key: PathKey) {
        self.files_added.push(key);
    }

    pub(crate) fn record_file_removed(&mut self, key: PathKey) {
        self.files_removed.push(key);
    }

    pub(crate) fn record_file_updated(&mut self, key: PathKey) {
        self.files_updated.push(key);
    }

    pub(crate) fn record_dir_removed(&mut self, key: PathKey) {
        self.dirs_removed.push(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn key(s: &str) -> PathKey {
        PathKey::from_relative(Path::new(s)).unwrap()
    }

    #[test]
    fn test_default_report_is_empty() {
        let report = ChangeReport::default();
        assert!(report.is_empty());
        assert_eq!(report.total_changes(), 0);
        assert_eq!(report.summary(), ReportSummary::default());
    }

    #[test]
    fn test_records_keep_insertion_order() {
        let mut report = ChangeReport::default();
        report.record_file_added(key("z.txt"));
        report.record_file_added(key("a.txt"));
        report.record_dir_removed(key("old"));

        let added: Vec<String> = report.files_added().iter().map(|k| k.to_string()).collect();
        assert_eq!(added, vec!["z.txt", "a.txt"]);
        assert_eq!(report.total_changes(), 3);
        assert!(!report.is_empty());
    }

    #[test]
    fn test_summary_counts_each_category() {
        let mut report = ChangeReport::default();
        report.record_dir_created(key("d"));
        report.record_file_added(key("d/f"));
        report.record_file_removed(key("g"));
        report.record_file_updated(key("h"));
        report.record_file_updated(key("i"));

        let summary = report.summary();
        assert_eq!(summary.dirs_created, 1);
        assert_eq!(summary.files_added, 1);
        assert_eq!(summary.files_removed, 1);
        assert_eq!(summary.files_updated, 2);
        assert_eq!(summary.dirs_removed, 0);
    }

    #[test]
    fn test_serializes_to_json() {
        let mut report = ChangeReport::default();
        report.record_file_updated(key("a/b.txt"));
        let json: serde_json::Value = serde_json::to_value(&report).unwrap();
        assert_eq!(json["files_updated"][0], "a/b.txt");
        assert_eq!(json["files_added"].as_array().unwrap().len(), 0);
    }
}

//! Persistent extraction cache keyed by assignment composite identity.
//!
//! Only graded results are kept. A graded hit skips the detail view on the
//! next run; anything ungraded is always re-extracted. The cache is loaded
//! and persisted at process boundaries only and is owned by one run at a time.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::PipelineError;
use super::snapshot::{read_json, write_json_atomic};
use super::types::{AssignmentRecord, ClassDescriptor};

/// Cached record plus the class it resolved to when it was stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(flatten)]
    pub record: AssignmentRecord,
    pub class_name: String,
    #[serde(default)]
    pub teacher: String,
    #[serde(default)]
    pub period: String,
    pub cached_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Descriptor recorded at caching time. Carries no current grade.
    pub fn descriptor(&self) -> ClassDescriptor {
        ClassDescriptor {
            class_id: self.record.class_id.clone().unwrap_or_default(),
            class_name: self.class_name.clone(),
            teacher: self.teacher.clone(),
            period: self.period.clone(),
            quarter_grades: Vec::new(),
            highlighted: false,
            current_grade: None,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheSnapshot {
    #[serde(default)]
    last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    entries: BTreeMap<String, CacheEntry>,
}

/// Outcome of reconciling one fresh extraction with the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheUpdate {
    Stored,
    Evicted,
    Unchanged,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionCache {
    entries: BTreeMap<String, CacheEntry>,
    last_updated: Option<DateTime<Utc>>,
}

impl ExtractionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from disk. A missing file yields an empty cache; unreadable JSON
    /// is a [`PipelineError::CorruptSnapshot`]. Ungraded entries left by older
    /// writers are dropped.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let Some(snapshot) = read_json::<CacheSnapshot>(path)? else {
            tracing::debug!(path = %path.display(), "No extraction cache yet, starting empty");
            return Ok(Self::new());
        };

        let before = snapshot.entries.len();
        let entries: BTreeMap<String, CacheEntry> = snapshot
            .entries
            .into_iter()
            .filter(|(key, entry)| !key.is_empty() && entry.record.graded)
            .collect();
        let purged = before - entries.len();
        if purged > 0 {
            tracing::warn!(purged, "Purged ungraded entries from extraction cache");
        }

        Ok(Self {
            entries,
            last_updated: snapshot.last_updated,
        })
    }

    /// Write atomically, stamping `last_updated`.
    pub fn persist(&mut self, path: &Path, now: DateTime<Utc>) -> Result<(), PipelineError> {
        self.last_updated = Some(now);
        let snapshot = CacheSnapshot {
            last_updated: self.last_updated,
            entries: self.entries.clone(),
        };
        write_json_atomic(path, &snapshot)?;
        tracing::debug!(
            entries = self.entries.len(),
            path = %path.display(),
            "Extraction cache persisted"
        );
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// A hit that can replace extraction: present and graded.
    pub fn lookup(&self, key: &str) -> Option<&CacheEntry> {
        self.get(key).filter(|entry| entry.record.graded)
    }

    /// Store a graded record, replacing any previous entry. Ungraded records
    /// are refused and `false` is returned.
    pub fn put(
        &mut self,
        key: &str,
        record: &AssignmentRecord,
        class: &ClassDescriptor,
        now: DateTime<Utc>,
    ) -> bool {
        if !record.graded || key.is_empty() {
            return false;
        }
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                record: record.clone(),
                class_name: class.class_name.clone(),
                teacher: class.teacher.clone(),
                period: class.period.clone(),
                cached_at: now,
            },
        );
        true
    }

    pub fn delete(&mut self, key: &str) -> Option<CacheEntry> {
        self.entries.remove(key)
    }

    /// Apply a fresh extraction: graded overwrites, ungraded evicts.
    pub fn reconcile(
        &mut self,
        key: &str,
        record: &AssignmentRecord,
        class: &ClassDescriptor,
        now: DateTime<Utc>,
    ) -> CacheUpdate {
        if self.put(key, record, class, now) {
            CacheUpdate::Stored
        } else if self.delete(key).is_some() {
            tracing::debug!(key, "Evicted stale cache entry after ungraded extraction");
            CacheUpdate::Evicted
        } else {
            CacheUpdate::Unchanged
        }
    }

    /// Update the class fields of a hit with a fresher correlation.
    /// `cached_at` is left alone since the record itself was not re-read.
    pub fn refresh_class(&mut self, key: &str, class: &ClassDescriptor) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.class_name = class.class_name.clone();
            entry.teacher = class.teacher.clone();
            entry.period = class.period.clone();
        }
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, graded: bool) -> AssignmentRecord {
        AssignmentRecord {
            assignment_id: Some(id.into()),
            class_id: Some("100_1".into()),
            student_id: Some("7".into()),
            name: format!("Assignment {id}"),
            due_date: Some("10/1/2025".into()),
            assign_date: None,
            earned_points: if graded { 9.0 } else { 0.0 },
            total_points: Some(10.0),
            weight: None,
            graded,
        }
    }

    fn class(name: &str) -> ClassDescriptor {
        ClassDescriptor {
            class_name: name.into(),
            teacher: "Lee".into(),
            period: "2".into(),
            ..ClassDescriptor::unresolved(Some("100_1"))
        }
    }

    #[test]
    fn ungraded_is_never_stored() {
        let mut cache = ExtractionCache::new();
        assert!(!cache.put("a|100_1|7", &record("a", false), &class("Algebra"), Utc::now()));
        assert!(cache.get("a|100_1|7").is_none());
    }

    #[test]
    fn graded_overwrites_last_write_wins() {
        let mut cache = ExtractionCache::new();
        let mut rec = record("a", true);
        cache.put("k", &rec, &class("Algebra"), Utc::now());
        rec.earned_points = 10.0;
        cache.put("k", &rec, &class("Algebra"), Utc::now());
        assert_eq!(cache.get("k").unwrap().record.earned_points, 10.0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn ungraded_reconcile_evicts_stale_entry() {
        let mut cache = ExtractionCache::new();
        cache.put("k", &record("a", true), &class("Algebra"), Utc::now());
        let update = cache.reconcile("k", &record("a", false), &class("Algebra"), Utc::now());
        assert_eq!(update, CacheUpdate::Evicted);
        assert!(cache.get("k").is_none());

        let update = cache.reconcile("k", &record("a", false), &class("Algebra"), Utc::now());
        assert_eq!(update, CacheUpdate::Unchanged);
    }

    #[test]
    fn refresh_class_keeps_timestamp() {
        let mut cache = ExtractionCache::new();
        let stamp = Utc::now();
        cache.put("k", &record("a", true), &class("ALGEBRA"), stamp);
        cache.refresh_class("k", &class("Algebra II"));
        let entry = cache.get("k").unwrap();
        assert_eq!(entry.class_name, "Algebra II");
        assert_eq!(entry.cached_at, stamp);
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ExtractionCache::load(&dir.path().join("nope.json")).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn corrupt_file_is_distinct_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = ExtractionCache::load(&path).unwrap_err();
        assert!(matches!(err, PipelineError::CorruptSnapshot { .. }));
    }

    #[test]
    fn persist_then_load_keeps_graded_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let mut cache = ExtractionCache::new();
        cache.put("k1", &record("1", true), &class("Algebra"), Utc::now());
        cache.persist(&path, Utc::now()).unwrap();

        let loaded = ExtractionCache::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.last_updated().is_some());
        let entry = loaded.lookup("k1").unwrap();
        assert_eq!(entry.class_name, "Algebra");
        assert_eq!(entry.descriptor().class_id, "100_1");
    }

    #[test]
    fn load_purges_ungraded_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let json = serde_json::json!({
            "last_updated": "2025-10-01T12:00:00Z",
            "entries": {
                "good": {
                    "assignment_id": "1", "class_id": null, "student_id": null,
                    "name": "Quiz", "due_date": null, "assign_date": null,
                    "earned_points": 8.0, "total_points": 10.0, "weight": null,
                    "graded": true, "class_name": "Algebra",
                    "cached_at": "2025-10-01T12:00:00Z"
                },
                "stale": {
                    "assignment_id": "2", "class_id": null, "student_id": null,
                    "name": "Lab", "due_date": null, "assign_date": null,
                    "earned_points": 0.0, "total_points": null, "weight": null,
                    "graded": false, "class_name": "Algebra",
                    "cached_at": "2025-10-01T12:00:00Z"
                }
            }
        });
        std::fs::write(&path, json.to_string()).unwrap();
        let cache = ExtractionCache::load(&path).unwrap();
        assert!(cache.get("good").is_some());
        assert!(cache.get("stale").is_none());
    }
}

//! # Run History
//!
//! Finished runs are stored as one JSON array under a single key, newest
//! first. The adapter never lets a storage problem reach the caller: a
//! failed or corrupted read lists as empty, and writes that cannot be made
//! safely are skipped with a warning. Losing history is acceptable; losing
//! the run in progress is not.

use chrono::{DateTime, SecondsFormat, Utc};
use log::{info, warn};
use serde::{Deserialize, Deserializer, Serialize};

use crate::platform::KeyValueStore;
use crate::session::RunSummary;
use crate::Result;

/// Store key holding the history array.
pub const HISTORY_KEY: &str = "runHistory";

// ============================================================================
// Types
// ============================================================================

/// One finished run as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct SavedRun {
    pub id: String,
    /// ISO-8601 timestamp of when the run finished
    pub date: String,
    /// Active time in seconds
    pub time: u64,
    /// Kilometers, two decimals. Older records stored this as a string.
    #[serde(deserialize_with = "number_or_numeric_string")]
    pub distance: f64,
    /// Seconds per km; absent when no distance was recorded
    #[serde(default)]
    pub avg_pace: Option<f64>,
    #[serde(default)]
    pub notes: String,
    pub goal_pace: f64,
    pub target_distance: f64,
}

impl SavedRun {
    /// Snapshot a finished session under `id`.
    pub fn from_summary(id: impl Into<String>, summary: &RunSummary, notes: impl Into<String>) -> Self {
        let date = DateTime::<Utc>::from_timestamp_millis(summary.finished_at_ms)
            .unwrap_or_default()
            .to_rfc3339_opts(SecondsFormat::Millis, true);

        Self {
            id: id.into(),
            date,
            time: summary.elapsed_seconds,
            distance: summary.distance_km_rounded(),
            avg_pace: summary.average_pace,
            notes: notes.into(),
            goal_pace: summary.config.goal_pace_seconds_per_km,
            target_distance: summary.config.target_distance_km,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

fn number_or_numeric_string<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Aggregates over the whole history.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct HistoryStats {
    pub run_count: u32,
    pub total_distance_km: f64,
    pub total_seconds: u64,
    /// Fastest average pace among runs that recorded one
    pub best_average_pace: Option<f64>,
}

// ============================================================================
// Adapter
// ============================================================================

/// Run history over any key-value store.
#[derive(Debug)]
pub struct RunHistory<S> {
    store: S,
    key: String,
}

impl<S: KeyValueStore> RunHistory<S> {
    pub fn new(store: S) -> Self {
        Self::with_key(store, HISTORY_KEY)
    }

    pub fn with_key(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// All saved runs, most recent first. Empty on any storage failure.
    pub fn list(&self) -> Vec<SavedRun> {
        self.load().unwrap_or_else(|e| {
            warn!("[PaceTracker] History unreadable, showing none: {}", e);
            Vec::new()
        })
    }

    pub fn get(&self, id: &str) -> Option<SavedRun> {
        self.list().into_iter().find(|r| r.id == id)
    }

    /// Prepend `run`. Skipped if the existing history cannot be read, so a
    /// corrupted array is never overwritten.
    pub fn save(&mut self, run: SavedRun) {
        let mut runs = match self.load() {
            Ok(runs) => runs,
            Err(e) => {
                warn!("[PaceTracker] Not saving run {}: history unreadable: {}", run.id, e);
                return;
            }
        };
        let id = run.id.clone();
        runs.insert(0, run);
        if self.write(&runs) {
            info!("[PaceTracker] Saved run {} ({} total)", id, runs.len());
        }
    }

    /// Build a record from `summary` with a fresh id, save it and return it.
    pub fn save_summary(&mut self, summary: &RunSummary, notes: &str) -> SavedRun {
        let run = SavedRun::from_summary(self.unique_id(summary.finished_at_ms), summary, notes);
        self.save(run.clone());
        run
    }

    /// Remove the run with `id`. No-op if absent or unreadable.
    pub fn delete(&mut self, id: &str) {
        let mut runs = match self.load() {
            Ok(runs) => runs,
            Err(e) => {
                warn!("[PaceTracker] Not deleting run {}: history unreadable: {}", id, e);
                return;
            }
        };
        let before = runs.len();
        runs.retain(|r| r.id != id);
        if runs.len() == before {
            return;
        }
        if self.write(&runs) {
            info!("[PaceTracker] Deleted run {}", id);
        }
    }

    pub fn stats(&self) -> HistoryStats {
        let runs = self.list();
        HistoryStats {
            run_count: runs.len() as u32,
            total_distance_km: runs.iter().map(|r| r.distance).sum(),
            total_seconds: runs.iter().map(|r| r.time).sum(),
            best_average_pace: runs
                .iter()
                .filter_map(|r| r.avg_pace)
                .filter(|p| p.is_finite() && *p > 0.0)
                .reduce(f64::min),
        }
    }

    /// History as the raw JSON array (for FFI consumers).
    pub fn list_json(&self) -> String {
        serde_json::to_string(&self.list()).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    fn load(&self) -> Result<Vec<SavedRun>> {
        match self.store.get(&self.key)? {
            Some(json) if !json.trim().is_empty() => Ok(serde_json::from_str(&json)?),
            _ => Ok(Vec::new()),
        }
    }

    fn write(&mut self, runs: &[SavedRun]) -> bool {
        let json = match serde_json::to_string(runs) {
            Ok(json) => json,
            Err(e) => {
                warn!("[PaceTracker] Could not encode history: {}", e);
                return false;
            }
        };
        match self.store.set(&self.key, &json) {
            Ok(()) => true,
            Err(e) => {
                warn!("[PaceTracker] History write failed: {}", e);
                false
            }
        }
    }

    fn unique_id(&self, finished_at_ms: i64) -> String {
        let base = format!("run-{}", finished_at_ms);
        let taken: Vec<String> = self.list().into_iter().map(|r| r.id).collect();
        if !taken.contains(&base) {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}-{}", base, n);
            if !taken.contains(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::{RunConfig, TrackerError};

    /// Store whose reads and/or writes always fail.
    struct BrokenStore {
        fail_get: bool,
        inner: MemoryStore,
    }

    impl KeyValueStore for BrokenStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            if self.fail_get {
                return Err(TrackerError::Storage {
                    message: "unavailable".to_string(),
                });
            }
            self.inner.get(key)
        }

        fn set(&mut self, _key: &str, _value: &str) -> Result<()> {
            Err(TrackerError::Storage {
                message: "quota exceeded".to_string(),
            })
        }
    }

    fn run(id: &str, km: f64, secs: u64) -> SavedRun {
        SavedRun {
            id: id.to_string(),
            date: "2026-10-01T07:30:00.000Z".to_string(),
            time: secs,
            distance: km,
            avg_pace: Some(secs as f64 / km),
            notes: String::new(),
            goal_pace: 330.0,
            target_distance: 5.0,
        }
    }

    fn summary(finished_at_ms: i64) -> RunSummary {
        RunSummary {
            elapsed_seconds: 1500,
            distance_meters: 5004.0,
            average_pace: Some(1500.0 / 5.004),
            finished_at_ms,
            config: RunConfig::new(300.0, 5.0),
        }
    }

    #[test]
    fn test_save_prepends() {
        let mut history = RunHistory::new(MemoryStore::new());
        history.save(run("a", 5.0, 1500));
        history.save(run("b", 10.0, 3300));

        let ids: Vec<String> = history.list().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_delete() {
        let mut history = RunHistory::new(MemoryStore::new());
        history.save(run("a", 5.0, 1500));
        history.save(run("b", 10.0, 3300));

        history.delete("a");
        assert!(history.get("a").is_none());
        assert_eq!(history.list().len(), 1);

        let before = history.store().get(HISTORY_KEY).unwrap();
        history.delete("missing");
        assert_eq!(history.store().get(HISTORY_KEY).unwrap(), before);
    }

    #[test]
    fn test_empty_store_lists_nothing() {
        let history = RunHistory::new(MemoryStore::new());
        assert!(history.list().is_empty());
        assert_eq!(history.stats(), HistoryStats::default());
    }

    #[test]
    fn test_corrupted_history_degrades() {
        let mut store = MemoryStore::new();
        store.set(HISTORY_KEY, "{not json").unwrap();
        let mut history = RunHistory::new(store);

        assert!(history.list().is_empty());

        // The corrupted blob is left alone rather than overwritten
        history.save(run("a", 5.0, 1500));
        history.delete("a");
        assert_eq!(
            history.store().get(HISTORY_KEY).unwrap().as_deref(),
            Some("{not json")
        );
    }

    #[test]
    fn test_unavailable_store_degrades() {
        let mut history = RunHistory::new(BrokenStore {
            fail_get: true,
            inner: MemoryStore::new(),
        });
        assert!(history.list().is_empty());
        history.save(run("a", 5.0, 1500));
        history.delete("a");

        let mut history = RunHistory::new(BrokenStore {
            fail_get: false,
            inner: MemoryStore::new(),
        });
        // Write fails silently
        history.save(run("a", 5.0, 1500));
        assert!(history.list().is_empty());
    }

    #[test]
    fn test_distance_accepts_string() {
        let json = r#"[{"id":"x","date":"2025-05-01T06:00:00.000Z","time":1800,
            "distance":"5.25","avgPace":342.86,"notes":"legacy","goalPace":330,"targetDistance":5}]"#;
        let mut store = MemoryStore::new();
        store.set(HISTORY_KEY, json).unwrap();
        let history = RunHistory::new(store);

        let runs = history.list();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].distance, 5.25);
        assert_eq!(runs[0].notes, "legacy");
    }

    #[test]
    fn test_wire_format_camel_case() {
        let json = serde_json::to_string(&run("a", 5.0, 1500)).unwrap();
        assert!(json.contains("\"avgPace\""));
        assert!(json.contains("\"goalPace\""));
        assert!(json.contains("\"targetDistance\""));
    }

    #[test]
    fn test_from_summary() {
        let saved = SavedRun::from_summary("run-1", &summary(1_700_000_000_000), "felt good");
        assert_eq!(saved.date, "2023-11-14T22:13:20.000Z");
        assert_eq!(saved.time, 1500);
        assert_eq!(saved.distance, 5.0);
        assert_eq!(saved.goal_pace, 300.0);
        assert_eq!(saved.target_distance, 5.0);
        assert_eq!(saved.notes, "felt good");
    }

    #[test]
    fn test_save_summary_unique_ids() {
        let mut history = RunHistory::new(MemoryStore::new());
        let first = history.save_summary(&summary(1_000), "");
        let second = history.save_summary(&summary(1_000), "");
        let third = history.save_summary(&summary(1_000), "");
        assert_eq!(first.id, "run-1000");
        assert_eq!(second.id, "run-1000-2");
        assert_eq!(third.id, "run-1000-3");
        assert_eq!(history.list()[0].id, "run-1000-3");
    }

    #[test]
    fn test_stats() {
        let mut history = RunHistory::new(MemoryStore::new());
        history.save(run("a", 5.0, 1500));
        history.save(run("b", 10.0, 3300));
        let mut no_pace = run("c", 0.0, 60);
        no_pace.avg_pace = None;
        history.save(no_pace);

        let stats = history.stats();
        assert_eq!(stats.run_count, 3);
        assert_eq!(stats.total_distance_km, 15.0);
        assert_eq!(stats.total_seconds, 4860);
        assert_eq!(stats.best_average_pace, Some(300.0));
    }
}

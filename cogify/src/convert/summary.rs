//! Per-tile outcomes and the run summary.

use std::time::Duration;

use serde::Serialize;

use crate::projection::QuadKey;

/// File name of the summary written to the output directory.
pub const SUMMARY_FILE_NAME: &str = "summary.json";

/// Final status of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TileStatus {
    /// The tool ran and the output was written.
    Converted,
    /// Dry run; the command was logged only.
    Planned,
    /// The output already existed.
    Skipped,
    Failed,
    /// Never submitted because the run was cancelled.
    Cancelled,
}

impl TileStatus {
    /// Whether the tile needs no further work.
    pub fn is_success(self) -> bool {
        matches!(
            self,
            TileStatus::Converted | TileStatus::Planned | TileStatus::Skipped
        )
    }
}

/// Outcome of one tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TileOutcome {
    pub index: usize,
    pub quad_key: QuadKey,
    pub status: TileStatus,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TileOutcome {
    pub fn new(index: usize, quad_key: QuadKey, status: TileStatus, duration: Duration) -> Self {
        Self {
            index,
            quad_key,
            status,
            duration_ms: duration.as_millis() as u64,
            error: None,
        }
    }

    pub fn failed(index: usize, quad_key: QuadKey, duration: Duration, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::new(index, quad_key, TileStatus::Failed, duration)
        }
    }

    pub fn cancelled(index: usize, quad_key: QuadKey) -> Self {
        Self::new(index, quad_key, TileStatus::Cancelled, Duration::ZERO)
    }
}

/// Overall result of a run that got past planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    /// Some tiles failed; the rest completed.
    PartialFailure,
    /// The run was cancelled before every tile was submitted.
    Cancelled,
}

/// Summary of a conversion run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// RFC 3339 time the summary was started.
    pub started_at: String,
    pub dry_run: bool,
    /// Zoom of the covering tiles.
    pub zoom: u8,
    /// Zoom matching the sources' native resolution.
    pub source_zoom: u8,
    /// Number of tiles planned for this run.
    pub total_tiles: usize,
    pub cancelled: bool,
    pub tiles: Vec<TileOutcome>,
}

impl RunSummary {
    pub fn new(total_tiles: usize, zoom: u8, source_zoom: u8, dry_run: bool) -> Self {
        Self {
            started_at: chrono::Utc::now().to_rfc3339(),
            dry_run,
            zoom,
            source_zoom,
            total_tiles,
            cancelled: false,
            tiles: Vec::with_capacity(total_tiles),
        }
    }

    /// Records a finished (or never started) tile.
    pub fn record(&mut self, outcome: TileOutcome) {
        if outcome.status == TileStatus::Cancelled {
            self.cancelled = true;
        }
        self.tiles.push(outcome);
    }

    /// Sorts outcomes into covering order.
    pub fn finish(&mut self) {
        self.tiles.sort_by_key(|t| t.index);
    }

    pub fn count(&self, status: TileStatus) -> usize {
        self.tiles.iter().filter(|t| t.status == status).count()
    }

    /// Check if any tiles failed.
    pub fn has_failures(&self) -> bool {
        self.tiles.iter().any(|t| t.status == TileStatus::Failed)
    }

    /// Get the number of failed tiles.
    pub fn failure_count(&self) -> usize {
        self.count(TileStatus::Failed)
    }

    /// Quad keys of failed tiles, in recorded order.
    pub fn failed_keys(&self) -> Vec<&QuadKey> {
        self.tiles
            .iter()
            .filter(|t| t.status == TileStatus::Failed)
            .map(|t| &t.quad_key)
            .collect()
    }

    /// Get the progress as a percentage of recorded tiles.
    pub fn progress_percent(&self) -> f64 {
        if self.total_tiles == 0 {
            100.0
        } else {
            (self.tiles.len() as f64 / self.total_tiles as f64) * 100.0
        }
    }

    /// Cancellation wins over failures: a cancelled run is incomplete
    /// whether or not any submitted tile failed.
    pub fn outcome(&self) -> RunOutcome {
        if self.cancelled {
            RunOutcome::Cancelled
        } else if self.has_failures() {
            RunOutcome::PartialFailure
        } else {
            RunOutcome::Success
        }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> QuadKey {
        QuadKey::parse(s).unwrap()
    }

    #[test]
    fn test_empty_summary_is_success() {
        let summary = RunSummary::new(0, 0, 0, true);
        assert_eq!(summary.outcome(), RunOutcome::Success);
        assert_eq!(summary.progress_percent(), 100.0);
    }

    #[test]
    fn test_partial_failure() {
        let mut summary = RunSummary::new(3, 2, 8, false);
        summary.record(TileOutcome::new(0, key("00"), TileStatus::Converted, Duration::from_millis(5)));
        summary.record(TileOutcome::failed(
            1,
            key("01"),
            Duration::from_millis(7),
            "boom".to_string(),
        ));
        assert!(summary.has_failures());
        assert_eq!(summary.failure_count(), 1);
        assert_eq!(summary.failed_keys(), vec![&key("01")]);
        assert!((summary.progress_percent() - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(summary.outcome(), RunOutcome::PartialFailure);
    }

    #[test]
    fn test_cancelled_wins() {
        let mut summary = RunSummary::new(2, 1, 4, false);
        summary.record(TileOutcome::failed(0, key("0"), Duration::ZERO, "x".to_string()));
        summary.record(TileOutcome::cancelled(1, key("1")));
        assert!(summary.cancelled);
        assert_eq!(summary.outcome(), RunOutcome::Cancelled);
    }

    #[test]
    fn test_skipped_and_planned_are_success() {
        assert!(TileStatus::Skipped.is_success());
        assert!(TileStatus::Planned.is_success());
        assert!(!TileStatus::Cancelled.is_success());
        assert!(!TileStatus::Failed.is_success());
    }

    #[test]
    fn test_finish_sorts_by_index() {
        let mut summary = RunSummary::new(3, 1, 1, true);
        for i in [2, 0, 1] {
            summary.record(TileOutcome::new(i, key("0"), TileStatus::Planned, Duration::ZERO));
        }
        summary.finish();
        let order: Vec<_> = summary.tiles.iter().map(|t| t.index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_json_shape() {
        let mut summary = RunSummary::new(2, 1, 3, false);
        summary.record(TileOutcome::new(0, key("2"), TileStatus::Converted, Duration::from_millis(42)));
        summary.record(TileOutcome::failed(1, key("3"), Duration::from_millis(3), "exit 1".to_string()));

        let value: serde_json::Value = serde_json::from_str(&summary.to_json_pretty().unwrap()).unwrap();
        assert_eq!(value["total_tiles"], 2);
        assert_eq!(value["tiles"][0]["quad_key"], "2");
        assert_eq!(value["tiles"][0]["status"], "converted");
        assert_eq!(value["tiles"][0]["duration_ms"], 42);
        assert!(value["tiles"][0].get("error").is_none());
        assert_eq!(value["tiles"][1]["status"], "failed");
        assert_eq!(value["tiles"][1]["error"], "exit 1");
    }
}

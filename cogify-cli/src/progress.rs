//! Terminal progress for conversion runs.

use std::collections::HashMap;

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::mpsc;

use cogify::convert::{ConvertEvent, RunOutcome, RunSummary, TileStatus};

const OVERALL_TEMPLATE: &str = "{spinner} {msg:<12} [{bar:40.cyan/blue}] {pos}/{len} tiles ({elapsed})";
const TILE_TEMPLATE: &str = "  {prefix:>14} [{bar:30}] {pos:>3}%";

/// Progress bars driven by [`ConvertEvent`]s: one overall bar plus one bar
/// per tile in flight.
pub struct ProgressDisplay {
    multi: MultiProgress,
    overall: ProgressBar,
    tiles: HashMap<usize, ProgressBar>,
}

impl Default for ProgressDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressDisplay {
    /// Display drawing to stderr.
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// Display that draws nothing, for tests.
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let multi = MultiProgress::with_draw_target(target);
        let overall = multi.add(ProgressBar::new(0));
        overall.set_style(style_or_default(OVERALL_TEMPLATE));
        overall.set_message("planning");
        Self {
            multi,
            overall,
            tiles: HashMap::new(),
        }
    }

    pub fn handle(&mut self, event: &ConvertEvent) {
        match event {
            ConvertEvent::State(state) => self.overall.set_message(state.to_string()),
            ConvertEvent::Planned { total, zoom } => {
                self.overall.set_length(*total as u64);
                self.overall.println(format!(
                    "Converting {} tiles at zoom {}",
                    total, zoom
                ));
            }
            ConvertEvent::Started { quad_key, index } => {
                let bar = self.multi.add(ProgressBar::new(100));
                bar.set_style(style_or_default(TILE_TEMPLATE));
                bar.set_prefix(quad_key.file_stem().to_string());
                self.tiles.insert(*index, bar);
            }
            ConvertEvent::Progress {
                index, progress, ..
            } => {
                if let Some(bar) = self.tiles.get(index) {
                    bar.set_position((progress * 100.0).round() as u64);
                }
            }
            ConvertEvent::Finished {
                quad_key,
                index,
                status,
                ..
            } => {
                if let Some(bar) = self.tiles.remove(index) {
                    bar.finish_and_clear();
                    self.multi.remove(&bar);
                }
                self.overall.inc(1);
                if *status == TileStatus::Failed {
                    self.overall
                        .println(format!("{} {}", style("failed").red(), quad_key.file_stem()));
                }
            }
        }
    }

    /// Number of tile bars currently shown.
    pub fn active_tiles(&self) -> usize {
        self.tiles.len()
    }

    /// Tiles finished so far.
    pub fn finished_tiles(&self) -> u64 {
        self.overall.position()
    }

    pub fn finish(&self) {
        for bar in self.tiles.values() {
            bar.finish_and_clear();
        }
        self.overall.finish_and_clear();
    }
}

fn style_or_default(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .map(|s| s.progress_chars("=> "))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Feeds events into the display until the run drops its sender.
pub async fn drive(mut rx: mpsc::UnboundedReceiver<ConvertEvent>, mut display: ProgressDisplay) {
    while let Some(event) = rx.recv().await {
        display.handle(&event);
    }
    display.finish();
}

/// Prints the end-of-run report to stdout.
pub fn print_summary(summary: &RunSummary) {
    println!();
    if summary.dry_run {
        println!(
            "{} {} tiles planned at zoom {} (source zoom {}). Re-run with --commit to convert.",
            style("Dry run:").yellow().bold(),
            summary.count(TileStatus::Planned),
            summary.zoom,
            summary.source_zoom
        );
    } else {
        println!(
            "Converted {}, skipped {}, failed {}, cancelled {}",
            style(summary.count(TileStatus::Converted)).green(),
            summary.count(TileStatus::Skipped),
            style(summary.failure_count()).red(),
            summary.count(TileStatus::Cancelled)
        );
    }

    for tile in summary.tiles.iter().filter(|t| t.status == TileStatus::Failed) {
        println!(
            "  {} {}: {}",
            style("✗").red(),
            tile.quad_key.file_stem(),
            tile.error.as_deref().unwrap_or("unknown error")
        );
    }

    match summary.outcome() {
        RunOutcome::Success => {}
        RunOutcome::PartialFailure => println!(
            "{}",
            style("Some tiles failed; re-run to retry them.").yellow()
        ),
        RunOutcome::Cancelled => println!("{}", style("Run cancelled.").yellow()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cogify::projection::QuadKey;
    use std::time::Duration;

    fn key(s: &str) -> QuadKey {
        QuadKey::parse(s).unwrap()
    }

    #[test]
    fn test_default_starts_empty() {
        let display = ProgressDisplay::default();
        assert_eq!(display.active_tiles(), 0);
        assert_eq!(display.finished_tiles(), 0);
        display.finish();
    }

    #[test]
    fn test_tile_bars_follow_lifecycle() {
        let mut display = ProgressDisplay::hidden();
        display.handle(&ConvertEvent::Planned { total: 2, zoom: 3 });
        display.handle(&ConvertEvent::Started {
            quad_key: key("012"),
            index: 0,
        });
        display.handle(&ConvertEvent::Started {
            quad_key: key("013"),
            index: 1,
        });
        assert_eq!(display.active_tiles(), 2);

        display.handle(&ConvertEvent::Progress {
            quad_key: key("012"),
            index: 0,
            progress: 0.5,
            since_last: Duration::from_millis(10),
        });
        assert_eq!(display.tiles[&0].position(), 50);

        display.handle(&ConvertEvent::Finished {
            quad_key: key("012"),
            index: 0,
            status: TileStatus::Converted,
            duration: Duration::from_millis(20),
        });
        assert_eq!(display.active_tiles(), 1);
        assert_eq!(display.finished_tiles(), 1);
    }

    #[test]
    fn test_progress_for_unknown_tile_is_ignored() {
        let mut display = ProgressDisplay::hidden();
        display.handle(&ConvertEvent::Progress {
            quad_key: key("0"),
            index: 9,
            progress: 1.0,
            since_last: Duration::ZERO,
        });
        assert_eq!(display.active_tiles(), 0);
    }

    #[tokio::test]
    async fn test_drive_ends_when_sender_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(ConvertEvent::Planned { total: 1, zoom: 0 }).unwrap();
        drop(tx);
        drive(rx, ProgressDisplay::hidden()).await;
    }
}

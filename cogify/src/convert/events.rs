//! Observable run events.

use std::time::Duration;

use tokio::sync::mpsc;

use super::state::RunState;
use super::summary::TileStatus;
use crate::projection::QuadKey;

/// Something that happened during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum ConvertEvent {
    /// The run moved to a new phase.
    State(RunState),
    /// Planning finished with this many jobs to dispatch.
    Planned { total: usize, zoom: u8 },
    /// A tile job started.
    Started { quad_key: QuadKey, index: usize },
    /// The tool reported progress for a tile.
    Progress {
        quad_key: QuadKey,
        index: usize,
        /// Fraction in `[0.0, 1.0]`.
        progress: f64,
        /// Time since the previous progress tick of this tile.
        since_last: Duration,
    },
    /// A tile job ended.
    Finished {
        quad_key: QuadKey,
        index: usize,
        status: TileStatus,
        duration: Duration,
    },
}

/// Optional event channel. Sending never fails the run.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventSink {
    tx: Option<mpsc::UnboundedSender<ConvertEvent>>,
}

impl EventSink {
    pub(crate) fn new(tx: Option<mpsc::UnboundedSender<ConvertEvent>>) -> Self {
        Self { tx }
    }

    pub(crate) fn emit(&self, event: ConvertEvent) {
        if let Some(tx) = &self.tx {
            // Receiver gone means nobody is watching
            let _ = tx.send(event);
        }
    }
}

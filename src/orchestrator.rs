//! Fixed-cadence analysis loop.
//! One cooperative task: take the freshest frame, recognize, analyze,
//! display. Every stage is fault-isolated - a failed stage yields nothing
//! this iteration and the cadence continues. Cancellation is cooperative,
//! observed at iteration boundaries, never preemptive: an in-flight
//! collaborator call finishes (bounded by its own timeout) before the next
//! cancellation check runs.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::analyze::Analyzer;
use crate::display::MoveDisplay;
use crate::recognize::Recognizer;
use crate::slot::FrameSlot;

/// Engine knobs forwarded to the analyzer each iteration.
#[derive(Clone, Copy, Debug)]
pub struct AnalysisOptions {
    pub depth: u32,
    pub multi_pv: u32,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            depth: 15,
            multi_pv: 1,
        }
    }
}

/// The consumer side of the pipeline: slot in, suggestion out.
pub struct AnalysisLoop<R, A, D> {
    slot: FrameSlot,
    recognizer: R,
    analyzer: A,
    display: D,
    options: AnalysisOptions,
}

impl<R, A, D> AnalysisLoop<R, A, D>
where
    R: Recognizer,
    A: Analyzer,
    D: MoveDisplay,
{
    pub fn new(
        slot: FrameSlot,
        recognizer: R,
        analyzer: A,
        display: D,
        options: AnalysisOptions,
    ) -> Self {
        Self {
            slot,
            recognizer,
            analyzer,
            display,
            options,
        }
    }

    /// Runs until `shutdown` flips to true (or its sender is dropped). The
    /// delay is fixed *after* each iteration body, so slow collaborators
    /// stretch the wall-clock period but iterations never overlap.
    pub async fn run(self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        debug!(interval_ms = interval.as_millis() as u64, "analysis loop started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            self.run_once().await;
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        // Sender gone: nobody can cancel us any more, and
                        // nobody is running the session either.
                        break;
                    }
                }
            }
        }
        debug!("analysis loop cancelled");
    }

    /// One iteration: take, recognize, analyze, display. Stages run
    /// strictly in order; each failure is logged and ends the iteration
    /// early without propagating.
    async fn run_once(&self) {
        let fen = {
            let Some(image) = self.slot.take() else {
                debug!("no frame resident, skipping iteration");
                return;
            };
            // The image lives exactly as long as this block: it is dropped
            // on success, on failure, and on task teardown alike.
            match self.recognizer.recognize(&image).await {
                Ok(fen) => fen,
                Err(err) => {
                    warn!(stage = "recognize", error = %err, "no position this iteration");
                    return;
                }
            }
        };
        debug!(fen = %fen, "position recognized");

        let suggestion = match self
            .analyzer
            .analyze(&fen, self.options.depth, self.options.multi_pv)
            .await
        {
            Ok(suggestion) => suggestion,
            Err(err) => {
                warn!(stage = "analyze", error = %err, "no move this iteration");
                return;
            }
        };
        debug!(suggestion = %suggestion, "analysis complete");

        if let Err(err) = self.display.show(&suggestion) {
            warn!(stage = "display", error = %err, "failed to show suggestion");
        }
    }
}

//! Session lifecycle.
//! Bridges consent to the capture producer and the analysis loop, and tears
//! both down in the reverse order: consumer first, producer second, so the
//! slot is never touched after its producer is gone.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::analyze::Analyzer;
use crate::capture::{CaptureHandle, CaptureProducer, CaptureSource, ConsentToken};
use crate::display::MoveDisplay;
use crate::error::CaptureError;
use crate::orchestrator::{AnalysisLoop, AnalysisOptions};
use crate::recognize::Recognizer;
use crate::slot::FrameSlot;

/// Cadences and engine knobs for one session.
#[derive(Clone, Copy, Debug)]
pub struct SessionConfig {
    /// Delay between analysis iterations.
    pub loop_interval: Duration,
    /// Delay between screen captures.
    pub frame_interval: Duration,
    pub options: AnalysisOptions,
}

/// A running capture-and-analysis session.
pub struct Session {
    producer: CaptureHandle,
    loop_shutdown: watch::Sender<bool>,
    loop_task: JoinHandle<()>,
}

impl Session {
    /// Exchanges the consent token for a capture session and starts the
    /// analysis loop on the configured cadence.
    pub fn start<S, R, A, D>(
        token: ConsentToken,
        source: S,
        recognizer: R,
        analyzer: A,
        display: D,
        config: SessionConfig,
    ) -> Result<Session, CaptureError>
    where
        S: CaptureSource,
        R: Recognizer + 'static,
        A: Analyzer + 'static,
        D: MoveDisplay + 'static,
    {
        let slot = FrameSlot::new();
        let producer = CaptureProducer::start(token, source, slot.clone(), config.frame_interval)?;
        let (loop_shutdown, shutdown_rx) = watch::channel(false);
        let analysis = AnalysisLoop::new(slot, recognizer, analyzer, display, config.options);
        let loop_task = tokio::spawn(analysis.run(config.loop_interval, shutdown_rx));
        debug!("session started");
        Ok(Session {
            producer,
            loop_shutdown,
            loop_task,
        })
    }

    /// Resolves if the capture session dies (e.g. authorization revoked).
    /// The producer does not restart itself; stop the session and start a
    /// new one after re-acquiring consent.
    pub async fn capture_failed(&mut self) -> Option<CaptureError> {
        self.producer.fatal().await
    }

    /// Stops consuming, then stops producing, then drains the slot.
    pub async fn stop(self) {
        let _ = self.loop_shutdown.send(true);
        if let Err(err) = self.loop_task.await {
            error!(error = %err, "analysis loop task failed");
        }
        self.producer.stop();
        debug!("session stopped");
    }
}

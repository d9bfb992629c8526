//! Screen capture producer.
//! Owns the platform capture session on a dedicated thread so that frame
//! arrival is never throttled by analysis latency. Each frame event runs
//! reconstruction and publishes into the shared [`FrameSlot`]; the analysis
//! loop consumes on its own cadence.
//! Permissions note: on macOS, grant "Screen & System Audio Recording"
//! permission to the terminal in System Settings > Privacy & Security.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, warn};
use xcap::Monitor;

use crate::error::CaptureError;
use crate::frame::{self, RawFrame};
use crate::slot::FrameSlot;

/// How often the capture thread re-checks for a stop request while pacing.
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

/// Opaque capture authorization, minted by the embedding application's
/// consent flow and consumed exactly once by [`CaptureProducer::start`].
/// Starting a capture session without one is not expressible.
#[derive(Debug)]
pub struct ConsentToken(());

impl ConsentToken {
    /// Mints a token. Call only after the user has granted capture consent.
    pub fn granted() -> Self {
        ConsentToken(())
    }
}

/// Platform boundary: something that can produce raw frames.
pub trait CaptureSource: Send + 'static {
    /// Produces the next raw frame, blocking as long as the platform needs.
    /// An error is session-fatal: the producer reports it once and stops.
    fn next_frame(&mut self) -> Result<RawFrame, CaptureError>;
}

/// Captures the primary monitor via `xcap`.
#[derive(Debug, Default)]
pub struct MonitorSource;

impl MonitorSource {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureSource for MonitorSource {
    fn next_frame(&mut self) -> Result<RawFrame, CaptureError> {
        let monitors = Monitor::all()?;
        let primary = monitors.into_iter().next().ok_or(CaptureError::NoMonitor)?;
        let screenshot = primary.capture_image()?;
        let (width, height) = screenshot.dimensions();
        if width == 0 || height == 0 {
            return Err(CaptureError::EmptyCapture);
        }
        // xcap returns densely packed RGBA.
        Ok(RawFrame::packed(width, height, screenshot.into_raw()))
    }
}

/// Starts and stops the dedicated capture thread.
pub struct CaptureProducer;

impl CaptureProducer {
    /// Begins a capture session. The thread loops: next frame, reconstruct,
    /// publish, then paces itself to `frame_interval`. Malformed frames are
    /// logged and skipped; a source error is reported on the status channel
    /// and stops the thread, requiring an explicit restart.
    pub fn start<S: CaptureSource>(
        _token: ConsentToken,
        mut source: S,
        slot: FrameSlot,
        frame_interval: Duration,
    ) -> Result<CaptureHandle, CaptureError> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let thread_slot = slot.clone();
        let thread = thread::Builder::new()
            .name("capture".into())
            .spawn(move || {
                capture_loop(&mut source, &thread_slot, shutdown_rx, status_tx, frame_interval);
            })?;
        Ok(CaptureHandle {
            shutdown: shutdown_tx,
            thread: Some(thread),
            status: status_rx,
            slot,
        })
    }
}

fn capture_loop<S: CaptureSource>(
    source: &mut S,
    slot: &FrameSlot,
    shutdown: watch::Receiver<bool>,
    status: mpsc::UnboundedSender<CaptureError>,
    frame_interval: Duration,
) {
    let mut published: u64 = 0;
    let mut dropped: u64 = 0;
    loop {
        if *shutdown.borrow() {
            break;
        }
        let started = Instant::now();
        match source.next_frame() {
            Ok(raw) => match frame::reconstruct(&raw) {
                Ok(image) => {
                    if slot.publish(image) {
                        published += 1;
                        debug!(
                            published,
                            width = raw.width,
                            height = raw.height,
                            latency_ms = started.elapsed().as_millis() as u64,
                            "frame published"
                        );
                    } else {
                        dropped += 1;
                        debug!(dropped, "slot occupied, dropped incoming frame");
                    }
                }
                Err(err) => {
                    warn!(error = %err, "skipping malformed frame");
                }
            },
            Err(err) => {
                error!(error = %err, "capture session failed, producer stopping");
                let _ = status.send(err);
                break;
            }
        }
        if sleep_observing_shutdown(frame_interval.saturating_sub(started.elapsed()), &shutdown) {
            break;
        }
    }
    debug!(published, dropped, "capture thread exiting");
}

/// Sleeps for `duration` in short slices, returning `true` as soon as a
/// stop request is observed.
fn sleep_observing_shutdown(duration: Duration, shutdown: &watch::Receiver<bool>) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if *shutdown.borrow() {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        thread::sleep(SHUTDOWN_POLL.min(deadline - now));
    }
}

/// Handle to a running capture session.
pub struct CaptureHandle {
    shutdown: watch::Sender<bool>,
    thread: Option<JoinHandle<()>>,
    status: mpsc::UnboundedReceiver<CaptureError>,
    slot: FrameSlot,
}

impl CaptureHandle {
    /// Resolves when the producer reports a session-fatal error. `None`
    /// means the thread stopped without reporting (normal shutdown).
    pub async fn fatal(&mut self) -> Option<CaptureError> {
        self.status.recv().await
    }

    /// Tears the session down: signals the thread, joins it, and drains any
    /// resident image out of the slot.
    pub fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("capture thread panicked");
            }
        }
        self.slot.drain();
    }
}

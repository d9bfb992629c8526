//! Error types for the capture → recognize → analyze → display pipeline.
//! Per-frame and per-iteration failures are logged where they happen and
//! become "no result this step"; they never abort the loop or the capture
//! session. The one fatal condition is a session-level [`CaptureError`],
//! which stops the producer until an explicit restart.

use thiserror::Error;

/// A raw frame that cannot be reconstructed into a packed image.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Row padding is not a whole number of pixels, the dimensions are
    /// degenerate, or the buffer is too short for the declared layout.
    /// Non-retryable: discard the frame and continue.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
}

/// Session-level capture failure. Fatal for the producer.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no monitors available")]
    NoMonitor,
    #[error("screen capture failed: {0}")]
    Platform(#[from] xcap::XCapError),
    #[error("captured an empty screenshot - possible permission issue or no display")]
    EmptyCapture,
    #[error("failed to spawn capture thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Failure to obtain a board position from the recognition service.
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("failed to encode frame as PNG: {0}")]
    Encode(#[from] image::ImageError),
    #[error("recognition request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("recognition service returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("recognition service returned an invalid position: {0}")]
    InvalidPosition(String),
}

/// Failure to obtain a move from the analysis service.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("analysis service returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Failure to show a move on the display surface.
#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("failed to write to the display surface: {0}")]
    Io(#[from] std::io::Error),
}

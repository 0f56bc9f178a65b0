//! Capture (meeting / transcription) session model.

mod model;

pub use model::{RecordingSegment, RecordingSession, RecordingState, RecordingStatus};

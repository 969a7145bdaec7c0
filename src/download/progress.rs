use std::sync::Arc;

/// Stage a progress event was emitted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    Preparing,
    Downloading,
    Complete,
    Error,
}

/// A transient progress notification; never stored by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub phase: ProgressPhase,
    pub current: u32,
    pub total: u32,
    /// 0..=100
    pub percentage: u8,
    pub filename: String,
}

impl ProgressEvent {
    pub fn new(phase: ProgressPhase, current: u32, total: u32, filename: impl Into<String>) -> Self {
        let percentage = if total == 0 {
            100
        } else {
            (current.min(total) as u64 * 100 / total as u64) as u8
        };
        Self {
            phase,
            current,
            total,
            percentage,
            filename: filename.into(),
        }
    }
}

/// Caller-supplied receiver for progress events.
pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

pub(crate) fn emit(sink: Option<&ProgressSink>, event: ProgressEvent) {
    if let Some(sink) = sink {
        sink(event);
    }
}

use std::sync::Arc;
use std::time::Duration;

/// Progress notifications emitted while a stage runs. Library code never
/// prints; the caller decides whether events become log lines, progress bars
/// or test assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum AuditEvent {
    PageStarted {
        url: String,
        attempt: usize,
    },
    RetryScheduled {
        url: String,
        attempt: usize,
        delay: Duration,
        error: String,
    },
    PageFinished {
        url: String,
        ok: bool,
    },
    PageSkipped {
        url: String,
    },
    BatchCompleted {
        batch: usize,
        total_batches: usize,
    },
    UrlProbed {
        stage: &'static str,
        url: String,
        done: usize,
        total: usize,
    },
}

pub type ProgressCallback = Arc<dyn Fn(AuditEvent) + Send + Sync>;

pub fn emit(callback: &Option<ProgressCallback>, event: AuditEvent) {
    if let Some(cb) = callback {
        cb(event);
    }
}

/// Human-readable status line sink. Fire-and-forget.
pub trait ProgressSink: Send + Sync {
    fn publish(&self, message: &str);
}

/// Prints to stdout and mirrors the line into the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn publish(&self, message: &str) {
        println!("{message}");
        tracing::info!(target: "progress", "{message}");
    }
}

#[derive(Debug, Default)]
pub struct RecordingProgress {
    messages: std::sync::Mutex<Vec<String>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        match self.messages.lock() {
            Ok(m) => m.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ProgressSink for RecordingProgress {
    fn publish(&self, message: &str) {
        let mut guard = match self.messages.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push(message.to_string());
    }
}

/// A sink for the human-readable progress of a long-running analysis.
///
/// The pipeline reports every step through this trait; a job forwards the lines to
/// its progress queue while the command line renders them next to a spinner.
pub trait Progress: Send + Sync {
    /// Set the phase label for the current operation (e.g., "Cloning", "Scanning").
    fn set_phase(&self, phase: &str);

    /// Emit one line of progress output.
    fn println(&self, msg: &str);

    /// Finish and clear any progress indicator.
    fn done(&self);
}

/// Collects progress lines in memory, mostly useful for tests.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    lines: std::sync::Mutex<Vec<String>>,
}

impl RecordingProgress {
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl Progress for RecordingProgress {
    fn set_phase(&self, _phase: &str) {}

    fn println(&self, msg: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(msg.to_string());
        }
    }

    fn done(&self) {}
}

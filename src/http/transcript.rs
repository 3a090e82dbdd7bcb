//! Transcript file
//!
//! An optional, append-only text log of what was sent, how long it took and
//! which certificates were accepted. Writing is best effort: a failure is
//! reported through `tracing` and otherwise ignored.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    path: Option<PathBuf>,
}

impl Transcript {
    pub fn new(path: Option<PathBuf>) -> Self {
        Transcript { path }
    }

    pub fn disabled() -> Self {
        Transcript { path: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    /// Append a titled entry
    pub fn record(&self, title: &str, text: &str) {
        let Some(path) = self.path.as_ref() else {
            return;
        };

        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| format!("{}.{:03}", d.as_secs(), d.subsec_millis()))
            .unwrap_or_default();
        let entry = format!("[{}] {}\n{}\n\n", stamp, title, text);

        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| file.write_all(entry.as_bytes()));

        if let Err(e) = result {
            tracing::warn!(path = %path.display(), error = %e, "transcript write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_writes_nothing() {
        let transcript = Transcript::disabled();
        assert!(!transcript.is_enabled());
        transcript.record("Request", "GET / HTTP/1.1");
    }

    #[test]
    fn test_entries_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        let transcript = Transcript::new(Some(path.clone()));

        transcript.record("Request", "GET / HTTP/1.1");
        transcript.record("Timing", "elapsed 0m 0.010s");

        let text = std::fs::read_to_string(&path).unwrap();
        let request_at = text.find("Request\nGET / HTTP/1.1").unwrap();
        let timing_at = text.find("Timing\nelapsed").unwrap();
        assert!(request_at < timing_at);
    }

    #[test]
    fn test_unwritable_path_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for appending
        let transcript = Transcript::new(Some(dir.path().to_path_buf()));
        transcript.record("Request", "ignored");
    }
}

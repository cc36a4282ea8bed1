//! Ingest progress reporting.
//!
//! Reports how far embedding has got while a document is loaded so users
//! see something happen during the (possibly slow) remote call.
//! Progress is emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event during ingestion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestProgressEvent {
    /// Chunks are being sent to the embedding service.
    Embedding { total: u64 },
    /// `n` of `total` chunks are stored in the index.
    Stored { n: u64, total: u64 },
}

/// Receives progress events. Implementations write to stderr (human or JSON).
pub trait IngestProgressReporter: Send + Sync {
    fn report(&self, event: IngestProgressEvent);
}

/// Human-friendly progress on stderr: "index  stored  12 / 40 chunks".
pub struct StderrProgress;

impl IngestProgressReporter for StderrProgress {
    fn report(&self, event: IngestProgressEvent) {
        if let Some(line) = human_line(&event) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

fn human_line(event: &IngestProgressEvent) -> Option<String> {
    match event {
        IngestProgressEvent::Embedding { total } => Some(format!(
            "index  embedding {} chunks...",
            format_number(*total)
        )),
        // only the final count; a line per chunk is noise
        IngestProgressEvent::Stored { n, total } if n == total => Some(format!(
            "index  stored  {} / {} chunks",
            format_number(*n),
            format_number(*total)
        )),
        IngestProgressEvent::Stored { .. } => None,
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IngestProgressReporter for JsonProgress {
    fn report(&self, event: IngestProgressEvent) {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{}", json_line(&event));
        let _ = stderr.flush();
    }
}

fn json_line(event: &IngestProgressEvent) -> String {
    let obj = match event {
        IngestProgressEvent::Embedding { total } => serde_json::json!({
            "event": "progress",
            "phase": "embedding",
            "total": total
        }),
        IngestProgressEvent::Stored { n, total } => serde_json::json!({
            "event": "progress",
            "phase": "stored",
            "n": n,
            "total": total
        }),
    };
    obj.to_string()
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IngestProgressReporter for NoProgress {
    fn report(&self, _event: IngestProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn IngestProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

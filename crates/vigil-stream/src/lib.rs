//! Stream ingest: folds one agent turn's chunk stream into the transcript
//! and raises the approval marker exactly once per session.

use tracing::debug;

use vigil_core::APPROVAL_MARKER;

// ── Log entries ──

/// One line of the console transcript. Immutable once its session closes;
/// the agent entry of the open session is the only entry that still grows.
#[derive(Debug, Clone, PartialEq)]
pub enum LogEntry {
    /// Operator command that started a turn.
    User(String),
    /// Accumulated agent output for one turn.
    Agent(String),
    /// Informational line produced by the console itself.
    Info(String),
}

impl LogEntry {
    pub fn text(&self) -> &str {
        match self {
            LogEntry::User(t) | LogEntry::Agent(t) | LogEntry::Info(t) => t,
        }
    }

}

// ── Session ──

/// One agent turn, from command submission to stream close.
#[derive(Debug)]
struct StreamSession {
    command_text: String,
    accumulated: String,
    /// Transcript index of this session's agent entry, once a chunk arrived.
    agent_entry: Option<usize>,
    /// Latched on the first marker hit; later chunks never re-report.
    marker_seen: bool,
}

/// Result of appending one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Chunk folded in, nothing new to act on.
    Appended,
    /// The accumulated text now contains the approval marker. Reported
    /// once per session.
    MarkerDetected,
    /// No session is open; the chunk was dropped.
    NoSession,
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Finished,
    Error,
}

// ── Transcript ──

/// Ordered console log plus the single open session, if any.
/// Owns session lifecycle exclusively; everything else reads.
#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<LogEntry>,
    session: Option<StreamSession>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new turn for `command_text`. An empty command is a no-op and
    /// returns false. If a session is still open it is finalized as-is
    /// first, so two turns are never merged.
    pub fn open(&mut self, command_text: &str) -> bool {
        if command_text.is_empty() {
            return false;
        }
        if self.session.is_some() {
            debug!("new command while a session is open; finalizing prior session");
            self.finalize_session();
        }
        self.entries.push(LogEntry::User(command_text.to_string()));
        self.session = Some(StreamSession {
            command_text: command_text.to_string(),
            accumulated: String::new(),
            agent_entry: None,
            marker_seen: false,
        });
        true
    }

    /// Fold one chunk into the open session. The whole accumulated buffer
    /// is re-scanned because the marker can straddle a chunk boundary.
    pub fn append_chunk(&mut self, chunk: &str) -> ChunkOutcome {
        let Some(session) = self.session.as_mut() else {
            return ChunkOutcome::NoSession;
        };
        session.accumulated.push_str(chunk);

        match session.agent_entry {
            Some(idx) => {
                if let Some(LogEntry::Agent(text)) = self.entries.get_mut(idx) {
                    text.push_str(chunk);
                }
            }
            None => {
                self.entries
                    .push(LogEntry::Agent(session.accumulated.clone()));
                session.agent_entry = Some(self.entries.len() - 1);
            }
        }

        if !session.marker_seen && session.accumulated.contains(APPROVAL_MARKER) {
            session.marker_seen = true;
            return ChunkOutcome::MarkerDetected;
        }
        ChunkOutcome::Appended
    }

    /// Close the open session. The agent entry freezes as the finished log
    /// line; on error the caller is expected to trigger a workspace
    /// recovery re-fetch.
    pub fn close(&mut self, reason: CloseReason) {
        if let Some(session) = &self.session {
            debug!(
                command = %session.command_text,
                ?reason,
                "closing stream session"
            );
        }
        self.finalize_session();
    }

    /// Append an informational console line outside any session.
    pub fn push_info(&mut self, line: impl Into<String>) {
        self.entries.push(LogEntry::Info(line.into()));
    }

    pub fn is_streaming(&self) -> bool {
        self.session.is_some()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Accumulated text of the open session's agent entry, if any chunk
    /// has arrived.
    pub fn current_agent_text(&self) -> Option<&str> {
        let session = self.session.as_ref()?;
        session.agent_entry.map(|_| session.accumulated.as_str())
    }

    fn finalize_session(&mut self) {
        self.session = None;
    }
}

//! Session recording: state snapshots and prompt/response transcripts.
//!
//! Recording is write-only observability. The engine talks to a
//! [`RecorderHandle`], which logs and swallows every recorder failure so a
//! broken disk can never change the outcome of a run.

use super::state::{ResearchPhase, ResearchState};
use crate::persistence::{atomic_write, atomic_write_json, load_json};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

/// Durable sink for research observability data.
pub trait SessionRecorder: Send + Sync {
    fn persist_state(&self, state: &ResearchState) -> io::Result<()>;

    /// Store a prompt and return the id its response will be filed under.
    fn persist_prompt(&self, session_id: Uuid, tag: &str, text: &str) -> io::Result<Uuid>;

    fn persist_response(
        &self,
        session_id: Uuid,
        tag: &str,
        prompt_id: Uuid,
        text: &str,
    ) -> io::Result<()>;
}

/// Fire-and-forget front for a [`SessionRecorder`].
#[derive(Clone, Default)]
pub struct RecorderHandle {
    inner: Option<Arc<dyn SessionRecorder>>,
}

impl RecorderHandle {
    pub fn new(recorder: Arc<dyn SessionRecorder>) -> Self {
        Self {
            inner: Some(recorder),
        }
    }

    /// A handle that records nothing.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Snapshot hook invoked after each state mutation.
    pub fn state_changed(&self, state: &ResearchState) {
        let Some(recorder) = &self.inner else {
            return;
        };
        if let Err(e) = recorder.persist_state(state) {
            warn!(
                session_id = %state.session_id(),
                phase = %state.current_phase(),
                error = %e,
                "Failed to persist research state"
            );
        }
    }

    /// Returns `None` when recording is disabled or the prompt could not be stored.
    pub fn prompt(&self, session_id: Uuid, tag: &str, text: &str) -> Option<Uuid> {
        let recorder = self.inner.as_ref()?;
        match recorder.persist_prompt(session_id, tag, text) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(session_id = %session_id, tag, error = %e, "Failed to persist prompt");
                None
            }
        }
    }

    pub fn response(&self, session_id: Uuid, tag: &str, prompt_id: Uuid, text: &str) {
        let Some(recorder) = &self.inner else {
            return;
        };
        if let Err(e) = recorder.persist_response(session_id, tag, prompt_id, text) {
            warn!(session_id = %session_id, tag, error = %e, "Failed to persist response");
        }
    }
}

/// Records nothing.
pub struct NoOpSessionRecorder;

impl SessionRecorder for NoOpSessionRecorder {
    fn persist_state(&self, _state: &ResearchState) -> io::Result<()> {
        Ok(())
    }

    fn persist_prompt(&self, _session_id: Uuid, _tag: &str, _text: &str) -> io::Result<Uuid> {
        Ok(Uuid::new_v4())
    }

    fn persist_response(
        &self,
        _session_id: Uuid,
        _tag: &str,
        _prompt_id: Uuid,
        _text: &str,
    ) -> io::Result<()> {
        Ok(())
    }
}

/// Writes one directory per session:
///
/// ```text
/// <base>/<session_id>/state.json
/// <base>/<session_id>/prompts/<prompt_id>.<tag>.txt
/// <base>/<session_id>/responses/<prompt_id>.<tag>.txt
/// ```
pub struct FileSessionRecorder {
    base_dir: PathBuf,
}

impl FileSessionRecorder {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn session_dir(&self, session_id: Uuid) -> PathBuf {
        self.base_dir.join(session_id.to_string())
    }

    fn transcript_path(&self, session_id: Uuid, kind: &str, prompt_id: Uuid, tag: &str) -> PathBuf {
        self.session_dir(session_id)
            .join(kind)
            .join(format!("{prompt_id}.{}.txt", sanitize_tag(tag)))
    }
}

impl SessionRecorder for FileSessionRecorder {
    fn persist_state(&self, state: &ResearchState) -> io::Result<()> {
        let path = self.session_dir(state.session_id()).join("state.json");
        atomic_write_json(&path, state)
    }

    fn persist_prompt(&self, session_id: Uuid, tag: &str, text: &str) -> io::Result<Uuid> {
        let prompt_id = Uuid::new_v4();
        let path = self.transcript_path(session_id, "prompts", prompt_id, tag);
        atomic_write(&path, text.as_bytes())?;
        debug!(path = %path.display(), "Recorded prompt");
        Ok(prompt_id)
    }

    fn persist_response(
        &self,
        session_id: Uuid,
        tag: &str,
        prompt_id: Uuid,
        text: &str,
    ) -> io::Result<()> {
        let path = self.transcript_path(session_id, "responses", prompt_id, tag);
        atomic_write(&path, text.as_bytes())
    }
}

/// Tags become part of file names.
fn sanitize_tag(tag: &str) -> String {
    tag.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

/// Summary of a recorded session for listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub query: String,
    pub phase: ResearchPhase,
    pub findings: usize,
    pub has_report: bool,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// List every readable session snapshot under `base_dir`, newest first.
///
/// Unreadable or foreign entries are skipped.
pub fn list_sessions(base_dir: &Path) -> Vec<SessionSummary> {
    let Ok(entries) = std::fs::read_dir(base_dir) else {
        return Vec::new();
    };

    let mut summaries: Vec<SessionSummary> = entries
        .flatten()
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let path = entry.path().join("state.json");
            match load_json::<ResearchState>(&path) {
                Ok(Some(state)) => Some(SessionSummary {
                    session_id: state.session_id(),
                    query: state.query().to_string(),
                    phase: state.current_phase(),
                    findings: state.findings().len(),
                    has_report: state.report.is_some(),
                    updated_at: state.updated_at,
                }),
                Ok(None) => None,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Skipping unreadable session");
                    None
                }
            }
        })
        .collect();

    summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    summaries
}

/// Load the latest snapshot of one recorded session.
pub fn load_session(base_dir: &Path, session_id: Uuid) -> crate::error::Result<ResearchState> {
    let path = base_dir.join(session_id.to_string()).join("state.json");
    let data = std::fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&data)?)
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPrompt {
    pub session_id: Uuid,
    pub tag: String,
    pub prompt_id: Uuid,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedResponse {
    pub session_id: Uuid,
    pub tag: String,
    pub prompt_id: Uuid,
    pub text: String,
}

/// Keeps everything in memory. Used by tests.
#[derive(Default)]
pub struct MemorySessionRecorder {
    snapshots: Mutex<Vec<ResearchState>>,
    prompts: Mutex<Vec<RecordedPrompt>>,
    responses: Mutex<Vec<RecordedResponse>>,
}

impl MemorySessionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<ResearchState> {
        self.snapshots.lock().unwrap().clone()
    }

    pub fn last_snapshot(&self) -> Option<ResearchState> {
        self.snapshots.lock().unwrap().last().cloned()
    }

    pub fn prompts(&self) -> Vec<RecordedPrompt> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn responses(&self) -> Vec<RecordedResponse> {
        self.responses.lock().unwrap().clone()
    }
}

impl SessionRecorder for MemorySessionRecorder {
    fn persist_state(&self, state: &ResearchState) -> io::Result<()> {
        self.snapshots.lock().unwrap().push(state.clone());
        Ok(())
    }

    fn persist_prompt(&self, session_id: Uuid, tag: &str, text: &str) -> io::Result<Uuid> {
        let prompt_id = Uuid::new_v4();
        self.prompts.lock().unwrap().push(RecordedPrompt {
            session_id,
            tag: tag.to_string(),
            prompt_id,
            text: text.to_string(),
        });
        Ok(prompt_id)
    }

    fn persist_response(
        &self,
        session_id: Uuid,
        tag: &str,
        prompt_id: Uuid,
        text: &str,
    ) -> io::Result<()> {
        self.responses.lock().unwrap().push(RecordedResponse {
            session_id,
            tag: tag.to_string(),
            prompt_id,
            text: text.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::state::Finding;
    use tempfile::TempDir;

    struct BrokenRecorder;

    impl SessionRecorder for BrokenRecorder {
        fn persist_state(&self, _state: &ResearchState) -> io::Result<()> {
            Err(io::Error::other("disk full"))
        }
        fn persist_prompt(&self, _: Uuid, _: &str, _: &str) -> io::Result<Uuid> {
            Err(io::Error::other("disk full"))
        }
        fn persist_response(&self, _: Uuid, _: &str, _: Uuid, _: &str) -> io::Result<()> {
            Err(io::Error::other("disk full"))
        }
    }

    #[test]
    fn test_handle_swallows_failures() {
        let handle = RecorderHandle::new(Arc::new(BrokenRecorder));
        let state = ResearchState::new("q");
        handle.state_changed(&state);
        assert!(handle.prompt(state.session_id(), "tag", "text").is_none());
        handle.response(state.session_id(), "tag", Uuid::new_v4(), "text");
    }

    #[test]
    fn test_disabled_handle_records_nothing() {
        let handle = RecorderHandle::disabled();
        assert!(handle.prompt(Uuid::new_v4(), "tag", "text").is_none());
    }

    #[test]
    fn test_file_recorder_layout() {
        let dir = TempDir::new().unwrap();
        let recorder = FileSessionRecorder::new(dir.path());
        let mut state = ResearchState::new("wasm component model");
        state.append_findings([Finding::new("WIT defines interfaces", "https://wasi.dev")]);

        recorder.persist_state(&state).unwrap();
        let prompt_id = recorder
            .persist_prompt(state.session_id(), "initial_queries", "prompt body")
            .unwrap();
        recorder
            .persist_response(state.session_id(), "initial_queries", prompt_id, "reply body")
            .unwrap();

        let session_dir = recorder.session_dir(state.session_id());
        assert!(session_dir.join("state.json").exists());
        let prompt_file = session_dir
            .join("prompts")
            .join(format!("{prompt_id}.initial_queries.txt"));
        let response_file = session_dir
            .join("responses")
            .join(format!("{prompt_id}.initial_queries.txt"));
        assert_eq!(std::fs::read_to_string(prompt_file).unwrap(), "prompt body");
        assert_eq!(std::fs::read_to_string(response_file).unwrap(), "reply body");
    }

    #[test]
    fn test_list_sessions_reads_snapshots() {
        let dir = TempDir::new().unwrap();
        let recorder = FileSessionRecorder::new(dir.path());
        let state = ResearchState::new("first");
        recorder.persist_state(&state).unwrap();
        std::fs::create_dir_all(dir.path().join("not-a-session")).unwrap();

        let sessions = list_sessions(dir.path());
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_id, state.session_id());
        assert_eq!(sessions[0].query, "first");
        assert_eq!(sessions[0].phase, ResearchPhase::Searching);
        assert!(!sessions[0].has_report);
    }

    #[test]
    fn test_load_session_round_trips_snapshot() {
        let dir = TempDir::new().unwrap();
        let recorder = FileSessionRecorder::new(dir.path());
        let mut state = ResearchState::new("loaded");
        state.append_findings([Finding::new("tokio steals work", "https://tokio.rs")]);
        recorder.persist_state(&state).unwrap();

        let loaded = load_session(dir.path(), state.session_id()).unwrap();
        assert_eq!(loaded.query(), "loaded");
        assert_eq!(loaded.findings().len(), 1);
    }

    #[test]
    fn test_load_session_errors() {
        let dir = TempDir::new().unwrap();
        let missing = load_session(dir.path(), Uuid::new_v4()).unwrap_err();
        assert!(matches!(missing, crate::error::DelveError::Io(_)));

        let id = Uuid::new_v4();
        std::fs::create_dir_all(dir.path().join(id.to_string())).unwrap();
        std::fs::write(dir.path().join(id.to_string()).join("state.json"), "{not json").unwrap();
        let garbled = load_session(dir.path(), id).unwrap_err();
        assert!(matches!(garbled, crate::error::DelveError::Serialization(_)));
    }

    #[test]
    fn test_list_sessions_missing_dir() {
        assert!(list_sessions(Path::new("/nonexistent/delve/sessions")).is_empty());
    }

    #[test]
    fn test_sanitize_tag() {
        assert_eq!(sanitize_tag("relevance"), "relevance");
        assert_eq!(sanitize_tag("a/b c"), "a_b_c");
    }
}

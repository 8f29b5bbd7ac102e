//! Research engine: four-phase research pipeline.
//!
//! Orchestrates:
//! 1. **Search** - Keyword queries fanned out to the search gateway
//! 2. **Plan** - Knowledge gaps, then a structured research plan
//! 3. **Investigate** - Per-strategy search, fetch, relevance gate, extraction
//! 4. **Synthesize** - One structured call producing the final report
//!
//! Any phase failure ends the run with a degraded report built from the
//! findings gathered so far.

pub mod callback;
pub mod context;
pub mod engine;
pub mod initial_search;
pub mod investigation;
pub mod planning;
pub mod prompts;
pub mod recorder;
pub mod report;
pub mod sources;
pub mod state;
pub mod synthesis;

pub use callback::{NoOpResearchCallback, RecordingResearchCallback, ResearchCallback};
pub use engine::ResearchEngine;
pub use recorder::{
    FileSessionRecorder, MemorySessionRecorder, NoOpSessionRecorder, RecorderHandle,
    SessionRecorder, SessionSummary, list_sessions, load_session,
};
pub use report::{DEGRADED_NOTICE, ReportMetadata, ResearchReport, SynthesisOutput};
pub use sources::{ContentFetcher, FetchOptions, SearchGateway, SearchOptions, SearchResult};
pub use state::{Finding, InvestigationStrategy, ResearchPhase, ResearchPlan, ResearchState};

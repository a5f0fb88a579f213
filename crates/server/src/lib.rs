//! Server crate for the ReelRecs recommendation engine.
//!
//! [`RecommendationEngine`] is the synchronous hybrid selector over the
//! loaded catalog; [`RecommendationOrchestrator`] runs it from async code
//! and swaps in reloaded data without stopping requests.

pub mod config;
pub mod engine;
pub mod orchestrator;

pub use config::EngineConfig;
pub use engine::{EngineSummary, Recommendation, RecommendationEngine, Strategy};
pub use orchestrator::{EngineHandle, RecommendationOrchestrator, RecommendationRequest};

//! Personal Assistant Orchestrator
//!
//! An agentic personal assistant that:
//! - Interprets natural-language requests through a tool-calling model loop
//! - Executes record operations (finances, schedule, journal) as tools
//! - Serializes and spaces remote calls behind a FIFO rate governor
//! - Caches low-variance responses (daily quote, web lookups)
//! - Persists records in Postgres or in memory
//! - Degrades remote faults into explanatory replies
//!
//! TURN LOOP:
//! UTTERANCE → MODEL → TOOL CALLS → RESULTS → MODEL → ... → REPLY + ACTION LOG

pub mod agent;
pub mod api;
pub mod context;
pub mod error;
pub mod execution;
pub mod gemini;
pub mod governor;
pub mod insights;
pub mod models;
pub mod store;
pub mod tools;

pub use error::Result;

// Re-export common types
pub use context::AssistantContext;
pub use models::*;

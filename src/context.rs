//! Process-wide wiring
//!
//! The store, governor, and model transport are constructed once at startup
//! and passed by handle into the orchestrator, the executor, and the insight
//! generators. There are no globals.

use crate::gemini::{GeminiClient, ModelTransport};
use crate::governor::RateGovernor;
use crate::store::RecordStore;
use std::env;
use std::sync::Arc;

pub struct AssistantContext {
    pub store: Arc<RecordStore>,
    pub governor: Arc<RateGovernor>,
    pub transport: Arc<dyn ModelTransport>,
}

impl AssistantContext {
    pub fn new(
        store: Arc<RecordStore>,
        governor: Arc<RateGovernor>,
        transport: Arc<dyn ModelTransport>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            governor,
            transport,
        })
    }

    /// Wire the production components from the environment. A missing
    /// GEMINI_API_KEY is tolerated here; every call will then surface a
    /// configuration-error reply instead of crashing.
    pub fn from_env() -> Arc<Self> {
        let api_key = env::var("GEMINI_API_KEY").unwrap_or_default();

        Self::new(
            Arc::new(RecordStore::from_env()),
            Arc::new(RateGovernor::new()),
            Arc::new(GeminiClient::new(api_key)),
        )
    }
}

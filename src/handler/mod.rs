//! Request handler module
//!
//! Hyper-facing adapter around the range engine.

pub mod router;

use std::sync::Arc;

pub use router::{handle_request, into_hyper_response, ProxyBody};

use crate::config::Config;
use crate::engine::{EngineSettings, EventSink, RangeEngine};
use crate::origin::{HttpOrigin, OriginError};

/// Shared, read-only application state
#[derive(Debug)]
pub struct AppState {
    pub config: Config,
    pub engine: RangeEngine,
}

impl AppState {
    /// Wire the HTTP origin and the event sink into an engine
    pub fn new(config: Config, events: Arc<dyn EventSink>) -> Result<Self, OriginError> {
        let origin = HttpOrigin::new(&config.origin)?;
        let engine = RangeEngine::new(
            Arc::new(origin),
            EngineSettings::from_config(&config),
            events,
        );
        Ok(Self { config, engine })
    }
}

//! Service state management.
//!
//! Contains the shared dispatcher handle and bot identity.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::dispatcher::Dispatcher;
use crate::transport::Transport;

/// Dispatcher over any transport, as shared by the HTTP handlers.
pub type SharedDispatcher = Arc<Dispatcher<dyn Transport>>;

/// Shared service state.
#[derive(Clone)]
pub struct ServiceState {
    /// The dispatcher handling updates.
    pub dispatcher: SharedDispatcher,
    /// This bot's own user id, for join detection.
    pub bot_id: Option<i64>,
    /// Service start time.
    pub started_at: DateTime<Utc>,
    ready: Arc<AtomicBool>,
}

impl ServiceState {
    /// Create service state around a dispatcher.
    ///
    /// The service starts not ready; call [`ServiceState::mark_ready`] once
    /// update delivery is set up.
    pub fn new(dispatcher: SharedDispatcher) -> Self {
        Self {
            dispatcher,
            bot_id: None,
            started_at: Utc::now(),
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Record the bot's own user id.
    pub fn with_bot_id(mut self, bot_id: i64) -> Self {
        self.bot_id = Some(bot_id);
        self
    }

    /// Flag the service as ready to receive updates.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Whether update delivery is set up.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Seconds since start.
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds().max(0)
    }
}

impl std::fmt::Debug for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceState")
            .field("bot_id", &self.bot_id)
            .field("started_at", &self.started_at)
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DurableStorage, InMemoryStorage};
    use crate::transport::RecordingTransport;

    fn state() -> ServiceState {
        let storage: Arc<dyn DurableStorage> = Arc::new(InMemoryStorage::new());
        let transport: Arc<dyn Transport> = Arc::new(RecordingTransport::new());
        ServiceState::new(Arc::new(Dispatcher::open(storage, transport)))
    }

    #[test]
    fn test_ready_flag_is_shared_between_clones() {
        let state = state();
        let clone = state.clone();
        assert!(!clone.is_ready());
        state.mark_ready();
        assert!(clone.is_ready());
    }

    #[test]
    fn test_bot_id() {
        let state = state().with_bot_id(42);
        assert_eq!(state.bot_id, Some(42));
        assert!(state.uptime_secs() >= 0);
    }
}

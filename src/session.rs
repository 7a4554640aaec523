//! Tracks metadata for an evaluation session.

use std::sync::Arc;

use crate::log;

/// Metadata for an evaluation session.
///
/// A session is created by the caller before building a [`Context`](crate::filters::context::Context)
/// and lives for as long as the caller wants; all evaluation passes that share a session
/// share its logging configuration.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    log_enabled: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            inner: Arc::new(SessionInner {
                log_enabled: log::log_enabled(),
            }),
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_for_test_suite() -> Self {
        Self {
            inner: Arc::new(SessionInner { log_enabled: false }),
        }
    }

    pub fn log_enabled(&self) -> bool {
        self.inner.log_enabled
    }
}

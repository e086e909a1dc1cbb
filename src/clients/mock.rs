//! Mock Service Layer for testing.
//!
//! In-memory client with error injection, in the same spirit as the crate's
//! tests: script the next failure, count calls, and assert on what the
//! manager did with the result.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::client::{LoginReply, ServiceLayerClient};
use crate::config::ServiceLayerConfig;
use crate::session::ServiceSession;
use crate::{Result, SlError};

/// Mock client with error injection.
///
/// Each injected error is consumed by the next matching call, which makes
/// fail-then-recover scripts straightforward:
///
/// ```
/// use slbridge::clients::mock::MockServiceLayer;
/// use slbridge::SlError;
///
/// let mock = MockServiceLayer::new();
/// mock.fail_next_login(SlError::Network("connection refused".into()));
/// // first login fails, second succeeds
/// ```
#[derive(Default)]
pub struct MockServiceLayer {
    login_error: Mutex<Option<SlError>>,
    logout_error: Mutex<Option<SlError>>,
    session_timeout: Mutex<Option<Duration>>,
    login_calls: AtomicUsize,
    logout_calls: AtomicUsize,
}

impl MockServiceLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the next `login` call to fail with the given error.
    pub fn fail_next_login(&self, err: SlError) {
        *self.login_error.lock().unwrap() = Some(err);
    }

    /// Scripts the next `logout` call to fail with the given error.
    pub fn fail_next_logout(&self, err: SlError) {
        *self.logout_error.lock().unwrap() = Some(err);
    }

    /// Sets the server-reported session timeout on subsequent logins.
    /// When unset, logins report no timeout and the manager falls back to
    /// its configured TTL.
    pub fn report_session_timeout(&self, timeout: Duration) {
        *self.session_timeout.lock().unwrap() = Some(timeout);
    }

    /// Number of `login` calls observed, failed ones included.
    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    /// Number of `logout` calls observed.
    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceLayerClient for MockServiceLayer {
    async fn login(&self, config: &ServiceLayerConfig) -> Result<LoginReply> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        config.validate()?;

        if let Some(err) = self.login_error.lock().unwrap().take() {
            return Err(err);
        }

        Ok(LoginReply {
            session_id: format!("B1SESSION-{}", uuid::Uuid::new_v4()),
            route_id: ".node4".to_string(),
            session_timeout: *self.session_timeout.lock().unwrap(),
        })
    }

    async fn logout(&self, _config: &ServiceLayerConfig, _session: &ServiceSession) -> Result<()> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self.logout_error.lock().unwrap().take() {
            return Err(err);
        }
        Ok(())
    }
}

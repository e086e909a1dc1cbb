//! The session token manager.
//!
//! [`SessionTokenManager`] owns at most one [`ServiceSession`] per process
//! and provides the lifecycle operations the settings surface needs: status,
//! test-connection, refresh, reset, and the step-up credential reveal.
//!
//! Concurrency: refresh and reset are serialized through a `transition`
//! mutex held across their whole read-modify-write, network round-trip
//! included. The session itself lives in an `RwLock<Option<_>>`, so status
//! reads run concurrently with writes but always observe either the old or
//! the new session atomically, never a mix.
//!
//! Failure semantics, which are the point of this component:
//! - a failed refresh never discards the cached session, whatever its age;
//! - a failed reset always ends in the no-session state;
//! - test-connection never touches the cached session at all.
//!
//! The Service Layer offers no reliable incremental-refresh endpoint, so
//! refresh performs a full re-login; it keeps refresh's preserve-on-failure
//! semantics rather than reset's discard-on-failure ones.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use crate::client::ServiceLayerClient;
use crate::config::{OperatorVerifier, ServiceLayerConfig};
use crate::session::{mask_token, ServiceSession, StatusReport};
use crate::{Result, SlError};

/// Outcome of a connectivity probe against supplied credentials.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl TestReport {
    fn ok() -> Self {
        Self {
            success: true,
            error: None,
            hint: None,
        }
    }

    fn failed(err: &SlError) -> Self {
        Self {
            success: false,
            error: Some(err.to_string()),
            hint: err.hint().map(str::to_string),
        }
    }
}

/// Non-secret connection fields, released only after operator step-up
/// authentication. The Service Layer password is never included in
/// plaintext, only as a masked preview.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealedCredentials {
    pub base_url: String,
    pub company_db: String,
    pub username: String,
    pub password_preview: String,
}

/// Owns the process-wide Service Layer session.
///
/// One instance per process; hand it around behind an `Arc`. If multiple
/// server instances run, each keeps its own independent session.
pub struct SessionTokenManager {
    client: Arc<dyn ServiceLayerClient>,
    config: ServiceLayerConfig,
    operator: Option<OperatorVerifier>,
    session: RwLock<Option<ServiceSession>>,
    /// Serializes refresh/reset read-modify-write sequences.
    transition: Mutex<()>,
}

impl SessionTokenManager {
    /// Creates a manager in the no-session state.
    ///
    /// # Errors
    ///
    /// Returns [`SlError::Configuration`] if the connection settings fail
    /// validation; nothing is constructed on bad input.
    pub fn new(config: ServiceLayerConfig, client: Arc<dyn ServiceLayerClient>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client,
            config,
            operator: None,
            session: RwLock::new(None),
            transition: Mutex::new(()),
        })
    }

    /// Installs the operator verifier that gates credential reveal.
    pub fn with_operator_verifier(mut self, verifier: OperatorVerifier) -> Self {
        self.operator = Some(verifier);
        self
    }

    /// Reports the current session state. Never fails and has no side
    /// effects; expiry is decided purely by the local clock, without
    /// contacting the Service Layer.
    ///
    /// The one exception to "no side effects": a cached session whose
    /// timestamps violate `expires_at > issued_at` is untrustworthy, so it
    /// is discarded and the report carries an error flag.
    pub async fn status(&self) -> StatusReport {
        let snapshot = self.session.read().await.clone();

        let Some(session) = snapshot else {
            return StatusReport::unknown();
        };

        if !session.invariant_holds() {
            tracing::warn!(
                session = %session.session_preview(),
                "cached session has a non-positive validity window; discarding"
            );
            *self.session.write().await = None;
            return StatusReport::unknown_with_error(
                "cached session had an invalid expiry and was discarded",
            );
        }

        StatusReport::from_session(&session, Utc::now())
    }

    /// Probes the Service Layer with the supplied credentials.
    ///
    /// Performs a live login (and a best-effort logout of the probe session)
    /// without reading or writing the cached session. Always returns a
    /// report; failures are folded into it with a troubleshooting hint.
    pub async fn test_connection(&self, credentials: &ServiceLayerConfig) -> TestReport {
        if let Err(e) = credentials.validate() {
            return TestReport::failed(&e);
        }

        match self.client.login(credentials).await {
            Ok(reply) => {
                // Close the probe session so it does not count against the
                // server's session limit. Failure here is not a probe failure.
                let ttl = reply.session_timeout.unwrap_or(credentials.session_ttl);
                if let Ok(probe) = ServiceSession::issue(reply.session_id, reply.route_id, ttl) {
                    if let Err(e) = self.client.logout(credentials, &probe).await {
                        tracing::debug!(error = %e, "probe logout failed");
                    }
                }
                tracing::info!("connection test succeeded");
                TestReport::ok()
            }
            Err(e) => {
                tracing::warn!(error = %e, "connection test failed");
                TestReport::failed(&e)
            }
        }
    }

    /// Re-issues the session via a fresh login, replacing the cached one
    /// atomically on success.
    ///
    /// On any failure the previous session is preserved unchanged: a failed
    /// refresh must never leave the process without a session the old token
    /// could still serve. Note that clock-based expiry is not reset by a
    /// failed refresh; an expired session stays expired.
    ///
    /// # Errors
    ///
    /// - [`SlError::NotAuthenticated`] if there is no cached session to
    ///   refresh (use [`reset`](Self::reset) to establish one)
    /// - any client error, with the old session left in place
    pub async fn refresh(&self) -> Result<StatusReport> {
        let _guard = self.transition.lock().await;

        if self.session.read().await.is_none() {
            return Err(SlError::NotAuthenticated);
        }

        match self.login_fresh().await {
            Ok(fresh) => {
                tracing::info!(expires_at = %fresh.expires_at(), "session refreshed");
                let report = StatusReport::from_session(&fresh, Utc::now());
                *self.session.write().await = Some(fresh);
                Ok(report)
            }
            Err(e) => {
                tracing::warn!(error = %e, "refresh failed; previous session retained");
                Err(e)
            }
        }
    }

    /// Discards the current session unconditionally and performs a fresh
    /// login.
    ///
    /// Succeeds or fails atomically with no fallback: on failure the manager
    /// is in the no-session state and the caller retries.
    pub async fn reset(&self) -> Result<StatusReport> {
        let _guard = self.transition.lock().await;

        *self.session.write().await = None;

        match self.login_fresh().await {
            Ok(fresh) => {
                tracing::info!(expires_at = %fresh.expires_at(), "session reset");
                let report = StatusReport::from_session(&fresh, Utc::now());
                *self.session.write().await = Some(fresh);
                Ok(report)
            }
            Err(e) => {
                tracing::warn!(error = %e, "reset failed; no session cached");
                Err(e)
            }
        }
    }

    /// Releases the non-secret connection fields after re-authenticating
    /// the calling operator.
    ///
    /// This gate is independent of the session lifecycle: it verifies the
    /// *local operator's* password, not anything about the Service Layer.
    /// The external password is only ever returned as a masked preview.
    ///
    /// # Errors
    ///
    /// - [`SlError::Configuration`] if no operator verifier is configured
    /// - [`SlError::Authentication`] if the supplied password does not match
    pub fn reveal_credentials(&self, operator_password: &str) -> Result<RevealedCredentials> {
        let verifier = self.operator.as_ref().ok_or_else(|| {
            SlError::Configuration("no operator verifier configured for credential reveal".into())
        })?;

        if !verifier.verify(operator_password) {
            tracing::warn!("credential reveal denied: operator password mismatch");
            return Err(SlError::Authentication(
                "operator password does not match".to_string(),
            ));
        }

        Ok(RevealedCredentials {
            base_url: self.config.base_url.clone(),
            company_db: self.config.company_db.clone(),
            username: self.config.username.clone(),
            password_preview: mask_token(self.config.password.expose()),
        })
    }

    /// Logs in with the configured credentials and builds the replacement
    /// session. The cached session is not touched; callers decide what to
    /// do with the outcome.
    async fn login_fresh(&self) -> Result<ServiceSession> {
        let reply = self.client.login(&self.config).await?;
        let ttl = reply.session_timeout.unwrap_or(self.config.session_ttl);
        ServiceSession::issue(reply.session_id, reply.route_id, ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::mock::MockServiceLayer;
    use crate::session::SessionStatus;
    use std::time::Duration;

    fn config() -> ServiceLayerConfig {
        ServiceLayerConfig::new(
            "https://b1.example.com:50000/b1s/v1",
            "SBODEMOUS",
            "manager",
            "secret-password",
        )
    }

    fn manager_with_mock() -> (SessionTokenManager, Arc<MockServiceLayer>) {
        let mock = Arc::new(MockServiceLayer::new());
        let manager = SessionTokenManager::new(config(), mock.clone()).unwrap();
        (manager, mock)
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let mock = Arc::new(MockServiceLayer::new());
        let mut bad = config();
        bad.base_url = "".to_string();

        assert!(matches!(
            SessionTokenManager::new(bad, mock),
            Err(SlError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_status_without_session_is_unknown() {
        let (manager, mock) = manager_with_mock();
        let report = manager.status().await;

        assert_eq!(report.status, SessionStatus::Unknown);
        assert!(report.error.is_none());
        // Status is local-only: no network traffic.
        assert_eq!(mock.login_calls(), 0);
    }

    #[tokio::test]
    async fn test_reset_installs_valid_session() {
        let (manager, _mock) = manager_with_mock();

        let report = manager.reset().await.unwrap();
        assert_eq!(report.status, SessionStatus::Valid);

        let after = manager.status().await;
        assert_eq!(after.status, SessionStatus::Valid);
        assert_eq!(after.token, report.token);
    }

    #[tokio::test]
    async fn test_status_is_idempotent() {
        let (manager, mock) = manager_with_mock();
        manager.reset().await.unwrap();
        let logins_after_reset = mock.login_calls();

        let first = manager.status().await;
        for _ in 0..5 {
            let again = manager.status().await;
            assert_eq!(again.status, first.status);
            assert_eq!(again.token, first.token);
            assert_eq!(again.expires_at, first.expires_at);
        }
        assert_eq!(mock.login_calls(), logins_after_reset);
    }

    #[tokio::test]
    async fn test_expiry_is_clock_derived() {
        let (manager, mock) = manager_with_mock();
        mock.report_session_timeout(Duration::from_millis(80));

        manager.reset().await.unwrap();
        assert_eq!(manager.status().await.status, SessionStatus::Valid);

        tokio::time::sleep(Duration::from_millis(120)).await;

        // Expired by the local clock, with no further network traffic.
        let logins = mock.login_calls();
        assert_eq!(manager.status().await.status, SessionStatus::Expired);
        assert_eq!(mock.login_calls(), logins);
    }

    #[tokio::test]
    async fn test_refresh_replaces_session() {
        let (manager, _mock) = manager_with_mock();
        let before = manager.reset().await.unwrap();

        let after = manager.refresh().await.unwrap();
        assert_eq!(after.status, SessionStatus::Valid);
        assert_ne!(after.token, before.token);
    }

    #[tokio::test]
    async fn test_failed_refresh_preserves_valid_session() {
        let (manager, mock) = manager_with_mock();
        let before = manager.reset().await.unwrap();

        mock.fail_next_login(SlError::Network("connection refused".into()));
        let err = manager.refresh().await.unwrap_err();
        assert!(matches!(err, SlError::Network(_)));

        let after = manager.status().await;
        assert_eq!(after.status, SessionStatus::Valid);
        assert_eq!(after.token, before.token);
        assert_eq!(after.expires_at, before.expires_at);
    }

    #[tokio::test]
    async fn test_failed_refresh_preserves_expired_session() {
        // Scenario: session issued with a short TTL, refresh attempted after
        // expiry fails. The old session must still be reported, as expired;
        // a failed refresh does not reset clock-based expiry.
        let (manager, mock) = manager_with_mock();
        mock.report_session_timeout(Duration::from_millis(50));
        let before = manager.reset().await.unwrap();

        tokio::time::sleep(Duration::from_millis(90)).await;
        assert_eq!(manager.status().await.status, SessionStatus::Expired);

        mock.fail_next_login(SlError::Network("host unreachable".into()));
        assert!(manager.refresh().await.is_err());

        let after = manager.status().await;
        assert_eq!(after.status, SessionStatus::Expired);
        assert_eq!(after.token, before.token);
        assert_eq!(after.expires_at, before.expires_at);
    }

    #[tokio::test]
    async fn test_refresh_without_session_is_not_authenticated() {
        let (manager, mock) = manager_with_mock();

        assert!(matches!(
            manager.refresh().await,
            Err(SlError::NotAuthenticated)
        ));
        assert_eq!(mock.login_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_reset_ends_in_no_session() {
        let (manager, mock) = manager_with_mock();
        manager.reset().await.unwrap();

        mock.fail_next_login(SlError::Authentication("password changed".into()));
        assert!(manager.reset().await.is_err());

        // Old session must not be retained after a failed reset.
        let report = manager.status().await;
        assert_eq!(report.status, SessionStatus::Unknown);
        assert!(report.token.is_none());
    }

    #[tokio::test]
    async fn test_reset_replaces_all_session_fields() {
        let (manager, _mock) = manager_with_mock();
        let first = manager.reset().await.unwrap();
        let second = manager.reset().await.unwrap();

        assert_eq!(second.status, SessionStatus::Valid);
        assert_ne!(second.token, first.token);
        assert!(second.issued_at.unwrap() >= first.issued_at.unwrap());
    }

    #[tokio::test]
    async fn test_test_connection_does_not_touch_cached_session() {
        let (manager, mock) = manager_with_mock();
        let before = manager.reset().await.unwrap();

        let report = manager.test_connection(&config()).await;
        assert!(report.success);
        assert_eq!(mock.logout_calls(), 1);

        // Probe must fail without disturbing the cache either.
        mock.fail_next_login(SlError::Authentication("wrong password".into()));
        let report = manager.test_connection(&config()).await;
        assert!(!report.success);
        assert!(report.error.unwrap().contains("wrong password"));
        assert!(report.hint.is_some());

        let after = manager.status().await;
        assert_eq!(after.token, before.token);
        assert_eq!(after.expires_at, before.expires_at);
    }

    #[tokio::test]
    async fn test_test_connection_with_bad_credentials_shape() {
        let (manager, mock) = manager_with_mock();
        let mut bad = config();
        bad.username = "".to_string();

        let report = manager.test_connection(&bad).await;
        assert!(!report.success);
        assert!(report.hint.is_some());
        assert_eq!(mock.login_calls(), 0);
    }

    #[tokio::test]
    async fn test_reveal_requires_matching_operator_password() {
        let (manager, _mock) = manager_with_mock();
        let manager =
            manager.with_operator_verifier(OperatorVerifier::from_password("salt", "op-pass"));

        assert!(matches!(
            manager.reveal_credentials("wrong"),
            Err(SlError::Authentication(_))
        ));

        let revealed = manager.reveal_credentials("op-pass").unwrap();
        assert_eq!(revealed.username, "manager");
        assert_eq!(revealed.company_db, "SBODEMOUS");
        // The external password never comes back in plaintext.
        assert!(!revealed.password_preview.contains("secret-password"));
    }

    #[tokio::test]
    async fn test_reveal_gate_ignores_session_state() {
        let (manager, _mock) = manager_with_mock();
        let manager =
            manager.with_operator_verifier(OperatorVerifier::from_password("salt", "op-pass"));

        // No session cached; the step-up gate still behaves identically.
        assert!(matches!(
            manager.reveal_credentials("nope"),
            Err(SlError::Authentication(_))
        ));
        assert!(manager.reveal_credentials("op-pass").is_ok());
    }

    #[tokio::test]
    async fn test_reveal_without_verifier_is_configuration_error() {
        let (manager, _mock) = manager_with_mock();
        assert!(matches!(
            manager.reveal_credentials("anything"),
            Err(SlError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_invariant_violation_discards_session() {
        let (manager, _mock) = manager_with_mock();
        let now = Utc::now();
        let broken = ServiceSession::from_parts("sid-0123456789", "rid", now, now);
        *manager.session.write().await = Some(broken);

        let report = manager.status().await;
        assert_eq!(report.status, SessionStatus::Unknown);
        assert!(report.error.is_some());

        // The bad session is gone; subsequent reads are plain unknown.
        let again = manager.status().await;
        assert_eq!(again.status, SessionStatus::Unknown);
        assert!(again.error.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_transitions_are_serialized() {
        let (manager, _mock) = manager_with_mock();
        manager.reset().await.unwrap();

        let manager = Arc::new(manager);
        let mut handles = Vec::new();
        for i in 0..8 {
            let m = manager.clone();
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    let _ = m.refresh().await;
                } else {
                    let _ = m.reset().await;
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        // Whatever the interleaving, the final state is a coherent session.
        let report = manager.status().await;
        assert_eq!(report.status, SessionStatus::Valid);
        assert!(report.token.is_some());
        assert!(report.expires_at.unwrap() > report.issued_at.unwrap());
    }
}

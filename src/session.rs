//! The cached Service Layer session and its status model.
//!
//! A [`ServiceSession`] is the opaque credential pair (`sessionId` + `routeId`)
//! issued by the Service Layer on login, together with its issue and expiry
//! timestamps. Sessions are owned exclusively by the
//! [`SessionTokenManager`](crate::manager::SessionTokenManager); callers only
//! ever see read-only [`StatusReport`] snapshots with masked token previews.
//!
//! Expiry is decided by the local clock: once `now >= expires_at` the session
//! is reported as expired without asking the Service Layer, even if the server
//! would still accept the token.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::{Result, SlError};

/// Lifecycle status of the cached session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// A session is cached and its expiry time has not passed.
    Valid,
    /// A session is cached but the local clock has passed its expiry time.
    Expired,
    /// No session is cached, or the cached state could not be trusted.
    Unknown,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Valid => write!(f, "valid"),
            Self::Expired => write!(f, "expired"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// An authenticated Service Layer session.
///
/// Replaced wholesale on refresh or reset; never partially mutated. Fields
/// are private so the only way to observe a session is through accessors or
/// a [`StatusReport`] snapshot.
#[derive(Clone)]
pub struct ServiceSession {
    session_id: String,
    route_id: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl ServiceSession {
    /// Creates a session issued now with the given time-to-live.
    ///
    /// # Errors
    ///
    /// Returns [`SlError::UnexpectedResponse`] if `ttl` is not positive,
    /// which would break the `expires_at > issued_at` invariant.
    pub fn issue(
        session_id: impl Into<String>,
        route_id: impl Into<String>,
        ttl: std::time::Duration,
    ) -> Result<Self> {
        let ttl = Duration::from_std(ttl)
            .map_err(|_| SlError::UnexpectedResponse("session TTL out of range".to_string()))?;
        if ttl <= Duration::zero() {
            return Err(SlError::UnexpectedResponse(
                "session TTL must be positive".to_string(),
            ));
        }

        let now = Utc::now();
        Ok(Self {
            session_id: session_id.into(),
            route_id: route_id.into(),
            issued_at: now,
            expires_at: now + ttl,
        })
    }

    /// Returns the raw session token. Crate-internal; callers outside the
    /// crate only see masked previews.
    pub(crate) fn session_id(&self) -> &str {
        &self.session_id
    }

    pub(crate) fn route_id(&self) -> &str {
        &self.route_id
    }

    /// When this session was issued.
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// When this session expires.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Clock-based status at the given instant. No network involved.
    pub fn status_at(&self, now: DateTime<Utc>) -> SessionStatus {
        if now >= self.expires_at {
            SessionStatus::Expired
        } else {
            SessionStatus::Valid
        }
    }

    /// Checks the `expires_at > issued_at` invariant.
    ///
    /// A violation means the cached state cannot be trusted; the manager
    /// logs it and discards the session.
    pub fn invariant_holds(&self) -> bool {
        self.expires_at > self.issued_at
    }

    /// Masked preview of the session token for diagnostics.
    pub fn session_preview(&self) -> String {
        mask_token(&self.session_id)
    }

    /// Masked preview of the routing token for diagnostics.
    pub fn route_preview(&self) -> String {
        mask_token(&self.route_id)
    }

    #[cfg(test)]
    pub(crate) fn from_parts(
        session_id: impl Into<String>,
        route_id: impl Into<String>,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            route_id: route_id.into(),
            issued_at,
            expires_at,
        }
    }
}

// Manual Debug so tokens never end up in logs via {:?}.
impl std::fmt::Debug for ServiceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceSession")
            .field("session_id", &self.session_preview())
            .field("route_id", &self.route_preview())
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Masked previews of the credential pair, safe to display in diagnostics.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenPreview {
    pub session_id: String,
    pub route_id: String,
}

/// Read-only snapshot of the manager's session state.
///
/// Returned by [`SessionTokenManager::status`](crate::manager::SessionTokenManager::status);
/// building one has no side effects.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<TokenPreview>,
    /// Set when the report is `unknown` because of an internal problem
    /// rather than a simple absence of session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusReport {
    /// Report for the no-session state.
    pub fn unknown() -> Self {
        Self {
            status: SessionStatus::Unknown,
            issued_at: None,
            expires_at: None,
            token: None,
            error: None,
        }
    }

    /// Report for an internal error; status is `unknown` with an error flag
    /// for the caller to display.
    pub fn unknown_with_error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::unknown()
        }
    }

    /// Snapshot of a cached session, with status derived from `now`.
    pub fn from_session(session: &ServiceSession, now: DateTime<Utc>) -> Self {
        Self {
            status: session.status_at(now),
            issued_at: Some(session.issued_at()),
            expires_at: Some(session.expires_at()),
            token: Some(TokenPreview {
                session_id: session.session_preview(),
                route_id: session.route_preview(),
            }),
            error: None,
        }
    }
}

/// Produces a masked preview of a secret value: first and last four
/// characters with the middle redacted. Values too short to mask safely
/// are fully redacted.
pub fn mask_token(token: &str) -> String {
    if token.is_empty() {
        return "-".to_string();
    }
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

//! Client seam for the Service Layer.
//!
//! The [`ServiceLayerClient`] trait is the only place the crate touches the
//! network. The manager is written against the trait so tests can swap in
//! [`MockServiceLayer`](crate::clients::mock::MockServiceLayer) with scripted
//! failures.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::ServiceLayerConfig;
use crate::session::ServiceSession;
use crate::Result;

/// What a successful login yields: the credential pair plus the server's
/// session timeout when it reports one.
#[derive(Debug, Clone)]
pub struct LoginReply {
    /// Opaque session token (`B1SESSION`).
    pub session_id: String,
    /// Opaque routing token (`ROUTEID`). Empty on single-node deployments
    /// that do not set the cookie.
    pub route_id: String,
    /// Server-reported session timeout, if present in the reply.
    pub session_timeout: Option<Duration>,
}

/// A client for one Service Layer instance.
///
/// Implementations must be `Send + Sync`; the manager shares one behind an
/// `Arc` across concurrent handlers. Every call must complete within the
/// timeout carried by the supplied configuration.
#[async_trait]
pub trait ServiceLayerClient: Send + Sync {
    /// Performs a login with the supplied credentials.
    ///
    /// # Errors
    ///
    /// - [`SlError::Network`](crate::SlError::Network) /
    ///   [`SlError::Timeout`](crate::SlError::Timeout): host unreachable or hung
    /// - [`SlError::Authentication`](crate::SlError::Authentication): credentials rejected
    /// - [`SlError::UnexpectedResponse`](crate::SlError::UnexpectedResponse): payload not understood
    async fn login(&self, config: &ServiceLayerConfig) -> Result<LoginReply>;

    /// Ends a session on the server. Best effort; the manager treats the
    /// local state as authoritative whether or not this succeeds.
    async fn logout(&self, config: &ServiceLayerConfig, session: &ServiceSession) -> Result<()>;
}

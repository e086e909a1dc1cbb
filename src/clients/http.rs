//! reqwest-based Service Layer client.
//!
//! Wire contract (SAP B1 Service Layer):
//! - `POST {base}/Login` with `{CompanyDB, UserName, Password}`; a 200 reply
//!   carries `SessionId` and `SessionTimeout` (minutes) in the body and the
//!   `ROUTEID` routing token in a `Set-Cookie` header.
//! - `POST {base}/Logout` with the session cookie.
//!
//! Every request carries the timeout from the supplied configuration; a hung
//! Service Layer surfaces as [`SlError::Timeout`], not a stuck handler.

use async_trait::async_trait;
use reqwest::header::SET_COOKIE;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::client::{LoginReply, ServiceLayerClient};
use crate::config::ServiceLayerConfig;
use crate::session::ServiceSession;
use crate::{Result, SlError};

#[derive(Serialize)]
struct LoginRequest<'a> {
    #[serde(rename = "CompanyDB")]
    company_db: &'a str,
    #[serde(rename = "UserName")]
    user_name: &'a str,
    #[serde(rename = "Password")]
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(rename = "SessionId")]
    session_id: String,
    /// Minutes, per the vendor contract.
    #[serde(rename = "SessionTimeout")]
    session_timeout: Option<u64>,
}

#[derive(Deserialize)]
struct VendorError {
    error: Option<VendorErrorBody>,
}

#[derive(Deserialize)]
struct VendorErrorBody {
    message: Option<VendorErrorMessage>,
}

#[derive(Deserialize)]
struct VendorErrorMessage {
    value: Option<String>,
}

/// HTTP client for a live Service Layer.
///
/// Holds only the underlying `reqwest::Client`; base URL, credentials, and
/// timeout travel with each call's [`ServiceLayerConfig`], which is what lets
/// `test_connection` probe arbitrary credentials through the same client.
#[derive(Debug, Clone, Default)]
pub struct HttpServiceLayerClient {
    client: reqwest::Client,
}

impl HttpServiceLayerClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(base_url: &str, path: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), path)
    }

    fn map_transport_error(e: reqwest::Error, config: &ServiceLayerConfig) -> SlError {
        if e.is_timeout() {
            SlError::Timeout(config.request_timeout.as_secs())
        } else {
            SlError::Network(e.to_string())
        }
    }

    /// Pulls the vendor's human-readable message out of an error body, if
    /// the body follows the documented shape.
    fn vendor_message(body: &str) -> Option<String> {
        serde_json::from_str::<VendorError>(body)
            .ok()
            .and_then(|v| v.error)
            .and_then(|e| e.message)
            .and_then(|m| m.value)
    }

    /// Extracts the `ROUTEID` cookie from the login reply headers.
    ///
    /// Single-node deployments may not set it; that is tolerated and the
    /// routing token is left empty.
    fn route_id_from_headers(headers: &reqwest::header::HeaderMap) -> String {
        for value in headers.get_all(SET_COOKIE) {
            let Ok(cookie) = value.to_str() else { continue };
            if let Some(rest) = cookie.trim_start().strip_prefix("ROUTEID=") {
                let route = rest.split(';').next().unwrap_or("").trim();
                if !route.is_empty() {
                    return route.to_string();
                }
            }
        }
        String::new()
    }
}

#[async_trait]
impl ServiceLayerClient for HttpServiceLayerClient {
    async fn login(&self, config: &ServiceLayerConfig) -> Result<LoginReply> {
        let request = LoginRequest {
            company_db: &config.company_db,
            user_name: &config.username,
            password: config.password.expose(),
        };

        let response = self
            .client
            .post(Self::endpoint(&config.base_url, "Login"))
            .timeout(config.request_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| Self::map_transport_error(e, config))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|e| Self::map_transport_error(e, config))?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let message = Self::vendor_message(&body)
                .unwrap_or_else(|| "Service Layer rejected the login".to_string());
            return Err(SlError::Authentication(message));
        }
        if !status.is_success() {
            return Err(SlError::UnexpectedResponse(format!(
                "login returned HTTP {}",
                status.as_u16()
            )));
        }

        let parsed: LoginResponse = serde_json::from_str(&body).map_err(|_| {
            SlError::UnexpectedResponse("login reply was not a Service Layer session".to_string())
        })?;

        Ok(LoginReply {
            session_id: parsed.session_id,
            route_id: Self::route_id_from_headers(&headers),
            session_timeout: parsed
                .session_timeout
                .map(|minutes| std::time::Duration::from_secs(minutes * 60)),
        })
    }

    async fn logout(&self, config: &ServiceLayerConfig, session: &ServiceSession) -> Result<()> {
        let cookie = if session.route_id().is_empty() {
            format!("B1SESSION={}", session.session_id())
        } else {
            format!(
                "B1SESSION={}; ROUTEID={}",
                session.session_id(),
                session.route_id()
            )
        };

        let response = self
            .client
            .post(Self::endpoint(&config.base_url, "Logout"))
            .timeout(config.request_timeout)
            .header(reqwest::header::COOKIE, cookie)
            .send()
            .await
            .map_err(|e| Self::map_transport_error(e, config))?;

        if !response.status().is_success() {
            // An already-dead server-side session is not a failure worth
            // surfacing; the local state is authoritative.
            tracing::debug!(status = %response.status(), "logout returned non-success");
        }
        Ok(())
    }
}

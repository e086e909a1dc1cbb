//! slbridge - Session lifecycle manager for the SAP Business One Service Layer.
//!
//! The Service Layer issues an opaque credential pair (`B1SESSION` +
//! `ROUTEID`) on login and expects it on every subsequent call, with a fixed
//! time-to-live. slbridge owns exactly one such session per process and gives
//! the rest of the deployment safe, serialized lifecycle operations over a
//! small HTTP API.
//!
//! # Design points
//!
//! - **Clock-derived expiry**: a session past its TTL is reported expired
//!   without asking the server, so status checks cost no network calls.
//! - **Preserve on failed refresh**: re-issuing the session only replaces the
//!   cached one after the new login fully succeeds; a failed refresh never
//!   destroys a token that might still work.
//! - **Atomic reset**: reset discards first and re-logs-in; on failure the
//!   process is cleanly in the no-session state.
//! - **Step-up reveal**: connection settings are only disclosed after the
//!   calling operator re-enters their own password, and the Service Layer
//!   password itself is never disclosed at all.
//!
//! # Quick Start
//!
//! ```no_run
//! use slbridge::clients::HttpServiceLayerClient;
//! use slbridge::{ServiceLayerConfig, SessionTokenManager};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> slbridge::Result<()> {
//!     let config = ServiceLayerConfig::new(
//!         "https://b1.example.com:50000/b1s/v1",
//!         "SBODEMOUS",
//!         "manager",
//!         std::env::var("SL_PASSWORD").unwrap_or_default(),
//!     );
//!
//!     let client = Arc::new(HttpServiceLayerClient::new());
//!     let manager = SessionTokenManager::new(config, client)?;
//!
//!     manager.reset().await?;
//!     let report = manager.status().await;
//!     println!("session: {}", report.status);
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod clients;
pub mod config;
pub mod error;
pub mod http;
pub mod manager;
pub mod session;

pub use client::{LoginReply, ServiceLayerClient};
pub use config::{AppConfig, OperatorVerifier, Secret, ServiceLayerConfig};
pub use error::{Result, SlError};
pub use manager::{RevealedCredentials, SessionTokenManager, TestReport};
pub use session::{ServiceSession, SessionStatus, StatusReport, TokenPreview};

//! Client implementations.
//!
//! - [`http`]: the real reqwest-based client
//! - [`mock`]: in-memory client with error injection for tests

pub mod http;
pub mod mock;

pub use http::HttpServiceLayerClient;
pub use mock::MockServiceLayer;

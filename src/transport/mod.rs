//! The two [`SyncTransport`](crate::traits::SyncTransport) implementations.
//!
//! | Transport | Exchange |
//! |-----------|----------|
//! | [`HttpTransport`] | `POST /api/data`, blocking, one connection per sync |
//! | [`MqttTransport`] | publish, then pick up whatever directive has arrived |
//!
//! Both encode the same JSON payload and parse the same response schema
//! (see [`crate::messages`]).

mod http;
mod mqtt;

pub use http::{HttpTransport, StdConnector, RESPONSE_CAPACITY, SYNC_PATH};
pub use mqtt::MqttTransport;

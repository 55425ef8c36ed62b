//! HTTP client for the Things Cloud history endpoints: stream CRUD,
//! paginated event reads, and commit of new events. Credential
//! storage, account signup, and device-push registration are the caller's
//! concern; this crate only shapes the requests the core sync engine needs.

pub mod client;
pub mod client_info;

pub use client::{EventsPage, HistoryClient, HistoryClientConfig, StreamMetadata};
pub use client_info::ClientInfo;

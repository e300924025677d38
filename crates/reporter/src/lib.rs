//! Report service collaborator.
//!
//! Validates the report key, delivers kills and status changes queued by the
//! tailer, keeps undelivered kills on disk, and runs the commander heartbeat.

pub mod api;
pub mod buffer;
pub mod credentials;
pub mod error;
pub mod heartbeat;
pub mod worker;

pub use api::{ApiClient, ApiConfig, ReportApi};
pub use buffer::{DEFAULT_BUFFER_CAPACITY, KillBuffer};
pub use credentials::{Credentials, KeyState};
pub use error::ReportError;
pub use heartbeat::{DEFAULT_HEARTBEAT_INTERVAL, heartbeat_for, run_heartbeat};
pub use worker::{
    DEFAULT_QUEUE_CAPACITY, DEFAULT_RETRY_INTERVAL, Outbound, ReportQueue, ReportWorker,
};

//! Intake HTTP API.
//!
//! `POST /submit` stores one intake record; `POST /upload-multiple` stores a
//! batch of report files and returns their public URLs. Uploaded objects are
//! readable under `GET /files/*key`.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use router::intake_router;
pub use server::{start_intake_server, IntakeServer};
pub use types::ApiContext;

//! Intake API endpoint handlers.

pub mod files;
pub mod health;
pub mod submit;
pub mod upload;

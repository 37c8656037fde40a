//! HTTP API handlers for huddle-importer
//!
//! REST endpoints driving an import through its lifecycle, plus an SSE
//! stream of progress events.

pub mod health;
pub mod import_workflow;
pub mod sse;

pub use health::health_routes;
pub use import_workflow::import_routes;
pub use sse::{event_routes, import_event_stream};

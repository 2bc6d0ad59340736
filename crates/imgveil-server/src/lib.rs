//! HTTP surface for imgveil.
//!
//! Exposes the session-init and get-chunk routes over axum, serves the
//! embedded browser client and runs the background session sweeper.

pub mod routes;
pub mod sweeper;

pub use routes::{AppState, build_router};
pub use sweeper::spawn_session_sweeper;
